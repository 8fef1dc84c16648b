//! Validator slots.
//!
//! # Responsibility
//! - Mirror the contract's slots into the slot grid model, with the
//!   aggregate `SlotStats` kept as that model's metadata.
//! - Claim a slot with a mined nonce.
//! - Cache slot counters into the active network's settings.
//!
//! # Invariants
//! - Slots and their stats change together under the model lock.
//!
//! A slot's owner and difficulty come from two separate calls, so a claim
//! landing between them can pair a new owner with the old difficulty. The
//! next refresh corrects it.

use super::{fraction, ServiceError, ServiceResult};
use crate::config::network::MIN_DIFFICULTY_FIELD;
use crate::config::{ConfigStore, NetworkSettings};
use crate::contract::{ContractCall, ContractContext};
use crate::model::account::Account;
use crate::model::list::ListModel;
use crate::model::notify::{NotificationDispatcher, Notify};
use crate::model::slot::{Slot, SlotStats};
use crate::task::{OwnerId, Task, TaskContext, TaskError, TaskManager, TaskResult};
use log::info;
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;

pub const SLOTS_NUMBER_METHOD: &str = "slotsNumber";
pub const MIN_DIFFICULTY_METHOD: &str = "minDifficulty";
pub const GET_SLOT_OWNER_METHOD: &str = "getSlotOwner";
pub const GET_SLOT_DIFFICULTY_METHOD: &str = "getSlotDifficulty";
pub const CLAIM_SLOT_METHOD: &str = "claimSlot";

pub type SlotModel = ListModel<Slot, SlotStats>;

pub struct SlotService {
    slots: Arc<SlotModel>,
    settings: Arc<Mutex<NetworkSettings>>,
    config: Arc<ConfigStore>,
    contract: ContractContext,
    tasks: TaskManager,
}

struct SlotSync {
    slots: Arc<SlotModel>,
    settings: Arc<Mutex<NetworkSettings>>,
    config: Arc<ConfigStore>,
    contract: ContractContext,
}

impl SlotService {
    pub fn new(
        dispatcher: &NotificationDispatcher,
        settings: Arc<Mutex<NetworkSettings>>,
        config: Arc<ConfigStore>,
        contract: ContractContext,
        tasks: TaskManager,
    ) -> Self {
        let slots = Arc::new(SlotModel::new(dispatcher));
        {
            let cached = settings.lock();
            slots.update(Notify::None, |_, stats| {
                *stats = SlotStats {
                    slots_number: cached.slots_number,
                    slots_claimed: cached.slots_claimed,
                    min_difficulty: cached.min_difficulty,
                };
            });
        }
        Self {
            slots,
            settings,
            config,
            contract,
            tasks,
        }
    }

    pub fn slots(&self) -> Arc<SlotModel> {
        Arc::clone(&self.slots)
    }

    /// Current aggregate, read under the slot model's lock.
    pub fn stats(&self) -> SlotStats {
        self.slots.meta()
    }

    pub fn refresh_slots(&self, owner: impl Into<OwnerId>) -> Arc<Task> {
        let sync = self.sync();
        self.tasks.launch_task(
            "Refresh slots",
            owner,
            move |ctx| sync.reload(ctx),
            |_| {},
        )
    }

    /// Claims a free slot with a nonce meeting the minimum difficulty.
    ///
    /// # Errors
    /// `Validation` when the last known stats show no free slot.
    pub fn claim_slot(&self, account: &Account, nonce: u64) -> ServiceResult<Arc<Task>> {
        account.validate()?;
        if !self.stats().has_free_slot() {
            return Err(ServiceError::Validation(
                "no free slot to claim; refresh slots first".to_string(),
            ));
        }

        let call = ContractCall::signed(
            CLAIM_SLOT_METHOD,
            vec![json!(nonce)],
            account.private_key.clone(),
        );
        let sync = self.sync();
        Ok(self.tasks.launch_task(
            "Claim slot",
            OwnerId::for_account(&account.address),
            move |ctx| {
                ctx.set_message("Submitting claim");
                sync.contract.call_raw(&call)?;
                ctx.check_exit()?;
                sync.reload(ctx)
            },
            |_| {},
        ))
    }

    fn sync(&self) -> SlotSync {
        SlotSync {
            slots: Arc::clone(&self.slots),
            settings: Arc::clone(&self.settings),
            config: Arc::clone(&self.config),
            contract: self.contract.clone(),
        }
    }
}

impl SlotSync {
    fn read_u64(&self, method: &str, params: Vec<serde_json::Value>) -> TaskResult<u64> {
        Ok(self.contract.call_json(&ContractCall::read(method, params))?)
    }

    fn reload(&self, ctx: &TaskContext) -> TaskResult<()> {
        ctx.set_message("Loading slots");
        let slots_number = self.read_u64(SLOTS_NUMBER_METHOD, Vec::new())?;
        let min_difficulty = self.read_u64(MIN_DIFFICULTY_METHOD, Vec::new())?;

        let mut fetched = Vec::new();
        for index in 0..slots_number {
            ctx.check_exit()?;
            let owner: String = self
                .contract
                .call_json(&ContractCall::read(GET_SLOT_OWNER_METHOD, vec![json!(index)]))?;
            let difficulty = self.read_u64(GET_SLOT_DIFFICULTY_METHOD, vec![json!(index)])?;
            fetched.push(Slot {
                index,
                owner,
                difficulty,
            });
            ctx.set_progress(fraction(index + 1, slots_number));
        }

        let stats = self.slots.update(Notify::Deferred, |items, stats| {
            *items = fetched;
            *stats = SlotStats::from_slots(items, min_difficulty);
            *stats
        });
        self.cache_counters(stats)?;

        info!(
            "event=slots_refresh module=service status=ok slots_number={} slots_claimed={}",
            stats.slots_number, stats.slots_claimed
        );
        ctx.set_message(format!(
            "{} of {} slots claimed",
            stats.slots_claimed, stats.slots_number
        ));
        Ok(())
    }

    fn cache_counters(&self, stats: SlotStats) -> TaskResult<()> {
        let mut settings = self.settings.lock();
        settings.slots_number = stats.slots_number;
        settings.slots_claimed = stats.slots_claimed;
        settings.min_difficulty = stats.min_difficulty;
        settings
            .save_slot_counters(&self.config)
            .map_err(|err| TaskError::Failed(err.to_string()))?;
        self.config
            .set(&settings.key(MIN_DIFFICULTY_FIELD), &stats.min_difficulty)
            .map_err(|err| TaskError::Failed(err.to_string()))
    }
}
