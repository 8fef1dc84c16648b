//! Application core wiring.
//!
//! # Responsibility
//! - Construct the dispatcher, task manager, config and services once, in
//!   dependency order, and hand them to the UI layer.
//! - Tear everything down in a fixed order at shutdown.
//!
//! # Invariants
//! - All services share one dispatcher and one task queue.
//! - `shutdown` stops every task before persisting, so no worker writes to
//!   a model or the config after the document is saved.

use crate::config::{ConfigStore, NetworkSettings};
use crate::contract::{ContractClient, ContractContext};
use crate::model::notify::NotificationDispatcher;
use crate::service::{AccountService, DexService, ProposalService, ServiceResult, SlotService};
use crate::task::{AlertSink, TaskManager};
use log::info;
use parking_lot::Mutex;
use std::sync::Arc;

pub struct AppCore {
    dispatcher: NotificationDispatcher,
    config: Arc<ConfigStore>,
    settings: Arc<Mutex<NetworkSettings>>,
    tasks: TaskManager,
    accounts: AccountService,
    proposals: ProposalService,
    dex: DexService,
    slots: SlotService,
}

impl AppCore {
    /// Builds the core on top of a loaded config.
    ///
    /// `network` selects the network section; `None` uses the config's
    /// active network. Stored accounts are loaded into the account model.
    pub fn start(
        config: ConfigStore,
        network: Option<&str>,
        client: Arc<dyn ContractClient>,
        alerts: Arc<dyn AlertSink>,
    ) -> Self {
        let settings = match network {
            Some(name) => NetworkSettings::load(&config, &NetworkSettings::for_network(name)),
            None => NetworkSettings::load_active(&config),
        };
        let contract = ContractContext::new(client, settings.endpoint());
        info!(
            "event=app_start module=app status=ok network={} eth_url={} version={}",
            settings.network,
            settings.eth_url,
            crate::core_version()
        );

        let dispatcher = NotificationDispatcher::new();
        let config = Arc::new(config);
        let settings = Arc::new(Mutex::new(settings));
        let tasks = TaskManager::new(&dispatcher, alerts);

        let accounts = AccountService::new(&dispatcher, Arc::clone(&config), tasks.clone());
        accounts.load_from_config();
        let proposals = ProposalService::new(&dispatcher, contract.clone(), tasks.clone());
        let dex = DexService::new(&dispatcher, contract.clone(), tasks.clone());
        let slots = SlotService::new(
            &dispatcher,
            Arc::clone(&settings),
            Arc::clone(&config),
            contract,
            tasks.clone(),
        );

        Self {
            dispatcher,
            config,
            settings,
            tasks,
            accounts,
            proposals,
            dex,
            slots,
        }
    }

    pub fn dispatcher(&self) -> &NotificationDispatcher {
        &self.dispatcher
    }

    pub fn config(&self) -> &Arc<ConfigStore> {
        &self.config
    }

    /// Snapshot of the active network settings.
    pub fn settings(&self) -> NetworkSettings {
        self.settings.lock().clone()
    }

    pub fn tasks(&self) -> &TaskManager {
        &self.tasks
    }

    pub fn accounts(&self) -> &AccountService {
        &self.accounts
    }

    pub fn proposals(&self) -> &ProposalService {
        &self.proposals
    }

    pub fn dex(&self) -> &DexService {
        &self.dex
    }

    pub fn slots(&self) -> &SlotService {
        &self.slots
    }

    /// Lets the host UI schedule a pass whenever a worker queues UI work.
    ///
    /// `waker` runs on the queuing thread and must not call `process_pending`
    /// itself.
    pub fn set_waker(&self, waker: impl Fn() + Send + Sync + 'static) {
        self.dispatcher.set_waker(waker);
    }

    /// One UI pass: delivers deferred notifications, alerts and callbacks.
    pub fn process_pending(&self) -> usize {
        self.dispatcher.process_pending()
    }

    /// Stops all tasks, then writes accounts and settings back to disk.
    ///
    /// Call from the UI thread, never from a task.
    pub fn shutdown(&self) -> ServiceResult<()> {
        let stopped = self.tasks.stop_all_tasks()?;
        self.tasks.wait_idle();
        self.dispatcher.process_pending();

        self.accounts.save_to_config()?;
        self.settings.lock().save(&self.config)?;
        self.config.save()?;
        info!(
            "event=app_shutdown module=app status=ok stopped_tasks={}",
            stopped
        );
        Ok(())
    }
}
