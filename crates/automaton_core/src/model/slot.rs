//! Validator slot model.
//!
//! # Invariants
//! - `SlotStats` is stored as metadata of the slot list model, so the table
//!   and its aggregate are always read under the same lock.
//!
//! Known inconsistency: a slot's `owner` and `difficulty` come from two
//! separate contract reads, so a claim landing between them can pair the new
//! owner with the old difficulty until the next refresh.

use crate::model::account::is_zero_address;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub index: u64,
    pub owner: String,
    pub difficulty: u64,
}

impl Slot {
    pub fn is_claimed(&self) -> bool {
        !is_zero_address(&self.owner)
    }
}

/// Aggregated counters over the slot table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotStats {
    pub slots_number: u64,
    pub slots_claimed: u64,
    pub min_difficulty: u64,
}

impl SlotStats {
    /// Derives the aggregate for `slots` with the contract's difficulty floor.
    pub fn from_slots(slots: &[Slot], min_difficulty: u64) -> Self {
        Self {
            slots_number: slots.len() as u64,
            slots_claimed: slots.iter().filter(|slot| slot.is_claimed()).count() as u64,
            min_difficulty,
        }
    }

    pub fn has_free_slot(&self) -> bool {
        self.slots_claimed < self.slots_number
    }
}
