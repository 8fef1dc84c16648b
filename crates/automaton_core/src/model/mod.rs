//! Observable presentation models and the domain records they carry.
//!
//! # Responsibility
//! - Provide list and proxy models that feed table/grid widgets.
//! - Define the account, proposal, order and slot records shown in them.
//!
//! # Invariants
//! - Listener callbacks never run under a model lock.
//! - Deferred notifications are delivered by the UI pass, never by the
//!   mutating thread.

pub mod account;
pub mod list;
pub mod notify;
pub mod order;
pub mod proposal;
pub mod proxy;
pub mod slot;
