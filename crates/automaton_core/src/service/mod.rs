//! Domain services behind the application's views.
//!
//! # Responsibility
//! - Own the list models the account, proposal, DEX and slot views bind to.
//! - Validate user input up front, then express each operation as contract
//!   calls on the shared task queue.
//!
//! # Invariants
//! - A validation failure returns `ServiceError` and launches no task.
//! - Signed operations are owned by `OwnerId::for_account(address)`, so
//!   removing an account stops its pending work.
//! - Worker threads update models with deferred notification only.

use crate::config::ConfigError;
use crate::model::account::AccountValidationError;
use crate::task::TaskQueueError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod account_service;
pub mod dex_service;
pub mod proposal_service;
pub mod slot_service;

pub use account_service::{AccountService, ACCOUNTS_KEY};
pub use dex_service::DexService;
pub use proposal_service::ProposalService;
pub use slot_service::SlotService;

pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Debug)]
pub enum ServiceError {
    /// Required input missing or out of range.
    Validation(String),
    Account(AccountValidationError),
    DuplicateAccount(String),
    NotFound(String),
    Config(ConfigError),
    TaskQueue(TaskQueueError),
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(message) => write!(f, "{message}"),
            Self::Account(err) => write!(f, "{err}"),
            Self::DuplicateAccount(address) => {
                write!(f, "account `{address}` is already imported")
            }
            Self::NotFound(what) => write!(f, "{what} not found"),
            Self::Config(err) => write!(f, "{err}"),
            Self::TaskQueue(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Account(err) => Some(err),
            Self::Config(err) => Some(err),
            Self::TaskQueue(err) => Some(err),
            _ => None,
        }
    }
}

impl From<AccountValidationError> for ServiceError {
    fn from(value: AccountValidationError) -> Self {
        Self::Account(value)
    }
}

impl From<ConfigError> for ServiceError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TaskQueueError> for ServiceError {
    fn from(value: TaskQueueError) -> Self {
        Self::TaskQueue(value)
    }
}

fn require_text(field: &str, value: &str) -> ServiceResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::Validation(format!("{field} must not be empty")));
    }
    Ok(trimmed.to_string())
}

fn require_positive(field: &str, value: u64) -> ServiceResult<u64> {
    if value == 0 {
        return Err(ServiceError::Validation(format!(
            "{field} must be greater than zero"
        )));
    }
    Ok(value)
}

/// Fraction of `done` out of `total`, 1.0 for an empty run.
fn fraction(done: u64, total: u64) -> f32 {
    if total == 0 {
        1.0
    } else {
        (done as f64 / total as f64) as f32
    }
}
