//! Core of the Automaton Playground desktop app.
//! Observable list models, a single-flight task queue and the account,
//! proposal, DEX and slot services the UI binds to.

pub mod app;
pub mod config;
pub mod contract;
pub mod logging;
pub mod model;
pub mod service;
pub mod task;

pub use app::AppCore;
pub use config::{ConfigError, ConfigResult, ConfigStore, NetworkSettings};
pub use contract::{
    ContractCall, ContractClient, ContractContext, ContractError, ContractResult, Endpoint,
};
pub use logging::{init_logging, logging_status, LoggingError};
pub use model::account::{Account, AccountValidationError};
pub use model::list::{ListModel, ObservableList};
pub use model::notify::{ModelListener, NotificationDispatcher, Notify, SubscriptionId};
pub use model::order::{Order, OrderKind};
pub use model::proposal::{Proposal, ProposalStatus};
pub use model::proxy::ProxyModel;
pub use model::slot::{Slot, SlotStats};
pub use service::{
    AccountService, DexService, ProposalService, ServiceError, ServiceResult, SlotService,
};
pub use task::{
    AlertSink, LogAlertSink, OwnerId, Task, TaskContext, TaskError, TaskManager, TaskOutcome,
    TaskPhase, TaskQueueError, TaskResult, TaskStatus,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
