//! Background task execution.
//!
//! # Responsibility
//! - Serialize network-bound units of work so only one runs at a time.
//! - Expose task progress and the task queue as observable models.
//!
//! # Invariants
//! - Tasks run in strict FIFO enqueue order.
//! - Cancellation is cooperative; nothing is forcibly terminated.

pub mod manager;
pub mod record;

pub use manager::{AlertSink, LogAlertSink, TaskManager, TaskQueueError, TaskQueueModel};
pub use record::{
    OwnerId, Task, TaskContext, TaskError, TaskId, TaskOutcome, TaskPhase, TaskResult, TaskStatus,
    TASK_CANCELLED_CODE, TASK_FAILED_CODE,
};
