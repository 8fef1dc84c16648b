//! Task record and the execution context handed to work closures.
//!
//! # Responsibility
//! - Hold title, owner, status, progress, status message and log of one unit
//!   of background work.
//! - Let the work closure report progress and poll for cancellation.
//!
//! # Invariants
//! - Status starts ok and is overwritten by the work closure or its outcome.
//! - Progress stays within `[0, 1]`.
//! - The log is append-only.
//! - Updates reach task listeners on the next UI pass, never on the worker.

use crate::contract::ContractError;
use crate::model::notify::{ModelListener, NotificationDispatcher, Notifier, Notify, SubscriptionId};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

pub type TaskResult<T> = Result<T, TaskError>;

/// Status code for generic task failures.
pub const TASK_FAILED_CODE: i32 = 1;
/// Status code recorded when a task exits on cancellation.
pub const TASK_CANCELLED_CODE: i32 = 2;

/// Stable task identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(Uuid);

impl TaskId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Display for TaskId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque key attributing tasks to the session that launched them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OwnerId(String);

impl OwnerId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Owner key for work bound to one account; case-insensitive on address.
    pub fn for_account(address: &str) -> Self {
        Self(format!("account:{}", address.trim().to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for OwnerId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OwnerId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for OwnerId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&OwnerId> for OwnerId {
    fn from(value: &OwnerId) -> Self {
        value.clone()
    }
}

/// Ok/error code plus message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStatus {
    pub code: i32,
    pub message: String,
}

impl TaskStatus {
    pub const OK_CODE: i32 = 0;

    pub fn ok() -> Self {
        Self {
            code: Self::OK_CODE,
            message: String::new(),
        }
    }

    pub fn error(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.code == Self::OK_CODE
    }
}

impl Default for TaskStatus {
    fn default() -> Self {
        Self::ok()
    }
}

/// Position of a task in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskPhase {
    Queued,
    Running,
    Completed,
}

/// Failure returned by a work closure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// Cooperative exit after a stop request; not reported to the user.
    Cancelled,
    Contract(ContractError),
    Failed(String),
    Panicked(String),
}

impl TaskError {
    /// Status recorded on the task for this failure.
    pub fn status(&self) -> TaskStatus {
        match self {
            Self::Cancelled => TaskStatus::error(TASK_CANCELLED_CODE, "cancelled"),
            Self::Contract(err) => TaskStatus::error(err.code(), err.to_string()),
            Self::Failed(message) => TaskStatus::error(TASK_FAILED_CODE, message.clone()),
            Self::Panicked(message) => {
                TaskStatus::error(TASK_FAILED_CODE, format!("task panicked: {message}"))
            }
        }
    }
}

impl Display for TaskError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cancelled => write!(f, "task cancelled"),
            Self::Contract(err) => write!(f, "{err}"),
            Self::Failed(message) => write!(f, "{message}"),
            Self::Panicked(message) => write!(f, "task panicked: {message}"),
        }
    }
}

impl Error for TaskError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Contract(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ContractError> for TaskError {
    fn from(value: ContractError) -> Self {
        Self::Contract(value)
    }
}

/// Final result of a task, handed to its completion callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Succeeded,
    Failed(TaskStatus),
    Cancelled,
}

impl TaskOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }
}

pub(crate) type Work = Box<dyn FnOnce(&TaskContext) -> TaskResult<()> + Send>;
pub(crate) type OnDone = Box<dyn FnOnce(&TaskOutcome) + Send>;

pub(crate) struct Job {
    pub(crate) work: Work,
    pub(crate) on_done: OnDone,
}

struct TaskState {
    phase: TaskPhase,
    status: TaskStatus,
    progress: f32,
    message: String,
    log: Vec<String>,
}

/// One unit of background work tracked by the task manager.
pub struct Task {
    id: TaskId,
    title: String,
    owner: OwnerId,
    state: Mutex<TaskState>,
    cancel_requested: AtomicBool,
    job: Mutex<Option<Job>>,
    notifier: Arc<Notifier>,
}

impl Task {
    pub(crate) fn new(
        title: String,
        owner: OwnerId,
        job: Job,
        dispatcher: &NotificationDispatcher,
    ) -> Self {
        Self {
            id: TaskId::new(),
            title,
            owner,
            state: Mutex::new(TaskState {
                phase: TaskPhase::Queued,
                status: TaskStatus::ok(),
                progress: 0.0,
                message: String::new(),
                log: Vec::new(),
            }),
            cancel_requested: AtomicBool::new(false),
            job: Mutex::new(Some(job)),
            notifier: Notifier::new(dispatcher),
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn owner(&self) -> &OwnerId {
        &self.owner
    }

    pub fn phase(&self) -> TaskPhase {
        self.state.lock().phase
    }

    pub fn status(&self) -> TaskStatus {
        self.state.lock().status.clone()
    }

    pub fn progress(&self) -> f32 {
        self.state.lock().progress
    }

    pub fn message(&self) -> String {
        self.state.lock().message.clone()
    }

    /// Copies the status-message log.
    pub fn log(&self) -> Vec<String> {
        self.state.lock().log.clone()
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.cancel_requested.load(Ordering::Acquire)
    }

    /// Subscribes to progress, message and phase changes of this task.
    pub fn subscribe(&self, listener: &Arc<dyn ModelListener>) -> SubscriptionId {
        self.notifier.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.notifier.unsubscribe(id);
    }

    pub(crate) fn request_cancel(&self) {
        self.cancel_requested.store(true, Ordering::Release);
    }

    pub(crate) fn take_job(&self) -> Option<Job> {
        self.job.lock().take()
    }

    pub(crate) fn mark_running(&self) {
        self.state.lock().phase = TaskPhase::Running;
        self.notifier.notify(Notify::Deferred);
    }

    pub(crate) fn complete(&self, outcome: &TaskOutcome) {
        {
            let mut state = self.state.lock();
            state.phase = TaskPhase::Completed;
            match outcome {
                TaskOutcome::Succeeded => state.progress = 1.0,
                TaskOutcome::Failed(status) => state.status = status.clone(),
                TaskOutcome::Cancelled => state.status = TaskError::Cancelled.status(),
            }
        }
        self.notifier.notify(Notify::Deferred);
    }

    fn update(&self, f: impl FnOnce(&mut TaskState)) {
        f(&mut *self.state.lock());
        self.notifier.notify(Notify::Deferred);
    }
}

impl Debug for Task {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("title", &self.title)
            .field("owner", &self.owner)
            .field("phase", &self.phase())
            .finish()
    }
}

/// Handle passed to a running work closure.
pub struct TaskContext {
    task: Arc<Task>,
}

impl TaskContext {
    pub(crate) fn new(task: Arc<Task>) -> Self {
        Self { task }
    }

    pub fn task(&self) -> &Arc<Task> {
        &self.task
    }

    /// Returns whether the owner asked this task to stop.
    pub fn should_exit(&self) -> bool {
        self.task.is_cancel_requested()
    }

    /// `Err(TaskError::Cancelled)` once a stop was requested; use with `?`.
    pub fn check_exit(&self) -> TaskResult<()> {
        if self.should_exit() {
            Err(TaskError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Sets progress, clamped to `[0, 1]`; NaN is ignored.
    pub fn set_progress(&self, fraction: f32) {
        if fraction.is_nan() {
            return;
        }
        self.task
            .update(|state| state.progress = fraction.clamp(0.0, 1.0));
    }

    /// Sets the status message and appends it to the log.
    pub fn set_message(&self, message: impl Into<String>) {
        let message = message.into();
        self.task.update(|state| {
            state.log.push(message.clone());
            state.message = message;
        });
    }

    /// Appends to the log without changing the status message.
    pub fn log(&self, line: impl Into<String>) {
        let line = line.into();
        self.task.update(|state| state.log.push(line));
    }

    pub fn set_status(&self, status: TaskStatus) {
        self.task.update(|state| state.status = status);
    }
}

#[cfg(test)]
mod tests {
    use super::{
        Job, OwnerId, Task, TaskContext, TaskError, TaskPhase, TaskStatus, TASK_CANCELLED_CODE,
    };
    use crate::contract::ContractError;
    use crate::model::notify::{ModelListener, NotificationDispatcher};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn idle_task(dispatcher: &NotificationDispatcher) -> Arc<Task> {
        Arc::new(Task::new(
            "probe".to_string(),
            OwnerId::from("tests"),
            Job {
                work: Box::new(|_| Ok(())),
                on_done: Box::new(|_| {}),
            },
            dispatcher,
        ))
    }

    #[test]
    fn new_task_is_queued_with_ok_status() {
        let dispatcher = NotificationDispatcher::new();
        let task = idle_task(&dispatcher);
        assert_eq!(task.phase(), TaskPhase::Queued);
        assert!(task.status().is_ok());
        assert_eq!(task.progress(), 0.0);
        assert!(task.take_job().is_some());
        assert!(task.take_job().is_none());
    }

    #[test]
    fn context_updates_are_delivered_on_the_ui_pass() {
        let dispatcher = NotificationDispatcher::new();
        let task = idle_task(&dispatcher);
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let listener: Arc<dyn ModelListener> = Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        task.subscribe(&listener);

        let ctx = TaskContext::new(Arc::clone(&task));
        ctx.set_progress(0.25);
        ctx.set_message("reading slots");
        ctx.set_progress(7.0);
        ctx.log("slot 3 skipped");
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        dispatcher.process_pending();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(task.progress(), 1.0);
        assert_eq!(task.message(), "reading slots");
        assert_eq!(task.log(), vec!["reading slots", "slot 3 skipped"]);
    }

    #[test]
    fn check_exit_reports_cancellation() {
        let dispatcher = NotificationDispatcher::new();
        let task = idle_task(&dispatcher);
        let ctx = TaskContext::new(Arc::clone(&task));
        assert!(ctx.check_exit().is_ok());

        task.request_cancel();
        assert!(ctx.should_exit());
        assert_eq!(ctx.check_exit(), Err(TaskError::Cancelled));
        assert_eq!(TaskError::Cancelled.status().code, TASK_CANCELLED_CODE);
    }

    #[test]
    fn contract_errors_keep_their_code() {
        let err = TaskError::from(ContractError::transport(-32000, "execution reverted"));
        let status = err.status();
        assert_eq!(status.code, -32000);
        assert!(status.message.contains("execution reverted"));
        assert!(!status.is_ok());
        assert!(TaskStatus::default().is_ok());
    }

    #[test]
    fn account_owner_ids_ignore_address_case() {
        assert_eq!(
            OwnerId::for_account("0xABCDEF"),
            OwnerId::for_account(" 0xabcdef ")
        );
    }
}
