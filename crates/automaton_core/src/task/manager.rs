//! Single-flight FIFO task manager.
//!
//! # Responsibility
//! - Run background work one task at a time, in enqueue order, each on its
//!   own worker thread, so blocking contract calls never stall the UI.
//! - Publish the enqueued-or-running tasks as an observable queue model.
//! - Stop an owner's tasks cooperatively during teardown.
//!
//! # Invariants
//! - At most one task is `Running`; it is always the queue head.
//! - A completed task is removed from the queue and never re-enqueued.
//! - A failed task never blocks the tasks behind it; nothing is retried.
//! - Queue mutations under the scheduler lock use deferred notification, so
//!   listener code cannot re-enter the scheduler. A stop call delivers the
//!   queue change immediately once that lock is released.
//! - Completion callbacks and alerts run on the UI pass.

use crate::logging::sanitize_message;
use crate::model::list::ListModel;
use crate::model::notify::{NotificationDispatcher, Notify};
use crate::task::record::{
    Job, OwnerId, Task, TaskContext, TaskError, TaskOutcome, TaskResult, TaskStatus,
    TASK_FAILED_CODE,
};
use log::{error, info, warn};
use parking_lot::{Condvar, Mutex};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

const MAX_LOGGED_MESSAGE_CHARS: usize = 200;

/// Observable queue of enqueued-or-running tasks.
pub type TaskQueueModel = ListModel<Arc<Task>>;

/// User-visible failure surface (a blocking alert dialog in the host UI).
pub trait AlertSink: Send + Sync {
    fn alert(&self, title: &str, message: &str);
}

/// Alert sink that only writes the alert to the log.
#[derive(Debug, Default)]
pub struct LogAlertSink;

impl AlertSink for LogAlertSink {
    fn alert(&self, title: &str, message: &str) {
        warn!(
            "event=alert module=task status=error title={} message={}",
            sanitize_message(title, MAX_LOGGED_MESSAGE_CHARS),
            sanitize_message(message, MAX_LOGGED_MESSAGE_CHARS)
        );
    }
}

/// Task manager misuse errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskQueueError {
    /// `stop_owned_tasks` was called from the worker of a task it would wait on.
    CalledFromOwnTask(OwnerId),
}

impl Display for TaskQueueError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CalledFromOwnTask(owner) => write!(
                f,
                "cannot stop tasks of `{owner}` from inside one of its running tasks"
            ),
        }
    }
}

impl Error for TaskQueueError {}

struct RunningTask {
    task: Arc<Task>,
    thread: ThreadId,
}

#[derive(Default)]
struct Scheduler {
    running: Option<RunningTask>,
}

struct ManagerInner {
    queue: Arc<TaskQueueModel>,
    dispatcher: NotificationDispatcher,
    alerts: Arc<dyn AlertSink>,
    scheduler: Mutex<Scheduler>,
    settled: Condvar,
}

/// Handle to the process-wide task queue. Cloning shares the same queue.
#[derive(Clone)]
pub struct TaskManager {
    inner: Arc<ManagerInner>,
}

impl TaskManager {
    pub fn new(dispatcher: &NotificationDispatcher, alerts: Arc<dyn AlertSink>) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                queue: Arc::new(ListModel::new(dispatcher)),
                dispatcher: dispatcher.clone(),
                alerts,
                scheduler: Mutex::new(Scheduler::default()),
                settled: Condvar::new(),
            }),
        }
    }

    /// Enqueues `work`; starts it at once when nothing else is running.
    ///
    /// `on_done` runs on the UI pass after completion, unless the task was
    /// stopped through `stop_owned_tasks`.
    pub fn launch_task<W, D>(
        &self,
        title: impl Into<String>,
        owner: impl Into<OwnerId>,
        work: W,
        on_done: D,
    ) -> Arc<Task>
    where
        W: FnOnce(&TaskContext) -> TaskResult<()> + Send + 'static,
        D: FnOnce(&TaskOutcome) + Send + 'static,
    {
        let job = Job {
            work: Box::new(work),
            on_done: Box::new(on_done),
        };
        let task = Arc::new(Task::new(
            title.into(),
            owner.into(),
            job,
            &self.inner.dispatcher,
        ));
        info!(
            "event=task_enqueued module=task status=ok task_id={} owner={} title={}",
            task.id(),
            task.owner(),
            task.title()
        );

        let mut scheduler = self.inner.scheduler.lock();
        self.inner.queue.add_item(Arc::clone(&task), Notify::Deferred);
        start_next(&self.inner, &mut scheduler);
        task
    }

    /// Requests cancellation of every task owned by `owner` and blocks until
    /// none of them remains in the queue. Returns how many were stopped.
    ///
    /// Tasks that have not started are removed at once; the running one is
    /// awaited. Teardown paths only: the running task must poll its
    /// cancellation flag for this call to return.
    ///
    /// # Errors
    /// Returns `CalledFromOwnTask` when invoked from the worker thread of a
    /// running task owned by `owner`, which would otherwise deadlock.
    pub fn stop_owned_tasks(&self, owner: &OwnerId) -> Result<usize, TaskQueueError> {
        self.stop_matching(|task| task.owner() == owner)
            .map_err(|()| TaskQueueError::CalledFromOwnTask(owner.clone()))
    }

    /// Stops every task regardless of owner; used at shutdown.
    pub fn stop_all_tasks(&self) -> Result<usize, TaskQueueError> {
        self.stop_matching(|_| true)
            .map_err(|()| TaskQueueError::CalledFromOwnTask(OwnerId::new("*")))
    }

    /// The observable queue of enqueued-or-running tasks.
    pub fn queue(&self) -> Arc<TaskQueueModel> {
        Arc::clone(&self.inner.queue)
    }

    pub fn dispatcher(&self) -> &NotificationDispatcher {
        &self.inner.dispatcher
    }

    pub fn running_task(&self) -> Option<Arc<Task>> {
        self.inner
            .scheduler
            .lock()
            .running
            .as_ref()
            .map(|running| Arc::clone(&running.task))
    }

    pub fn is_idle(&self) -> bool {
        let scheduler = self.inner.scheduler.lock();
        scheduler.running.is_none() && self.inner.queue.is_empty()
    }

    /// Blocks until the queue is empty and nothing runs.
    ///
    /// Must not be called from inside a task.
    pub fn wait_idle(&self) {
        let mut scheduler = self.inner.scheduler.lock();
        while scheduler.running.is_some() || !self.inner.queue.is_empty() {
            self.inner.settled.wait(&mut scheduler);
        }
    }

    /// Like `wait_idle`, giving up after `timeout`. Returns whether idle.
    pub fn wait_idle_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut scheduler = self.inner.scheduler.lock();
        while scheduler.running.is_some() || !self.inner.queue.is_empty() {
            if self
                .inner
                .settled
                .wait_until(&mut scheduler, deadline)
                .timed_out()
            {
                return scheduler.running.is_none() && self.inner.queue.is_empty();
            }
        }
        true
    }

    fn stop_matching(&self, matches: impl Fn(&Task) -> bool) -> Result<usize, ()> {
        let stopped = self.cancel_and_wait(matches)?;
        if stopped > 0 {
            // Owner views must be empty by the time the caller tears down.
            self.inner.queue.notify(Notify::Immediate);
        }
        Ok(stopped)
    }

    fn cancel_and_wait(&self, matches: impl Fn(&Task) -> bool) -> Result<usize, ()> {
        let current = thread::current().id();
        let mut scheduler = self.inner.scheduler.lock();

        let running_id = match &scheduler.running {
            Some(running) if matches(&*running.task) && running.thread == current => {
                return Err(());
            }
            Some(running) => Some(running.task.id()),
            None => None,
        };

        let owned: Vec<Arc<Task>> = self
            .inner
            .queue
            .snapshot()
            .into_iter()
            .filter(|task| matches(&**task))
            .collect();
        if owned.is_empty() {
            return Ok(0);
        }
        for task in &owned {
            task.request_cancel();
        }

        let dropped = self.inner.queue.remove_where(
            |task| matches(&**task) && Some(task.id()) != running_id,
            Notify::Deferred,
        );
        for task in &dropped {
            // The owner is going away, so its callback must not fire.
            drop(task.take_job());
            task.complete(&TaskOutcome::Cancelled);
            info!(
                "event=task_dropped module=task status=ok task_id={} owner={}",
                task.id(),
                task.owner()
            );
        }
        if !dropped.is_empty() {
            self.inner.settled.notify_all();
        }

        while self.inner.queue.snapshot().iter().any(|task| matches(&**task)) {
            self.inner.settled.wait(&mut scheduler);
        }
        Ok(owned.len())
    }
}

/// Starts the queue head when nothing runs. Caller holds the scheduler lock.
fn start_next(inner: &Arc<ManagerInner>, scheduler: &mut Scheduler) {
    while scheduler.running.is_none() {
        let Some(task) = inner.queue.try_get(0) else {
            return;
        };
        task.mark_running();

        let worker_inner = Arc::clone(inner);
        let worker_task = Arc::clone(&task);
        let spawned = thread::Builder::new()
            .name(format!("automaton-task-{}", task.id()))
            .spawn(move || run_task(worker_inner, worker_task));

        match spawned {
            Ok(handle) => {
                info!(
                    "event=task_started module=task status=ok task_id={} owner={}",
                    task.id(),
                    task.owner()
                );
                scheduler.running = Some(RunningTask {
                    task,
                    thread: handle.thread().id(),
                });
            }
            Err(err) => {
                error!(
                    "event=task_started module=task status=error task_id={} error={}",
                    task.id(),
                    err
                );
                let outcome = TaskOutcome::Failed(TaskStatus::error(
                    TASK_FAILED_CODE,
                    format!("failed to start worker: {err}"),
                ));
                task.complete(&outcome);
                if let Some(job) = task.take_job() {
                    publish_outcome(inner, &task, outcome, job.on_done);
                }
                inner
                    .queue
                    .remove_where(|queued| queued.id() == task.id(), Notify::Deferred);
                inner.settled.notify_all();
            }
        }
    }
}

fn run_task(inner: Arc<ManagerInner>, task: Arc<Task>) {
    let Some(Job { work, on_done }) = task.take_job() else {
        // Dropped by a concurrent stop before the worker got to it.
        finish(&inner, &task);
        return;
    };

    let ctx = TaskContext::new(Arc::clone(&task));
    let result = if task.is_cancel_requested() {
        Err(TaskError::Cancelled)
    } else {
        panic::catch_unwind(AssertUnwindSafe(|| work(&ctx)))
            .unwrap_or_else(|payload| Err(TaskError::Panicked(panic_text(payload.as_ref()))))
    };

    let outcome = match result {
        Ok(()) => {
            let status = task.status();
            if status.is_ok() {
                TaskOutcome::Succeeded
            } else {
                TaskOutcome::Failed(status)
            }
        }
        Err(TaskError::Cancelled) => TaskOutcome::Cancelled,
        Err(err) => TaskOutcome::Failed(err.status()),
    };
    task.complete(&outcome);
    publish_outcome(&inner, &task, outcome, on_done);
    finish(&inner, &task);
}

/// Logs the outcome and marshals alert + completion callback to the UI pass.
fn publish_outcome(
    inner: &ManagerInner,
    task: &Arc<Task>,
    outcome: TaskOutcome,
    on_done: Box<dyn FnOnce(&TaskOutcome) + Send>,
) {
    let stopped = task.is_cancel_requested();
    match &outcome {
        TaskOutcome::Succeeded => info!(
            "event=task_completed module=task status=ok task_id={}",
            task.id()
        ),
        TaskOutcome::Cancelled => info!(
            "event=task_completed module=task status=cancelled task_id={}",
            task.id()
        ),
        TaskOutcome::Failed(status) => {
            warn!(
                "event=task_completed module=task status=error task_id={} code={} message={}",
                task.id(),
                status.code,
                sanitize_message(&status.message, MAX_LOGGED_MESSAGE_CHARS)
            );
            if !stopped {
                let alerts = Arc::clone(&inner.alerts);
                let title = task.title().to_string();
                let message = status.message.clone();
                inner
                    .dispatcher
                    .post(move || alerts.alert(title.as_str(), message.as_str()));
            }
        }
    }

    if !stopped {
        inner.dispatcher.post(move || on_done(&outcome));
    }
}

fn finish(inner: &Arc<ManagerInner>, task: &Arc<Task>) {
    let mut scheduler = inner.scheduler.lock();
    inner
        .queue
        .remove_where(|queued| queued.id() == task.id(), Notify::Deferred);
    if scheduler
        .running
        .as_ref()
        .is_some_and(|running| running.task.id() == task.id())
    {
        scheduler.running = None;
    }
    inner.settled.notify_all();
    start_next(inner, &mut scheduler);
}

fn panic_text(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
