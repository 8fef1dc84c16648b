mod common;

use automaton_core::{
    ModelListener, NotificationDispatcher, ObservableList, OwnerId, ProxyModel, Task, TaskError,
    TaskManager, TaskOutcome, TaskPhase, TaskStatus,
};
use common::{RecordingAlerts, WAIT};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

fn manager() -> (NotificationDispatcher, TaskManager, Arc<RecordingAlerts>) {
    let dispatcher = NotificationDispatcher::new();
    let alerts = RecordingAlerts::new();
    let tasks = TaskManager::new(&dispatcher, alerts.clone());
    (dispatcher, tasks, alerts)
}

fn owned_by(tasks: &TaskManager, owner: &str) -> Arc<ProxyModel<Arc<Task>>> {
    let proxy = ProxyModel::new(tasks.dispatcher());
    let owner = OwnerId::from(owner);
    proxy.set_filter(move |task: &Arc<Task>| task.owner() == &owner);
    let queue: Arc<dyn ObservableList<Arc<Task>>> = tasks.queue();
    proxy.set_model(Some(queue));
    proxy
}

#[test]
fn tasks_start_in_launch_order_one_at_a_time() {
    let (_dispatcher, tasks, _alerts) = manager();
    let started = Arc::new(Mutex::new(Vec::new()));
    let active = Arc::new(AtomicUsize::new(0));
    let overlap = Arc::new(AtomicBool::new(false));

    let latencies = [30u64, 1, 15, 0, 5];
    for (index, latency) in latencies.into_iter().enumerate() {
        let started = Arc::clone(&started);
        let active = Arc::clone(&active);
        let overlap = Arc::clone(&overlap);
        tasks.launch_task(
            format!("task {index}"),
            "fifo",
            move |ctx| {
                if active.fetch_add(1, Ordering::SeqCst) != 0 {
                    overlap.store(true, Ordering::SeqCst);
                }
                assert_eq!(ctx.task().phase(), TaskPhase::Running);
                started.lock().push(index);
                thread::sleep(Duration::from_millis(latency));
                active.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            },
            |_| {},
        );
    }

    assert!(tasks.wait_idle_timeout(WAIT));
    assert_eq!(*started.lock(), vec![0, 1, 2, 3, 4]);
    assert!(!overlap.load(Ordering::SeqCst));
    assert!(tasks.queue().is_empty());
    assert!(tasks.is_idle());
}

#[test]
fn queue_model_holds_only_enqueued_or_running_tasks() {
    let (dispatcher, tasks, _alerts) = manager();
    let (release_tx, release_rx) = mpsc::channel::<()>();

    let first = tasks.launch_task(
        "blocker",
        "queue",
        move |_| {
            release_rx
                .recv_timeout(WAIT)
                .map_err(|err| TaskError::Failed(err.to_string()))
        },
        |_| {},
    );
    let second = tasks.launch_task("waiting", "queue", |_| Ok(()), |_| {});

    assert_eq!(tasks.queue().size(), 2);
    assert_eq!(first.phase(), TaskPhase::Running);
    assert_eq!(second.phase(), TaskPhase::Queued);
    let running = tasks.running_task().expect("blocker is running");
    assert_eq!(running.id(), first.id());

    release_tx.send(()).expect("release blocker");
    assert!(tasks.wait_idle_timeout(WAIT));
    dispatcher.process_pending();
    assert_eq!(second.phase(), TaskPhase::Completed);
    assert!(tasks.queue().is_empty());
}

#[test]
fn failing_middle_task_alerts_once_and_the_queue_drains() {
    let (dispatcher, tasks, alerts) = manager();
    let outcomes = Arc::new(Mutex::new(Vec::new()));

    let mut launched = Vec::new();
    for (owner, fails) in [("A", false), ("B", true), ("A", false)] {
        let sink = Arc::clone(&outcomes);
        launched.push(tasks.launch_task(
            format!("work for {owner}"),
            owner,
            move |ctx| {
                if fails {
                    ctx.set_status(TaskStatus::error(-32000, "execution reverted"));
                    return Err(TaskError::Failed("execution reverted".to_string()));
                }
                ctx.set_progress(0.5);
                Ok(())
            },
            move |outcome| sink.lock().push(outcome.clone()),
        ));
    }

    assert!(tasks.wait_idle_timeout(WAIT));
    dispatcher.process_pending();

    assert!(tasks.queue().is_empty());
    let raised = alerts.alerts();
    assert_eq!(raised.len(), 1);
    assert_eq!(raised[0].0, "work for B");
    assert!(raised[0].1.contains("execution reverted"));

    assert!(launched[0].status().is_ok());
    assert!(!launched[1].status().is_ok());
    assert!(launched[2].status().is_ok());
    let outcomes = outcomes.lock();
    assert_eq!(outcomes.len(), 3);
    assert_eq!(outcomes[0], TaskOutcome::Succeeded);
    assert!(matches!(outcomes[1], TaskOutcome::Failed(_)));
    assert_eq!(outcomes[2], TaskOutcome::Succeeded);
}

#[test]
fn stopping_an_owner_empties_its_filtered_view_without_alerts() {
    let (dispatcher, tasks, alerts) = manager();
    let view_tasks = owned_by(&tasks, "account:view");
    let view_hits = Arc::new(AtomicUsize::new(0));
    let view_counter = Arc::clone(&view_hits);
    let view_listener: Arc<dyn ModelListener> = Arc::new(move || {
        view_counter.fetch_add(1, Ordering::SeqCst);
    });
    view_tasks.subscribe(&view_listener);
    let callbacks = Arc::new(AtomicUsize::new(0));
    let (started_tx, started_rx) = mpsc::channel();

    let counted = Arc::clone(&callbacks);
    tasks.launch_task(
        "long poll",
        "account:view",
        move |ctx| {
            started_tx
                .send(())
                .map_err(|err| TaskError::Failed(err.to_string()))?;
            loop {
                ctx.check_exit()?;
                thread::sleep(Duration::from_millis(2));
            }
        },
        move |_| {
            counted.fetch_add(1, Ordering::SeqCst);
        },
    );
    for _ in 0..2 {
        let counted = Arc::clone(&callbacks);
        tasks.launch_task(
            "queued behind",
            "account:view",
            |_| Ok(()),
            move |_| {
                counted.fetch_add(1, Ordering::SeqCst);
            },
        );
    }
    let other_ran = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&other_ran);
    tasks.launch_task(
        "other owner",
        "account:other",
        move |_| {
            flag.store(true, Ordering::SeqCst);
            Ok(())
        },
        |_| {},
    );

    started_rx.recv_timeout(WAIT).expect("long poll started");
    dispatcher.process_pending();
    assert_eq!(view_tasks.size(), 3);
    let hits_before_stop = view_hits.load(Ordering::SeqCst);

    let stopped = tasks
        .stop_owned_tasks(&OwnerId::from("account:view"))
        .expect("stop from the UI thread");
    assert_eq!(stopped, 3);
    assert_eq!(view_tasks.size(), 0);
    assert!(view_hits.load(Ordering::SeqCst) > hits_before_stop);
    assert!(tasks
        .queue()
        .find(|task| task.owner().as_str() == "account:view")
        .is_none());

    assert!(tasks.wait_idle_timeout(WAIT));
    dispatcher.process_pending();
    assert!(other_ran.load(Ordering::SeqCst));
    assert!(alerts.alerts().is_empty());
    assert_eq!(callbacks.load(Ordering::SeqCst), 0);
}

#[test]
fn stopping_an_owner_without_tasks_returns_immediately() {
    let (_dispatcher, tasks, _alerts) = manager();
    let stopped = tasks
        .stop_owned_tasks(&OwnerId::from("nobody"))
        .expect("nothing to stop");
    assert_eq!(stopped, 0);
}

#[test]
fn progress_updates_reach_task_listeners_on_the_ui_pass() {
    let (dispatcher, tasks, _alerts) = manager();
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let (progressed_tx, progressed_rx) = mpsc::channel::<()>();

    let task = tasks.launch_task(
        "stepper",
        "progress",
        move |ctx| {
            ctx.set_progress(0.25);
            ctx.set_message("quarter done");
            ctx.set_progress(0.5);
            progressed_tx
                .send(())
                .map_err(|err| TaskError::Failed(err.to_string()))?;
            release_rx
                .recv_timeout(WAIT)
                .map_err(|err| TaskError::Failed(err.to_string()))
        },
        |_| {},
    );
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    let listener: Arc<dyn ModelListener> = Arc::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    task.subscribe(&listener);

    progressed_rx.recv_timeout(WAIT).expect("task reported progress");
    assert_eq!(hits.load(Ordering::SeqCst), 0);
    dispatcher.process_pending();
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert_eq!(task.progress(), 0.5);
    assert_eq!(task.message(), "quarter done");
    assert_eq!(task.log(), vec!["quarter done".to_string()]);

    release_tx.send(()).expect("release");
    assert!(tasks.wait_idle_timeout(WAIT));
}
