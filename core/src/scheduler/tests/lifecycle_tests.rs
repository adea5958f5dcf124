//! Spawning, hooks, cancellation and the serve loop

use std::cell::{Cell as Counter, RefCell};
use std::rc::Rc;

use super::helpers::*;
use crate::cell::Cell;
use crate::error::EvalError;
use crate::scheduler::{TaskKind, TaskOutcome, Tick, PRI_DEFAULT};

#[test]
fn test_spawn_assigns_ids_and_titles() {
    let log = run_log();
    let mut sched = scheduler();
    let a = sched.spawn(Spin::boxed("a", 1, &log));
    let b = sched.spawn_with_priority(Spin::boxed("b", 1, &log), 5);
    assert_eq!((a, b), (1, 2));
    assert_eq!(sched.len(), 2);

    let tasks = sched.tasks();
    assert_eq!(tasks[1].title, "1.FrameTask");
    assert_eq!(tasks[1].priority, PRI_DEFAULT);
    assert_eq!(tasks[2].title, "2.FrameTask");
    assert_eq!(tasks[2].priority, 5);
    assert_eq!(tasks[2].kind, TaskKind::Frame);
}

#[test]
fn test_hooks_see_completion_then_removal() {
    let log = run_log();
    let events = Rc::new(RefCell::new(Vec::new()));
    let mut sched = scheduler();

    let seen = events.clone();
    sched.on_complete(move |r| seen.borrow_mut().push(format!("complete {}", r.title)));
    let seen = events.clone();
    sched.on_remove(move |r| seen.borrow_mut().push(format!("remove {}", r.title)));

    sched.spawn(Spin::boxed("a", 2, &log));
    let reports = sched.run_until_idle();

    assert_eq!(*events.borrow(), vec!["complete 1.FrameTask", "remove 1.FrameTask"]);
    assert_eq!(reports[0].outcome, TaskOutcome::Completed(Cell::symbol("a")));
    assert_eq!(reports[0].quanta, 2);
    assert_eq!(reports[0].steps, 2);
}

#[test]
fn test_failing_task_does_not_stop_others() {
    let log = run_log();
    let failures = Rc::new(RefCell::new(Vec::new()));
    let mut sched = scheduler();
    let seen = failures.clone();
    sched.on_complete(move |r| {
        if let TaskOutcome::Failed(e) = &r.outcome {
            seen.borrow_mut().push(e.clone());
        }
    });

    sched.spawn(Spin::boxed("a", 3, &log));
    let boom = sched.spawn(Box::new(Boom));
    sched.spawn(Spin::boxed("c", 3, &log));

    let reports = sched.run_until_idle();
    assert_eq!(reports.len(), 3);
    let failed = reports.iter().find(|r| r.id == boom).unwrap();
    assert_eq!(failed.outcome, TaskOutcome::Failed(EvalError::DivideByZero));
    assert_eq!(failed.title, "2.ClassicTask");
    assert_eq!(*failures.borrow(), vec![EvalError::DivideByZero]);
    assert_eq!(reports.iter().filter(|r| r.outcome.is_completed()).count(), 2);
    assert_eq!(log.borrow().len(), 6);
}

#[test]
fn test_cancel_fires_only_removal() {
    let log = run_log();
    let completed = Rc::new(Counter::new(0));
    let removed = Rc::new(Counter::new(0));
    let mut sched = scheduler();
    let c = completed.clone();
    sched.on_complete(move |_| c.set(c.get() + 1));
    let r = removed.clone();
    sched.on_remove(move |_| r.set(r.get() + 1));

    let id = sched.spawn(Spin::boxed("a", 10, &log));
    assert!(matches!(sched.tick(), Tick::Ran(ran) if ran == id));

    let report = sched.cancel(id).unwrap();
    assert_eq!(report.outcome, TaskOutcome::Cancelled);
    assert_eq!(report.quanta, 1);
    assert_eq!((completed.get(), removed.get()), (0, 1));
    assert!(sched.cancel(id).is_none());
    assert_eq!(sched.tick(), Tick::Idle);
}

#[test]
fn test_spawn_handle_queues_until_next_tick() {
    let log = run_log();
    let mut sched = scheduler();
    let handle = sched.spawner();

    let id = handle.spawn(Spin::boxed("late", 1, &log), PRI_DEFAULT);
    assert_eq!(id, 1);
    assert_eq!(handle.queued(), 1);
    assert_eq!(sched.tasks().len(), 1);
    assert_eq!(sched.len(), 1);

    let Tick::Finished(report) = sched.tick() else {
        unreachable!("queued task should run on the first tick")
    };
    assert_eq!(report.id, id);
    assert_eq!(handle.queued(), 0);
}

#[test]
fn test_completion_hook_can_spawn_followups() {
    let log = run_log();
    let mut sched = scheduler();
    let handle = sched.spawner();
    let hook_log = log.clone();
    let spawned = Rc::new(Counter::new(false));
    let flag = spawned.clone();
    sched.on_complete(move |_| {
        if !flag.get() {
            flag.set(true);
            handle.spawn(Spin::boxed("followup", 1, &hook_log), PRI_DEFAULT);
        }
    });

    sched.spawn(Spin::boxed("first", 1, &log));
    let reports = sched.run_until_idle();
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[1].title, "2.FrameTask");
    assert_eq!(*log.borrow(), vec!["first", "followup"]);
}

#[test]
fn test_serve_sleeps_when_idle() {
    let log = run_log();
    let sleeps = Rc::new(Counter::new(0u32));
    let wakes = Rc::new(Counter::new(0u32));
    let mut sched = scheduler();

    let s = sleeps.clone();
    sched.on_sleep(move |wanted| {
        s.set(s.get() + 1);
        assert_eq!(wanted, 0);
        0
    });
    let w = wakes.clone();
    sched.on_awaken(move || w.set(w.get() + 1));

    sched.spawn(Spin::boxed("a", 2, &log));
    let stop_after = sleeps.clone();
    let reports = sched.serve(move || stop_after.get() >= 3);

    assert_eq!(reports.len(), 1);
    assert_eq!(sleeps.get(), 3);
    assert_eq!(wakes.get(), 3);
}

#[test]
fn test_reports_serialize_to_json() {
    let log = run_log();
    let mut sched = scheduler();
    sched.spawn(Spin::boxed("a", 1, &log));
    sched.spawn(Box::new(Boom));
    let cancelled = sched.spawn(Spin::boxed("c", 5, &log));
    let cancel_report = sched.cancel(cancelled).unwrap();
    let reports = sched.run_until_idle();

    let done = serde_json::to_value(&reports[0]).unwrap();
    assert_eq!(done["kind"], "FrameTask");
    assert_eq!(done["outcome"]["status"], "completed");
    assert_eq!(done["outcome"]["value"], "a");

    let failed = serde_json::to_value(&reports[1]).unwrap();
    assert_eq!(failed["outcome"]["status"], "failed");
    assert_eq!(failed["outcome"]["value"], "division by zero");

    let cancelled = serde_json::to_value(&cancel_report).unwrap();
    assert_eq!(cancelled["outcome"]["status"], "cancelled");
    assert_eq!(cancelled["quanta"], 0);
}
