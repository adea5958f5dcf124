//! Cooperative task scheduler
//!
//! Single-threaded and non-preemptive. Each tick walks the task list
//! round-robin from where the last tick stopped. Every visit decrements a
//! task's level; once the level reaches `PRI_RUN` it is reset to the task's
//! base priority and the task runs one quantum. Equal priorities therefore
//! take turns, and lower (more urgent) priorities come up more often.
//!
//! Tasks added from inside a hook go through a `SpawnHandle` and join the
//! list at the start of the next tick.

pub mod task;
pub mod types;

#[cfg(test)]
mod tests;

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use tracing::{debug, info, trace, warn};

use crate::cell::Cell;
use crate::config::SchedulerConfig;
use crate::error::Error;
use crate::reader;

pub use task::{ClassicTask, FrameTask, IdleTask, MachineTask, Task, TaskFactory};
pub use types::{
    TaskId, TaskInfo, TaskKind, TaskOutcome, TaskReport, Tick, WaitState, DEFAULT_QUANTUM,
    PRI_DEFAULT, PRI_HIGHEST, PRI_IDLE, PRI_RUN,
};

type ReportHook = Box<dyn FnMut(&TaskReport)>;
type SleepHook = Box<dyn FnMut(u64) -> u64>;
type AwakenHook = Box<dyn FnMut()>;

/* ===================== Spawn Handle ===================== */

struct Pending {
    id: TaskId,
    priority: i32,
    task: Box<dyn Task>,
}

/// Cloneable handle that queues tasks for the next tick
#[derive(Clone)]
pub struct SpawnHandle {
    inbox: Rc<RefCell<VecDeque<Pending>>>,
    next_id: Rc<std::cell::Cell<TaskId>>,
}

impl SpawnHandle {
    fn new() -> Self {
        SpawnHandle {
            inbox: Rc::new(RefCell::new(VecDeque::new())),
            next_id: Rc::new(std::cell::Cell::new(0)),
        }
    }

    fn allocate_id(&self) -> TaskId {
        let id = self.next_id.get();
        self.next_id.set(id.wrapping_add(1));
        id
    }

    /// Queue `task`; it becomes runnable at the start of the next tick
    pub fn spawn(&self, task: Box<dyn Task>, priority: i32) -> TaskId {
        let id = self.allocate_id();
        self.inbox.borrow_mut().push_back(Pending { id, priority, task });
        id
    }

    pub fn queued(&self) -> usize {
        self.inbox.borrow().len()
    }
}

/* ===================== Scheduler ===================== */

struct TaskSlot {
    id: TaskId,
    title: String,
    priority: i32,
    level: i32,
    wait: WaitState,
    quanta: u64,
    task: Box<dyn Task>,
}

impl TaskSlot {
    fn is_idle(&self) -> bool {
        self.task.kind() == TaskKind::Idle
    }

    /// Eligible for a quantum: not the idle task and not suspended
    fn schedulable(&self) -> bool {
        !self.is_idle() && self.wait == WaitState::Ready
    }

    fn report(self, outcome: TaskOutcome) -> TaskReport {
        TaskReport {
            id: self.id,
            title: self.title,
            kind: self.task.kind(),
            priority: self.priority,
            quanta: self.quanta,
            steps: self.task.steps(),
            outcome,
        }
    }
}

pub struct Scheduler {
    tasks: Vec<TaskSlot>,
    cursor: usize,
    quantum: usize,
    default_priority: i32,
    idle_sleep_ms: u64,
    spawner: SpawnHandle,
    on_complete: Option<ReportHook>,
    on_remove: Option<ReportHook>,
    on_sleep: Option<SleepHook>,
    on_awaken: Option<AwakenHook>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Scheduler::new(&SchedulerConfig::default())
    }
}

impl Scheduler {
    /// Scheduler holding only its idle task
    pub fn new(config: &SchedulerConfig) -> Self {
        let mut scheduler = Scheduler {
            tasks: Vec::new(),
            cursor: 0,
            quantum: config.quantum.max(1),
            default_priority: config.default_priority,
            idle_sleep_ms: config.idle_sleep_ms,
            spawner: SpawnHandle::new(),
            on_complete: None,
            on_remove: None,
            on_sleep: None,
            on_awaken: None,
        };
        scheduler.spawn_with_priority(Box::new(IdleTask), PRI_IDLE);
        scheduler
    }

    /* ===================== Hooks ===================== */

    pub fn on_complete(&mut self, hook: impl FnMut(&TaskReport) + 'static) -> &mut Self {
        self.on_complete = Some(Box::new(hook));
        self
    }

    pub fn on_remove(&mut self, hook: impl FnMut(&TaskReport) + 'static) -> &mut Self {
        self.on_remove = Some(Box::new(hook));
        self
    }

    /// Receives the desired sleep in milliseconds and returns the sleep to perform
    pub fn on_sleep(&mut self, hook: impl FnMut(u64) -> u64 + 'static) -> &mut Self {
        self.on_sleep = Some(Box::new(hook));
        self
    }

    pub fn on_awaken(&mut self, hook: impl FnMut() + 'static) -> &mut Self {
        self.on_awaken = Some(Box::new(hook));
        self
    }

    /* ===================== Task Management ===================== */

    pub fn spawner(&self) -> SpawnHandle {
        self.spawner.clone()
    }

    pub fn spawn(&mut self, task: Box<dyn Task>) -> TaskId {
        self.spawn_with_priority(task, self.default_priority)
    }

    pub fn spawn_with_priority(&mut self, task: Box<dyn Task>, priority: i32) -> TaskId {
        let id = self.spawner.allocate_id();
        self.insert(Pending { id, priority, task });
        id
    }

    fn insert(&mut self, pending: Pending) {
        let title = format!("{}.{}", pending.id, pending.task.kind());
        debug!(id = pending.id, title = %title, priority = pending.priority, "Task spawned");
        self.tasks.push(TaskSlot {
            id: pending.id,
            title,
            priority: pending.priority,
            level: pending.priority,
            wait: WaitState::Ready,
            quanta: 0,
            task: pending.task,
        });
    }

    fn drain_inbox(&mut self) {
        let queued: Vec<Pending> = self.spawner.inbox.borrow_mut().drain(..).collect();
        for pending in queued {
            self.insert(pending);
        }
    }

    fn position(&self, id: TaskId) -> Option<usize> {
        self.tasks.iter().position(|t| t.id == id)
    }

    /// Keep a task out of scheduling until `resume`
    pub fn suspend(&mut self, id: TaskId) -> bool {
        self.set_wait(id, WaitState::Suspended)
    }

    pub fn resume(&mut self, id: TaskId) -> bool {
        self.set_wait(id, WaitState::Ready)
    }

    fn set_wait(&mut self, id: TaskId, wait: WaitState) -> bool {
        match self.tasks.iter_mut().find(|t| t.id == id && !t.is_idle()) {
            Some(slot) => {
                slot.wait = wait;
                true
            }
            None => false,
        }
    }

    /// Remove a task between quanta; `on_remove` fires but `on_complete` does not
    pub fn cancel(&mut self, id: TaskId) -> Option<TaskReport> {
        let idx = self.position(id).filter(|idx| !self.tasks[*idx].is_idle())?;
        let report = self.remove_at(idx, TaskOutcome::Cancelled);
        info!(id, "Task cancelled");
        Some(report)
    }

    /// Tasks other than the idle task
    pub fn len(&self) -> usize {
        self.tasks.iter().filter(|t| !t.is_idle()).count() + self.spawner.queued()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn tasks(&self) -> Vec<TaskInfo> {
        self.tasks
            .iter()
            .map(|t| TaskInfo {
                id: t.id,
                title: t.title.clone(),
                kind: t.task.kind(),
                priority: t.priority,
                level: t.level,
                wait: t.wait,
                quanta: t.quanta,
            })
            .collect()
    }

    /* ===================== Ticking ===================== */

    /// Pick the next due task and run one quantum of it
    pub fn tick(&mut self) -> Tick {
        self.drain_inbox();
        if !self.tasks.iter().any(TaskSlot::schedulable) {
            return Tick::Idle;
        }

        let len = self.tasks.len();
        let mut visited = 0;
        let idx = loop {
            if visited == len {
                self.fast_forward();
                visited = 0;
            }
            visited += 1;

            let idx = self.cursor % len;
            self.cursor = (idx + 1) % len;
            let slot = &mut self.tasks[idx];
            if !slot.schedulable() {
                continue;
            }
            slot.level = slot.level.saturating_sub(1);
            if slot.level <= PRI_RUN {
                slot.level = slot.priority;
                break idx;
            }
        };

        self.run_at(idx)
    }

    /// Skip the laps in which no task would come due
    fn fast_forward(&mut self) {
        let gap = self
            .tasks
            .iter()
            .filter(|t| t.schedulable())
            .map(|t| t.level.saturating_sub(PRI_RUN))
            .min();
        let Some(gap) = gap else { return };
        let skip = gap.saturating_sub(1);
        if skip > 0 {
            for slot in self.tasks.iter_mut().filter(|t| t.schedulable()) {
                slot.level = slot.level.saturating_sub(skip);
            }
        }
    }

    fn run_at(&mut self, idx: usize) -> Tick {
        let slot = &mut self.tasks[idx];
        let id = slot.id;
        slot.quanta += 1;
        trace!(id, title = %slot.title, quantum = slot.quanta, "Running task");

        let outcome = match slot.task.run_quantum(self.quantum) {
            Ok(()) if !slot.task.is_finished() => return Tick::Ran(id),
            Ok(()) => {
                let result = slot.task.result().unwrap_or_else(Cell::nil);
                info!(id, title = %slot.title, result = %result, "Task completed");
                TaskOutcome::Completed(result)
            }
            Err(e) => {
                warn!(id, title = %slot.title, error = %e, "Task failed");
                TaskOutcome::Failed(e)
            }
        };

        if let Some(hook) = self.on_complete.as_mut() {
            let preview = TaskReport {
                id,
                title: self.tasks[idx].title.clone(),
                kind: self.tasks[idx].task.kind(),
                priority: self.tasks[idx].priority,
                quanta: self.tasks[idx].quanta,
                steps: self.tasks[idx].task.steps(),
                outcome: outcome.clone(),
            };
            hook(&preview);
        }
        Tick::Finished(self.remove_at(idx, outcome))
    }

    fn remove_at(&mut self, idx: usize, outcome: TaskOutcome) -> TaskReport {
        let report = self.tasks.remove(idx).report(outcome);
        if idx < self.cursor {
            self.cursor -= 1;
        }
        if !self.tasks.is_empty() {
            self.cursor %= self.tasks.len();
        }
        debug!(id = report.id, title = %report.title, "Task removed");
        if let Some(hook) = self.on_remove.as_mut() {
            hook(&report);
        }
        report
    }

    /* ===================== Driving Loops ===================== */

    /// Tick until nothing but the idle task is runnable
    pub fn run_until_idle(&mut self) -> Vec<TaskReport> {
        let mut reports = Vec::new();
        loop {
            match self.tick() {
                Tick::Idle => return reports,
                Tick::Ran(_) => {}
                Tick::Finished(report) => reports.push(report),
            }
        }
    }

    /// Tick until `stop` returns true, sleeping whenever the scheduler is idle
    pub fn serve(&mut self, mut stop: impl FnMut() -> bool) -> Vec<TaskReport> {
        let mut reports = Vec::new();
        while !stop() {
            match self.tick() {
                Tick::Idle => self.sleep(),
                Tick::Ran(_) => {}
                Tick::Finished(report) => reports.push(report),
            }
        }
        reports
    }

    /// Yield real time through the sleep hooks
    pub fn sleep(&mut self) {
        let wanted = self.idle_sleep_ms;
        let ms = match self.on_sleep.as_mut() {
            Some(hook) => hook(wanted),
            None => wanted,
        };
        trace!(ms, "Scheduler sleeping");
        if ms > 0 {
            std::thread::sleep(Duration::from_millis(ms));
        }
        if let Some(hook) = self.on_awaken.as_mut() {
            hook();
        }
    }
}

/* ===================== Source Programs ===================== */

/// Every top-level form of `source` wrapped in one `begin`, for use as a single task
pub fn program_form(source: &str) -> Result<Cell, Error> {
    let mut items = vec![Cell::symbol("begin")];
    items.extend(reader::read_program(source)?);
    Ok(Cell::list(items))
}
