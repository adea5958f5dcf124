//! Scheduler data types

use std::fmt;

use serde::{Serialize, Serializer};

use crate::cell::Cell;
use crate::error::EvalError;

pub type TaskId = u32;

/// Default base priority; lower numbers are more urgent
pub const PRI_DEFAULT: i32 = 20;
/// Base priority of the idle task
pub const PRI_IDLE: i32 = i32::MAX;
/// A task runs once its decaying level reaches this value
pub const PRI_RUN: i32 = -20;
/// Runs on every visit
pub const PRI_HIGHEST: i32 = i32::MIN;

/// Steps granted per quantum unless configured otherwise
pub const DEFAULT_QUANTUM: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TaskKind {
    #[serde(rename = "ClassicTask")]
    Classic,
    #[serde(rename = "FrameTask")]
    Frame,
    #[serde(rename = "MachineTask")]
    Machine,
    #[serde(rename = "Idle")]
    Idle,
}

impl TaskKind {
    pub fn name(self) -> &'static str {
        match self {
            TaskKind::Classic => "ClassicTask",
            TaskKind::Frame => "FrameTask",
            TaskKind::Machine => "MachineTask",
            TaskKind::Idle => "Idle",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WaitState {
    Ready,
    Suspended,
}

/// How a task left the scheduler
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "value", rename_all = "lowercase")]
pub enum TaskOutcome {
    Completed(#[serde(serialize_with = "display")] Cell),
    Failed(#[serde(serialize_with = "display")] EvalError),
    Cancelled,
}

impl TaskOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, TaskOutcome::Completed(_))
    }
}

/// Delivered to `on_complete`/`on_remove` and returned from the driving loops
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskReport {
    pub id: TaskId,
    pub title: String,
    pub kind: TaskKind,
    pub priority: i32,
    pub quanta: u64,
    pub steps: u64,
    pub outcome: TaskOutcome,
}

/// Snapshot of one scheduled task
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskInfo {
    pub id: TaskId,
    pub title: String,
    pub kind: TaskKind,
    pub priority: i32,
    pub level: i32,
    pub wait: WaitState,
    pub quanta: u64,
}

/// Result of one scheduling tick
#[derive(Debug, Clone, PartialEq)]
pub enum Tick {
    /// Nothing but the idle task was runnable
    Idle,
    /// The task ran one quantum and is still in flight
    Ran(TaskId),
    /// The task ran its last quantum and was removed
    Finished(TaskReport),
}

fn display<T: fmt::Display, S: Serializer>(value: &T, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(value)
}
