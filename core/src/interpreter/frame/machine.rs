//! Frame machine state
//!
//! The machine holds every in-flight frame of one evaluation:
//! - frames: explicit stack; `frames[i + 1]` is the child `frames[i]` waits on
//! - steps: handler dispatches so far
//! - max_depth: high-water mark of the stack

use tracing::debug;

use super::types::{FrameState, Wait};
use crate::cell::{Cell, Env};

/* ===================== Machine ===================== */

pub struct FrameMachine {
    pub(super) frames: Vec<FrameState>,
    pub(super) steps: u64,
    pub(super) max_depth: usize,
    pub(super) debug: bool,
}

impl FrameMachine {
    /// Machine with a single root frame evaluating `expr` in `env`
    pub fn new(expr: Cell, env: Env) -> Self {
        FrameMachine {
            frames: vec![FrameState::new(expr, env)],
            steps: 0,
            max_depth: 1,
            debug: false,
        }
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// True once the root frame reached DONE
    pub fn is_done(&self) -> bool {
        self.frames.len() == 1 && self.frames[0].is_done()
    }

    /// Root result, available once done
    pub fn result(&self) -> Option<&Cell> {
        if self.is_done() {
            Some(&self.frames[0].result)
        } else {
            None
        }
    }

    pub fn root(&self) -> &FrameState {
        &self.frames[0]
    }

    /// Frame currently doing work
    pub fn top(&self) -> &FrameState {
        &self.frames[self.frames.len() - 1]
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }
}

/* ===================== Frame Management ===================== */

/// Suspend the top frame on a new child frame
pub(super) fn push_frame(machine: &mut FrameMachine, expr: Cell, env: Env) {
    if let Some(parent) = machine.frames.last_mut() {
        parent.wait = Wait::Subframe;
    }
    if machine.debug {
        debug!(depth = machine.frames.len() + 1, expr = %expr, "spawn frame");
    }
    machine.frames.push(FrameState::new(expr, env));
    machine.max_depth = machine.max_depth.max(machine.frames.len());
}

/// Pop a finished child and hand its result to the parent
pub(super) fn pop_frame(machine: &mut FrameMachine) {
    let Some(child) = machine.frames.pop() else {
        return;
    };
    if let Some(parent) = machine.frames.last_mut() {
        parent.wait = Wait::SubframeFin;
        parent.incoming = Some(child.result);
    }
}
