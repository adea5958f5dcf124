//! Resumable frame evaluator
//!
//! Recursive evaluation re-expressed as an explicit state machine. Every
//! sub-evaluation is a `FrameState` on the machine's own stack, tagged with
//! the step it runs next. Evaluation can stop after any step and resume later,
//! which is what lets the scheduler interleave many evaluations.
//!
//! Tail positions (`if` branches, the last `begin` form, closure bodies and
//! macro expansions) reuse the current frame, so the stack only grows with
//! non-tail call depth.

mod exec_loop;
mod handlers;
mod machine;
pub mod types;

#[cfg(test)]
mod tests;

pub use exec_loop::{run_for, run_until_done, single_step};
pub use machine::FrameMachine;
pub use types::{FrameState, Phase, StepTag, Wait};

use super::{Evaluator, Strategy};
use crate::cell::{Cell, Env};
use crate::error::EvalResult;

/* ===================== Evaluator ===================== */

pub struct FrameEval {
    debug: bool,
    steps: u64,
    last_max_depth: usize,
}

impl FrameEval {
    pub fn new(debug: bool) -> Self {
        FrameEval {
            debug,
            steps: 0,
            last_max_depth: 0,
        }
    }

    /// Deepest frame stack reached by the most recent `eval`
    pub fn last_max_depth(&self) -> usize {
        self.last_max_depth
    }
}

impl Evaluator for FrameEval {
    fn strategy(&self) -> Strategy {
        Strategy::Frame
    }

    fn eval(&mut self, expr: &Cell, env: &Env) -> EvalResult<Cell> {
        let mut machine = FrameMachine::new(expr.clone(), env.clone()).with_debug(self.debug);
        let result = run_until_done(&mut machine);
        self.steps += machine.steps();
        self.last_max_depth = machine.max_depth();
        result
    }

    fn steps(&self) -> u64 {
        self.steps
    }
}
