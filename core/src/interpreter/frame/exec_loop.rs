//! Core execution loop
//!
//! `single_step()` advances the evaluation by one unit: the top frame runs one
//! handler, and if that finishes it, each parent in turn consumes its child's
//! result within the same step. The host stack never grows with the
//! evaluated program's nesting.

use tracing::debug;

use super::handlers::{dispatch, Flow};
use super::machine::{pop_frame, push_frame, FrameMachine};
use crate::cell::Cell;
use crate::error::EvalResult;

/* ===================== Public API ===================== */

/// Step the machine until the root frame is done and return its result
pub fn run_until_done(machine: &mut FrameMachine) -> EvalResult<Cell> {
    loop {
        if let Some(result) = machine.result() {
            return Ok(result.clone());
        }
        single_step(machine)?;
    }
}

/// Step at most `budget` times; returns true once the machine is done
pub fn run_for(machine: &mut FrameMachine, budget: u32) -> EvalResult<bool> {
    for _ in 0..budget {
        if machine.is_done() {
            break;
        }
        single_step(machine)?;
    }
    Ok(machine.is_done())
}

/// Execute one step
pub fn single_step(machine: &mut FrameMachine) -> EvalResult<()> {
    if machine.is_done() {
        return Ok(());
    }

    let mut flow = dispatch_top(machine)?;
    loop {
        match flow {
            Flow::Stay | Flow::Again => return Ok(()),
            Flow::Spawn(expr, env) => {
                push_frame(machine, expr, env);
                return Ok(());
            }
            Flow::Done if machine.frames.len() == 1 => return Ok(()),
            Flow::Done => {
                pop_frame(machine);
                flow = dispatch_top(machine)?;
            }
        }
    }
}

/* ===================== Dispatch ===================== */

/// Run handlers on the top frame until one yields something other than `Again`
fn dispatch_top(machine: &mut FrameMachine) -> EvalResult<Flow> {
    let depth = machine.frames.len();
    let debug = machine.debug;
    let Some(frame) = machine.frames.last_mut() else {
        return Ok(Flow::Done);
    };

    loop {
        if debug {
            debug!(depth, phase = %frame.phase(), expr = %frame.expr, "frame step");
        }
        frame.steps += 1;
        machine.steps += 1;
        match dispatch(frame)? {
            Flow::Again => continue,
            flow => return Ok(flow),
        }
    }
}
