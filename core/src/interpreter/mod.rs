//! Evaluation strategies
//!
//! Three engines implement the same surface language:
//! - `classic`: recursive tree walker, the reference oracle
//! - `frame`: resumable state machine with an explicit frame stack
//! - `Cell` (in `crate::machine`): the evaluator written in assembly and run on the bytecode VM
//!
//! Callers pick one through `Strategy` and talk to it through `Evaluator`.

pub mod classic;
pub mod forms;
pub mod frame;

#[cfg(test)]
mod tests;

use std::fmt;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::cell::{Cell, Env};
use crate::config::Config;
use crate::error::{Error, EvalResult};
use crate::machine::eval::CellMachineEval;
use crate::reader;

pub use classic::ClassicEval;
pub use frame::{run_until_done, FrameEval, FrameMachine};

/* ===================== Evaluator ===================== */

/// One evaluation engine
pub trait Evaluator {
    fn strategy(&self) -> Strategy;

    /// Evaluate `expr` in `env`
    fn eval(&mut self, expr: &Cell, env: &Env) -> EvalResult<Cell>;

    /// Steps taken since construction (engine-specific unit)
    fn steps(&self) -> u64;
}

/// Which engine evaluates expressions
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Recursive reference evaluator
    Classic,
    /// Resumable frame evaluator
    #[default]
    Frame,
    /// Assembly evaluator on the bytecode machine
    Cell,
}

impl Strategy {
    pub const ALL: [Strategy; 3] = [Strategy::Classic, Strategy::Frame, Strategy::Cell];
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Strategy::Classic => "classic",
            Strategy::Frame => "frame",
            Strategy::Cell => "cell",
        })
    }
}

/// Build the engine for `strategy` using the engine and VM settings in `config`
pub fn build_evaluator(strategy: Strategy, config: &Config) -> Result<Box<dyn Evaluator>> {
    let debug = config.engine.debug;
    Ok(match strategy {
        Strategy::Classic => Box::new(ClassicEval::new(config.engine.max_depth, debug)),
        Strategy::Frame => Box::new(FrameEval::new(debug)),
        Strategy::Cell => Box::new(
            CellMachineEval::from_config(&config.vm, debug)
                .context("Failed to prepare the cell machine evaluator")?,
        ),
    })
}

/// Read every form in `source` and evaluate them in order, returning the last result
pub fn eval_source(
    evaluator: &mut dyn Evaluator,
    source: &str,
    env: &Env,
) -> Result<Cell, Error> {
    let mut last = Cell::nil();
    for form in reader::read_program(source)? {
        last = evaluator.eval(&form, env)?;
    }
    Ok(last)
}
