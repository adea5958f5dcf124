//! Schedulable tasks
//!
//! A task owns one in-flight evaluation and advances it a bounded number of
//! steps per quantum. The reference evaluator cannot pause, so `ClassicTask`
//! finishes in its first quantum.

use anyhow::Result;

use super::types::TaskKind;
use crate::cell::{Cell, Env};
use crate::config::Config;
use crate::error::{EvalError, EvalResult};
use crate::interpreter::frame::{run_for, FrameMachine};
use crate::interpreter::{ClassicEval, Evaluator, Strategy};
use crate::machine::{CellMachineEval, Machine};

pub trait Task {
    fn kind(&self) -> TaskKind;

    /// Advance by at most `budget` steps
    fn run_quantum(&mut self, budget: usize) -> EvalResult<()>;

    fn is_finished(&self) -> bool;

    /// Final value once finished
    fn result(&self) -> Option<Cell>;

    fn steps(&self) -> u64;
}

/* ===================== Classic ===================== */

pub struct ClassicTask {
    expr: Cell,
    env: Env,
    eval: ClassicEval,
    result: Option<Cell>,
}

impl ClassicTask {
    pub fn new(expr: Cell, env: Env, max_depth: usize, debug: bool) -> Self {
        ClassicTask {
            expr,
            env,
            eval: ClassicEval::new(max_depth, debug),
            result: None,
        }
    }
}

impl Task for ClassicTask {
    fn kind(&self) -> TaskKind {
        TaskKind::Classic
    }

    fn run_quantum(&mut self, _budget: usize) -> EvalResult<()> {
        if self.result.is_none() {
            self.result = Some(self.eval.eval(&self.expr, &self.env)?);
        }
        Ok(())
    }

    fn is_finished(&self) -> bool {
        self.result.is_some()
    }

    fn result(&self) -> Option<Cell> {
        self.result.clone()
    }

    fn steps(&self) -> u64 {
        self.eval.steps()
    }
}

/* ===================== Frame ===================== */

pub struct FrameTask {
    machine: FrameMachine,
}

impl FrameTask {
    pub fn new(expr: Cell, env: Env, debug: bool) -> Self {
        FrameTask {
            machine: FrameMachine::new(expr, env).with_debug(debug),
        }
    }
}

impl Task for FrameTask {
    fn kind(&self) -> TaskKind {
        TaskKind::Frame
    }

    fn run_quantum(&mut self, budget: usize) -> EvalResult<()> {
        let budget = u32::try_from(budget).unwrap_or(u32::MAX);
        run_for(&mut self.machine, budget)?;
        Ok(())
    }

    fn is_finished(&self) -> bool {
        self.machine.is_done()
    }

    fn result(&self) -> Option<Cell> {
        self.machine.result().cloned()
    }

    fn steps(&self) -> u64 {
        self.machine.steps()
    }
}

/* ===================== Machine ===================== */

pub struct MachineTask {
    machine: Machine,
}

impl MachineTask {
    pub fn new(machine: Machine) -> Self {
        MachineTask { machine }
    }

    /// Load the evaluator program of `eval` with `(expr env)`
    pub fn evaluate(eval: &CellMachineEval, expr: &Cell, env: &Env) -> EvalResult<Self> {
        Ok(MachineTask::new(eval.machine(expr, env)?))
    }
}

impl Task for MachineTask {
    fn kind(&self) -> TaskKind {
        TaskKind::Machine
    }

    fn run_quantum(&mut self, budget: usize) -> EvalResult<()> {
        if self.machine.run_for(budget)? {
            if let Some(message) = self.machine.halt_message() {
                return Err(EvalError::from_halt(message));
            }
        }
        Ok(())
    }

    fn is_finished(&self) -> bool {
        self.machine.is_finished()
    }

    fn result(&self) -> Option<Cell> {
        self.is_finished().then(|| self.machine.a().clone())
    }

    fn steps(&self) -> u64 {
        self.machine.steps()
    }
}

/* ===================== Idle ===================== */

/// Always present, never finishes, never does anything
pub struct IdleTask;

impl Task for IdleTask {
    fn kind(&self) -> TaskKind {
        TaskKind::Idle
    }

    fn run_quantum(&mut self, _budget: usize) -> EvalResult<()> {
        Ok(())
    }

    fn is_finished(&self) -> bool {
        false
    }

    fn result(&self) -> Option<Cell> {
        None
    }

    fn steps(&self) -> u64 {
        0
    }
}

/* ===================== Factory ===================== */

/// Builds tasks of one strategy from expressions
pub struct TaskFactory {
    strategy: Strategy,
    max_depth: usize,
    debug: bool,
    machine: Option<CellMachineEval>,
}

impl TaskFactory {
    pub fn new(strategy: Strategy, config: &Config) -> Result<Self> {
        let debug = config.engine.debug;
        let machine = match strategy {
            Strategy::Cell => Some(CellMachineEval::from_config(&config.vm, debug)?),
            _ => None,
        };
        Ok(TaskFactory {
            strategy,
            max_depth: config.engine.max_depth,
            debug,
            machine,
        })
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    pub fn build(&self, expr: Cell, env: &Env) -> EvalResult<Box<dyn Task>> {
        Ok(match (&self.machine, self.strategy) {
            (Some(eval), _) => Box::new(MachineTask::evaluate(eval, &expr, env)?),
            (None, Strategy::Classic) => {
                Box::new(ClassicTask::new(expr, env.clone(), self.max_depth, self.debug))
            }
            (None, _) => Box::new(FrameTask::new(expr, env.clone(), self.debug)),
        })
    }
}
