//! Surface-language evaluator running on the cell machine

use std::fs;
use std::rc::Rc;

use anyhow::{Context, Result};
use tracing::debug;

use super::assembler::{AssembleError, Assembler};
use super::code::CodeResult;
use super::vm::Machine;
use crate::cell::{Cell, Env};
use crate::config::VmConfig;
use crate::error::{EvalError, EvalResult};
use crate::interpreter::{Evaluator, Strategy};

/// Evaluator program, entered at `main` with `(x env)`
pub const EVAL_ASM: &str = include_str!("../../asm/eval.asm");

/// Recursive factorial, entered at `main` with `(n)`
pub const FAC_ASM: &str = include_str!("../../asm/fac.asm");

pub struct CellMachineEval {
    program: Rc<CodeResult>,
    stack_size: usize,
    trace: bool,
    steps: u64,
}

impl CellMachineEval {
    /// The bundled evaluator program
    pub fn new(stack_size: usize, trace: bool) -> Result<Self, AssembleError> {
        CellMachineEval::with_program(EVAL_ASM, "main", stack_size, trace)
    }

    /// A custom evaluator program; it receives `(x env)` and leaves the value in A
    pub fn with_program(
        source: &str,
        entry: &str,
        stack_size: usize,
        trace: bool,
    ) -> Result<Self, AssembleError> {
        let program = Assembler::assemble(source, entry)?;
        debug!(
            code = program.code.len(),
            data = program.data.len(),
            entry = program.entry,
            "Assembled evaluator program"
        );
        Ok(CellMachineEval {
            program: Rc::new(program),
            stack_size,
            trace,
            steps: 0,
        })
    }

    pub fn from_config(vm: &VmConfig, trace: bool) -> Result<Self> {
        match &vm.program {
            Some(path) => {
                let source = fs::read_to_string(path)
                    .with_context(|| format!("Failed to read program {}", path.display()))?;
                CellMachineEval::with_program(&source, &vm.entry, vm.stack_size, trace)
                    .with_context(|| format!("Failed to assemble {}", path.display()))
            }
            None => Ok(CellMachineEval::new(vm.stack_size, trace)?),
        }
    }

    pub fn program(&self) -> &CodeResult {
        &self.program
    }

    /// Fresh machine with `(x env)` loaded
    pub fn machine(&self, expr: &Cell, env: &Env) -> EvalResult<Machine> {
        let args = [expr.clone(), Cell::Env(env.clone())];
        Ok(Machine::new(self.program.clone(), &args, self.stack_size)?.with_trace(self.trace))
    }
}

impl Evaluator for CellMachineEval {
    fn strategy(&self) -> Strategy {
        Strategy::Cell
    }

    fn eval(&mut self, expr: &Cell, env: &Env) -> EvalResult<Cell> {
        let mut machine = self.machine(expr, env)?;
        let result = machine.run();
        self.steps += machine.steps();
        let value = result?;
        match machine.halt_message() {
            Some(message) => Err(EvalError::from_halt(message)),
            None => Ok(value),
        }
    }

    fn steps(&self) -> u64 {
        self.steps
    }
}
