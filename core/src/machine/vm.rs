//! Cell machine
//!
//! An accumulator machine over a fixed stack of cells. The stack grows
//! downward: PUSH pre-decrements SP, POP post-increments it. A call frame
//! built by `JSR f` + `ENTER n` looks like
//!
//! ```text
//!   BP+2..   arguments (the last one pushed sits at BP+2)
//!   BP+1     return address
//!   BP+0     caller's BP
//!   BP-1..   locals reserved by ENTER n
//! ```
//!
//! Every stack, code and data access is bounds-checked and reports
//! `EvalError::VmFault` instead of touching memory out of range.

use std::fmt;
use std::io::Write;
use std::rc::Rc;

use tracing::debug;

use super::code::CodeResult;
use super::opcode::OpCode;
use crate::cell::env::key_text;
use crate::cell::ops::{self, Comparison};
use crate::cell::{Cell, CellType, Env};
use crate::error::{EvalError, EvalResult};
use crate::runtime::io::ProgramOutput;

pub const DEFAULT_STACK_SIZE: usize = 3000;

/* ===================== Machine ===================== */

pub struct Machine {
    program: Rc<CodeResult>,
    stack: Vec<Cell>,
    pc: usize,
    sp: usize,
    bp: usize,
    a: Cell,
    finished: bool,
    halt_message: Option<String>,
    steps: u64,
    trace: bool,
    out: Box<dyn Write>,
}

impl Machine {
    /// Load `program` with `args` pushed in order and PC at the entry point
    pub fn new(program: Rc<CodeResult>, args: &[Cell], stack_size: usize) -> EvalResult<Self> {
        if stack_size == 0 {
            return Err(EvalError::VmFault("stack size must be positive".into()));
        }
        let top = stack_size - 1;
        let entry = program.entry;
        let mut machine = Machine {
            program,
            stack: vec![Cell::Number(0); stack_size],
            pc: entry,
            sp: top,
            bp: top,
            a: Cell::Number(0),
            finished: false,
            halt_message: None,
            steps: 0,
            trace: false,
            out: Box::new(ProgramOutput),
        };
        for arg in args {
            machine.push(arg.clone())?;
        }
        Ok(machine)
    }

    /// Send PRINT, HALTMSG and STATE output to `out`
    pub fn with_output(mut self, out: Box<dyn Write>) -> Self {
        self.out = out;
        self
    }

    /// Log every executed instruction at debug level
    pub fn with_trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }

    pub fn a(&self) -> &Cell {
        &self.a
    }

    pub fn pc(&self) -> usize {
        self.pc
    }

    pub fn sp(&self) -> usize {
        self.sp
    }

    pub fn bp(&self) -> usize {
        self.bp
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Message recorded by HALTMSG, if the program stopped that way
    pub fn halt_message(&self) -> Option<&str> {
        self.halt_message.as_deref()
    }

    pub fn stack_slot(&self, idx: usize) -> Option<&Cell> {
        self.stack.get(idx)
    }

    /// Run until EXIT or HALTMSG, returning the accumulator
    pub fn run(&mut self) -> EvalResult<Cell> {
        while !self.finished {
            self.step()?;
        }
        Ok(self.a.clone())
    }

    /// Execute at most `budget` instructions; true once the program finished
    pub fn run_for(&mut self, budget: usize) -> EvalResult<bool> {
        for _ in 0..budget {
            if self.finished {
                break;
            }
            self.step()?;
        }
        Ok(self.finished)
    }

    /* ===================== Fetch / Dispatch ===================== */

    /// Fetch, decode and execute one instruction
    pub fn step(&mut self) -> EvalResult<()> {
        let pc = self.pc;
        if self.finished {
            let word = self.program.code.get(pc).copied().unwrap_or(-1);
            return Err(EvalError::MissingOpcode { word, pc });
        }

        let word = self.fetch()?;
        let op = OpCode::from_word(word).ok_or(EvalError::MissingOpcode { word, pc })?;
        let operand = match op.operand_count() {
            0 => 0,
            _ => self.fetch()?,
        };

        if self.trace {
            debug!(
                pc,
                op = op.mnemonic(),
                operand,
                sp = self.sp,
                bp = self.bp,
                a = %self.a,
                "exec"
            );
        }
        self.steps += 1;
        self.execute(op, operand)
    }

    fn execute(&mut self, op: OpCode, n: i64) -> EvalResult<()> {
        match op {
            OpCode::Nop => {}

            // frame addressing
            OpCode::Lea => self.a = self.slot(offset(self.bp, n)?)?.clone(),
            OpCode::Sea => {
                let idx = offset(self.bp, n)?;
                let value = self.a.clone();
                *self.slot_mut(idx)? = value;
            }
            OpCode::Adj => {
                let sp = offset(self.sp, n)?;
                if sp > self.stack.len() {
                    return Err(fault(format!("ADJ {} moves SP past the stack base", n)));
                }
                self.sp = sp;
            }

            // stack
            OpCode::Push => self.push(self.a.clone())?,
            OpCode::Pop => self.a = self.pop()?,
            OpCode::Peek => self.a = self.top()?.clone(),
            OpCode::Dup => {
                let value = self.top()?.clone();
                self.push(value)?;
            }
            OpCode::Switch => {
                self.slot(self.sp + 1)?;
                self.stack.swap(self.sp, self.sp + 1);
            }
            OpCode::Data => self.a = self.data(n)?,

            // control
            OpCode::Jsr => {
                self.push(Cell::Number(self.pc as i64))?;
                self.pc = self.target(n)?;
            }
            OpCode::Enter => {
                self.push(Cell::Number(self.bp as i64))?;
                self.bp = self.sp;
                let locals = usize::try_from(n)
                    .map_err(|_| fault(format!("ENTER with negative size {}", n)))?;
                self.sp = self
                    .sp
                    .checked_sub(locals)
                    .ok_or_else(|| fault("stack overflow"))?;
            }
            OpCode::Leave => {
                self.sp = self.bp;
                self.bp = address(&self.pop()?)?;
                self.pc = address(&self.pop()?)?;
            }
            OpCode::Bz => {
                if self.a.to_int() == 0 {
                    self.pc = self.target(n)?;
                }
            }
            OpCode::Bnz => {
                if self.a.to_int() != 0 {
                    self.pc = self.target(n)?;
                }
            }
            OpCode::Jmp => self.pc = self.target(n)?,

            // comparisons: left operand on the stack, right in A
            OpCode::Lt => self.compare(Comparison::Lt, true)?,
            OpCode::Ltk => self.compare(Comparison::Lt, false)?,
            OpCode::Le => self.compare(Comparison::Le, true)?,
            OpCode::Lek => self.compare(Comparison::Le, false)?,
            OpCode::Gt => self.compare(Comparison::Gt, true)?,
            OpCode::Gtk => self.compare(Comparison::Gt, false)?,
            OpCode::Eq => self.equality(true, true)?,
            OpCode::Eqk => self.equality(true, false)?,
            OpCode::Neq => self.equality(false, true)?,
            OpCode::Neqk => self.equality(false, false)?,

            // arithmetic
            OpCode::Sub => {
                let lhs = self.pop()?;
                self.a = ops::sub(&lhs, &self.a)?;
            }
            OpCode::Mul => {
                let lhs = self.pop()?;
                self.a = ops::mul(&lhs, &self.a)?;
            }

            // cells
            OpCode::CellNew => self.a = new_cell(self.a.to_int())?,
            OpCode::CellType => self.a = Cell::Number(self.a.cell_type().code()),
            OpCode::CellCount => self.a = Cell::Number(self.a.len() as i64),
            OpCode::CellIndex => {
                let idx = self.a.to_int();
                let list = self.top()?;
                let item = usize::try_from(idx).ok().and_then(|i| list.get(i));
                self.a = item.ok_or_else(|| {
                    fault(format!("index {} out of range for {:?}", idx, list))
                })?;
            }
            OpCode::CellSetEnv => {
                let env = env_of("CELLSETENV", &self.a)?;
                let rebound = match self.top()? {
                    Cell::Lambda(c) => Cell::Lambda(Rc::new(c.rebind(env))),
                    Cell::Macro(c) => Cell::Macro(Rc::new(c.rebind(env))),
                    other => {
                        return Err(EvalError::type_mismatch(
                            "CELLSETENV",
                            format!("expected a closure, got {}", other.type_name()),
                        ))
                    }
                };
                *self.slot_mut(self.sp)? = rebound;
            }
            OpCode::CellGetEnv => {
                let cell = self.pop()?;
                self.a = Cell::Env(env_of("CELLGETENV", &cell)?);
            }
            OpCode::CellPush => match self.top()? {
                Cell::List(items) => items.borrow_mut().push(self.a.clone()),
                other => {
                    return Err(EvalError::type_mismatch(
                        "CELLPUSH",
                        format!("expected a list, got {}", other.type_name()),
                    ))
                }
            },
            OpCode::CellSetType => {
                let tag = CellType::from_code(self.a.to_int()).ok_or_else(|| {
                    EvalError::type_mismatch("CELLSETTYPE", format!("no cell type {}", self.a))
                })?;
                let retagged = retag(self.top()?.clone(), tag)?;
                *self.slot_mut(self.sp)? = retagged;
            }
            OpCode::CellInvoke => {
                let args = self.pop()?;
                let env = self.pop()?;
                self.a = invoke(&self.a, &args.items(), &env)?;
            }
            OpCode::CellHead => self.a = self.top()?.head(),
            OpCode::CellTail => self.a = self.top()?.tail(),

            // environments
            OpCode::EnvLookup => {
                let key = self.pop()?;
                self.a = env_of("ENVLOOKUP", &self.a)?.lookup(&key_text(&key)?)?;
            }
            OpCode::EnvSet => {
                let key = key_text(&self.pop()?)?;
                env_of("ENVSET", self.top()?)?.set(&key, self.a.clone())?;
            }
            OpCode::EnvDefine => {
                let key = key_text(&self.pop()?)?;
                env_of("ENVDEFINE", self.top()?)?.define(key, self.a.clone());
            }
            OpCode::EnvNew => {
                let values = self.pop()?;
                let keys = self.pop()?;
                let parent = env_of("ENVNEW", &self.a)?;
                self.a = Cell::Env(Env::bind(&keys, values.items(), &parent)?);
            }

            // termination and output
            OpCode::Exit => self.finished = true,
            OpCode::Print => {
                let text = self.a.to_string();
                self.emit(&text)?;
            }
            OpCode::HaltMsg => {
                let message = self.data(n)?.to_string();
                self.emit(&format!("{}\n", message))?;
                self.halt_message = Some(message);
                self.finished = true;
            }
            OpCode::State => {
                let state = format!("{}\n", self);
                self.emit(&state)?;
            }
        }
        Ok(())
    }

    /* ===================== Operations ===================== */

    fn compare(&mut self, op: Comparison, pop: bool) -> EvalResult<()> {
        let lhs = if pop { self.pop()? } else { self.top()?.clone() };
        self.a = Cell::Number(ops::compare(op, &lhs, &self.a)? as i64);
        Ok(())
    }

    fn equality(&mut self, equal: bool, pop: bool) -> EvalResult<()> {
        let lhs = if pop { self.pop()? } else { self.top()?.clone() };
        self.a = Cell::Number(((lhs == self.a) == equal) as i64);
        Ok(())
    }

    fn emit(&mut self, text: &str) -> EvalResult<()> {
        self.out
            .write_all(text.as_bytes())
            .and_then(|_| self.out.flush())
            .map_err(|e| fault(format!("output failed: {}", e)))
    }

    /* ===================== Checked Access ===================== */

    fn fetch(&mut self) -> EvalResult<i64> {
        let word = self
            .program
            .code
            .get(self.pc)
            .copied()
            .ok_or_else(|| fault(format!("pc {} outside code", self.pc)))?;
        self.pc += 1;
        Ok(word)
    }

    fn target(&self, n: i64) -> EvalResult<usize> {
        usize::try_from(n)
            .ok()
            .filter(|t| *t < self.program.code.len())
            .ok_or_else(|| fault(format!("jump target {} outside code", n)))
    }

    fn data(&self, n: i64) -> EvalResult<Cell> {
        usize::try_from(n)
            .ok()
            .and_then(|idx| self.program.data.get(idx))
            .cloned()
            .ok_or_else(|| fault(format!("data index {} out of range", n)))
    }

    fn slot(&self, idx: usize) -> EvalResult<&Cell> {
        self.stack
            .get(idx)
            .ok_or_else(|| fault(format!("stack index {} out of range", idx)))
    }

    fn slot_mut(&mut self, idx: usize) -> EvalResult<&mut Cell> {
        self.stack
            .get_mut(idx)
            .ok_or_else(|| fault(format!("stack index {} out of range", idx)))
    }

    fn top(&self) -> EvalResult<&Cell> {
        self.slot(self.sp)
    }

    fn push(&mut self, value: Cell) -> EvalResult<()> {
        self.sp = self.sp.checked_sub(1).ok_or_else(|| fault("stack overflow"))?;
        *self.slot_mut(self.sp)? = value;
        Ok(())
    }

    fn pop(&mut self) -> EvalResult<Cell> {
        let value = self.top()?.clone();
        self.sp += 1;
        Ok(value)
    }
}

impl fmt::Display for Machine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PC={} SP={} BP={} A={:?} steps={}",
            self.pc, self.sp, self.bp, self.a, self.steps
        )?;
        let end = self.stack.len().min(self.sp + 8);
        for idx in self.sp..end {
            write!(f, "\n  [{}] {:?}", idx, self.stack[idx])?;
        }
        Ok(())
    }
}

/* ===================== Helpers ===================== */

fn fault(msg: impl Into<String>) -> EvalError {
    EvalError::VmFault(msg.into())
}

fn offset(base: usize, delta: i64) -> EvalResult<usize> {
    i64::try_from(base)
        .ok()
        .and_then(|b| b.checked_add(delta))
        .and_then(|idx| usize::try_from(idx).ok())
        .ok_or_else(|| fault(format!("offset {} from {} out of range", delta, base)))
}

/// Saved BP or return address popped by LEAVE
fn address(cell: &Cell) -> EvalResult<usize> {
    cell.as_number()
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| fault(format!("corrupt frame link {:?}", cell)))
}

fn env_of(op: &str, cell: &Cell) -> EvalResult<Env> {
    cell.env().cloned().ok_or_else(|| {
        EvalError::type_mismatch(op, format!("expected an environment, got {}", cell.type_name()))
    })
}

fn new_cell(code: i64) -> EvalResult<Cell> {
    Ok(match CellType::from_code(code) {
        Some(CellType::Symbol) => Cell::symbol(""),
        Some(CellType::String) => Cell::string(""),
        Some(CellType::Number) => Cell::Number(0),
        Some(CellType::List) => Cell::nil(),
        Some(CellType::EnvPtr) => Cell::Env(Env::new()),
        _ => {
            return Err(EvalError::type_mismatch(
                "CELLNEW",
                format!("cannot create an empty cell of type {}", code),
            ))
        }
    })
}

/// Reinterpret `cell` under `tag`
///
/// Lists become closures over a fresh detached environment until
/// CELLSETENV binds them.
fn retag(cell: Cell, tag: CellType) -> EvalResult<Cell> {
    if cell.cell_type() == tag {
        return Ok(cell);
    }
    let converted = match (tag, &cell) {
        (CellType::Lambda, Cell::List(items)) => Some(Cell::lambda(items.clone(), Env::new())),
        (CellType::Macro, Cell::List(items)) => Some(Cell::macro_(items.clone(), Env::new())),
        (CellType::Lambda, Cell::Macro(c)) => Some(Cell::Lambda(c.clone())),
        (CellType::Macro, Cell::Lambda(c)) => Some(Cell::Macro(c.clone())),
        (CellType::List, Cell::Lambda(c) | Cell::Macro(c)) => Some(Cell::List(c.form().clone())),
        (CellType::Symbol, _) => cell.atom_text().map(|t| Cell::symbol(&t)),
        (CellType::String, _) => cell.atom_text().map(|t| Cell::string(&t)),
        (CellType::Number, Cell::Symbol(t) | Cell::Str(t)) => t.parse().ok().map(Cell::Number),
        _ => None,
    };
    converted.ok_or_else(|| {
        EvalError::type_mismatch(
            "CELLSETTYPE",
            format!("cannot retag {} as {}", cell.type_name(), tag.name()),
        )
    })
}

fn invoke(proc: &Cell, args: &[Cell], env: &Cell) -> EvalResult<Cell> {
    match proc {
        Cell::Proc(p) => p.call(args),
        Cell::ProcEnv(p) => p.call(args, &env_of("CELLINVOKE", env)?),
        other => Err(EvalError::NotCallable(other.to_string())),
    }
}
