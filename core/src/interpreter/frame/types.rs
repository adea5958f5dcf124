//! Frame records and their step tags

use std::collections::VecDeque;
use std::fmt;

use crate::cell::{Cell, Env};

/* ===================== Step Tags ===================== */

/// What a frame does on its next step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum StepTag {
    Enter = 0,
    Builtin = 1,
    Begin = 2,
    IfTest = 3,
    Define = 4,
    Proc = 5,
    Exps = 6,
    ExecProc = 7,
    ExecMacro = 8,
    Done = 9,
}

impl StepTag {
    pub fn name(self) -> &'static str {
        match self {
            StepTag::Enter => "ENTER",
            StepTag::Builtin => "BUILTIN",
            StepTag::Begin => "BEGIN",
            StepTag::IfTest => "IF_TEST",
            StepTag::Define => "DEFINE",
            StepTag::Proc => "PROC",
            StepTag::Exps => "EXPS",
            StepTag::ExecProc => "EXEC_PROC",
            StepTag::ExecMacro => "EXEC_MACRO",
            StepTag::Done => "DONE",
        }
    }
}

/// Relationship to the child frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Wait {
    Ready = 0,
    /// Waiting on a child frame (SUBFRAME)
    Subframe = 1,
    /// Child just completed; its result is in `incoming` (SUBFRAME_FIN)
    SubframeFin = 2,
}

/// Tag plus wait bits, rendered like `IF_TEST|SUBFRAME_FIN`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Phase {
    pub tag: StepTag,
    pub wait: Wait,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag.name())?;
        match self.wait {
            Wait::Ready => Ok(()),
            Wait::Subframe => f.write_str("|SUBFRAME"),
            Wait::SubframeFin => f.write_str("|SUBFRAME_FIN"),
        }
    }
}

/* ===================== Frames ===================== */

/// One in-flight sub-evaluation
pub struct FrameState {
    pub tag: StepTag,
    pub wait: Wait,

    /// Expression under evaluation; reassigned in place on tail calls
    pub expr: Cell,
    pub env: Env,
    pub result: Cell,

    /// Result handed up by the child that just finished
    pub incoming: Option<Cell>,

    /// Remaining `begin` body
    pub body: VecDeque<Cell>,

    /// Evaluated operator
    pub proc: Cell,

    /// Operands still to evaluate
    pub pending: VecDeque<Cell>,

    /// Evaluated (or, for macros, raw) arguments
    pub args: Vec<Cell>,

    pub steps: u64,
}

impl FrameState {
    pub fn new(expr: Cell, env: Env) -> Self {
        FrameState {
            tag: StepTag::Enter,
            wait: Wait::Ready,
            expr,
            env,
            result: Cell::nil(),
            incoming: None,
            body: VecDeque::new(),
            proc: Cell::nil(),
            pending: VecDeque::new(),
            args: Vec::new(),
            steps: 0,
        }
    }

    pub fn phase(&self) -> Phase {
        Phase {
            tag: self.tag,
            wait: self.wait,
        }
    }

    pub fn is_done(&self) -> bool {
        self.tag == StepTag::Done
    }

    /// Consume the finished child's result and clear the wait bits
    pub fn take_incoming(&mut self) -> Cell {
        self.wait = Wait::Ready;
        self.incoming.take().unwrap_or_else(Cell::nil)
    }

    /// Restart this frame on a new expression (tail position)
    pub fn tail_call(&mut self, expr: Cell, env: Option<Env>) {
        self.expr = expr;
        if let Some(env) = env {
            self.env = env;
        }
        self.tag = StepTag::Enter;
        self.wait = Wait::Ready;
        self.proc = Cell::nil();
        self.args.clear();
        self.pending.clear();
        self.body.clear();
    }

    pub fn finish(&mut self, result: Cell) {
        self.result = result;
        self.tag = StepTag::Done;
        self.wait = Wait::Ready;
    }
}
