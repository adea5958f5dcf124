//! Value model
//!
//! `Cell` is the single tagged value type shared by the reference evaluator,
//! the frame evaluator and the bytecode machine. Lists are shared and mutable
//! in place (the machine's CELLPUSH relies on this); everything else is
//! immutable once built.

pub mod env;
pub mod ops;

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::error::EvalResult;

pub use env::Env;

/// Shared, growable list storage
pub type List = Rc<RefCell<Vec<Cell>>>;

pub const TRUE_NAME: &str = "#true";
pub const FALSE_NAME: &str = "#false";
pub const NIL_NAME: &str = "#nil";

/* ===================== Cell Type Tags ===================== */

/// Numeric tag of a cell, as seen by assembly code through `CELLTYPE`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CellType {
    Symbol = 0,
    String = 1,
    Number = 2,
    List = 3,
    Lambda = 4,
    Macro = 5,
    Proc = 6,
    ProcEnv = 7,
    EnvPtr = 8,
}

impl CellType {
    pub const ALL: [CellType; 9] = [
        CellType::Symbol,
        CellType::String,
        CellType::Number,
        CellType::List,
        CellType::Lambda,
        CellType::Macro,
        CellType::Proc,
        CellType::ProcEnv,
        CellType::EnvPtr,
    ];

    /// Upper-case tag name, bound as `CellType.NAME`
    pub fn name(self) -> &'static str {
        match self {
            CellType::Symbol => "SYMBOL",
            CellType::String => "STRING",
            CellType::Number => "NUMBER",
            CellType::List => "LIST",
            CellType::Lambda => "LAMBDA",
            CellType::Macro => "MACRO",
            CellType::Proc => "PROC",
            CellType::ProcEnv => "PROCENV",
            CellType::EnvPtr => "ENVPTR",
        }
    }

    pub fn label(self) -> String {
        format!("CellType.{}", self.name())
    }

    pub fn code(self) -> i64 {
        self as i64
    }

    pub fn from_code(code: i64) -> Option<CellType> {
        CellType::ALL.iter().copied().find(|t| t.code() == code)
    }
}

/* ===================== Procedures ===================== */

type NativeFn = dyn Fn(&[Cell]) -> EvalResult<Cell>;
type NativeEnvFn = dyn Fn(&[Cell], &Env) -> EvalResult<Cell>;

/// Host procedure taking evaluated arguments
#[derive(Clone)]
pub struct NativeProc {
    name: Rc<str>,
    func: Rc<NativeFn>,
}

impl NativeProc {
    pub fn new(name: &str, func: impl Fn(&[Cell]) -> EvalResult<Cell> + 'static) -> Self {
        NativeProc {
            name: name.into(),
            func: Rc::new(func),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, args: &[Cell]) -> EvalResult<Cell> {
        (self.func)(args)
    }
}

/// Host procedure that also receives the calling environment
#[derive(Clone)]
pub struct NativeProcEnv {
    name: Rc<str>,
    func: Rc<NativeEnvFn>,
}

impl NativeProcEnv {
    pub fn new(
        name: &str,
        func: impl Fn(&[Cell], &Env) -> EvalResult<Cell> + 'static,
    ) -> Self {
        NativeProcEnv {
            name: name.into(),
            func: Rc::new(func),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, args: &[Cell], env: &Env) -> EvalResult<Cell> {
        (self.func)(args, env)
    }
}

/// Lambda or macro: the defining `(lambda params body)` list plus its scope
pub struct Closure {
    form: List,
    env: Env,
}

impl Closure {
    pub fn new(form: List, env: Env) -> Self {
        Closure { form, env }
    }

    pub fn form(&self) -> &List {
        &self.form
    }

    pub fn env(&self) -> &Env {
        &self.env
    }

    pub fn params(&self) -> Cell {
        self.part(1)
    }

    pub fn body(&self) -> Cell {
        self.part(2)
    }

    /// Same form, different scope
    pub fn rebind(&self, env: Env) -> Closure {
        Closure {
            form: self.form.clone(),
            env,
        }
    }

    fn part(&self, idx: usize) -> Cell {
        self.form.borrow().get(idx).cloned().unwrap_or_else(Cell::nil)
    }
}

/* ===================== Cell ===================== */

#[derive(Clone)]
pub enum Cell {
    Number(i64),
    Symbol(Rc<str>),
    Str(Rc<str>),
    /// Also the empty/nil value when it holds no elements
    List(List),
    Lambda(Rc<Closure>),
    Macro(Rc<Closure>),
    Proc(NativeProc),
    ProcEnv(NativeProcEnv),
    Env(Env),
}

impl Cell {
    pub fn number(n: i64) -> Cell {
        Cell::Number(n)
    }

    pub fn symbol(name: &str) -> Cell {
        Cell::Symbol(name.into())
    }

    pub fn string(text: &str) -> Cell {
        Cell::Str(text.into())
    }

    pub fn list(items: Vec<Cell>) -> Cell {
        Cell::List(Rc::new(RefCell::new(items)))
    }

    /// The empty list
    pub fn nil() -> Cell {
        Cell::list(Vec::new())
    }

    pub fn truth(value: bool) -> Cell {
        if value {
            Cell::symbol(TRUE_NAME)
        } else {
            Cell::symbol(FALSE_NAME)
        }
    }

    pub fn lambda(form: List, env: Env) -> Cell {
        Cell::Lambda(Rc::new(Closure::new(form, env)))
    }

    pub fn macro_(form: List, env: Env) -> Cell {
        Cell::Macro(Rc::new(Closure::new(form, env)))
    }

    pub fn cell_type(&self) -> CellType {
        match self {
            Cell::Number(_) => CellType::Number,
            Cell::Symbol(_) => CellType::Symbol,
            Cell::Str(_) => CellType::String,
            Cell::List(_) => CellType::List,
            Cell::Lambda(_) => CellType::Lambda,
            Cell::Macro(_) => CellType::Macro,
            Cell::Proc(_) => CellType::Proc,
            Cell::ProcEnv(_) => CellType::ProcEnv,
            Cell::Env(_) => CellType::EnvPtr,
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Cell::List(items) if items.borrow().is_empty())
    }

    /// Only `#false` is false
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Cell::Symbol(s) | Cell::Str(s) if &**s == FALSE_NAME)
    }

    pub fn as_number(&self) -> Option<i64> {
        match self {
            Cell::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            Cell::Symbol(s) => Some(s),
            _ => None,
        }
    }

    /// Backing list of a list, or the defining form of a closure
    pub fn as_list(&self) -> Option<&List> {
        match self {
            Cell::List(items) => Some(items),
            Cell::Lambda(c) | Cell::Macro(c) => Some(c.form()),
            _ => None,
        }
    }

    /// Snapshot of the elements; empty for non-list cells
    pub fn items(&self) -> Vec<Cell> {
        self.as_list()
            .map(|items| items.borrow().clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.as_list().map(|items| items.borrow().len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, idx: usize) -> Option<Cell> {
        self.as_list().and_then(|items| items.borrow().get(idx).cloned())
    }

    /// First element, Nil when empty
    pub fn head(&self) -> Cell {
        self.get(0).unwrap_or_else(Cell::nil)
    }

    /// Fresh list of every element but the first
    pub fn tail(&self) -> Cell {
        let items = self.items();
        Cell::list(items.into_iter().skip(1).collect())
    }

    /// Integer view used by machine branches: numbers as-is, `#true` as 1
    pub fn to_int(&self) -> i64 {
        match self {
            Cell::Number(n) => *n,
            Cell::Symbol(s) if &**s == TRUE_NAME => 1,
            _ => 0,
        }
    }

    /// Printed text of an atom
    pub fn atom_text(&self) -> Option<String> {
        match self {
            Cell::Number(n) => Some(n.to_string()),
            Cell::Symbol(s) | Cell::Str(s) => Some(s.to_string()),
            _ => None,
        }
    }

    /// Environment carried by an env handle or closure
    pub fn env(&self) -> Option<&Env> {
        match self {
            Cell::Env(env) => Some(env),
            Cell::Lambda(c) | Cell::Macro(c) => Some(c.env()),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Cell::Number(_) => "number",
            Cell::Symbol(_) => "symbol",
            Cell::Str(_) => "string",
            Cell::List(_) => "list",
            Cell::Lambda(_) => "lambda",
            Cell::Macro(_) => "macro",
            Cell::Proc(_) => "proc",
            Cell::ProcEnv(_) => "procenv",
            Cell::Env(_) => "environment",
        }
    }
}

/* ===================== Equality ===================== */

impl PartialEq for Cell {
    fn eq(&self, other: &Cell) -> bool {
        match (self, other) {
            (Cell::List(a), Cell::List(b)) => {
                Rc::ptr_eq(a, b) || (a.borrow().is_empty() && b.borrow().is_empty())
            }
            (Cell::Lambda(a), Cell::Lambda(b)) | (Cell::Macro(a), Cell::Macro(b)) => {
                Rc::ptr_eq(a, b) || (Rc::ptr_eq(a.form(), b.form()) && a.env().ptr_eq(b.env()))
            }
            (Cell::Proc(a), Cell::Proc(b)) => Rc::ptr_eq(&a.func, &b.func),
            (Cell::ProcEnv(a), Cell::ProcEnv(b)) => Rc::ptr_eq(&a.func, &b.func),
            (Cell::Env(a), Cell::Env(b)) => a.ptr_eq(b),
            _ => match (self.atom_text(), other.atom_text()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
        }
    }
}

/* ===================== Printing ===================== */

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Number(n) => write!(f, "{}", n),
            Cell::Symbol(s) | Cell::Str(s) => f.write_str(s),
            Cell::List(items) => {
                f.write_str("(")?;
                for (i, item) in items.borrow().iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str(")")
            }
            Cell::Lambda(c) => write!(f, "#Lambda({} {})", c.params(), c.body()),
            Cell::Macro(c) => write!(f, "#Macro({} {})", c.params(), c.body()),
            Cell::Proc(_) => f.write_str("#Proc"),
            Cell::ProcEnv(_) => f.write_str("#ProcEnv"),
            Cell::Env(_) => f.write_str("#Env"),
        }
    }
}

impl fmt::Debug for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Str(s) => write!(f, "{:?}", s),
            Cell::Proc(p) => write!(f, "#Proc<{}>", p.name()),
            Cell::ProcEnv(p) => write!(f, "#ProcEnv<{}>", p.name()),
            other => write!(f, "{}", other),
        }
    }
}
