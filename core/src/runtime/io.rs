//! Printing and environment reflection
//!
//! Program output (`print`, and the cell machine's PRINT/HALTMSG/STATE unless
//! a machine is given its own writer) goes through [`ProgramOutput`]: stdout,
//! or whatever [`redirect_output`] installed on the current thread.

use std::cell::RefCell;
use std::io::{self, Write};

use crate::cell::{Cell, Env};
use crate::error::{EvalError, EvalResult};

use super::expect_arity;

thread_local! {
    static REDIRECT: RefCell<Option<Box<dyn Write>>> = RefCell::new(None);
}

/// Writer for program output on the current thread
#[derive(Debug, Clone, Copy, Default)]
pub struct ProgramOutput;

impl Write for ProgramOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        REDIRECT.with(|r| match r.borrow_mut().as_mut() {
            Some(out) => out.write(buf),
            None => io::stdout().write(buf),
        })
    }

    fn flush(&mut self) -> io::Result<()> {
        REDIRECT.with(|r| match r.borrow_mut().as_mut() {
            Some(out) => out.flush(),
            None => io::stdout().flush(),
        })
    }
}

/// Send this thread's program output to `out` until the guard drops
pub fn redirect_output(out: Box<dyn Write>) -> OutputGuard {
    let previous = REDIRECT.with(|r| r.replace(Some(out)));
    OutputGuard { previous }
}

/// Restores the previous output target on drop
#[must_use]
pub struct OutputGuard {
    previous: Option<Box<dyn Write>>,
}

impl Drop for OutputGuard {
    fn drop(&mut self) {
        let previous = self.previous.take();
        REDIRECT.with(|r| {
            if let Some(mut current) = r.replace(previous) {
                let _ = current.flush();
            }
        });
    }
}

fn joined(args: &[Cell]) -> String {
    args.iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Print the arguments space-separated on one line
pub fn print(args: &[Cell]) -> EvalResult<Cell> {
    let mut out = ProgramOutput;
    writeln!(out, "{}", joined(args))
        .and_then(|_| out.flush())
        .map_err(|e| EvalError::Output(e.to_string()))?;
    Ok(Cell::nil())
}

pub fn str(args: &[Cell]) -> EvalResult<Cell> {
    Ok(Cell::string(&joined(args)))
}

/// The calling environment as a first-class value
pub fn current_env(_args: &[Cell], env: &Env) -> EvalResult<Cell> {
    Ok(Cell::Env(env.clone()))
}

pub fn env_str(args: &[Cell]) -> EvalResult<Cell> {
    expect_arity(args, 1)?;
    let env = args[0].env().ok_or_else(|| {
        EvalError::type_mismatch(
            "env-str",
            format!("expected environment, got {}", args[0].type_name()),
        )
    })?;
    Ok(Cell::string(&env.describe()))
}
