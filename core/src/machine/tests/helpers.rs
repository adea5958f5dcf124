//! Test helpers for cell machine tests

use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

use crate::cell::Cell;
use crate::error::EvalResult;
use crate::machine::{Assembler, Machine};

pub const TEST_STACK: usize = 64;

/// Output sink the test keeps a handle to after the machine takes ownership
#[derive(Clone, Default)]
pub struct SharedBuf(Rc<RefCell<Vec<u8>>>);

impl SharedBuf {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Assemble `source` (entry `main`) and load it with `args`
pub fn load(source: &str, args: &[Cell]) -> (Machine, SharedBuf) {
    let program = Assembler::assemble(source, "main").expect("Assembly failed");
    let out = SharedBuf::default();
    let machine = Machine::new(Rc::new(program), args, TEST_STACK)
        .expect("Load failed")
        .with_output(Box::new(out.clone()));
    (machine, out)
}

/// Run `source` to completion, returning the accumulator
pub fn run(source: &str, args: &[Cell]) -> EvalResult<Cell> {
    let (mut machine, _) = load(source, args);
    machine.run()
}
