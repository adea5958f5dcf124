//! Bytecode cell machine
//!
//! - `opcode`: the instruction set
//! - `assembler`: text assembly to `CodeResult`
//! - `vm`: the accumulator/stack machine that runs it
//! - `eval`: the surface-language evaluator, written in assembly, as an `Evaluator`

pub mod assembler;
pub mod code;
pub mod eval;
pub mod opcode;
pub mod vm;

#[cfg(test)]
mod tests;

pub use assembler::{AssembleError, Assembler, Label};
pub use code::{disassemble, CodeResult};
pub use eval::{CellMachineEval, EVAL_ASM, FAC_ASM};
pub use opcode::OpCode;
pub use vm::{Machine, DEFAULT_STACK_SIZE};
