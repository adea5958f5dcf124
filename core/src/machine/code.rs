//! Loadable program image

use std::fmt::Write;

use super::opcode::OpCode;
use crate::cell::Cell;

/// Assembled program: code words, constant pool and entry point
#[derive(Debug, Clone)]
pub struct CodeResult {
    pub code: Vec<i64>,
    pub data: Vec<Cell>,
    pub entry: usize,
}

/// Render `program` one instruction per line, annotating data loads
pub fn disassemble(program: &CodeResult) -> String {
    let mut out = String::new();
    let mut pc = 0;
    while pc < program.code.len() {
        let word = program.code[pc];
        let marker = if pc == program.entry { ">" } else { " " };
        let Some(op) = OpCode::from_word(word) else {
            let _ = writeln!(out, "{}{:05}  .word {}", marker, pc, word);
            pc += 1;
            continue;
        };

        let operands: Vec<i64> = program
            .code
            .iter()
            .skip(pc + 1)
            .take(op.operand_count())
            .copied()
            .collect();
        let mut line = format!("{}{:05}  {}", marker, pc, op.mnemonic());
        for operand in &operands {
            let _ = write!(line, " {}", operand);
        }
        if matches!(op, OpCode::Data | OpCode::HaltMsg) {
            if let Some(cell) = operands
                .first()
                .and_then(|idx| usize::try_from(*idx).ok())
                .and_then(|idx| program.data.get(idx))
            {
                let _ = write!(line, "    ; {:?}", cell);
            }
        }
        let _ = writeln!(out, "{}", line);
        pc += 1 + op.operand_count();
    }
    out
}
