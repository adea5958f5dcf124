//! Instruction set
//!
//! Opcode numbers are the variant order; assembly source names them by
//! mnemonic and the assembler pre-seeds every mnemonic as a label.

/// One machine instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i64)]
pub enum OpCode {
    Nop = 0,
    Lea,
    Sea,
    Adj,
    Push,
    Pop,
    Peek,
    Dup,
    Switch,
    Data,
    Jsr,
    Enter,
    Leave,
    Bz,
    Bnz,
    Jmp,
    Lt,
    Ltk,
    Le,
    Lek,
    Gt,
    Gtk,
    Eq,
    Eqk,
    Neqk,
    Neq,
    Sub,
    Mul,
    CellNew,
    CellType,
    CellCount,
    CellIndex,
    CellSetEnv,
    CellGetEnv,
    CellPush,
    CellSetType,
    CellInvoke,
    CellHead,
    CellTail,
    EnvLookup,
    EnvSet,
    EnvDefine,
    EnvNew,
    Exit,
    Print,
    HaltMsg,
    State,
}

impl OpCode {
    /// Every opcode, indexed by its number
    pub const ALL: [OpCode; 47] = [
        OpCode::Nop,
        OpCode::Lea,
        OpCode::Sea,
        OpCode::Adj,
        OpCode::Push,
        OpCode::Pop,
        OpCode::Peek,
        OpCode::Dup,
        OpCode::Switch,
        OpCode::Data,
        OpCode::Jsr,
        OpCode::Enter,
        OpCode::Leave,
        OpCode::Bz,
        OpCode::Bnz,
        OpCode::Jmp,
        OpCode::Lt,
        OpCode::Ltk,
        OpCode::Le,
        OpCode::Lek,
        OpCode::Gt,
        OpCode::Gtk,
        OpCode::Eq,
        OpCode::Eqk,
        OpCode::Neqk,
        OpCode::Neq,
        OpCode::Sub,
        OpCode::Mul,
        OpCode::CellNew,
        OpCode::CellType,
        OpCode::CellCount,
        OpCode::CellIndex,
        OpCode::CellSetEnv,
        OpCode::CellGetEnv,
        OpCode::CellPush,
        OpCode::CellSetType,
        OpCode::CellInvoke,
        OpCode::CellHead,
        OpCode::CellTail,
        OpCode::EnvLookup,
        OpCode::EnvSet,
        OpCode::EnvDefine,
        OpCode::EnvNew,
        OpCode::Exit,
        OpCode::Print,
        OpCode::HaltMsg,
        OpCode::State,
    ];

    pub fn from_word(word: i64) -> Option<OpCode> {
        usize::try_from(word)
            .ok()
            .and_then(|idx| OpCode::ALL.get(idx).copied())
    }

    pub fn word(self) -> i64 {
        self as i64
    }

    /// Number of inline operand words following the opcode
    pub fn operand_count(self) -> usize {
        match self {
            OpCode::Lea
            | OpCode::Sea
            | OpCode::Adj
            | OpCode::Data
            | OpCode::Jsr
            | OpCode::Enter
            | OpCode::Bz
            | OpCode::Bnz
            | OpCode::Jmp
            | OpCode::HaltMsg => 1,
            _ => 0,
        }
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            OpCode::Nop => "NOP",
            OpCode::Lea => "LEA",
            OpCode::Sea => "SEA",
            OpCode::Adj => "ADJ",
            OpCode::Push => "PUSH",
            OpCode::Pop => "POP",
            OpCode::Peek => "PEEK",
            OpCode::Dup => "DUP",
            OpCode::Switch => "SWITCH",
            OpCode::Data => "DATA",
            OpCode::Jsr => "JSR",
            OpCode::Enter => "ENTER",
            OpCode::Leave => "LEAVE",
            OpCode::Bz => "BZ",
            OpCode::Bnz => "BNZ",
            OpCode::Jmp => "JMP",
            OpCode::Lt => "LT",
            OpCode::Ltk => "LTK",
            OpCode::Le => "LE",
            OpCode::Lek => "LEK",
            OpCode::Gt => "GT",
            OpCode::Gtk => "GTK",
            OpCode::Eq => "EQ",
            OpCode::Eqk => "EQK",
            OpCode::Neqk => "NEQK",
            OpCode::Neq => "NEQ",
            OpCode::Sub => "SUB",
            OpCode::Mul => "MUL",
            OpCode::CellNew => "CELLNEW",
            OpCode::CellType => "CELLTYPE",
            OpCode::CellCount => "CELLCOUNT",
            OpCode::CellIndex => "CELLINDEX",
            OpCode::CellSetEnv => "CELLSETENV",
            OpCode::CellGetEnv => "CELLGETENV",
            OpCode::CellPush => "CELLPUSH",
            OpCode::CellSetType => "CELLSETTYPE",
            OpCode::CellInvoke => "CELLINVOKE",
            OpCode::CellHead => "CELLHEAD",
            OpCode::CellTail => "CELLTAIL",
            OpCode::EnvLookup => "ENVLOOKUP",
            OpCode::EnvSet => "ENVSET",
            OpCode::EnvDefine => "ENVDEFINE",
            OpCode::EnvNew => "ENVNEW",
            OpCode::Exit => "EXIT",
            OpCode::Print => "PRINT",
            OpCode::HaltMsg => "HALTMSG",
            OpCode::State => "STATE",
        }
    }
}
