//! Assembler for the cell machine
//!
//! Source is a whitespace-separated token stream:
//!
//! ```text
//! ; comment to end of line
//! !define NAME VALUE     integer or existing label
//! name:                  label at the current code offset
//! "text"                 string constant, emits its data index
//! $payload               integer constant, emits its data index
//! 42                     literal code word
//! WORD                   label reference, resolved after the whole source is read
//! ```
//!
//! A backslash escapes the next character, so `\;` and `\ ` stay inside a token.

use std::collections::HashMap;

use thiserror::Error;

use super::code::CodeResult;
use super::opcode::OpCode;
use crate::cell::{Cell, CellType};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AssembleError {
    #[error("duplicate label '{0}'")]
    DuplicateLabel(String),

    #[error("label not found: '{0}'")]
    LabelNotFound(String),

    #[error("malformed operand '{0}'")]
    MalformedOperand(String),

    #[error("unterminated string starting on line {0}")]
    UnterminatedString(usize),

    #[error("'!define' on line {0} needs a name and a value")]
    IncompleteDefine(usize),
}

/// What a label stands for
#[derive(Debug, Clone)]
pub enum Label {
    /// Emitted as-is
    Fixed(i64),
    /// Copied into the data section on use; emits the data index
    Data(Cell),
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Word { text: String, line: usize },
    Str { text: String },
}

#[derive(Debug, Clone)]
enum Slot {
    Word(i64),
    Delayed(String),
}

/* ===================== Assembler ===================== */

pub struct Assembler {
    labels: HashMap<String, Label>,
    code: Vec<Slot>,
    data: Vec<Cell>,
}

impl Default for Assembler {
    fn default() -> Self {
        Assembler::new()
    }
}

impl Assembler {
    /// Assembler with opcode mnemonics, `CellType.*` codes and the
    /// `Nil`/`True`/`False`/`NewLine` constants already defined
    pub fn new() -> Self {
        let mut labels = HashMap::new();
        for op in OpCode::ALL {
            labels.insert(op.mnemonic().to_string(), Label::Fixed(op.word()));
        }
        for tag in CellType::ALL {
            labels.insert(tag.label(), Label::Fixed(tag.code()));
        }
        labels.insert("Nil".into(), Label::Data(Cell::nil()));
        labels.insert("True".into(), Label::Data(Cell::truth(true)));
        labels.insert("False".into(), Label::Data(Cell::truth(false)));
        labels.insert("NewLine".into(), Label::Data(Cell::string("\n")));

        Assembler {
            labels,
            code: Vec::new(),
            data: Vec::new(),
        }
    }

    /// Assemble `source` in one go
    pub fn assemble(source: &str, entry: &str) -> Result<CodeResult, AssembleError> {
        let mut asm = Assembler::new();
        asm.feed(source)?;
        asm.finish(entry)
    }

    pub fn label(&self, name: &str) -> Option<&Label> {
        self.labels.get(name)
    }

    pub fn define_label(&mut self, name: &str, label: Label) -> Result<(), AssembleError> {
        if self.labels.contains_key(name) {
            return Err(AssembleError::DuplicateLabel(name.to_string()));
        }
        self.labels.insert(name.to_string(), label);
        Ok(())
    }

    /// Append the program text in `source`
    pub fn feed(&mut self, source: &str) -> Result<(), AssembleError> {
        let mut tokens = tokenize(source)?.into_iter();

        while let Some(token) = tokens.next() {
            let (text, line) = match token {
                Token::Str { text } => {
                    let idx = self.add_data(Cell::string(&text));
                    self.code.push(Slot::Word(idx));
                    continue;
                }
                Token::Word { text, line } => (text, line),
            };

            if text == "!define" {
                let mut operand = || match tokens.next() {
                    Some(Token::Word { text, .. }) | Some(Token::Str { text }) => Ok(text),
                    None => Err(AssembleError::IncompleteDefine(line)),
                };
                let name = operand()?;
                let value = operand()?;
                let label = match value.parse::<i64>() {
                    Ok(n) => Label::Fixed(n),
                    Err(_) => self
                        .labels
                        .get(&value)
                        .cloned()
                        .ok_or(AssembleError::LabelNotFound(value))?,
                };
                self.define_label(&name, label)?;
            } else if let Some(payload) = text.strip_prefix('$') {
                let value = self.constant(payload).ok_or_else(|| {
                    AssembleError::MalformedOperand(text.clone())
                })?;
                let idx = self.add_data(Cell::Number(value));
                self.code.push(Slot::Word(idx));
            } else if let Ok(word) = text.parse::<i64>() {
                self.code.push(Slot::Word(word));
            } else if let Some(name) = text.strip_suffix(':').filter(|n| !n.is_empty()) {
                let here = self.code.len() as i64;
                self.define_label(name, Label::Fixed(here))?;
            } else {
                self.code.push(Slot::Delayed(text));
            }
        }
        Ok(())
    }

    /// Resolve every delayed reference and produce the program
    pub fn finish(mut self, entry: &str) -> Result<CodeResult, AssembleError> {
        let slots = std::mem::take(&mut self.code);
        let mut code = Vec::with_capacity(slots.len());
        for slot in slots {
            let word = match slot {
                Slot::Word(word) => word,
                Slot::Delayed(name) => match self.labels.get(&name).cloned() {
                    Some(Label::Fixed(value)) => value,
                    Some(Label::Data(cell)) => self.add_data(cell),
                    None => return Err(AssembleError::LabelNotFound(name)),
                },
            };
            code.push(word);
        }

        let entry = match self.labels.get(entry) {
            Some(Label::Fixed(pc)) => usize::try_from(*pc)
                .map_err(|_| AssembleError::MalformedOperand(entry.to_string()))?,
            Some(Label::Data(_)) => return Err(AssembleError::MalformedOperand(entry.to_string())),
            None => return Err(AssembleError::LabelNotFound(entry.to_string())),
        };

        Ok(CodeResult {
            code,
            data: self.data,
            entry,
        })
    }

    /// Integer payload of a `$` token: a literal or an integer-valued label
    fn constant(&self, payload: &str) -> Option<i64> {
        payload.parse().ok().or(match self.labels.get(payload) {
            Some(Label::Fixed(value)) => Some(*value),
            _ => None,
        })
    }

    fn add_data(&mut self, cell: Cell) -> i64 {
        self.data.push(cell);
        self.data.len() as i64 - 1
    }
}

/* ===================== Tokenizer ===================== */

fn tokenize(source: &str) -> Result<Vec<Token>, AssembleError> {
    let mut tokens = Vec::new();
    let mut word = String::new();
    let mut line = 1;
    let mut chars = source.chars();

    fn flush(word: &mut String, line: usize, tokens: &mut Vec<Token>) {
        if !word.is_empty() {
            tokens.push(Token::Word {
                text: std::mem::take(word),
                line,
            });
        }
    }

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(escaped) = chars.next() {
                    if escaped == '\n' {
                        line += 1;
                    }
                    word.push(escaped);
                }
            }
            ';' => {
                flush(&mut word, line, &mut tokens);
                for skipped in chars.by_ref() {
                    if skipped == '\n' {
                        line += 1;
                        break;
                    }
                }
            }
            '"' if word.is_empty() => {
                let start = line;
                let mut text = String::new();
                let mut closed = false;
                while let Some(s) = chars.next() {
                    match s {
                        '"' => {
                            closed = true;
                            break;
                        }
                        '\\' => {
                            if let Some(escaped) = chars.next() {
                                text.push(escaped);
                            }
                        }
                        other => {
                            if other == '\n' {
                                line += 1;
                            }
                            text.push(other);
                        }
                    }
                }
                if !closed {
                    return Err(AssembleError::UnterminatedString(start));
                }
                tokens.push(Token::Str { text });
            }
            c if c.is_whitespace() => {
                flush(&mut word, line, &mut tokens);
                if c == '\n' {
                    line += 1;
                }
            }
            other => word.push(other),
        }
    }
    flush(&mut word, line, &mut tokens);
    Ok(tokens)
}
