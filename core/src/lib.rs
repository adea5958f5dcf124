pub mod cell;
pub mod cli;
pub mod config;
pub mod error;
pub mod interpreter;
pub mod machine;
pub mod reader;
pub mod runtime;
pub mod scheduler;
pub mod suite;

// Re-export main types
pub use cell::{Cell, CellType, Env};
pub use config::Config;
pub use error::{Error, EvalError, EvalResult};
pub use interpreter::{build_evaluator, eval_source, Evaluator, Strategy};
pub use reader::{read, read_program, ReadError};
pub use runtime::standard_env;
