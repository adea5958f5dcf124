//! Test helpers for frame evaluator tests

use crate::cell::{Cell, Env};
use crate::error::EvalResult;
use crate::interpreter::frame::FrameEval;
use crate::interpreter::Evaluator;
use crate::reader;
use crate::runtime::standard_env;

/// Evaluate every form of `source` in `env`, returning the last result
pub fn eval_in(eval: &mut FrameEval, source: &str, env: &Env) -> EvalResult<Cell> {
    let forms = reader::read_program(source).expect("Read failed");
    let mut last = Cell::nil();
    for form in forms {
        last = eval.eval(&form, env)?;
    }
    Ok(last)
}

/// Evaluate `source` in a fresh standard environment and render the result
pub fn eval_str(source: &str) -> String {
    let env = standard_env();
    let mut eval = FrameEval::new(false);
    eval_in(&mut eval, source, &env)
        .expect("Evaluation failed")
        .to_string()
}
