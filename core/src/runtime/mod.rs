//! Native procedure library
//!
//! Host procedures installed into a fresh root environment. Every evaluator
//! shares the same bindings, so results agree across engines.

pub mod io;
pub mod list;
pub mod math;

use crate::cell::{Cell, CellType, Env, NativeProc, NativeProcEnv, FALSE_NAME, NIL_NAME, TRUE_NAME};
use crate::error::{EvalError, EvalResult};


/* ===================== Environment Injection ===================== */

/// Fresh root environment with the full native library installed
pub fn standard_env() -> Env {
    let env = Env::new();
    inject_stdlib(&env);
    env
}

/// Install constants, `CellType.NAME` tags and native procedures into `env`
pub fn inject_stdlib(env: &Env) {
    env.define(TRUE_NAME, Cell::truth(true));
    env.define(FALSE_NAME, Cell::truth(false));
    env.define(NIL_NAME, Cell::nil());

    for tag in CellType::ALL {
        env.define(tag.label(), Cell::number(tag.code()));
    }

    let procs: &[(&str, fn(&[Cell]) -> EvalResult<Cell>)] = &[
        ("+", math::plus),
        ("-", math::minus),
        ("*", math::multiply),
        ("/", math::divide),
        ("<", math::less_than),
        ("<=", math::less_equal),
        (">", math::greater_than),
        (">=", math::greater_equal),
        ("=", math::num_equal),
        ("==", math::equal),
        ("head", list::head),
        ("tail", list::tail),
        ("null?", list::nullp),
        ("list", list::list),
        ("cons", list::cons),
        ("append", list::append),
        ("length", list::length),
        ("print", io::print),
        ("str", io::str),
        ("env-str", io::env_str),
    ];
    for (name, func) in procs {
        env.define(*name, Cell::Proc(NativeProc::new(name, *func)));
    }

    env.define("env", Cell::ProcEnv(NativeProcEnv::new("env", io::current_env)));
}

/* ===================== Argument Helpers ===================== */

pub(crate) fn expect_arity(args: &[Cell], expected: usize) -> EvalResult<()> {
    if args.len() != expected {
        return Err(EvalError::ArityMismatch {
            expected,
            got: args.len(),
        });
    }
    Ok(())
}

pub(crate) fn expect_list<'a>(op: &str, cell: &'a Cell) -> EvalResult<&'a Cell> {
    match cell {
        Cell::List(_) => Ok(cell),
        other => Err(EvalError::type_mismatch(
            op,
            format!("expected list, got {} '{}'", other.type_name(), other),
        )),
    }
}
