//! Step handlers
//!
//! Each handler advances one frame from one phase. Handlers never touch
//! other frames: they ask the exec loop to spawn a child by returning
//! `Flow::Spawn`, and receive the child's value through `incoming`.

use super::types::{FrameState, StepTag, Wait};
use crate::cell::{Cell, Env};
use crate::error::{EvalError, EvalResult};
use crate::interpreter::forms::{self, SpecialForm};

/// What the exec loop should do after a handler ran
pub enum Flow {
    /// Dispatch this frame again within the same step
    Again,
    /// Step complete, frame still running
    Stay,
    /// Push a child frame evaluating `expr` in `env` and wait for it
    Spawn(Cell, Env),
    /// Frame reached DONE
    Done,
}

/* ===================== Dispatcher ===================== */

pub fn dispatch(frame: &mut FrameState) -> EvalResult<Flow> {
    match (frame.tag, frame.wait) {
        (StepTag::Enter, Wait::Ready) => enter(frame),
        (StepTag::Builtin, Wait::Ready) => builtin(frame),
        (StepTag::Begin, Wait::Ready) => begin(frame),
        (StepTag::Begin, Wait::SubframeFin) => begin_fin(frame),
        (StepTag::IfTest, Wait::SubframeFin) => if_test_fin(frame),
        (StepTag::Define, Wait::SubframeFin) => define_fin(frame),
        (StepTag::Proc, Wait::Ready) => proc(frame),
        (StepTag::Proc, Wait::SubframeFin) => proc_fin(frame),
        (StepTag::Exps, Wait::Ready) => exps(frame),
        (StepTag::Exps, Wait::SubframeFin) => exps_fin(frame),
        (StepTag::ExecProc, Wait::Ready) => exec_proc(frame),
        (StepTag::ExecMacro, Wait::SubframeFin) => exec_macro_fin(frame),
        _ => Err(EvalError::UnimplementedStep(frame.phase().to_string())),
    }
}

/* ===================== Entry ===================== */

fn enter(frame: &mut FrameState) -> EvalResult<Flow> {
    let value = match &frame.expr {
        Cell::Symbol(name) => frame.env.lookup(name)?,
        Cell::List(_) if frame.expr.is_empty() => Cell::nil(),
        Cell::List(_) => {
            frame.tag = StepTag::Builtin;
            return Ok(Flow::Again);
        }
        other => other.clone(),
    };
    frame.finish(value);
    Ok(Flow::Done)
}

fn builtin(frame: &mut FrameState) -> EvalResult<Flow> {
    let Some(form) = SpecialForm::of(&frame.expr) else {
        frame.tag = StepTag::Proc;
        return Ok(Flow::Again);
    };
    let items = frame.expr.items();

    match form {
        SpecialForm::Quote => {
            frame.finish(forms::operand(&items, 1, form)?);
            Ok(Flow::Done)
        }
        SpecialForm::Lambda | SpecialForm::Macro => {
            frame.finish(forms::make_closure(form, &frame.expr, &frame.env)?);
            Ok(Flow::Done)
        }
        SpecialForm::If => {
            let test = forms::operand(&items, 1, form)?;
            frame.tag = StepTag::IfTest;
            Ok(Flow::Spawn(test, frame.env.clone()))
        }
        SpecialForm::Define | SpecialForm::Set => {
            forms::binding_name(&items, form)?;
            let value = forms::operand(&items, 2, form)?;
            frame.tag = StepTag::Define;
            Ok(Flow::Spawn(value, frame.env.clone()))
        }
        SpecialForm::Begin => {
            frame.body = items.into_iter().skip(1).collect();
            frame.tag = StepTag::Begin;
            Ok(Flow::Again)
        }
    }
}

/* ===================== Special Forms ===================== */

fn begin(frame: &mut FrameState) -> EvalResult<Flow> {
    match frame.body.len() {
        0 => {
            let result = std::mem::replace(&mut frame.result, Cell::nil());
            frame.finish(result);
            Ok(Flow::Done)
        }
        1 => {
            // last body form runs in this frame
            let last = frame.body.pop_front().unwrap_or_else(Cell::nil);
            frame.tail_call(last, None);
            Ok(Flow::Again)
        }
        _ => {
            let next = frame.body.pop_front().unwrap_or_else(Cell::nil);
            Ok(Flow::Spawn(next, frame.env.clone()))
        }
    }
}

fn begin_fin(frame: &mut FrameState) -> EvalResult<Flow> {
    frame.result = frame.take_incoming();
    Ok(Flow::Stay)
}

fn if_test_fin(frame: &mut FrameState) -> EvalResult<Flow> {
    let test = frame.take_incoming();
    let branch = forms::if_branch(&frame.expr.items(), &test)?;
    frame.tail_call(branch, None);
    Ok(Flow::Again)
}

fn define_fin(frame: &mut FrameState) -> EvalResult<Flow> {
    let value = frame.take_incoming();
    let items = frame.expr.items();
    let form = SpecialForm::of(&frame.expr).unwrap_or(SpecialForm::Define);
    let name = forms::binding_name(&items, form)?;
    let value = forms::assign(form, &name, value, &frame.env)?;
    frame.finish(value);
    Ok(Flow::Done)
}

/* ===================== Application ===================== */

fn proc(frame: &mut FrameState) -> EvalResult<Flow> {
    Ok(Flow::Spawn(frame.expr.head(), frame.env.clone()))
}

fn proc_fin(frame: &mut FrameState) -> EvalResult<Flow> {
    frame.proc = frame.take_incoming();
    let operands: Vec<Cell> = frame.expr.items().into_iter().skip(1).collect();

    if let Cell::Macro(_) = frame.proc {
        frame.args = operands;
        frame.tag = StepTag::ExecProc;
    } else {
        frame.args.clear();
        frame.pending = operands.into();
        frame.tag = StepTag::Exps;
    }
    Ok(Flow::Again)
}

fn exps(frame: &mut FrameState) -> EvalResult<Flow> {
    match frame.pending.pop_front() {
        Some(operand) => Ok(Flow::Spawn(operand, frame.env.clone())),
        None => {
            frame.tag = StepTag::ExecProc;
            Ok(Flow::Again)
        }
    }
}

fn exps_fin(frame: &mut FrameState) -> EvalResult<Flow> {
    let value = frame.take_incoming();
    frame.args.push(value);
    Ok(Flow::Again)
}

fn exec_proc(frame: &mut FrameState) -> EvalResult<Flow> {
    let args = std::mem::take(&mut frame.args);
    match frame.proc.clone() {
        Cell::Proc(p) => {
            frame.finish(p.call(&args)?);
            Ok(Flow::Done)
        }
        Cell::ProcEnv(p) => {
            frame.finish(p.call(&args, &frame.env)?);
            Ok(Flow::Done)
        }
        Cell::Lambda(closure) => {
            let scope = Env::bind(&closure.params(), args, closure.env())?;
            frame.tail_call(closure.body(), Some(scope));
            Ok(Flow::Again)
        }
        Cell::Macro(closure) => {
            let scope = Env::bind(&closure.params(), args, closure.env())?;
            frame.tag = StepTag::ExecMacro;
            Ok(Flow::Spawn(closure.body(), scope))
        }
        other => Err(EvalError::NotCallable(other.to_string())),
    }
}

fn exec_macro_fin(frame: &mut FrameState) -> EvalResult<Flow> {
    let expansion = frame.take_incoming();
    frame.tail_call(expansion, None);
    Ok(Flow::Again)
}
