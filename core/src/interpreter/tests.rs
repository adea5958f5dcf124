//! Cross-evaluator agreement
//!
//! The reference evaluator is the oracle: every engine must agree with it on
//! the result or error of a program, and on what the program prints.

use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

use maplit::hashmap;

use super::*;
use crate::error::EvalError;
use crate::runtime::io::redirect_output;
use crate::runtime::standard_env;
use crate::suite::{run_suite, CORPUS};

/// Program output collected while redirected
#[derive(Clone, Default)]
struct Captured(Rc<RefCell<Vec<u8>>>);

impl Captured {
    fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }
}

impl Write for Captured {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn engines() -> Vec<Box<dyn Evaluator>> {
    let config = Config::default();
    Strategy::ALL
        .iter()
        .map(|s| build_evaluator(*s, &config).unwrap())
        .collect()
}

fn eval_with(evaluator: &mut dyn Evaluator, source: &str) -> Result<String, String> {
    let env = standard_env();
    eval_source(evaluator, source, &env)
        .map(|v| v.to_string())
        .map_err(|e| e.to_string())
}

#[test]
fn test_build_evaluator_reports_strategy() {
    for (strategy, mut engine) in Strategy::ALL.iter().zip(engines()) {
        assert_eq!(engine.strategy(), *strategy);
        assert_eq!(engine.steps(), 0);
        eval_with(engine.as_mut(), "(+ 1 2)").unwrap();
        assert!(engine.steps() > 0, "{} counted no steps", strategy);
    }
}

#[test]
fn test_suite_passes_on_every_engine() {
    for mut engine in engines() {
        let report = run_suite(engine.as_mut());
        assert!(
            report.is_success(),
            "{} failed: {:#?}",
            report.strategy,
            report.failures
        );
        assert_eq!(report.passed, CORPUS.len());
    }
}

#[test]
fn test_engines_agree_on_programs() {
    let programs = hashmap! {
        "(define fac (lambda (n) (if (<= n 1) 1 (* n (fac (- n 1)))))) (fac 10)" => "3628800",
        "(begin)" => "()",
        "(if #false 1)" => "()",
        "(if () 1 2)" => "1",
        "(quote (a (b c) \"d\"))" => "(a (b c) d)",
        "((lambda args (length args)) 1 2 3)" => "3",
        "(define k 5) (define f (lambda () k)) (set! k 6) (f)" => "6",
        "(== \"abc\" (quote abc))" => "#true",
        "(cons 1 (quote (2 3)))" => "(1 2 3)",
        "(str 1 \"a\" (quote b))" => "1 a b",
    };
    for (source, expected) in programs {
        for mut engine in engines() {
            let strategy = engine.strategy();
            assert_eq!(
                eval_with(engine.as_mut(), source).as_deref(),
                Ok(expected),
                "{} on {}",
                strategy,
                source
            );
        }
    }
}

#[test]
fn test_engines_agree_on_errors() {
    let programs = [
        ("nosuch", EvalError::UnboundSymbol("nosuch".into())),
        ("(set! nosuch 1)", EvalError::SetOnUndefined("nosuch".into())),
        ("(1 2)", EvalError::NotCallable("1".into())),
        ("((lambda (a) a))", EvalError::ArityMismatch { expected: 1, got: 0 }),
        ("(/ 10 0)", EvalError::DivideByZero),
    ];
    for (source, expected) in programs {
        for mut engine in engines() {
            let env = standard_env();
            let form = crate::reader::read(source).unwrap();
            let err = engine.eval(&form, &env).unwrap_err();
            assert_eq!(err, expected, "{} on {}", engine.strategy(), source);
        }
    }
}

#[test]
fn test_engines_agree_on_malformed_forms() {
    let _quiet = redirect_output(Box::new(std::io::sink()));
    let sources = [
        "(quote)",
        "(if)",
        "(if 1)",
        "(define)",
        "(define x)",
        "(set! x)",
        "(lambda (x))",
        "(macro ())",
    ];
    for source in sources {
        for mut engine in engines() {
            let env = standard_env();
            let form = crate::reader::read(source).unwrap();
            let err = engine.eval(&form, &env).unwrap_err();
            assert!(
                matches!(err, EvalError::MalformedForm(_)),
                "{} on {}: {}",
                engine.strategy(),
                source,
                err
            );
        }
    }
}

#[test]
fn test_print_output_is_captured_on_every_engine() {
    for mut engine in engines() {
        let out = Captured::default();
        let _redirect = redirect_output(Box::new(out.clone()));
        eval_with(engine.as_mut(), "(print 1 (quote (2 3))) (print (+ 2 2))").unwrap();
        assert_eq!(out.text(), "1 (2 3)\n4\n", "{}", engine.strategy());
    }
}

#[test]
fn test_eval_source_surfaces_read_errors() {
    let mut engine = ClassicEval::new(100, false);
    let err = eval_source(&mut engine, "(+ 1", &standard_env()).unwrap_err();
    let Error::Read(_) = err else {
        unreachable!("expected a read error, got {:?}", err)
    };
}

#[test]
fn test_reference_evaluator_depth_guard() {
    let mut engine = ClassicEval::new(50, false);
    let source = "(define down (lambda (n) (if (<= n 0) 0 (+ 1 (down (- n 1)))))) (down 100)";
    let err = eval_source(&mut engine, source, &standard_env()).unwrap_err();
    let Error::Eval(EvalError::RecursionLimit(limit)) = err else {
        unreachable!("expected a recursion limit, got {:?}", err)
    };
    assert_eq!(limit, 50);
}

#[test]
fn test_strategy_names() {
    let names: Vec<String> = Strategy::ALL.iter().map(|s| s.to_string()).collect();
    assert_eq!(names, vec!["classic", "frame", "cell"]);
    assert_eq!(Strategy::default(), Strategy::Frame);
    let parsed: Strategy = serde_json::from_str("\"cell\"").unwrap();
    assert_eq!(parsed, Strategy::Cell);
}

#[test]
fn test_reference_evaluator_deep_recursion_off_main_thread() {
    // Spawned threads get a much smaller stack than the main thread
    let handle = std::thread::spawn(|| {
        let config = Config::default();
        let mut engine = ClassicEval::new(config.engine.max_depth, false);
        let env = standard_env();
        let define = "(define fact (lambda (n) (if (<= n 1) 1 (* n (fact (- n 1))))))";
        eval_source(&mut engine, define, &env).unwrap();

        let deep = eval_source(&mut engine, "(fact 900)", &env).map(|v| v.to_string());
        let runaway = eval_source(&mut engine, "(fact 5000)", &env).unwrap_err();
        (deep.map_err(|e| e.to_string()), runaway.to_string())
    });
    let (deep, runaway) = handle.join().unwrap();
    // 900! has far more than 64 factors of two
    assert_eq!(deep.as_deref(), Ok("0"));
    assert_eq!(runaway, "recursion limit of 1000 exceeded");
}
