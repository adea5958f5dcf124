//! Regression corpus
//!
//! A fixed list of `(source, printed result)` pairs run in order against one
//! shared environment, so later cases see earlier definitions. Every
//! evaluator must pass all of them.

use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{info, warn};

use crate::interpreter::{Evaluator, Strategy};
use crate::reader;
use crate::runtime::standard_env;

pub const CORPUS: &[(&str, &str)] = &[
    ("((lambda (X) (+ X X)) 5)", "10"),
    ("(< 10 2)", "#false"),
    ("(<= 10 2)", "#false"),
    ("(+ 2 2)", "4"),
    ("(+ (* 2 100) (* 1 10))", "210"),
    ("(> 6 5)", "#true"),
    ("(< 6 5)", "#false"),
    ("(if (> 6 5) (+ 1 1) (+ 2 2))", "2"),
    ("(if (< 6 5) (+ 1 1) (+ 2 2))", "4"),
    ("(define X 3)", "3"),
    ("X", "3"),
    ("(+ X X)", "6"),
    ("(begin (define X 1) (set! X (+ X 1)) (+ X 1))", "3"),
    ("(define twice (lambda (X) (* 2 X)))", "#Lambda((X) (* 2 X))"),
    ("(twice 5)", "10"),
    (
        "(define compose (lambda (F G) (lambda (X) (F (G X)))))",
        "#Lambda((F G) (lambda (X) (F (G X))))",
    ),
    ("((compose list twice) 5)", "(10)"),
    ("(define repeat (lambda (F) (compose F F)))", "#Lambda((F) (compose F F))"),
    ("((repeat twice) 5)", "20"),
    ("((repeat (repeat twice)) 5)", "80"),
    // head recursive
    (
        "(define fact (lambda (N) (if (<= N 1) 1 (* N (fact (- N 1))))))",
        "#Lambda((N) (if (<= N 1) 1 (* N (fact (- N 1)))))",
    ),
    ("(fact 3)", "6"),
    ("(fact 12)", "479001600"),
    // tail recursive
    (
        "(begin (define fac (lambda (N) (fac2 N 1))) (define fac2 (lambda (N A) (if (<= N 0) A (fac2 (- N 1) (* N A))))))",
        "#Lambda((N A) (if (<= N 0) A (fac2 (- N 1) (* N A))))",
    ),
    ("(fac 10)", "3628800"),
    (
        "(define abs (lambda (N) ((if (> N 0) + -) 0 N)))",
        "#Lambda((N) ((if (> N 0) + -) 0 N))",
    ),
    ("(list (abs -3) (abs 0) (abs 3))", "(3 0 3)"),
    (
        "(define combine (lambda (F) (lambda (X Y) (if (null? X) (quote ()) (F (list (head X) (head Y)) ((combine F) (tail X) (tail Y)))))))",
        "#Lambda((F) (lambda (X Y) (if (null? X) (quote ()) (F (list (head X) (head Y)) ((combine F) (tail X) (tail Y))))))",
    ),
    (
        "(define zip (combine cons))",
        "#Lambda((X Y) (if (null? X) (quote ()) (F (list (head X) (head Y)) ((combine F) (tail X) (tail Y)))))",
    ),
    ("(zip (list 1 2 3 4) (list 5 6 7 8))", "((1 5) (2 6) (3 7) (4 8))"),
    (
        "(define riff-shuffle (lambda (Deck) (begin \
         (define take (lambda (N Seq) (if (<= N 0) (quote ()) (cons (head Seq) (take (- N 1) (tail Seq)))))) \
         (define drop (lambda (N Seq) (if (<= N 0) Seq (drop (- N 1) (tail Seq))))) \
         (define mid (lambda (Seq) (/ (length Seq) 2))) \
         ((combine append) (take (mid Deck) Deck) (drop (mid Deck) Deck)))))",
        "#Lambda((Deck) (begin (define take (lambda (N Seq) (if (<= N 0) (quote ()) (cons (head Seq) (take (- N 1) (tail Seq)))))) (define drop (lambda (N Seq) (if (<= N 0) Seq (drop (- N 1) (tail Seq))))) (define mid (lambda (Seq) (/ (length Seq) 2))) ((combine append) (take (mid Deck) Deck) (drop (mid Deck) Deck))))",
    ),
    ("(riff-shuffle (list 1 2 3 4 5 6 7 8))", "(1 5 2 6 3 7 4 8)"),
    ("((repeat riff-shuffle) (list 1 2 3 4 5 6 7 8))", "(1 3 5 7 2 4 6 8)"),
    (
        "(riff-shuffle (riff-shuffle (riff-shuffle (list 1 2 3 4 5 6 7 8))))",
        "(1 2 3 4 5 6 7 8)",
    ),
    // macros
    ("(define abc 1)", "1"),
    ("(define get! (macro (var) var))", "#Macro((var) var)"),
    ("(get! abc)", "1"),
    (
        "(define incr (macro (var n) (list (quote set!) var (list (quote +) n (list (quote get!) var)))))",
        "#Macro((var n) (list (quote set!) var (list (quote +) n (list (quote get!) var))))",
    ),
    ("(incr abc 2)", "3"),
    ("(get! abc)", "3"),
];

/* ===================== Reports ===================== */

#[derive(Debug, Clone, Serialize)]
pub struct CaseFailure {
    pub source: String,
    pub expected: String,
    /// Printed result, or the error message
    pub actual: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SuiteReport {
    pub strategy: Strategy,
    pub passed: usize,
    pub failed: usize,
    pub steps: u64,
    #[serde(serialize_with = "as_millis")]
    pub elapsed: Duration,
    pub failures: Vec<CaseFailure>,
}

impl SuiteReport {
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

fn as_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

/* ===================== Runner ===================== */

/// Run `CORPUS` against `evaluator` in a fresh standard environment
pub fn run_suite(evaluator: &mut dyn Evaluator) -> SuiteReport {
    run_cases(evaluator, CORPUS)
}

pub fn run_cases(evaluator: &mut dyn Evaluator, cases: &[(&str, &str)]) -> SuiteReport {
    let env = standard_env();
    let steps_before = evaluator.steps();
    let started = Instant::now();
    let mut passed = 0;
    let mut failures = Vec::new();

    for (source, expected) in cases {
        let actual = reader::read(source)
            .map_err(|e| e.to_string())
            .and_then(|form| evaluator.eval(&form, &env).map_err(|e| e.to_string()));

        match actual {
            Ok(value) if value.to_string() == *expected => passed += 1,
            other => {
                let actual = match other {
                    Ok(value) => value.to_string(),
                    Err(msg) => format!("error: {}", msg),
                };
                warn!(source, expected, actual = %actual, "Suite case failed");
                failures.push(CaseFailure {
                    source: source.to_string(),
                    expected: expected.to_string(),
                    actual,
                });
            }
        }
    }

    let report = SuiteReport {
        strategy: evaluator.strategy(),
        passed,
        failed: failures.len(),
        steps: evaluator.steps() - steps_before,
        elapsed: started.elapsed(),
        failures,
    };
    info!(
        strategy = %report.strategy,
        passed = report.passed,
        failed = report.failed,
        steps = report.steps,
        "Suite finished"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::{ClassicEval, FrameEval};

    #[test]
    fn test_corpus_passes_on_reference_evaluator() {
        let mut eval = ClassicEval::new(1000, false);
        let report = run_suite(&mut eval);
        assert!(report.is_success(), "{:#?}", report.failures);
        assert_eq!(report.passed, CORPUS.len());
        assert!(report.steps > 0);
    }

    #[test]
    fn test_failures_are_reported_not_raised() {
        let mut eval = FrameEval::new(false);
        let cases = [("(+ 1 1)", "2"), ("(+ 1 1)", "3"), ("nope", "1"), ("(", "x")];
        let report = run_cases(&mut eval, &cases);
        assert_eq!(report.passed, 1);
        assert_eq!(report.failed, 3);
        assert_eq!(report.failures[0].actual, "2");
        assert!(report.failures[1].actual.starts_with("error: unbound symbol"));
        assert!(report.failures[2].actual.starts_with("error:"));
    }

    #[test]
    fn test_report_serializes() {
        let mut eval = FrameEval::new(false);
        let report = run_cases(&mut eval, &[("1", "1")]);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["strategy"], "frame");
        assert_eq!(json["passed"], 1);
        assert!(json["elapsed"].is_u64());
    }
}
