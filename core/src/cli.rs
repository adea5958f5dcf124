use std::collections::HashMap;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use crate::cell::{Cell, Env};
use crate::config::Config;
use crate::error::{Error, EvalError};
use crate::interpreter::{build_evaluator, eval_source, Evaluator, Strategy};
use crate::machine::{disassemble, Assembler, Machine};
use crate::reader::{self, ReadError};
use crate::runtime::standard_env;
use crate::scheduler::{program_form, Scheduler, TaskFactory, TaskOutcome};
use crate::suite::run_suite;

#[derive(Parser)]
#[command(name = "scheming")]
#[command(about = "Scheming - a small Lisp with interchangeable evaluators", long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default search)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Evaluator to use (overrides config file and env vars)
    #[arg(short = 'E', long, global = true, value_enum)]
    pub evaluator: Option<Strategy>,

    /// Trace evaluation steps and VM instructions
    #[arg(short, long, global = true)]
    pub debug: bool,

    /// Report steps and elapsed time after each evaluation
    #[arg(short, long, global = true)]
    pub timing: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Evaluate source files in order in one environment
    Run {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Evaluate an expression and print the result
    Eval {
        expr: String,
    },

    /// Read-eval-print loop on stdin
    Repl,

    /// Run the regression suite
    Test {
        /// Run against every evaluator instead of the selected one
        #[arg(long)]
        all: bool,

        #[arg(long)]
        json: bool,
    },

    /// Assemble a program and run it on the cell machine
    Asm {
        file: PathBuf,

        /// Label to start at
        #[arg(long, default_value = "main")]
        entry: String,

        /// Print the disassembly before running
        #[arg(long)]
        listing: bool,

        /// Arguments pushed before the program starts, each read as an expression
        args: Vec<String>,
    },

    /// Run each file as its own task on the cooperative scheduler
    Schedule {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        #[arg(long)]
        json: bool,
    },

    /// Time an expression on every evaluator
    Bench {
        expr: String,

        #[arg(short = 'n', long, default_value = "10")]
        iterations: u32,

        #[arg(long)]
        json: bool,
    },

    /// Print the effective configuration as TOML
    Config,
}

/// Run the CLI by parsing process arguments
pub fn run_cli() -> Result<()> {
    let cli = Cli::parse();
    run_cli_with_args(cli)
}

/// Run the CLI with provided arguments
pub fn run_cli_from_args(args: Vec<String>) -> Result<()> {
    let cli = Cli::parse_from(args);
    run_cli_with_args(cli)
}

fn run_cli_with_args(cli: Cli) -> Result<()> {
    // Load and validate before running anything so config errors surface first
    let config = Config::builder()
        .config_path(cli.config)
        .evaluator(cli.evaluator)
        .debug(cli.debug)
        .timing(cli.timing)
        .build()?;

    init_tracing(config.engine.debug);
    debug!(evaluator = %config.engine.evaluator, "Configuration loaded");

    match cli.command {
        Commands::Run { files } => run_files(&config, &files),
        Commands::Eval { expr } => {
            let mut evaluator = build_evaluator(config.engine.evaluator, &config)?;
            let value = timed_eval(&config, evaluator.as_mut(), &expr, &standard_env())?;
            println!("{}", value);
            Ok(())
        }
        Commands::Repl => repl(&config),
        Commands::Test { all, json } => run_tests(&config, all, json),
        Commands::Asm {
            file,
            entry,
            listing,
            args,
        } => run_asm(&config, &file, &entry, listing, &args),
        Commands::Schedule { files, json } => schedule(&config, &files, json),
        Commands::Bench {
            expr,
            iterations,
            json,
        } => bench(&config, &expr, iterations, json),
        Commands::Config => {
            print!("{}", config.to_toml()?);
            Ok(())
        }
    }
}

/// Filter used when `RUST_LOG` is unset
fn default_directive(debug: bool) -> &'static str {
    if debug {
        "debug"
    } else {
        "warn"
    }
}

fn init_tracing(debug: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(debug)));
    // A subscriber may already be installed when the CLI is embedded
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

/* ===================== Evaluation ===================== */

fn timed_eval(
    config: &Config,
    evaluator: &mut dyn Evaluator,
    source: &str,
    env: &Env,
) -> Result<Cell, Error> {
    let steps_before = evaluator.steps();
    let started = Instant::now();
    let result = eval_source(evaluator, source, env);
    if config.engine.timing {
        eprintln!(
            "[{}] {} steps in {:.3} ms",
            evaluator.strategy(),
            evaluator.steps() - steps_before,
            millis(started.elapsed())
        );
    }
    result
}

fn run_files(config: &Config, files: &[PathBuf]) -> Result<()> {
    let mut evaluator = build_evaluator(config.engine.evaluator, config)?;
    let env = standard_env();
    for path in files {
        let source = read_file(path)?;
        timed_eval(config, evaluator.as_mut(), &source, &env)
            .with_context(|| format!("Failed to evaluate {}", path.display()))?;
    }
    Ok(())
}

fn repl(config: &Config) -> Result<()> {
    let mut evaluator = build_evaluator(config.engine.evaluator, config)?;
    let env = standard_env();
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut pending = String::new();

    loop {
        write!(stdout, "{}", if pending.is_empty() { "> " } else { ". " })?;
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            println!();
            return Ok(());
        }
        pending.push_str(&line);
        if pending.trim().is_empty() {
            pending.clear();
            continue;
        }

        match timed_eval(config, evaluator.as_mut(), &pending, &env) {
            Ok(value) => println!("{}", value),
            // Keep reading until the form is closed
            Err(Error::Read(ReadError::UnbalancedParens(msg))) if msg.contains("unclosed") => {
                continue
            }
            Err(e) => println!("Error: {}", e),
        }
        pending.clear();
    }
}

/* ===================== Regression Suite ===================== */

fn run_tests(config: &Config, all: bool, json: bool) -> Result<()> {
    let strategies = if all {
        Strategy::ALL.to_vec()
    } else {
        vec![config.engine.evaluator]
    };

    let mut reports = Vec::new();
    for strategy in strategies {
        let mut evaluator = build_evaluator(strategy, config)?;
        reports.push(run_suite(evaluator.as_mut()));
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        for report in &reports {
            for failure in &report.failures {
                println!("FAIL [{}] {}", report.strategy, failure.source);
                println!("    expected: {}", failure.expected);
                println!("    actual:   {}", failure.actual);
            }
            println!(
                "{}: {} passed, {} failed ({} steps, {:.3} ms)",
                report.strategy,
                report.passed,
                report.failed,
                report.steps,
                millis(report.elapsed)
            );
        }
    }

    let failed: usize = reports.iter().map(|r| r.failed).sum();
    if failed > 0 {
        bail!("{} regression case(s) failed", failed);
    }
    Ok(())
}

/* ===================== Cell Machine ===================== */

fn run_asm(config: &Config, file: &Path, entry: &str, listing: bool, args: &[String]) -> Result<()> {
    let source = read_file(file)?;
    let program = Assembler::assemble(&source, entry)
        .with_context(|| format!("Failed to assemble {}", file.display()))?;
    if listing {
        print!("{}", disassemble(&program));
    }

    let args = args
        .iter()
        .map(|a| reader::read(a).with_context(|| format!("Invalid argument '{}'", a)))
        .collect::<Result<Vec<Cell>>>()?;

    let mut machine = Machine::new(Rc::new(program), &args, config.vm.stack_size)?
        .with_trace(config.engine.debug);
    let started = Instant::now();
    let value = machine.run()?;
    if config.engine.timing {
        eprintln!(
            "[asm] {} steps in {:.3} ms",
            machine.steps(),
            millis(started.elapsed())
        );
    }
    if let Some(message) = machine.halt_message() {
        return Err(EvalError::from_halt(message).into());
    }
    println!("{}", value);
    Ok(())
}

/* ===================== Scheduler ===================== */

fn schedule(config: &Config, files: &[PathBuf], json: bool) -> Result<()> {
    let factory = TaskFactory::new(config.engine.evaluator, config)?;
    let mut scheduler = Scheduler::new(&config.scheduler);
    let mut names = HashMap::new();

    for path in files {
        let source = read_file(path)?;
        let form = program_form(&source)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let task = factory.build(form, &standard_env())?;
        let id = scheduler.spawn(task);
        names.insert(id, path.display().to_string());
    }

    let reports = scheduler.run_until_idle();

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        for report in &reports {
            let name = names.get(&report.id).map(String::as_str).unwrap_or("?");
            match &report.outcome {
                TaskOutcome::Completed(value) => println!("{} {}: {}", report.title, name, value),
                TaskOutcome::Failed(e) => println!("{} {}: error: {}", report.title, name, e),
                TaskOutcome::Cancelled => println!("{} {}: cancelled", report.title, name),
            }
            if config.engine.timing {
                eprintln!(
                    "[{}] {} steps over {} quanta",
                    report.title, report.steps, report.quanta
                );
            }
        }
    }

    let failed = reports.iter().filter(|r| !r.outcome.is_completed()).count();
    if failed > 0 {
        bail!("{} task(s) failed", failed);
    }
    Ok(())
}

/* ===================== Benchmark ===================== */

#[derive(Debug, Serialize)]
struct BenchResult {
    strategy: Strategy,
    iterations: u32,
    steps: u64,
    elapsed_ms: f64,
    result: String,
}

fn bench(config: &Config, expr: &str, iterations: u32, json: bool) -> Result<()> {
    if iterations == 0 {
        bail!("--iterations must be at least 1");
    }

    let mut results = Vec::new();
    for strategy in Strategy::ALL {
        let mut evaluator = build_evaluator(strategy, config)?;
        let started = Instant::now();
        let mut last = Cell::nil();
        for _ in 0..iterations {
            last = eval_source(evaluator.as_mut(), expr, &standard_env())
                .with_context(|| format!("{} evaluator failed", strategy))?;
        }
        results.push(BenchResult {
            strategy,
            iterations,
            steps: evaluator.steps(),
            elapsed_ms: millis(started.elapsed()),
            result: last.to_string(),
        });
    }

    if results.windows(2).any(|w| w[0].result != w[1].result) {
        warn!("Evaluators disagree on the result");
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else {
        for r in &results {
            println!(
                "{:<8} {:>10} steps {:>10.3} ms  => {}",
                r.strategy, r.steps, r.elapsed_ms, r.result
            );
        }
    }
    Ok(())
}

fn millis(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use tracing_subscriber::fmt::MakeWriter;

    use super::*;

    /// Log sink shared between the subscriber and the test
    #[derive(Clone, Default)]
    struct LogCapture(Arc<Mutex<Vec<u8>>>);

    impl LogCapture {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl Write for LogCapture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for LogCapture {
        type Writer = LogCapture;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    fn logs_with_debug_flag(strategy: Strategy, source: &str) -> String {
        let capture = LogCapture::default();
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::new(default_directive(true)))
            .with_ansi(false)
            .with_writer(capture.clone())
            .finish();

        let mut config = Config::default();
        config.engine.debug = true;
        tracing::subscriber::with_default(subscriber, || {
            let mut evaluator = build_evaluator(strategy, &config).unwrap();
            eval_source(evaluator.as_mut(), source, &standard_env()).unwrap();
        });
        capture.text()
    }

    #[test]
    fn test_debug_flag_shows_frame_steps() {
        let logs = logs_with_debug_flag(Strategy::Frame, "(+ 1 2)");
        assert!(logs.contains("spawn frame"), "{}", logs);
        assert!(logs.contains("frame step"), "{}", logs);
    }

    #[test]
    fn test_debug_flag_shows_every_engine() {
        let classic = logs_with_debug_flag(Strategy::Classic, "(+ 1 2)");
        assert!(classic.contains("result=3"), "{}", classic);
        let cell = logs_with_debug_flag(Strategy::Cell, "(+ 1 2)");
        assert!(cell.contains("exec") && cell.contains("EXIT"), "{}", cell);
    }

    #[test]
    fn test_quiet_by_default() {
        assert_eq!(default_directive(false), "warn");
    }

    #[test]
    fn test_global_flags_parse_after_subcommand() {
        let cli = Cli::try_parse_from(["scheming", "eval", "(+ 1 2)", "-E", "cell", "-d"]).unwrap();
        assert_eq!(cli.evaluator, Some(Strategy::Cell));
        assert!(cli.debug);
        assert!(!cli.timing);
        let Commands::Eval { expr } = cli.command else {
            unreachable!("expected eval")
        };
        assert_eq!(expr, "(+ 1 2)");
    }

    #[test]
    fn test_asm_arguments() {
        let cli = Cli::try_parse_from([
            "scheming", "asm", "fac.asm", "--listing", "--entry", "start", "10",
        ])
        .unwrap();
        let Commands::Asm {
            file,
            entry,
            listing,
            args,
        } = cli.command
        else {
            unreachable!("expected asm")
        };
        assert_eq!(file, PathBuf::from("fac.asm"));
        assert_eq!(entry, "start");
        assert!(listing);
        assert_eq!(args, vec!["10"]);
    }

    #[test]
    fn test_run_requires_files() {
        assert!(Cli::try_parse_from(["scheming", "run"]).is_err());
        assert!(Cli::try_parse_from(["scheming", "-E", "nope", "repl"]).is_err());
    }

    #[test]
    fn test_bench_defaults() {
        let cli = Cli::try_parse_from(["scheming", "bench", "(fac 5)"]).unwrap();
        let Commands::Bench {
            iterations, json, ..
        } = cli.command
        else {
            unreachable!("expected bench")
        };
        assert_eq!(iterations, 10);
        assert!(!json);
    }
}
