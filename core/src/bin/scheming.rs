/// Scheming command-line interface
///
/// Runs programs, the regression suite and the scheduler from the shell.

use scheming_core::cli;

fn main() {
    if let Err(e) = cli::run_cli() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
