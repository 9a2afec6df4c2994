//! Reprise demo runner
//!
//! Lists and runs the bundled instrumented routines, and prints the
//! effective engine configuration.

use reprise_core::cli;

fn main() {
    if let Err(e) = cli::run_cli() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
