use clap::Parser;
use retryhttp_core::logging;

mod cli;

use crate::cli::Cli;

fn main() {
    let cli = Cli::parse();

    // Log file by default; stderr with --verbose or when the state dir is unusable.
    if cli.global.verbose {
        logging::init_logging_stderr();
    } else if let Err(e) = logging::init_logging() {
        logging::init_logging_stderr();
        tracing::warn!("file logging unavailable, using stderr: {:#}", e);
    }

    if let Err(err) = cli.run() {
        eprintln!("retryhttp error: {:#}", err);
        std::process::exit(1);
    }
}
