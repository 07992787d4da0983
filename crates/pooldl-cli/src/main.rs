use clap::Parser;
use pooldl_core::logging;

mod cli;

use crate::cli::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Log to the XDG state file; stderr if it cannot be opened.
    if let Err(e) = logging::init_logging(cli.verbose) {
        logging::init_logging_stderr(cli.verbose);
        tracing::warn!("log file unavailable, logging to stderr: {:#}", e);
    }

    if let Err(err) = cli.run().await {
        eprintln!("pooldl error: {:#}", err);
        std::process::exit(1);
    }
}
