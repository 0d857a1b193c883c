//! `stride` binary entry point.

use clap::Parser;
use stride::cli::{self, Cli};
use stride::logging;

fn main() {
    let cli = Cli::parse();

    if let Err(e) = logging::init_logging(cli.verbose, cli.quiet, None) {
        eprintln!("Failed to initialize logging: {e}");
        std::process::exit(1);
    }

    if let Err(e) = cli::run(&cli) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
