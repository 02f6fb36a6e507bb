//! latticectl CLI entry point
//!
//! Parses arguments, runs the selected command and maps the aggregate
//! report onto the process exit status.

use clap::Parser;

use latticectl::cli::{run, Cli};

fn main() {
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err:#}");
            std::process::exit(1);
        }
    }
}
