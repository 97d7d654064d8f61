//! Entry point: parses the CLI, installs tracing, and hands off to `run.rs`.

mod cli;
mod run;

use anyhow::Result;

fn main() -> Result<()> {
    let cli = cli::parse();
    run::initialise_tracing();
    run::run(cli)
}
