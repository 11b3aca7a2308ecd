//! facetview CLI binary
//!
//! Browse virtual views over a content store from the command line.

use anyhow::Context;
use clap::Parser;
use facetview::logging::init_logging;
use facetview::tooling::cli::{load_config, Cli, CliContext};
use std::process;

fn setup(cli: &Cli) -> anyhow::Result<CliContext> {
    let mut config = load_config(cli.config.as_deref()).context("loading configuration")?;
    cli.apply_logging_overrides(&mut config);
    init_logging(Some(&config.logging)).context("initializing logging")?;
    CliContext::new(config, &cli.fixture, cli.store.clone()).context("opening repository")
}

fn main() {
    let cli = Cli::parse();

    let context = match setup(&cli) {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    };

    match context.execute(&cli.command) {
        Ok(output) => {
            println!("{}", output);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}
