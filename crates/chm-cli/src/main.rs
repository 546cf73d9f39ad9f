//! chm - versioned schema migrations for ClickHouse and DuckDB

use clap::Parser;
use std::process::ExitCode;

mod cli;
mod commands;

use cli::Cli;
use commands::{create, down, dump, up};

/// `info` by default, `debug` with `--verbose`; `RUST_LOG` wins when set.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .format_target(false)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.global.verbose);

    let result = match &cli.command {
        cli::Commands::Create(args) => create::execute(args, &cli.global).await,
        cli::Commands::Up(args) => up::execute(args, &cli.global).await,
        cli::Commands::Down(args) => down::execute(args, &cli.global).await,
        cli::Commands::Dump(args) => dump::execute(args, &cli.global).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("❌ {:#}", err);
            ExitCode::FAILURE
        }
    }
}
