mod cli;
mod commands;
mod script;

use clap::Parser;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Command};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_span_events(FmtSpan::CLOSE)
        .init();

    let cli = Cli::parse_from(cli::normalize_argv(std::env::args()));
    let exit_code = match &cli.command {
        Command::Encode(args) => run_job("encode", &args.output, commands::encode::run(args)),
        Command::Decode(args) => run_job("decode", &args.output, commands::decode::run(args)),
        Command::Info(args) => run_job("info", &args.input, commands::info::run(args)),
        Command::Script(args) => run_script(args),
    };
    std::process::exit(exit_code);
}

fn run_job(subcommand: &str, path: &std::path::Path, result: ktxforge_core::error::Result<()>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("{subcommand} {path}: {err}", path = path.display());
            1
        }
    }
}

fn run_script(args: &cli::ScriptArgs) -> i32 {
    match script::run_script(&args.input, args.jobs) {
        Ok(outcome) => {
            tracing::info!(
                path = %args.input.display(),
                commands = outcome.command_count,
                errors = outcome.error_count,
                "script finished"
            );
            if outcome.error_count > 0 {
                1
            } else {
                0
            }
        }
        Err(err) => {
            eprintln!("script {path}: {err}", path = args.input.display());
            1
        }
    }
}
