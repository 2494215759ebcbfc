//! # chan CLI entry point
//!
//! Parses arguments, installs the tracing subscriber, and dispatches to
//! the subcommand handlers in the library.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use chan_cli::block::{run_sign_block, run_verify_block, SignBlockArgs, VerifyBlockArgs};
use chan_cli::keygen::{run_keygen, KeygenArgs};
use chan_cli::simulate::{run_simulate, SimulateArgs};

/// State channel node toolkit.
#[derive(Parser, Debug)]
#[command(name = "chan", version, about, long_about = None)]
struct Cli {
    /// Verbose logging. Repeat for more (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate a participant key file.
    Keygen(KeygenArgs),

    /// Author and sign a block.
    SignBlock(SignBlockArgs),

    /// Verify a signed block's author signature.
    VerifyBlock(VerifyBlockArgs),

    /// Run an in-process multi-party channel.
    Simulate(SimulateArgs),
}

fn init_tracing(verbose: u8, json: bool) {
    let filter = match std::env::var("RUST_LOG") {
        Ok(directives) if !directives.is_empty() => EnvFilter::new(directives),
        _ => EnvFilter::new(match verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }),
    };
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.json);

    let result = match &cli.command {
        Commands::Keygen(args) => run_keygen(args),
        Commands::SignBlock(args) => run_sign_block(args),
        Commands::VerifyBlock(args) => run_verify_block(args),
        Commands::Simulate(args) => run_simulate(args),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}
