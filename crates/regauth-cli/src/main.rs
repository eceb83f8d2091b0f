//! regauth - log in to and out of container registries.
//!
//! Credentials are kept in the shared containers auth file so other image
//! tools pick them up.

mod cli;
mod commands;

use std::io;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::{Cli, Command};

/// Initialize the tracing subscriber for logging
fn init_tracing(verbose: u8, debug: bool) {
    // RUST_LOG wins over the verbosity flags. Logs go to stderr; stdout
    // carries the per-registry report.
    let default_level = if debug || verbose >= 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

fn main() -> Result<ExitCode> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.debug);
    debug!("regauth starting");

    match cli.command {
        Command::Logout(args) => commands::logout(args),
        Command::Login(args) => commands::login(args),
        Command::GetLogin(args) => commands::get_login(args),
    }
}
