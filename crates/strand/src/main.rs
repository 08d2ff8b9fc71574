//! Strand plugin entry point.

use std::io::Write;
use std::process::ExitCode;

use clap::Parser;
use color_eyre::eyre::Result;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use strand::cli::Cli;
use strand::cni::ErrorResult;
use strand_network::CNI_VERSION;

fn main() -> Result<ExitCode> {
    // Initialize error handling
    color_eyre::install()?;

    let cli = Cli::parse();

    // stdout carries the CNI result, so logs go to stderr
    let directive = if cli.debug { "strand=debug" } else { "strand=info" };
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive(directive.parse()?))
        .init();

    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout().lock();

    match cli.execute(stdin.lock(), &mut stdout) {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(err) => {
            tracing::error!(code = err.code(), error = %err, "Plugin failed");
            serde_json::to_writer(&mut stdout, &ErrorResult::new(&err, CNI_VERSION))?;
            writeln!(stdout)?;
            Ok(ExitCode::FAILURE)
        }
    }
}
