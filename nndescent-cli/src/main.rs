//! Entry point for the `nndescent` binary.
//!
//! Installs logging, runs the parsed command, writes the rendered graph to
//! stdout and maps failures onto the process exit code. Failures are logged
//! with the stable error codes of the core library.

use std::{
    io::{self, BufWriter, Write},
    process::ExitCode,
};

use anyhow::{Context, Result};
use clap::Parser;
use nndescent_cli::{
    cli::{Cli, CliError, render_summary, run_cli},
    logging::{self, LoggingError},
};
use tracing::{error, field};

fn try_main() -> Result<()> {
    let cli = Cli::parse();
    let summary = run_cli(cli).context("failed to execute command")?;
    let mut writer = BufWriter::new(io::stdout().lock());
    render_summary(&summary, &mut writer).context("failed to render output")?;
    writer.flush().context("failed to flush output")?;
    Ok(())
}

fn main() -> ExitCode {
    if let Err(err) = logging::init_logging() {
        report_logging_init_error(&err);
        return ExitCode::FAILURE;
    }

    let Err(err) = try_main() else {
        return ExitCode::SUCCESS;
    };
    let core = err.downcast_ref::<CliError>().and_then(|cli_error| match cli_error {
        CliError::Core(core) => Some(core),
        _ => None,
    });
    let code = core.map(|core| field::display(core.code().as_str()));
    let similarity_code = core
        .and_then(|core| core.similarity_code())
        .map(|code| field::display(code.as_str()));
    error!(
        error = %format!("{err:#}"),
        code,
        similarity_code,
        "command execution failed"
    );
    ExitCode::FAILURE
}

#[expect(
    clippy::print_stderr,
    reason = "tracing is unavailable until logging is initialised"
)]
fn report_logging_init_error(err: &LoggingError) {
    eprintln!("failed to initialise logging: {err}");
}
