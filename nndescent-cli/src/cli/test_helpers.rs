//! Fixtures shared by the CLI unit tests.

use std::{fs, io, path::PathBuf};

use clap::Parser;
use tempfile::TempDir;

use super::{Cli, CliError, RunCommand, commands::run_command};

pub(super) fn temp_dir() -> TempDir {
    match TempDir::new() {
        Ok(dir) => dir,
        Err(err) => panic!("failed to create temp dir: {err}"),
    }
}

pub(super) fn write_input(dir: &TempDir, name: &str, contents: &str) -> io::Result<PathBuf> {
    let path = dir.path().join(name);
    fs::write(&path, contents)?;
    Ok(path)
}

/// Parses `run <path> <extra...>` into a [`RunCommand`].
pub(super) fn parse_run(path: &std::path::Path, extra: &[&str]) -> RunCommand {
    let path = path.to_string_lossy().into_owned();
    let args = ["nndescent", "run", path.as_str()]
        .into_iter()
        .chain(extra.iter().copied());
    match Cli::try_parse_from(args) {
        Ok(Cli {
            command: super::Command::Run(run),
        }) => run,
        Err(err) => panic!("arguments must parse: {err}"),
    }
}

pub(super) fn run_expecting_error(command: RunCommand, panic_msg: &str) -> CliError {
    match run_command(command) {
        Ok(_) => panic!("{panic_msg}"),
        Err(err) => err,
    }
}
