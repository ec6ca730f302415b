//! Command-line interface for building KNN graphs from vector files.
//!
//! The `run` command reads one property vector per line, builds the
//! approximate KNN graph and renders either a per-node summary or the full
//! list of similarity pairs.

mod commands;
mod input;

pub use commands::{
    Cli, CliError, Command, ExecutionSummary, MetricArg, OutputFormat, RunCommand, SamplerArg,
    render_summary, run_cli,
};

#[cfg(test)]
mod test_helpers;
