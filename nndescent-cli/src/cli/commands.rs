//! Command implementations and argument parsing for the nndescent CLI.

use std::{
    collections::BTreeSet,
    io::{self, Write},
    path::{Path, PathBuf},
};

use clap::{Args, Parser, Subcommand, ValueEnum};
use nndescent_core::{
    KnnConfig, KnnConfigBuilder, KnnContext, KnnError, KnnResult, SamplerKind, ScalarSimilarity,
    SimilarityMetric, TracingProgress, VectorSimilarity,
};
use thiserror::Error;
use tracing::{Span, field, info, instrument};

use super::input::read_vectors;

/// Top-level CLI options parsed by [`clap`].
#[derive(Debug, Parser, Clone)]
#[command(
    name = "nndescent",
    about = "Build approximate k-nearest-neighbour graphs with NN-descent."
)]
pub struct Cli {
    /// Command to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Supported CLI commands.
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Build the KNN graph of a vector file.
    Run(RunCommand),
}

/// Options accepted by the `run` command.
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    /// Path to a UTF-8 file with one comma- or space-separated vector per line.
    pub path: PathBuf,

    /// How to compare the property vectors of two nodes.
    #[arg(long, value_enum, default_value_t = MetricArg::Cosine)]
    pub metric: MetricArg,

    /// Neighbours kept per node.
    #[arg(long = "top-k", default_value_t = KnnConfig::default().top_k())]
    pub top_k: usize,

    /// Fraction of `top-k` sampled per iteration.
    #[arg(long = "sample-rate", default_value_t = KnnConfig::default().sample_rate())]
    pub sample_rate: f64,

    /// Update ratio at or below which the computation has converged.
    #[arg(long = "delta-threshold", default_value_t = KnnConfig::default().delta_threshold())]
    pub delta_threshold: f64,

    /// Upper bound on refinement iterations.
    #[arg(long = "max-iterations", default_value_t = KnnConfig::default().max_iterations())]
    pub max_iterations: u32,

    /// Random comparisons per node and iteration.
    #[arg(long = "random-joins", default_value_t = KnnConfig::default().random_joins())]
    pub random_joins: usize,

    /// Probability of replacing the worst neighbour with a worse candidate.
    #[arg(long = "perturbation-rate", default_value_t = KnnConfig::default().perturbation_rate())]
    pub perturbation_rate: f64,

    /// Minimum similarity kept in the final graph.
    #[arg(long = "similarity-cutoff", default_value_t = KnnConfig::default().similarity_cutoff())]
    pub similarity_cutoff: f64,

    /// Worker threads.
    #[arg(long, default_value_t = KnnConfig::default().concurrency())]
    pub concurrency: usize,

    /// Seed for reproducible runs; combine with `--concurrency 1`.
    #[arg(long)]
    pub seed: Option<u64>,

    /// How neighbour lists are seeded before refinement.
    #[arg(long, value_enum, default_value_t = SamplerArg::Uniform)]
    pub sampler: SamplerArg,

    /// Only report neighbours of these node ids (comma-separated).
    #[arg(long = "source-nodes", value_delimiter = ',')]
    pub source_nodes: Vec<usize>,

    /// Only keep these node ids as neighbours (comma-separated).
    #[arg(long = "target-nodes", value_delimiter = ',')]
    pub target_nodes: Vec<usize>,

    /// What to print once the graph is built.
    #[arg(long, value_enum, default_value_t = OutputFormat::Summary)]
    pub output: OutputFormat,

    /// Override name for the input (defaults to the file stem).
    #[arg(long)]
    pub name: Option<String>,
}

/// Similarity applied to the loaded vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MetricArg {
    /// Cosine similarity of the vectors.
    Cosine,
    /// Inverse Euclidean distance of the vectors.
    Euclidean,
    /// Pearson correlation of the vectors.
    Pearson,
    /// Jaccard index of the vectors as value sets.
    Jaccard,
    /// Overlap coefficient of the vectors as value sets.
    Overlap,
    /// `1 / (1 + |a - b|)` over single-value rows.
    Scalar,
}

impl MetricArg {
    const fn vector_metric(self) -> Option<SimilarityMetric> {
        match self {
            Self::Cosine => Some(SimilarityMetric::Cosine),
            Self::Euclidean => Some(SimilarityMetric::Euclidean),
            Self::Pearson => Some(SimilarityMetric::Pearson),
            Self::Jaccard => Some(SimilarityMetric::Jaccard),
            Self::Overlap => Some(SimilarityMetric::Overlap),
            Self::Scalar => None,
        }
    }

    const fn as_str(self) -> &'static str {
        match self.vector_metric() {
            Some(metric) => metric.as_str(),
            None => "scalar",
        }
    }
}

/// Initial sampling strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SamplerArg {
    /// Uniformly random peers.
    Uniform,
    /// Random walks over the line-order chain of nodes.
    RandomWalk,
}

impl From<SamplerArg> for SamplerKind {
    fn from(value: SamplerArg) -> Self {
        match value {
            SamplerArg::Uniform => Self::Uniform,
            SamplerArg::RandomWalk => Self::RandomWalk,
        }
    }
}

/// Rendering of the finished graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Run statistics followed by each node's neighbour ids.
    Summary,
    /// One `source<TAB>target<TAB>similarity` line per retained entry.
    Pairs,
}

/// Errors surfaced while executing CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// Reading the input failed.
    #[error("failed to read `{path}`: {source}")]
    Io {
        /// Path that triggered the failure.
        path: PathBuf,
        /// Underlying operating system error.
        #[source]
        source: io::Error,
    },
    /// The input held no lines.
    #[error("`{path}` contains no vectors")]
    EmptyInput {
        /// Path of the empty input.
        path: PathBuf,
    },
    /// A value could not be parsed as a finite number.
    #[error("`{path}` line {line}: `{value}` is not a finite number")]
    InvalidValue {
        /// Path of the input.
        path: PathBuf,
        /// One-based line number.
        line: usize,
        /// Offending token.
        value: String,
    },
    /// A row disagreed with the dimension required by the metric.
    #[error("`{path}` line {line}: expected {expected} values, found {found}")]
    DimensionMismatch {
        /// Path of the input.
        path: PathBuf,
        /// One-based line number.
        line: usize,
        /// Required number of values.
        expected: usize,
        /// Number of values on the line.
        found: usize,
    },
    /// Graph construction failed.
    #[error(transparent)]
    Core(#[from] KnnError),
}

/// Outcome of a `run` command.
#[derive(Debug, Clone)]
pub struct ExecutionSummary {
    /// Name of the input, from `--name` or the file stem.
    pub data_source: String,
    /// Metric label used for the run.
    pub metric: &'static str,
    /// Requested rendering.
    pub output: OutputFormat,
    /// The computed graph.
    pub result: KnnResult,
}

/// Executes the CLI command represented by `cli`.
///
/// # Errors
/// Returns [`CliError`] when the input cannot be loaded or the computation
/// fails.
///
/// # Examples
/// ```
/// # use std::error::Error;
/// # use clap::Parser;
/// # use nndescent_cli::cli::{Cli, run_cli};
/// # use tempfile::NamedTempFile;
/// #
/// # fn main() -> Result<(), Box<dyn Error>> {
/// let file = NamedTempFile::new()?;
/// std::fs::write(file.path(), "1.2\n1.1\n42\n")?;
/// let path = file.path().to_string_lossy().into_owned();
/// let cli = Cli::try_parse_from([
///     "nndescent", "run", path.as_str(), "--metric", "scalar", "--top-k", "1",
///     "--seed", "7", "--concurrency", "1", "--random-joins", "32",
/// ])?;
/// let summary = run_cli(cli)?;
/// assert_eq!(summary.result.neighbours_of(2).collect::<Vec<_>>(), vec![0]);
/// # Ok(())
/// # }
/// ```
#[instrument(name = "cli.run", err, skip(cli), fields(command = field::Empty))]
pub fn run_cli(cli: Cli) -> Result<ExecutionSummary, CliError> {
    match cli.command {
        Command::Run(run) => {
            Span::current().record("command", "run");
            run_command(run)
        }
    }
}

#[instrument(
    name = "cli.execute",
    err,
    skip(command),
    fields(path = field::Empty, metric = command.metric.as_str(), top_k = command.top_k),
)]
pub(super) fn run_command(command: RunCommand) -> Result<ExecutionSummary, CliError> {
    Span::current().record("path", field::display(command.path.display()));
    let knn = build_config(&command).build_knn()?;
    let table = read_vectors(&command.path)?;
    let node_count = table.node_count();
    let data_source = derive_data_source_name(&command.path, command.name.as_deref());

    let chain: Vec<Vec<usize>> = (0..node_count)
        .map(|node| chain_neighbours(node, node_count))
        .collect();
    let progress = TracingProgress::new();
    let sources: BTreeSet<usize> = command.source_nodes.iter().copied().collect();
    let targets: BTreeSet<usize> = command.target_nodes.iter().copied().collect();
    let is_source = |node: usize| sources.contains(&node);
    let is_target = |node: usize| targets.contains(&node);
    let mut context = KnnContext::new()
        .with_adjacency(&chain)
        .with_progress(&progress);
    if !sources.is_empty() {
        context = context.with_source_filter(&is_source);
    }
    if !targets.is_empty() {
        context = context.with_target_filter(&is_target);
    }

    let result = match command.metric.vector_metric() {
        Some(metric) => {
            if metric.is_positional() {
                table.uniform_dimension(&command.path)?;
            }
            let similarity = VectorSimilarity::new(data_source.as_str(), table.rows, metric);
            knn.compute_with(node_count, &similarity, context)?
        }
        None => {
            let values = table.into_scalars(&command.path)?;
            let similarity = ScalarSimilarity::new(data_source.as_str(), values);
            knn.compute_with(node_count, &similarity, context)?
        }
    };

    info!(
        data_source = data_source.as_str(),
        nodes = node_count,
        iterations = result.ran_iterations(),
        converged = result.did_converge(),
        "command completed"
    );
    Ok(ExecutionSummary {
        data_source,
        metric: command.metric.as_str(),
        output: command.output,
        result,
    })
}

pub(super) fn build_config(command: &RunCommand) -> KnnConfigBuilder {
    let builder = KnnConfigBuilder::new()
        .with_top_k(command.top_k)
        .with_sample_rate(command.sample_rate)
        .with_delta_threshold(command.delta_threshold)
        .with_max_iterations(command.max_iterations)
        .with_random_joins(command.random_joins)
        .with_perturbation_rate(command.perturbation_rate)
        .with_similarity_cutoff(command.similarity_cutoff)
        .with_concurrency(command.concurrency)
        .with_initial_sampler(command.sampler.into());
    match command.seed {
        Some(seed) => builder.with_random_seed(seed),
        None => builder,
    }
}

/// Neighbours of `node` when the input lines are treated as a chain.
fn chain_neighbours(node: usize, node_count: usize) -> Vec<usize> {
    let previous = node.checked_sub(1);
    let next = Some(node + 1).filter(|&next| next < node_count);
    previous.into_iter().chain(next).collect()
}

pub(super) fn derive_data_source_name(path: &Path, override_name: Option<&str>) -> String {
    if let Some(name) = override_name {
        return name.to_owned();
    }
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .map_or_else(|| "vectors".to_owned(), ToOwned::to_owned)
}

/// Renders `summary` to `writer` in the format it requested.
///
/// # Errors
/// Returns [`io::Error`] if writing to the supplied writer fails.
///
/// # Examples
/// ```
/// # use std::error::Error;
/// # use nndescent_cli::cli::{ExecutionSummary, OutputFormat, render_summary};
/// # use nndescent_core::{KnnConfigBuilder, ScalarSimilarity};
/// #
/// # fn main() -> Result<(), Box<dyn Error>> {
/// let knn = KnnConfigBuilder::new().with_top_k(1).with_random_seed(1).build_knn()?;
/// let result = knn.compute(2, &ScalarSimilarity::new("demo", vec![0.0, 1.0]))?;
/// let summary = ExecutionSummary {
///     data_source: "demo".into(),
///     metric: "scalar",
///     output: OutputFormat::Pairs,
///     result,
/// };
/// let mut buffer = Vec::new();
/// render_summary(&summary, &mut buffer)?;
/// assert_eq!(String::from_utf8(buffer)?, "0\t1\t0.5\n1\t0\t0.5\n");
/// # Ok(())
/// # }
/// ```
pub fn render_summary(summary: &ExecutionSummary, mut writer: impl Write) -> io::Result<()> {
    let result = &summary.result;
    match summary.output {
        OutputFormat::Pairs => {
            for pair in result.similarity_results() {
                writeln!(writer, "{}\t{}\t{}", pair.source, pair.target, pair.similarity)?;
            }
        }
        OutputFormat::Summary => {
            writeln!(writer, "data source: {}", summary.data_source)?;
            writeln!(writer, "metric: {}", summary.metric)?;
            writeln!(writer, "nodes: {}", result.node_count())?;
            writeln!(writer, "iterations: {}", result.ran_iterations())?;
            writeln!(writer, "converged: {}", result.did_converge())?;
            writeln!(writer, "node pairs considered: {}", result.node_pairs_considered())?;
            writeln!(writer, "similarity pairs: {}", result.total_similarity_pairs())?;
            for node in 0..result.node_count() {
                let ids: Vec<String> = result.neighbours_of(node).map(|id| id.to_string()).collect();
                writeln!(writer, "{node}\t{}", ids.join(","))?;
            }
        }
    }
    Ok(())
}
