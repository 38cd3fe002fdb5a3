//! kgx CLI - streaming knowledge-graph transformation

mod config;

use anyhow::{Context, Result, bail};
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{Shell, generate};
use config::Config;
use indicatif::{ProgressBar, ProgressStyle};
use kgx_core::{
    FilterSet, InputSpec, OutputSpec, Registry, TransformConfig, TransformStats, Transformer,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "kgx")]
#[command(about = "Streaming knowledge-graph transformation", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Show debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Config file (default: ~/.config/kgx/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// List available formats
    Formats,

    /// Read, filter and write a knowledge graph
    Transform(TransformArgs),

    /// List available profiles
    Profiles,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },

    /// Generate man page
    Manpage,
}

#[derive(Args)]
struct TransformArgs {
    /// Input files or glob patterns
    #[arg(short, long = "input", required = true, num_args = 1..)]
    inputs: Vec<String>,

    /// Input format (overrides detection)
    #[arg(long)]
    input_format: Option<String>,

    /// Output file; without one the graph is only loaded and summarized
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format (overrides detection)
    #[arg(long)]
    output_format: Option<String>,

    /// Transformation config (JSON, YAML, or TOML)
    #[arg(long, conflicts_with = "profile")]
    transform_config: Option<PathBuf>,

    /// Named profile from the config file or the built-ins
    #[arg(long)]
    profile: Option<String>,

    /// Node filter as ATTRIBUTE=VALUE[,VALUE...] (repeatable)
    #[arg(long = "node-filter", value_name = "FILTER")]
    node_filters: Vec<String>,

    /// Edge filter as ATTRIBUTE=VALUE[,VALUE...] (repeatable)
    #[arg(long = "edge-filter", value_name = "FILTER")]
    edge_filters: Vec<String>,

    /// Drop edges whose subject or object was filtered out
    #[arg(long)]
    prune_dangling_edges: bool,

    /// Write records as they are read instead of loading the graph first
    #[arg(long)]
    stream: bool,
}

/// Output verbosity level.
#[derive(Clone, Copy)]
enum Verbosity {
    Quiet,
    Normal,
    Verbose,
}

impl Verbosity {
    fn from_flags(verbose: bool, quiet: bool) -> Self {
        if quiet {
            Verbosity::Quiet
        } else if verbose {
            Verbosity::Verbose
        } else {
            Verbosity::Normal
        }
    }

    fn info(self, msg: &str) {
        if !matches!(self, Verbosity::Quiet) {
            eprintln!("{msg}");
        }
    }

    fn result(self, msg: &str) {
        if !matches!(self, Verbosity::Quiet) {
            println!("{msg}");
        }
    }

    fn log_filter(self) -> EnvFilter {
        match self {
            Verbosity::Quiet => EnvFilter::new("off"),
            Verbosity::Normal => {
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
            }
            Verbosity::Verbose => {
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
            }
        }
    }
}

fn init_tracing(v: Verbosity) {
    tracing_subscriber::fmt()
        .with_env_filter(v.log_filter())
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = if let Some(ref path) = cli.config {
        Config::load_from_path(Some(path.clone()))
    } else {
        Config::load()
    };

    // Config defaults, CLI flags override
    let verbose = cli.verbose || config.defaults.verbose;
    let quiet = cli.quiet || (config.defaults.quiet && !cli.verbose);
    let verbosity = Verbosity::from_flags(verbose, quiet);
    init_tracing(verbosity);

    let registry = Arc::new(kgx_formats::registry());

    match cli.command {
        Commands::Formats => cmd_formats(&registry, verbosity),
        Commands::Transform(args) => cmd_transform(registry, &config, args, verbosity),
        Commands::Profiles => cmd_profiles(&config, verbosity),
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "kgx", &mut std::io::stdout());
            Ok(())
        }
        Commands::Manpage => {
            let cmd = Cli::command();
            let man = clap_mangen::Man::new(cmd);
            man.render(&mut std::io::stdout())?;
            Ok(())
        }
    }
}

fn cmd_formats(registry: &Registry, v: Verbosity) -> Result<()> {
    v.result("Available formats:\n");

    for decl in registry.declarations() {
        v.result(&format!("  {}", decl.id));
        if !decl.description.is_empty() {
            v.result(&format!("    {}", decl.description));
        }
        if !decl.extensions.is_empty() {
            v.result(&format!("    extensions: {}", decl.extensions.join(", ")));
        }
        if !decl.aliases.is_empty() {
            v.result(&format!("    aliases:    {}", decl.aliases.join(", ")));
        }
        v.result("");
    }

    v.result(&format!("Total: {} formats", registry.len()));
    Ok(())
}

fn cmd_profiles(config: &Config, v: Verbosity) -> Result<()> {
    v.result("Built-in profiles:\n");
    for (name, description) in config::list_profiles() {
        v.result(&format!("  {:<14} {}", name, description));
    }

    if !config.profiles.is_empty() {
        let mut names: Vec<_> = config.profiles.keys().collect();
        names.sort();
        v.result("\nUser profiles:\n");
        for name in names {
            v.result(&format!("  {}", name));
        }
    }
    Ok(())
}

fn cmd_transform(
    registry: Arc<Registry>,
    config: &Config,
    args: TransformArgs,
    v: Verbosity,
) -> Result<()> {
    let transform_config = build_transform_config(config, &args)?;

    let files = collect_files(&args.inputs)?;
    let mut input = InputSpec::new(files);
    if let Some(format) = &args.input_format {
        input = input.format(format.clone());
    }

    let output = args.output.as_ref().map(|path| {
        let mut output = OutputSpec::new(path);
        if let Some(format) = &args.output_format {
            output = output.format(format.clone());
        }
        output
    });

    let stream = args.stream || config.defaults.stream;
    if stream && output.is_none() {
        bail!("--stream requires --output");
    }

    let progress = progress_bar(v)?;
    let mut transformer = Transformer::new(registry, transform_config);
    if let Some(pb) = &progress {
        let pb = pb.clone();
        transformer = transformer.with_inspector(move |_| pb.inc(1));
    }

    let result = run(&mut transformer, &input, output.as_ref(), stream);
    if let Some(pb) = progress {
        pb.finish_and_clear();
    }
    let stats = result?;

    report(&stats, output.as_ref().map(|o| o.filename.as_path()), v);
    Ok(())
}

fn run(
    transformer: &mut Transformer,
    input: &InputSpec,
    output: Option<&OutputSpec>,
    stream: bool,
) -> Result<TransformStats> {
    match output {
        Some(output) if stream => transformer
            .transform_stream(input, output)
            .with_context(|| format!("Failed to stream to {}", output.filename.display())),
        Some(output) => {
            let mut stats = transformer
                .transform(input)
                .context("Failed to read input graph")?;
            let written = transformer
                .save(output)
                .with_context(|| format!("Failed to write {}", output.filename.display()))?;
            stats.nodes_written = written.nodes_written;
            stats.edges_written = written.edges_written;
            stats.duration += written.duration;
            Ok(stats)
        }
        None => transformer
            .transform(input)
            .context("Failed to read input graph"),
    }
}

fn progress_bar(v: Verbosity) -> Result<Option<ProgressBar>> {
    if matches!(v, Verbosity::Quiet) {
        return Ok(None);
    }
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::with_template(
        "{spinner:.green} {pos} records [{elapsed_precise}]",
    )?);
    pb.enable_steady_tick(Duration::from_millis(120));
    Ok(Some(pb))
}

fn report(stats: &TransformStats, output: Option<&Path>, v: Verbosity) {
    v.result(&format!(
        "Read {} nodes, {} edges in {:.2?}",
        stats.nodes_read, stats.edges_read, stats.duration
    ));
    let filtered = stats.nodes_filtered + stats.edges_filtered + stats.edges_pruned;
    if filtered > 0 {
        v.result(&format!(
            "Filtered {} nodes, {} edges ({} pruned as dangling)",
            stats.nodes_filtered,
            stats.edges_filtered + stats.edges_pruned,
            stats.edges_pruned
        ));
    }
    if stats.graph_nodes + stats.graph_edges > 0 {
        v.result(&format!(
            "Graph: {} nodes, {} edges",
            stats.graph_nodes, stats.graph_edges
        ));
    }
    if let Some(path) = output {
        v.result(&format!(
            "Wrote {} nodes, {} edges -> {}",
            stats.nodes_written,
            stats.edges_written,
            path.display()
        ));
    }
    if stats.records_skipped > 0 {
        v.info(&format!(
            "Warning: skipped {} malformed records",
            stats.records_skipped
        ));
    }
    if stats.dangling_edges > 0 {
        v.info(&format!(
            "Warning: {} edges reference nodes that were never read",
            stats.dangling_edges
        ));
    }
}

/// Resolve the transformation config: an explicit file, else a profile,
/// else the defaults; command-line filters are layered on top.
fn build_transform_config(config: &Config, args: &TransformArgs) -> Result<TransformConfig> {
    let mut transform_config = if let Some(path) = &args.transform_config {
        let data = std::fs::read(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        TransformConfig::from_bytes(&data, path.to_str())
            .with_context(|| format!("Invalid transform config {}", path.display()))?
    } else if let Some(name) = args.profile.as_ref().or(config.defaults.profile.as_ref()) {
        config
            .get_profile(name)
            .with_context(|| {
                format!("Unknown profile '{}'. Run `kgx profiles` to list them.", name)
            })?
    } else {
        TransformConfig::new()
    };

    if let Some(delimiter) = config.defaults.list_delimiter {
        transform_config.tabular.list_delimiter = delimiter;
    }
    for filter in &args.node_filters {
        add_filter(&mut transform_config.node_filters, filter)?;
    }
    for filter in &args.edge_filters {
        add_filter(&mut transform_config.edge_filters, filter)?;
    }
    if args.prune_dangling_edges {
        transform_config.prune_dangling_edges = true;
    }

    Ok(transform_config)
}

/// Parse `ATTRIBUTE=VALUE[,VALUE...]` into the filter set.
fn add_filter(filters: &mut FilterSet, spec: &str) -> Result<()> {
    let Some((attribute, values)) = spec.split_once('=') else {
        bail!("Invalid filter '{}'. Expected ATTRIBUTE=VALUE[,VALUE...]", spec);
    };
    let attribute = attribute.trim();
    let values: Vec<&str> = values
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .collect();
    if attribute.is_empty() || values.is_empty() {
        bail!("Invalid filter '{}'. Expected ATTRIBUTE=VALUE[,VALUE...]", spec);
    }
    filters.extend(attribute, values);
    Ok(())
}

/// Expand glob patterns; plain paths are kept in the order given.
fn collect_files(patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for pattern in patterns {
        if pattern.contains('*') || pattern.contains('?') || pattern.contains('[') {
            let paths =
                glob::glob(pattern).with_context(|| format!("Invalid glob pattern '{}'", pattern))?;
            let mut matched: Vec<PathBuf> = paths.flatten().filter(|p| p.is_file()).collect();
            if matched.is_empty() {
                tracing::warn!(pattern = %pattern, "pattern matched no files");
            }
            matched.sort();
            files.extend(matched);
        } else {
            files.push(PathBuf::from(pattern));
        }
    }

    if files.is_empty() {
        bail!("No input files found");
    }
    Ok(files)
}
