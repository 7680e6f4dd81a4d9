use anyhow::{Context as AnyhowContext, Result};
use clap::Parser;
use config::{CleanerConfig, EnvConfig, FileConfig, FlagConfig};
use profile_cleaner_graph::UrlFilter;
use profile_cleaner_trace::TraceCleaner;
use serde_json::Value;
use std::fs;
use std::io;
use std::path::PathBuf;

pub mod config;
mod report;

fn print_stdout(text: &str) -> Result<()> {
    use std::io::Write;

    let mut stdout = io::stdout().lock();
    if let Err(err) = stdout
        .write_all(text.as_bytes())
        .and_then(|_| stdout.write_all(b"\n"))
        .and_then(|_| stdout.flush())
    {
        if err.kind() == io::ErrorKind::BrokenPipe {
            return Ok(());
        }
        return Err(err.into());
    }
    Ok(())
}

#[derive(Parser)]
#[command(name = "profile-cleaner")]
#[command(about = "Strip unwanted frames from the CPU profiles in a Chrome performance trace", long_about = None)]
#[command(version)]
struct Cli {
    /// Trace file: traceEvents JSON, a bare event array, or a .cpuprofile
    trace: PathBuf,

    /// Comma-separated URL substrings; frames whose URL contains any of them are removed
    patterns: Option<String>,

    /// Additional URL substring to remove (repeatable)
    #[arg(short = 'e', long = "exclude", value_name = "PATTERN")]
    exclude: Vec<String>,

    /// Where to write the cleaned trace (default: updated-trace.json)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Base URL of the source viewer used for deep links
    #[arg(long)]
    viewer_url: Option<String>,

    /// Keep remote call-frame URLs as they are
    #[arg(long)]
    no_annotate: bool,

    /// Write single-line JSON instead of pretty-printed
    #[arg(long)]
    compact: bool,

    /// Worker threads for cleaning profiles in parallel
    #[arg(short, long)]
    jobs: Option<usize>,

    /// JSON config file
    #[arg(long, env = "PROFILE_CLEANER_CONFIG")]
    config: Option<PathBuf>,

    /// Print a JSON run report on stdout
    #[arg(long, conflicts_with = "summary")]
    json: bool,

    /// Print a per-tree summary table on stdout
    #[arg(long)]
    summary: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors
    #[arg(long)]
    quiet: bool,
}

impl Cli {
    fn flags(&self) -> FlagConfig {
        FlagConfig {
            patterns: self.patterns.clone(),
            exclude: self.exclude.clone(),
            output: self.output.clone(),
            viewer_url: self.viewer_url.clone(),
            no_annotate: self.no_annotate,
            compact: self.compact,
            jobs: self.jobs,
        }
    }
}

pub fn main_entry() -> Result<()> {
    let mut cli = Cli::parse();

    // stdout is reserved for the JSON report
    if cli.json {
        cli.quiet = true;
    }

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    let file_config = match &cli.config {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };
    let config = CleanerConfig::resolve(file_config, EnvConfig::from_env(), cli.flags())?;

    if let Some(jobs) = config.jobs {
        rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .build_global()
            .context("Failed to configure worker threads")?;
    }

    run(&cli, &config)
}

fn run(cli: &Cli, config: &CleanerConfig) -> Result<()> {
    if config.exclude.is_empty() {
        log::warn!("No URL patterns given; no frames will be removed");
    } else {
        log::info!("Removing frames matching: {}", config.exclude.join(", "));
    }

    let raw = fs::read_to_string(&cli.trace)
        .with_context(|| format!("Failed to read trace {}", cli.trace.display()))?;
    let mut document: Value = serde_json::from_str(&raw)
        .with_context(|| format!("Trace {} is not valid JSON", cli.trace.display()))?;
    drop(raw);

    let mut cleaner = TraceCleaner::new(UrlFilter::new(config.exclude.iter().cloned()));
    if config.annotate {
        cleaner = cleaner.with_viewer(config.viewer.clone());
    }
    let report = cleaner
        .clean_document(&mut document)
        .with_context(|| format!("Failed to clean {}", cli.trace.display()))?;

    // Serialize fully before touching the output path.
    let encoded = if config.pretty {
        serde_json::to_string_pretty(&document)?
    } else {
        serde_json::to_string(&document)?
    };
    fs::write(&config.output, encoded)
        .with_context(|| format!("Failed to write {}", config.output.display()))?;
    log::info!("Updated trace saved to {}", config.output.display());

    if cli.json {
        let run_report = report::RunReport::new(
            &cli.trace,
            &config.output,
            &config.exclude,
            config.annotate,
            &report,
        );
        print_stdout(&serde_json::to_string(&run_report)?)?;
    } else if cli.summary {
        print_stdout(&report::render_summary(&report))?;
    }
    Ok(())
}
