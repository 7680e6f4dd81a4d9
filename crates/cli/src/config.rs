use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use profile_cleaner_protocol::{ViewerLink, DEFAULT_VIEWER_BASE_URL};
use serde::Deserialize;

pub const CONFIG_SCHEMA_VERSION: u32 = 1;
pub const VIEWER_URL_ENV: &str = "PROFILE_CLEANER_VIEWER_URL";
pub const JOBS_ENV: &str = "PROFILE_CLEANER_JOBS";
pub const DEFAULT_OUTPUT: &str = "updated-trace.json";

const MAX_JOBS: usize = 256;

/// On-disk config (`--config`).
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub exclude: Vec<String>,
    pub viewer_url: Option<String>,
    pub annotate: Option<bool>,
    pub output: Option<PathBuf>,
    pub pretty: Option<bool>,
    pub jobs: Option<usize>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("Invalid config {}", path.display()))
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)?;
        if let Some(version) = config.schema_version {
            if version != CONFIG_SCHEMA_VERSION {
                return Err(anyhow!(
                    "schema_version {version} is not supported (expected {CONFIG_SCHEMA_VERSION})"
                ));
            }
        }
        Ok(config)
    }
}

/// Overrides read from the environment.
#[derive(Debug, Default)]
pub struct EnvConfig {
    pub viewer_url: Option<String>,
    pub jobs: Option<usize>,
}

impl EnvConfig {
    pub fn from_env() -> Self {
        let viewer = std::env::var(VIEWER_URL_ENV).ok();
        let jobs = std::env::var(JOBS_ENV).ok();
        Self::from_raw(viewer.as_deref(), jobs.as_deref())
    }

    fn from_raw(viewer_url: Option<&str>, jobs: Option<&str>) -> Self {
        let jobs = jobs.map(str::trim).filter(|v| !v.is_empty()).and_then(|v| {
            let parsed = parse_jobs(v);
            if parsed.is_none() {
                log::warn!("Ignoring {JOBS_ENV}={v}: expected a positive integer");
            }
            parsed
        });
        Self {
            viewer_url: viewer_url
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string),
            jobs,
        }
    }
}

/// Overrides taken from the command line.
#[derive(Debug, Default)]
pub struct FlagConfig {
    /// Comma-separated positional pattern list
    pub patterns: Option<String>,
    pub exclude: Vec<String>,
    pub output: Option<PathBuf>,
    pub viewer_url: Option<String>,
    pub no_annotate: bool,
    pub compact: bool,
    pub jobs: Option<usize>,
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone)]
pub struct CleanerConfig {
    pub exclude: Vec<String>,
    pub viewer: ViewerLink,
    pub annotate: bool,
    pub output: PathBuf,
    pub pretty: bool,
    pub jobs: Option<usize>,
}

impl CleanerConfig {
    /// Layer defaults < file < environment < flags. Exclusion patterns from
    /// the file and the command line are merged.
    pub fn resolve(file: FileConfig, env: EnvConfig, flags: FlagConfig) -> Result<Self> {
        let mut exclude = Vec::new();
        let from_flags = flags
            .patterns
            .as_deref()
            .map(split_patterns)
            .unwrap_or_default();
        for pattern in file
            .exclude
            .into_iter()
            .chain(from_flags)
            .chain(flags.exclude)
        {
            if !pattern.is_empty() && !exclude.contains(&pattern) {
                exclude.push(pattern);
            }
        }

        let viewer_url = flags
            .viewer_url
            .or(env.viewer_url)
            .or(file.viewer_url)
            .unwrap_or_else(|| DEFAULT_VIEWER_BASE_URL.to_string());
        let viewer = ViewerLink::new(&viewer_url)?;

        let jobs = flags.jobs.or(env.jobs).or(file.jobs);
        if let Some(jobs) = jobs {
            if jobs == 0 || jobs > MAX_JOBS {
                return Err(anyhow!("jobs must be between 1 and {MAX_JOBS} (got {jobs})"));
            }
        }

        Ok(Self {
            exclude,
            viewer,
            annotate: !flags.no_annotate && file.annotate.unwrap_or(true),
            output: flags
                .output
                .or(file.output)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT)),
            pretty: !flags.compact && file.pretty.unwrap_or(true),
            jobs,
        })
    }
}

/// Split the original `a,b,c` pattern argument.
pub fn split_patterns(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_jobs(raw: &str) -> Option<usize> {
    raw.parse::<usize>()
        .ok()
        .filter(|&n| n > 0)
        .map(|n| n.min(MAX_JOBS))
}
