//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Shared primitives and utilities for the core runtime."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds};
use tracing::debug;

use crate::logging::{LogFormat, LogStream};

fn default_max_blocking_threads() -> usize {
    512
}

fn default_thread_name() -> String {
    "procsig-worker".to_owned()
}

fn default_keep_alive() -> Duration {
    Duration::from_secs(10)
}

fn default_logging_directory() -> PathBuf {
    PathBuf::from("target/logs")
}

fn default_log_format() -> LogFormat {
    LogFormat::Pretty
}

fn default_bench_times() -> u64 {
    10_000
}

fn default_bench_repeat_factor() -> u64 {
    100
}

/// Top-level configuration for procsig services and tools.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcsigConfig {
    #[serde(default)]
    pub runtime: RuntimeConfig,
    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub benchmark: BenchmarkConfig,
}

/// Metadata describing where a [`ProcsigConfig`] was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: ProcsigConfig,
    pub source: PathBuf,
}

impl ProcsigConfig {
    pub const ENV_CONFIG_PATH: &str = "PROCSIG_CONFIG";

    /// Load configuration from disk, respecting the `PROCSIG_CONFIG` override.
    pub fn load<P: AsRef<Path>>(candidates: &[P]) -> Result<Self> {
        Ok(Self::load_with_source(candidates)?.config)
    }

    /// Load configuration from disk together with the effective source path.
    pub fn load_with_source<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedConfig> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(&path)?;
                return Ok(LoadedConfig {
                    config,
                    source: path,
                });
            }
        }

        for candidate in candidates {
            let path = candidate.as_ref();
            if path.exists() {
                let config = Self::from_path(path)?;
                return Ok(LoadedConfig {
                    config,
                    source: path.to_path_buf(),
                });
            }
        }

        Err(anyhow!(
            "no configuration files found. inspected: {}",
            candidates
                .iter()
                .map(|p| p.as_ref().display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ))
    }

    /// Load from `path`, or fall back to defaults when no path is given.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_path(path),
            None => Ok(Self::default()),
        }
    }

    fn from_path(path: &Path) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        let config = toml::from_str::<ProcsigConfig>(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Render as TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("failed to serialise configuration")
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        self.runtime.validate()?;
        self.benchmark.validate()?;
        Ok(())
    }
}

impl std::str::FromStr for ProcsigConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: ProcsigConfig =
            toml::from_str(content).with_context(|| "failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

/// Sizing of the background execution context.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Async worker threads; `None` lets the runtime pick one per core.
    #[serde(default)]
    pub worker_threads: Option<usize>,
    /// Upper bound on threads running deferred computations at once.
    #[serde(default = "default_max_blocking_threads")]
    pub max_blocking_threads: usize,
    #[serde(default = "default_thread_name")]
    pub thread_name: String,
    /// Idle time before a blocking thread is retired.
    #[serde(default = "default_keep_alive")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub keep_alive: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            worker_threads: None,
            max_blocking_threads: default_max_blocking_threads(),
            thread_name: default_thread_name(),
            keep_alive: default_keep_alive(),
        }
    }
}

impl RuntimeConfig {
    pub fn validate(&self) -> Result<()> {
        if self.worker_threads == Some(0) {
            return Err(anyhow!("runtime.worker_threads must be at least 1"));
        }
        if self.max_blocking_threads == 0 {
            return Err(anyhow!("runtime.max_blocking_threads must be at least 1"));
        }
        if self.thread_name.trim().is_empty() {
            return Err(anyhow!("runtime.thread_name must not be empty"));
        }
        Ok(())
    }
}

/// Where debug diagnostic lines are written.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    #[default]
    Stderr,
    Tracing,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiagnosticsConfig {
    #[serde(default)]
    pub sink: SinkKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    /// Console stream for log output.
    #[serde(default)]
    pub stream: LogStream,
    #[serde(default)]
    pub file_prefix: Option<String>,
    /// Also write a rolling JSON log file under `directory`.
    #[serde(default)]
    pub file_enabled: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_logging_directory(),
            format: default_log_format(),
            stream: LogStream::default(),
            file_prefix: None,
            file_enabled: false,
        }
    }
}

/// Defaults for the benchmark helper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkConfig {
    #[serde(default = "default_bench_times")]
    pub times: u64,
    #[serde(default = "default_bench_repeat_factor")]
    pub repeat_factor: u64,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            times: default_bench_times(),
            repeat_factor: default_bench_repeat_factor(),
        }
    }
}

impl BenchmarkConfig {
    pub fn validate(&self) -> Result<()> {
        if self.repeat_factor == 0 {
            return Err(anyhow!("benchmark.repeat_factor must be at least 1"));
        }
        Ok(())
    }
}
