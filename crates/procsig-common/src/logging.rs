//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Shared primitives and utilities for the core runtime."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::fmt as std_fmt;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::daily;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::LoggingConfig;

const LOG_ENV: &str = "PROCSIG_LOG";

/// Available log formats.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum LogFormat {
    StructuredJson,
    #[default]
    Pretty,
}

/// Console stream the log layer writes to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogStream {
    #[default]
    Stdout,
    Stderr,
}

/// Keeps the non-blocking log writers alive. Dropping it flushes whatever is
/// still buffered, so hold it until the process is about to exit.
#[must_use = "dropping the guard flushes and stops the log writers"]
pub struct LogGuard {
    _console: WorkerGuard,
    _file: Option<WorkerGuard>,
}

impl std_fmt::Debug for LogGuard {
    fn fmt(&self, f: &mut std_fmt::Formatter<'_>) -> std_fmt::Result {
        f.debug_struct("LogGuard")
            .field("file", &self._file.is_some())
            .finish()
    }
}

/// Initialize the tracing subscriber based on configuration and environment variables.
///
/// `PROCSIG_LOG` overrides the filter (e.g. `info`, `procsig_rt=debug`). When
/// unset the standard `RUST_LOG` variable is honoured, finally defaulting to
/// `info`. Console output goes to `config.stream`; a daily rolling JSON file
/// is added when `file_enabled` is set.
pub fn init_tracing(service_name: &str, config: &LoggingConfig) -> Result<LogGuard> {
    let (console_writer, console_guard) = match config.stream {
        LogStream::Stdout => tracing_appender::non_blocking(std::io::stdout()),
        LogStream::Stderr => tracing_appender::non_blocking(std::io::stderr()),
    };

    let filter = match std::env::var(LOG_ENV) {
        Ok(directive) => EnvFilter::try_new(directive).unwrap_or_else(|err| {
            eprintln!(
                "invalid {} directive ({}); defaulting to info logging",
                LOG_ENV, err
            );
            EnvFilter::new("info")
        }),
        Err(_) => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    let fmt_layer = match config.format {
        LogFormat::StructuredJson => fmt::layer()
            .with_target(false)
            .with_timer(fmt::time::UtcTime::rfc_3339())
            .json()
            .with_writer(console_writer)
            .boxed(),
        LogFormat::Pretty => fmt::layer()
            .with_target(true)
            .with_timer(fmt::time::UtcTime::rfc_3339())
            .with_writer(console_writer)
            .boxed(),
    };

    let mut file_guard = None;
    let file_layer = if config.file_enabled {
        std::fs::create_dir_all(&config.directory)?;
        let prefix = config
            .file_prefix
            .clone()
            .unwrap_or_else(|| service_name.to_owned());
        let file_appender = daily(
            &config.directory,
            format!("{}-{}.log", prefix, service_name),
        );
        let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
        file_guard = Some(guard);
        Some(
            fmt::layer()
                .with_target(true)
                .with_timer(fmt::time::UtcTime::rfc_3339())
                .json()
                .with_writer(file_writer)
                .boxed(),
        )
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .with(file_layer)
        .try_init()
        .ok();

    info!(
        service = %service_name,
        file_enabled = config.file_enabled,
        log_dir = %config.directory.display(),
        format = ?config.format,
        stream = ?config.stream,
        "tracing initialised"
    );
    Ok(LogGuard {
        _console: console_guard,
        _file: file_guard,
    })
}
