//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Shared primitives and utilities for the core runtime."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
//! Core shared primitives for the procsig workspace.
//! This crate exposes configuration loading, tracing setup, and the monotonic
//! timestamp type used to instrument deferred work.

pub mod config;
pub mod logging;
pub mod time;

pub use config::{
    BenchmarkConfig, DiagnosticsConfig, LoadedConfig, LoggingConfig, ProcsigConfig, RuntimeConfig,
    SinkKind,
};
pub use logging::{init_tracing, LogFormat, LogGuard, LogStream};
pub use time::{format_seconds, Calibration, TimeStamp, TimeStampError};
