//! ---
//! ems_section: "03-persistence-logging"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Structured logging adapters and sinks."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
#![warn(missing_docs)]
//! Debug diagnostic sink and baseline tracing setup for procsig.

use tracing::Level;
use tracing_subscriber::{fmt as subscriber_fmt, prelude::*, EnvFilter, Registry};

pub mod macros;
pub mod sink;

pub use sink::{install_sink, DiagnosticSink, Diagnostics, MemorySink, StderrSink, TracingSink};

/// Initialize a baseline tracing subscriber suitable for development.
///
/// Events go to stderr so they never mix with a tool's stdout.
pub fn init() {
    let _ = Registry::default()
        .with(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(subscriber_fmt::layer().with_writer(std::io::stderr))
        .try_init();
}
