//! ---
//! ems_section: "03-persistence-logging"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Structured logging adapters and sinks."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::fmt;
use std::io::Write;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::{Mutex, RwLock};

/// Destination for diagnostic text. Writes arrive already serialized.
pub trait DiagnosticSink: Send + Sync {
    /// Append `text` verbatim.
    fn write_str(&self, text: &str);
}

/// Appends diagnostic text to standard error.
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrSink;

impl DiagnosticSink for StderrSink {
    fn write_str(&self, text: &str) {
        let stderr = std::io::stderr();
        let mut handle = stderr.lock();
        let _ = handle.write_all(text.as_bytes());
        let _ = handle.flush();
    }
}

/// Forwards completed diagnostic lines to `tracing` at debug level.
///
/// Text written without a trailing newline is held back until the line is
/// completed by a later write.
#[derive(Debug, Default)]
pub struct TracingSink {
    pending: Mutex<String>,
}

impl TracingSink {
    /// Sink with no buffered partial line.
    pub fn new() -> Self {
        Self::default()
    }
}

impl DiagnosticSink for TracingSink {
    fn write_str(&self, text: &str) {
        let mut pending = self.pending.lock();
        pending.push_str(text);
        while let Some(idx) = pending.find('\n') {
            let line: String = pending.drain(..=idx).collect();
            tracing::debug!(
                target: "procsig::diag",
                message = %line.trim_end_matches('\n')
            );
        }
    }
}

/// Captures everything written to it. Used by tests and by callers that want
/// to inspect diagnostic output programmatically.
#[derive(Debug, Default)]
pub struct MemorySink {
    buffer: Mutex<String>,
}

impl MemorySink {
    /// Empty capture buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Full captured text.
    pub fn contents(&self) -> String {
        self.buffer.lock().clone()
    }

    /// Captured text split into lines, without terminators.
    pub fn lines(&self) -> Vec<String> {
        self.buffer.lock().lines().map(str::to_owned).collect()
    }

    /// Discard everything captured so far.
    pub fn clear(&self) {
        self.buffer.lock().clear();
    }
}

impl DiagnosticSink for MemorySink {
    fn write_str(&self, text: &str) {
        self.buffer.lock().push_str(text);
    }
}

static WRITE_LOCK: Mutex<()> = parking_lot::const_mutex(());

static GLOBAL_SINK: Lazy<RwLock<Arc<dyn DiagnosticSink>>> =
    Lazy::new(|| RwLock::new(Arc::new(StderrSink)));

/// Replace the process-wide sink, returning the previous one.
pub fn install_sink(sink: Arc<dyn DiagnosticSink>) -> Arc<dyn DiagnosticSink> {
    std::mem::replace(&mut *GLOBAL_SINK.write(), sink)
}

/// Handle onto a diagnostic sink.
///
/// Every write from every handle goes through one process-wide lock, so lines
/// emitted concurrently never interleave. Output is produced only in builds
/// with `debug_assertions`; in release builds both entry points are no-ops.
/// Prefer the [`diag_println!`](crate::diag_println) and
/// [`diag_print!`](crate::diag_print) macros, which additionally skip
/// evaluating their arguments in release builds.
#[derive(Clone, Default)]
pub struct Diagnostics {
    sink: Option<Arc<dyn DiagnosticSink>>,
}

impl fmt::Debug for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Diagnostics")
            .field("global", &self.sink.is_none())
            .finish()
    }
}

impl Diagnostics {
    /// Handle that writes to whichever sink is installed process-wide at the
    /// time of each write.
    pub fn global() -> Self {
        Self { sink: None }
    }

    /// Handle bound to a specific sink.
    pub fn with_sink(sink: Arc<dyn DiagnosticSink>) -> Self {
        Self { sink: Some(sink) }
    }

    /// Whether diagnostic output is compiled in.
    pub const fn enabled() -> bool {
        cfg!(debug_assertions)
    }

    /// Append the formatted value followed by a newline.
    pub fn println(&self, args: fmt::Arguments<'_>) {
        if Self::enabled() {
            self.emit(args, true);
        }
    }

    /// Append the formatted value with no trailing newline.
    pub fn print(&self, args: fmt::Arguments<'_>) {
        if Self::enabled() {
            self.emit(args, false);
        }
    }

    fn emit(&self, args: fmt::Arguments<'_>, newline: bool) {
        let mut text = args.to_string();
        if newline {
            text.push('\n');
        }
        let _serialized = WRITE_LOCK.lock();
        match &self.sink {
            Some(sink) => sink.write_str(&text),
            None => GLOBAL_SINK.read().write_str(&text),
        }
    }
}
