//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Runtime helpers supporting deferred work."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
//! Timing decorators for [`Future`] and [`FallibleFuture`].
//!
//! An [`Instrumented`] container stamps the moment it was constructed and
//! freezes that stamp as soon as the computation returns, before the result
//! is published. Labelled containers also write `"<label>: <duration>"` to the
//! diagnostic sink.

use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use procsig_common::TimeStamp;
use procsig_logging::{diag_println, Diagnostics};
use tracing::debug;

use crate::executor::{BackgroundExecutor, Executor};
use crate::future::{FallibleFuture, Future, Resolvable};

/// Label and diagnostic target for an instrumented container.
#[derive(Debug, Clone, Default)]
pub struct DebugOptions {
    label: Option<String>,
    diagnostics: Diagnostics,
}

impl DebugOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shorthand for `DebugOptions::new().with_label(label)`.
    pub fn labeled(label: impl Into<String>) -> Self {
        Self::new().with_label(label)
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Route the timing line to `diagnostics` instead of the process-wide sink.
    pub fn with_diagnostics(mut self, diagnostics: Diagnostics) -> Self {
        self.diagnostics = diagnostics;
        self
    }
}

#[derive(Debug)]
struct Timing {
    label: Option<String>,
    started_at: TimeStamp,
    finished: OnceCell<TimeStamp>,
}

impl Timing {
    fn start(label: Option<String>) -> Self {
        Self {
            label,
            started_at: TimeStamp::now(),
            finished: OnceCell::new(),
        }
    }

    fn finish(&self, diagnostics: &Diagnostics) {
        let mut elapsed = self.started_at.clone();
        let formatted = elapsed.freeze();
        debug!(
            label = self.label.as_deref().unwrap_or(""),
            elapsed = %formatted,
            "deferred computation finished"
        );
        if let Some(label) = &self.label {
            diag_println!(sink = diagnostics, "{label}: {formatted}");
        }
        let _ = self.finished.set(elapsed);
    }
}

fn instrument<T, F>(
    timing: Arc<Timing>,
    diagnostics: Diagnostics,
    compute: F,
) -> impl FnOnce() -> T + Send + 'static
where
    T: 'static,
    F: FnOnce() -> T + Send + 'static,
{
    move || {
        let value = compute();
        timing.finish(&diagnostics);
        value
    }
}

/// A base container plus construction stamp, resolution time and label.
pub struct Instrumented<C> {
    inner: C,
    timing: Arc<Timing>,
}

/// Instrumented [`Future`].
pub type DebugFuture<T> = Instrumented<Future<T>>;

/// Instrumented [`FallibleFuture`].
pub type DebugFallibleFuture<T, E> = Instrumented<FallibleFuture<T, E>>;

impl<C: Clone> Clone for Instrumented<C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            timing: Arc::clone(&self.timing),
        }
    }
}

impl<C: fmt::Debug> fmt::Debug for Instrumented<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instrumented")
            .field("label", &self.timing.label)
            .field("inner", &self.inner)
            .finish()
    }
}

impl<C> Instrumented<C> {
    pub fn inner(&self) -> &C {
        &self.inner
    }

    pub fn label(&self) -> Option<&str> {
        self.timing.label.as_deref()
    }

    /// Absolute stamp taken when the container was constructed.
    pub fn started_at(&self) -> &TimeStamp {
        &self.timing.started_at
    }
}

impl<C: Resolvable> Instrumented<C> {
    pub fn wait(&self) {
        self.inner.wait();
    }

    pub fn is_resolved(&self) -> bool {
        self.inner.is_resolved()
    }

    /// Time from construction until the computation returned. Blocks until resolved.
    pub fn duration(&self) -> TimeStamp {
        self.inner.wait();
        self.timing
            .finished
            .get()
            .cloned()
            .expect("resolution stamp is recorded before the result is published")
    }

    pub fn duration_seconds(&self) -> f64 {
        self.duration().seconds()
    }
}

impl<C: Resolvable> Resolvable for Instrumented<C> {
    fn wait(&self) {
        Instrumented::wait(self);
    }

    fn is_resolved(&self) -> bool {
        Instrumented::is_resolved(self)
    }
}

impl<T: Send + 'static> Instrumented<Future<T>> {
    pub fn spawn<F>(options: DebugOptions, compute: F) -> Self
    where
        F: FnOnce() -> T + Send + 'static,
    {
        Self::spawn_on(BackgroundExecutor::global(), options, compute)
    }

    pub fn spawn_on<X, F>(executor: &X, options: DebugOptions, compute: F) -> Self
    where
        X: Executor + ?Sized,
        F: FnOnce() -> T + Send + 'static,
    {
        let timing = Arc::new(Timing::start(options.label));
        let wrapped = instrument(Arc::clone(&timing), options.diagnostics, compute);
        Self {
            inner: Future::spawn_on(executor, wrapped),
            timing,
        }
    }
}

impl<T: Clone> Instrumented<Future<T>> {
    pub fn value(&self) -> T {
        self.inner.value()
    }
}

impl<T: Send + 'static, E: Send + 'static> Instrumented<FallibleFuture<T, E>> {
    pub fn spawn<F>(options: DebugOptions, compute: F) -> Self
    where
        F: FnOnce() -> Result<T, E> + Send + 'static,
    {
        Self::spawn_on(BackgroundExecutor::global(), options, compute)
    }

    pub fn spawn_on<X, F>(executor: &X, options: DebugOptions, compute: F) -> Self
    where
        X: Executor + ?Sized,
        F: FnOnce() -> Result<T, E> + Send + 'static,
    {
        let timing = Arc::new(Timing::start(options.label));
        let wrapped = instrument(Arc::clone(&timing), options.diagnostics, compute);
        Self {
            inner: FallibleFuture::spawn_on(executor, wrapped),
            timing,
        }
    }
}

impl<T: Clone, E: Clone> Instrumented<FallibleFuture<T, E>> {
    pub fn value(&self) -> Result<T, E> {
        self.inner.value()
    }

    pub fn is_failed(&self) -> bool {
        self.inner.is_failed()
    }
}
