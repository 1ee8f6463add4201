//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Runtime helpers supporting deferred work."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::fmt;
use std::sync::Arc;

use procsig_common::{format_seconds, Calibration, TimeStamp};
use procsig_logging::{diag_println, Diagnostics};
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::executor::{BackgroundExecutor, Executor};
use crate::future::Future;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BenchmarkError {
    #[error("repeat factor must be at least 1")]
    InvalidRepeatFactor,
    #[error("no workers available for {times} iterations with repeat factor {repeat_factor}")]
    NoWorkers { times: u64, repeat_factor: u64 },
}

/// Result of a timed run.
#[derive(Debug, Clone, Serialize)]
pub struct BenchmarkReport {
    pub label: String,
    pub iterations: u64,
    pub workers: usize,
    pub total_seconds: f64,
    /// Mean time per iteration with the calibrated loop overhead removed.
    pub per_iteration_seconds: f64,
}

impl BenchmarkReport {
    pub fn total(&self) -> TimeStamp {
        TimeStamp::from_seconds(self.total_seconds).with_label(self.label.clone())
    }
}

impl fmt::Display for BenchmarkReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} per iteration ({} iterations on {} worker(s), {} total)",
            self.label,
            format_seconds(self.per_iteration_seconds),
            self.iterations,
            self.workers,
            format_seconds(self.total_seconds)
        )
    }
}

/// Worker count for a parallel run: `min(1, times / repeat_factor)`.
///
/// This never exceeds one worker and is zero when `times < repeat_factor`.
pub fn parallel_worker_count(times: u64, repeat_factor: u64) -> usize {
    if repeat_factor == 0 {
        return 0;
    }
    (times / repeat_factor).min(1) as usize
}

/// Times closures against the process clock calibration.
pub struct Benchmark<'a> {
    calibration: &'a Calibration,
    executor: &'a dyn Executor,
    diagnostics: Diagnostics,
}

impl fmt::Debug for Benchmark<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Benchmark")
            .field("calibration", &self.calibration)
            .field("diagnostics", &self.diagnostics)
            .finish_non_exhaustive()
    }
}

impl<'a> Benchmark<'a> {
    pub fn new(calibration: &'a Calibration) -> Self {
        Self {
            calibration,
            executor: BackgroundExecutor::global(),
            diagnostics: Diagnostics::global(),
        }
    }

    /// Run parallel workers on `executor` instead of the global pool.
    pub fn with_executor(mut self, executor: &'a dyn Executor) -> Self {
        self.executor = executor;
        self
    }

    pub fn with_diagnostics(mut self, diagnostics: Diagnostics) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    /// Run `f` `times` times on the calling thread.
    pub fn measure<F>(&self, label: &str, times: u64, mut f: F) -> BenchmarkReport
    where
        F: FnMut(),
    {
        let mut elapsed = TimeStamp::now();
        for _ in 0..times {
            f();
        }
        elapsed.freeze();
        self.report(label, times, 1, &elapsed)
    }

    /// Split `times` iterations across background workers.
    pub fn measure_parallel<F>(
        &self,
        label: &str,
        times: u64,
        repeat_factor: u64,
        f: F,
    ) -> Result<BenchmarkReport, BenchmarkError>
    where
        F: Fn() + Send + Sync + 'static,
    {
        if repeat_factor == 0 {
            return Err(BenchmarkError::InvalidRepeatFactor);
        }
        let workers = parallel_worker_count(times, repeat_factor);
        if workers == 0 {
            return Err(BenchmarkError::NoWorkers {
                times,
                repeat_factor,
            });
        }

        let f = Arc::new(f);
        let share = times / workers as u64;
        let remainder = times % workers as u64;
        let mut elapsed = TimeStamp::now();
        let running: Vec<Future<u64>> = (0..workers as u64)
            .map(|worker| {
                let f = Arc::clone(&f);
                let count = share + u64::from(worker < remainder);
                Future::spawn_on(self.executor, move || {
                    for _ in 0..count {
                        f();
                    }
                    count
                })
            })
            .collect();
        let completed: u64 = running.iter().map(Future::value).sum();
        elapsed.freeze();
        Ok(self.report(label, completed, workers, &elapsed))
    }

    fn report(
        &self,
        label: &str,
        iterations: u64,
        workers: usize,
        elapsed: &TimeStamp,
    ) -> BenchmarkReport {
        let total_seconds = elapsed.seconds();
        let per_iteration_seconds = if iterations == 0 {
            0.0
        } else {
            let raw = total_seconds * workers as f64 / iterations as f64;
            (raw - self.calibration.loop_overhead_seconds()).max(0.0)
        };
        let report = BenchmarkReport {
            label: label.to_owned(),
            iterations,
            workers,
            total_seconds,
            per_iteration_seconds,
        };
        info!(
            label,
            iterations,
            workers,
            total = %format_seconds(total_seconds),
            per_iteration = %format_seconds(per_iteration_seconds),
            "benchmark finished"
        );
        diag_println!(sink = self.diagnostics, "{report}");
        report
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::thread;
    use std::time::Duration;

    use procsig_logging::MemorySink;

    use super::*;

    #[test]
    fn worker_count_is_capped_at_one() {
        assert_eq!(parallel_worker_count(1_000, 10), 1);
        assert_eq!(parallel_worker_count(10, 10), 1);
        assert_eq!(parallel_worker_count(9, 10), 0);
        assert_eq!(parallel_worker_count(5, 0), 0);
    }

    #[test]
    fn sequential_measurement_counts_iterations() {
        let sink = Arc::new(MemorySink::new());
        let bench = Benchmark::new(Calibration::global())
            .with_diagnostics(Diagnostics::with_sink(sink.clone()));
        let mut calls = 0;
        let report = bench.measure("sleep", 3, || {
            calls += 1;
            thread::sleep(Duration::from_millis(2));
        });
        assert_eq!(calls, 3);
        assert_eq!(report.iterations, 3);
        assert_eq!(report.workers, 1);
        assert!(report.total_seconds >= 0.006);
        assert!(report.per_iteration_seconds > 0.0);
        assert!(!report.total().is_absolute());
        if Diagnostics::enabled() {
            assert!(sink.contents().starts_with("sleep: "));
        }
    }

    #[test]
    fn zero_iterations_report_zero_cost() {
        let bench = Benchmark::new(Calibration::global());
        let report = bench.measure("empty", 0, || {});
        assert_eq!(report.per_iteration_seconds, 0.0);
    }

    #[test]
    fn parallel_measurement_runs_every_iteration() {
        let counter = Arc::new(AtomicU64::new(0));
        let bench = Benchmark::new(Calibration::global());
        let seen = Arc::clone(&counter);
        let report = bench
            .measure_parallel("count", 500, 100, move || {
                seen.fetch_add(1, Ordering::SeqCst);
            })
            .expect("one worker");
        assert_eq!(report.workers, 1);
        assert_eq!(report.iterations, 500);
        assert_eq!(counter.load(Ordering::SeqCst), 500);
    }

    #[test]
    fn parallel_measurement_rejects_degenerate_inputs() {
        let bench = Benchmark::new(Calibration::global());
        assert_eq!(
            bench.measure_parallel("none", 10, 0, || {}).unwrap_err(),
            BenchmarkError::InvalidRepeatFactor
        );
        assert_eq!(
            bench.measure_parallel("few", 5, 10, || {}).unwrap_err(),
            BenchmarkError::NoWorkers {
                times: 5,
                repeat_factor: 10
            }
        );
    }

    #[test]
    fn report_serialises_to_json() {
        let report = BenchmarkReport {
            label: "icons".into(),
            iterations: 4,
            workers: 1,
            total_seconds: 0.004,
            per_iteration_seconds: 0.001,
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["label"], "icons");
        assert_eq!(json["iterations"], 4);
        assert_eq!(
            report.to_string(),
            "icons: 1.000 ms per iteration (4 iterations on 1 worker(s), 4.000 ms total)"
        );
    }
}
