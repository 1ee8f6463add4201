//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Runtime helpers supporting deferred work."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
//! Deferred-work primitives for procsig: single-assignment futures, the
//! execution contexts that run them, timing decorators and a benchmark helper.

pub mod benchmark;
pub mod debug;
pub mod executor;
pub mod future;

pub use benchmark::{parallel_worker_count, Benchmark, BenchmarkError, BenchmarkReport};
pub use debug::{DebugFallibleFuture, DebugFuture, DebugOptions, Instrumented};
pub use executor::{BackgroundExecutor, Executor, Job, MainLoop, MainLoopHandle};
pub use future::{perform_on_main, FallibleFuture, Future, Resolvable};
