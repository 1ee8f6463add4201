//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Runtime helpers supporting deferred work."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::collections::VecDeque;
use std::fmt;
use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use once_cell::sync::OnceCell;
use parking_lot::{Condvar, Mutex};
use procsig_common::RuntimeConfig;
use tokio::runtime::{Builder, Handle, Runtime};
use tracing::{debug, info, trace, warn};

/// A zero-argument unit of work.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// An execution context that accepts jobs without blocking the submitter.
pub trait Executor: Send + Sync {
    fn execute(&self, job: Job);
}

static GLOBAL: OnceCell<BackgroundExecutor> = OnceCell::new();

/// Thread-pool backed context. Jobs run in parallel with no ordering guarantee.
pub struct BackgroundExecutor {
    runtime: Runtime,
    thread_name: String,
}

impl fmt::Debug for BackgroundExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackgroundExecutor")
            .field("thread_name", &self.thread_name)
            .finish()
    }
}

impl BackgroundExecutor {
    pub fn new(config: &RuntimeConfig) -> Result<Self> {
        config.validate()?;
        let mut builder = Builder::new_multi_thread();
        builder
            .thread_name(config.thread_name.clone())
            .max_blocking_threads(config.max_blocking_threads)
            .thread_keep_alive(config.keep_alive)
            .enable_time();
        if let Some(workers) = config.worker_threads {
            builder.worker_threads(workers);
        }
        let runtime = builder
            .build()
            .context("failed to build background runtime")?;
        info!(
            thread_name = %config.thread_name,
            max_blocking_threads = config.max_blocking_threads,
            "background executor started"
        );
        Ok(Self {
            runtime,
            thread_name: config.thread_name.clone(),
        })
    }

    /// Install the process-wide executor. Fails if one is already in use.
    pub fn init_global(config: &RuntimeConfig) -> Result<&'static BackgroundExecutor> {
        let executor = Self::new(config)?;
        GLOBAL
            .set(executor)
            .map_err(|_| anyhow!("background executor already initialised"))?;
        Ok(Self::global())
    }

    /// The process-wide executor, built from default settings on first use.
    pub fn global() -> &'static BackgroundExecutor {
        GLOBAL.get_or_init(|| {
            Self::new(&RuntimeConfig::default())
                .expect("default runtime configuration builds a runtime")
        })
    }

    /// Handle onto the underlying runtime for async callers.
    pub fn handle(&self) -> &Handle {
        self.runtime.handle()
    }
}

impl Executor for BackgroundExecutor {
    fn execute(&self, job: Job) {
        trace!(executor = %self.thread_name, "dispatching job");
        drop(self.runtime.spawn_blocking(job));
    }
}

#[derive(Default)]
struct MainQueue {
    jobs: Mutex<VecDeque<Job>>,
    queued: Condvar,
}

/// UI-affinity loop. Owned by the thread that drives it.
///
/// Jobs scheduled through a [`MainLoopHandle`] run, in submission order, the
/// next time the owner calls [`MainLoop::run_pending`]. A pass only runs jobs
/// that were queued when it started, so callbacks scheduled from inside a job
/// wait for the following pass.
pub struct MainLoop {
    queue: Arc<MainQueue>,
    _not_send: PhantomData<*const ()>,
}

impl fmt::Debug for MainLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MainLoop")
            .field("pending", &self.pending())
            .finish()
    }
}

impl Default for MainLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl MainLoop {
    pub fn new() -> Self {
        Self {
            queue: Arc::new(MainQueue::default()),
            _not_send: PhantomData,
        }
    }

    pub fn handle(&self) -> MainLoopHandle {
        MainLoopHandle {
            queue: Arc::clone(&self.queue),
        }
    }

    pub fn pending(&self) -> usize {
        self.queue.jobs.lock().len()
    }

    /// Run every job queued before this call. Returns how many ran.
    ///
    /// A panicking job does not stop the pass: the remaining jobs still run,
    /// then the first panic is resumed on the caller.
    pub fn run_pending(&self) -> usize {
        let batch = std::mem::take(&mut *self.queue.jobs.lock());
        let count = batch.len();
        let mut first_panic = None;
        for job in batch {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(job)) {
                warn!("main loop job panicked");
                first_panic.get_or_insert(payload);
            }
        }
        if count > 0 {
            debug!(jobs = count, "main loop pass complete");
        }
        if let Some(payload) = first_panic {
            panic::resume_unwind(payload);
        }
        count
    }

    /// Block up to `timeout` for work to arrive, then run a pass.
    pub fn wait_and_run(&self, timeout: Duration) -> usize {
        {
            let mut jobs = self.queue.jobs.lock();
            if jobs.is_empty() {
                let _ = self.queue.queued.wait_for(&mut jobs, timeout);
            }
        }
        self.run_pending()
    }
}

/// Cloneable, thread-safe submitter for a [`MainLoop`].
#[derive(Clone)]
pub struct MainLoopHandle {
    queue: Arc<MainQueue>,
}

impl fmt::Debug for MainLoopHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MainLoopHandle").finish_non_exhaustive()
    }
}

impl MainLoopHandle {
    /// Queue `job` behind everything already pending. Never blocks on the loop.
    pub fn schedule<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.queue.jobs.lock().push_back(Box::new(job));
        self.queue.queued.notify_one();
    }
}

impl Executor for MainLoopHandle {
    fn execute(&self, job: Job) {
        self.queue.jobs.lock().push_back(job);
        self.queue.queued.notify_one();
    }
}
