//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Runtime helpers supporting deferred work."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
//! Single-assignment containers for values computed once in the background.
//!
//! A [`Future`] schedules its computation on construction and blocks readers
//! until the result is stored. The result is written exactly once; every
//! reader afterwards observes that same result. [`FallibleFuture`] carries a
//! `Result` so a failed computation is replayed to every reader.
//!
//! If the computation panics, or its job is discarded by the executor without
//! running, the container is marked abandoned and every reader panics instead
//! of waiting forever.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex, MutexGuard};
use tracing::warn;

use crate::executor::{BackgroundExecutor, Executor, MainLoopHandle};

enum Slot<T> {
    Pending,
    Resolved(T),
    Abandoned(&'static str),
}

struct Shared<T> {
    slot: Mutex<Slot<T>>,
    settled: Condvar,
    done: AtomicBool,
}

impl<T> Shared<T> {
    fn pending() -> Self {
        Self {
            slot: Mutex::new(Slot::Pending),
            settled: Condvar::new(),
            done: AtomicBool::new(false),
        }
    }

    fn settle(&self, next: Slot<T>) {
        let mut slot = self.slot.lock();
        debug_assert!(matches!(*slot, Slot::Pending), "slot written twice");
        if matches!(*slot, Slot::Pending) {
            *slot = next;
            self.done.store(true, Ordering::Release);
            self.settled.notify_all();
        }
    }

    fn wait(&self) -> MutexGuard<'_, Slot<T>> {
        let mut slot = self.slot.lock();
        while matches!(*slot, Slot::Pending) {
            self.settled.wait(&mut slot);
        }
        slot
    }
}

/// Write side of a [`Shared`] slot, owned by the scheduled job.
///
/// Dropping it without resolving marks the slot abandoned and wakes readers.
struct Resolver<T> {
    shared: Option<Arc<Shared<T>>>,
}

impl<T> Resolver<T> {
    fn resolve(mut self, value: T) {
        if let Some(shared) = self.shared.take() {
            shared.settle(Slot::Resolved(value));
        }
    }
}

impl<T> Drop for Resolver<T> {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.take() {
            let reason = if std::thread::panicking() {
                "computation panicked"
            } else {
                "computation was discarded before it ran"
            };
            warn!(reason, "future abandoned");
            shared.settle(Slot::Abandoned(reason));
        }
    }
}

/// Implemented by containers whose readers can block until resolution.
pub trait Resolvable {
    /// Block the calling thread until the result is stored.
    fn wait(&self);

    /// Whether the container has settled. Advisory: it may turn true right
    /// after returning false, but never reports true before the write.
    fn is_resolved(&self) -> bool;
}

/// A value computed exactly once on a background execution context.
///
/// Handles are cheap to clone and share the same result.
pub struct Future<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Future<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> fmt::Debug for Future<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Future")
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

impl<T: Send + 'static> Future<T> {
    /// Schedule `compute` on the process-wide background executor.
    pub fn spawn<F>(compute: F) -> Self
    where
        F: FnOnce() -> T + Send + 'static,
    {
        Self::spawn_on(BackgroundExecutor::global(), compute)
    }

    /// Schedule `compute` on `executor`. Never blocks the caller.
    pub fn spawn_on<E, F>(executor: &E, compute: F) -> Self
    where
        E: Executor + ?Sized,
        F: FnOnce() -> T + Send + 'static,
    {
        let shared = Arc::new(Shared::pending());
        let resolver = Resolver {
            shared: Some(Arc::clone(&shared)),
        };
        executor.execute(Box::new(move || {
            let value = compute();
            resolver.resolve(value);
        }));
        Self { shared }
    }
}

impl<T> Future<T> {
    /// A future that already holds `value`.
    pub fn resolved(value: T) -> Self {
        let shared = Shared::pending();
        shared.settle(Slot::Resolved(value));
        Self {
            shared: Arc::new(shared),
        }
    }

    /// Block until resolved, then call `f` with a reference to the value.
    ///
    /// `f` runs while the result lock is held and must not wait on this future.
    pub fn with_value<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let slot = self.shared.wait();
        match &*slot {
            Slot::Resolved(value) => f(value),
            Slot::Abandoned(reason) => panic!("future abandoned: {reason}"),
            Slot::Pending => unreachable!("wait returned while pending"),
        }
    }

    /// Block until resolved without copying the value.
    pub fn wait(&self) {
        self.with_value(|_| ());
    }

    /// Non-blocking, advisory check; never true before the result is written.
    pub fn is_resolved(&self) -> bool {
        self.shared.done.load(Ordering::Acquire)
    }

    /// Call `f` with the value if it is already available. Never blocks on
    /// the computation.
    pub fn peek<R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        match &*self.shared.slot.lock() {
            Slot::Resolved(value) => Some(f(value)),
            _ => None,
        }
    }
}

impl<T: Clone> Future<T> {
    /// Block until resolved and return a copy of the value.
    pub fn value(&self) -> T {
        self.with_value(T::clone)
    }

    /// The value, if already resolved.
    pub fn try_value(&self) -> Option<T> {
        self.peek(T::clone)
    }
}

impl<T> Resolvable for Future<T> {
    fn wait(&self) {
        Future::wait(self);
    }

    fn is_resolved(&self) -> bool {
        Future::is_resolved(self)
    }
}

/// A [`Future`] whose computation may fail. Every reader sees the same
/// outcome: the value, or the error the computation returned.
pub struct FallibleFuture<T, E> {
    inner: Future<Result<T, E>>,
}

impl<T, E> Clone for FallibleFuture<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T, E> fmt::Debug for FallibleFuture<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FallibleFuture")
            .field("resolved", &self.is_resolved())
            .field("failed", &self.is_failed())
            .finish()
    }
}

impl<T: Send + 'static, E: Send + 'static> FallibleFuture<T, E> {
    pub fn spawn<F>(compute: F) -> Self
    where
        F: FnOnce() -> Result<T, E> + Send + 'static,
    {
        Self::spawn_on(BackgroundExecutor::global(), compute)
    }

    pub fn spawn_on<X, F>(executor: &X, compute: F) -> Self
    where
        X: Executor + ?Sized,
        F: FnOnce() -> Result<T, E> + Send + 'static,
    {
        Self {
            inner: Future::spawn_on(executor, compute),
        }
    }
}

impl<T, E> FallibleFuture<T, E> {
    /// An already-settled future.
    pub fn from_result(result: Result<T, E>) -> Self {
        Self {
            inner: Future::resolved(result),
        }
    }

    pub fn wait(&self) {
        self.inner.wait();
    }

    pub fn is_resolved(&self) -> bool {
        self.inner.is_resolved()
    }

    /// Whether the computation finished with an error. False while pending.
    pub fn is_failed(&self) -> bool {
        self.inner.peek(Result::is_err).unwrap_or(false)
    }

    pub fn with_result<R>(&self, f: impl FnOnce(&Result<T, E>) -> R) -> R {
        self.inner.with_value(f)
    }
}

impl<T: Clone, E: Clone> FallibleFuture<T, E> {
    /// Block until resolved; return the value or the computation's error.
    pub fn value(&self) -> Result<T, E> {
        self.inner.value()
    }

    pub fn try_value(&self) -> Option<Result<T, E>> {
        self.inner.try_value()
    }
}

impl<T, E> Resolvable for FallibleFuture<T, E> {
    fn wait(&self) {
        FallibleFuture::wait(self);
    }

    fn is_resolved(&self) -> bool {
        FallibleFuture::is_resolved(self)
    }
}

/// Run `f` on the main loop behind `handle` and expose its result.
pub fn perform_on_main<T, F>(handle: &MainLoopHandle, f: F) -> Future<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    Future::spawn_on(handle, f)
}
