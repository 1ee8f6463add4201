//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Runtime helpers supporting deferred work."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Barrier};
use std::thread;
use std::time::Duration;

use procsig_common::RuntimeConfig;
use procsig_logging::{Diagnostics, MemorySink};
use procsig_rt::{
    BackgroundExecutor, DebugFallibleFuture, DebugFuture, DebugOptions, FallibleFuture, Future,
};

#[derive(Debug, Clone, PartialEq, Eq)]
enum LookupError {
    Unsigned(String),
}

#[test]
fn concurrent_readers_share_one_computation() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counted = Arc::clone(&calls);
    let future = Future::spawn(move || {
        counted.fetch_add(1, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(20));
        String::from("Developer ID Application: Example Corp")
    });

    let readers = 16;
    let barrier = Arc::new(Barrier::new(readers));
    let handles: Vec<_> = (0..readers)
        .map(|_| {
            let future = future.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                future.value()
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(
            handle.join().expect("reader thread"),
            "Developer ID Application: Example Corp"
        );
    }
    assert_eq!(future.value(), "Developer ID Application: Example Corp");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn is_resolved_flips_only_after_the_write() {
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let future = Future::spawn(move || {
        release_rx.recv().expect("release signal");
        42_u32
    });

    assert!(!future.is_resolved());
    assert_eq!(future.try_value(), None);
    thread::sleep(Duration::from_millis(10));
    assert!(!future.is_resolved());

    release_tx.send(()).expect("computation waiting");
    assert_eq!(future.value(), 42);
    assert!(future.is_resolved());
    assert_eq!(future.try_value(), Some(42));
}

#[test]
fn failure_reaches_every_reader() {
    let future: FallibleFuture<String, LookupError> = FallibleFuture::spawn(|| {
        thread::sleep(Duration::from_millis(10));
        Err(LookupError::Unsigned("/Applications/Unsigned.app".into()))
    });

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let future = future.clone();
            thread::spawn(move || future.value())
        })
        .collect();
    for handle in handles {
        assert_eq!(
            handle.join().expect("reader thread"),
            Err(LookupError::Unsigned("/Applications/Unsigned.app".into()))
        );
    }
    assert!(future.is_failed());
    assert_eq!(
        future.value(),
        Err(LookupError::Unsigned("/Applications/Unsigned.app".into()))
    );
}

#[test]
fn debug_future_reports_label_and_duration() {
    let sink = Arc::new(MemorySink::new());
    let options =
        DebugOptions::labeled("load").with_diagnostics(Diagnostics::with_sink(sink.clone()));
    let future = DebugFuture::spawn(options, || {
        thread::sleep(Duration::from_millis(50));
        42
    });

    assert_eq!(future.value(), 42);
    assert_eq!(future.label(), Some("load"));
    assert!(future.duration_seconds() >= 0.050);

    if Diagnostics::enabled() {
        let lines = sink.lines();
        assert_eq!(lines.len(), 1, "{lines:?}");
        let line = &lines[0];
        let duration = line.strip_prefix("load: ").expect("label prefix");
        let millis = duration.strip_suffix(" ms").expect("millisecond unit");
        let millis: f64 = millis.parse().expect("numeric duration");
        assert!(millis >= 50.0, "{line}");
    }
}

#[test]
fn debug_fallible_future_keeps_the_error() {
    let sink = Arc::new(MemorySink::new());
    let options =
        DebugOptions::labeled("codesign").with_diagnostics(Diagnostics::with_sink(sink.clone()));
    let future: DebugFallibleFuture<(), LookupError> =
        DebugFallibleFuture::spawn(options, || Err(LookupError::Unsigned("helper".into())));
    assert_eq!(future.value(), Err(LookupError::Unsigned("helper".into())));
    assert!(future.is_failed());
    assert!(!future.duration().is_absolute());
}

#[test]
fn a_thousand_futures_each_run_exactly_once() {
    let counter = Arc::new(AtomicUsize::new(0));
    let futures: Vec<Future<usize>> = (0..1000)
        .map(|_| {
            let counter = Arc::clone(&counter);
            Future::spawn(move || counter.fetch_add(1, Ordering::SeqCst))
        })
        .collect();

    let values: BTreeSet<usize> = futures.iter().map(Future::value).collect();
    assert_eq!(counter.load(Ordering::SeqCst), 1000);
    assert_eq!(values.len(), 1000);
    assert_eq!(values, (0..1000).collect::<BTreeSet<_>>());
}

#[test]
fn dedicated_executor_resolves_futures() {
    let config = RuntimeConfig {
        worker_threads: Some(1),
        max_blocking_threads: 4,
        thread_name: "procsig-test".into(),
        ..RuntimeConfig::default()
    };
    let executor = BackgroundExecutor::new(&config).expect("runtime");
    let future = Future::spawn_on(&executor, || thread::current().name().map(str::to_owned));
    assert_eq!(future.value().as_deref(), Some("procsig-test"));
}

#[test]
#[should_panic(expected = "future abandoned: computation panicked")]
fn panicking_computation_poisons_readers() {
    let future: Future<u32> = Future::spawn(|| panic!("icon decode failed"));
    future.value();
}
