//! ---
//! ems_section: "05-networking-external-interfaces"
//! ems_subsection: "binary"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Control CLI for exercising procsig runtime primitives."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Result};
use clap::Args;
use procsig_rt::{perform_on_main, DebugFallibleFuture, DebugOptions, Future, MainLoop};
use tracing::info;

const ANSWER: u64 = 42;

#[derive(Debug, Args)]
pub struct ResolveArgs {
    #[arg(long, default_value = "resolve", help = "Diagnostic label for the computation")]
    pub label: String,
    #[arg(long, default_value_t = 50, help = "Simulated work time in milliseconds")]
    pub millis: u64,
    #[arg(long, help = "Make the computation fail instead of returning a value")]
    pub fail: bool,
}

/// Run the computation in the background and report from the main loop, the
/// way a table view would refresh once a slow lookup lands.
pub fn run(args: ResolveArgs) -> Result<()> {
    let work = Duration::from_millis(args.millis);
    let fail = args.fail;
    let future: DebugFallibleFuture<u64, String> =
        DebugFallibleFuture::spawn(DebugOptions::labeled(args.label.clone()), move || {
            thread::sleep(work);
            if fail {
                Err(format!("computation failed after {} ms", work.as_millis()))
            } else {
                Ok(ANSWER)
            }
        });

    let main = MainLoop::new();
    let handle = main.handle();
    let watched = future.clone();
    let label = args.label;
    let _notifier = Future::spawn(move || {
        watched.wait();
        perform_on_main(&handle, move || {
            let elapsed = watched.duration();
            match watched.value() {
                Ok(value) => println!("{label}: resolved {value} in {elapsed}"),
                Err(err) => println!("{label}: failed in {elapsed}: {err}"),
            }
        })
    });

    while main.wait_and_run(Duration::from_millis(100)) == 0 {}
    info!(resolved = future.is_resolved(), "main loop drained");

    future.value().map(|_| ()).map_err(|err| anyhow!(err))
}
