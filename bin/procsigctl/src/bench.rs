//! ---
//! ems_section: "05-networking-external-interfaces"
//! ems_subsection: "binary"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Control CLI for exercising procsig runtime primitives."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use anyhow::{Context, Result};
use clap::Args;
use procsig_common::{BenchmarkConfig, Calibration};
use procsig_rt::Benchmark;

#[derive(Debug, Args)]
pub struct BenchArgs {
    #[arg(long, help = "Iterations to run (defaults to benchmark.times)")]
    pub times: Option<u64>,
    #[arg(long, help = "Repeat factor for parallel runs (defaults to benchmark.repeat_factor)")]
    pub repeat: Option<u64>,
    #[arg(long, help = "Split iterations across background workers")]
    pub parallel: bool,
    #[arg(long, help = "Emit the report as JSON")]
    pub json: bool,
}

fn workload() {
    let sum: u64 = (0..64u64).map(std::hint::black_box).sum();
    std::hint::black_box(sum);
}

pub fn run(args: BenchArgs, defaults: &BenchmarkConfig) -> Result<()> {
    let times = args.times.unwrap_or(defaults.times);
    let repeat = args.repeat.unwrap_or(defaults.repeat_factor);
    let bench = Benchmark::new(Calibration::global());
    let report = if args.parallel {
        bench.measure_parallel("parallel-sum", times, repeat, workload)?
    } else {
        bench.measure("sum", times, workload)
    };
    if args.json {
        let json = serde_json::to_string_pretty(&report).context("unable to encode report")?;
        println!("{json}");
    } else {
        println!("{report}");
    }
    Ok(())
}
