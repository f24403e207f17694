// Wed Aug 05 2026 - Alex

use anyhow::Context;
use bytes::Bytes;
use clap::Parser;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use parallel_apply::utils::timing::{format_duration, ServiceTimes};
use parallel_apply::{Engine, EngineConfig, ModuleLocator, NativeBackend, TopologyKind};
use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(author = "Alex")]
#[command(version = "1.0.0")]
#[command(about = "Parallel apply benchmark for named operations", long_about = None)]
struct Args {
    /// Operation module file; the builtin module is used when omitted
    #[arg(short, long)]
    module: Option<PathBuf>,

    /// Payload file applied on every iteration
    #[arg(short, long)]
    data: PathBuf,

    #[arg(short, long, default_value_t = num_cpus::get())]
    workers: usize,

    #[arg(short, long, default_value_t = 1)]
    iterations: usize,

    /// Use the staged pipeline topology instead of the shared queue
    #[arg(long)]
    pipeline: bool,

    #[arg(long)]
    no_progress: bool,

    /// Write a JSON report to this path
    #[arg(long)]
    report: Option<PathBuf>,

    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Operation names applied to the payload on each iteration
    #[arg(required = true)]
    operations: Vec<String>,
}

#[derive(Serialize)]
struct BenchReport {
    workers: usize,
    iterations: usize,
    operations: Vec<String>,
    topology: TopologyKind,
    tasks: usize,
    failures: usize,
    completion_us: u128,
    initialization_us: u128,
    computation_us: u128,
    average_service_us: Option<u128>,
}

fn main() {
    if let Err(error) = run() {
        eprintln!("{} {:#}", "[!]".red().bold(), error);
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let args = Args::parse();
    parallel_apply::utils::logging::init(args.verbose as usize);

    println!("{}", "Parallel Apply Benchmark".cyan().bold());
    println!("{}", "=".repeat(50).cyan());
    println!();

    let start = Instant::now();

    let payload = fs::read(&args.data)
        .with_context(|| format!("failed to read payload file {}", args.data.display()))?;
    let payload = Bytes::from(payload);

    let module = match &args.module {
        Some(path) => ModuleLocator::File(path.clone()),
        None => ModuleLocator::Builtin,
    };
    let topology = if args.pipeline {
        TopologyKind::Pipeline
    } else {
        TopologyKind::SharedQueue
    };

    println!(
        "{} Starting engine: {} workers, {} topology",
        "[*]".blue(),
        args.workers,
        if args.pipeline { "pipeline" } else { "shared-queue" }
    );

    let config = EngineConfig::new()
        .with_module(module)
        .with_worker_count(args.workers)
        .with_topology(topology);
    let engine = Engine::new(config, Arc::new(NativeBackend::new()));
    engine.initialize().context("engine initialization failed")?;
    let ready = Instant::now();

    println!(
        "{} Dispatching {} iterations x {} operations over {} payload bytes",
        "[*]".blue(),
        args.iterations,
        args.operations.len(),
        payload.len()
    );

    let mut futures = Vec::with_capacity(args.iterations * args.operations.len());
    for _ in 0..args.iterations {
        futures.extend(engine.dispatch(payload.clone(), &args.operations)?);
    }

    let bar = if args.no_progress {
        ProgressBar::hidden()
    } else {
        let bar = ProgressBar::new(futures.len() as u64);
        bar.set_style(
            ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        bar
    };

    let collect_timer = parallel_apply::utils::logging::ScopedTimer::new("collect results");
    let mut service = ServiceTimes::new();
    let mut failures = 0usize;
    for future in &futures {
        let result = future.wait();
        if result.is_failed() {
            failures += 1;
        }
        service.record(&result);
        bar.inc(1);
    }
    bar.finish_and_clear();
    drop(collect_timer);

    let end = Instant::now();
    engine.shutdown(true).context("engine shutdown failed")?;

    let completion = end.duration_since(start);
    let initialization = ready.duration_since(start);
    let computation = end.duration_since(ready);
    let average_service = service.average();

    println!();
    println!("{} Completion time:         {}", "[+]".green(), format_duration(completion));
    println!("{} Initialization overhead: {}", "[+]".green(), format_duration(initialization));
    println!("{} Computation time:        {}", "[+]".green(), format_duration(computation));
    match average_service {
        Some(average) => {
            println!("{} Average service time:    {}", "[+]".green(), format_duration(average));
        }
        None => {
            println!("{} Average service time:    n/a (single iteration)", "[+]".green());
        }
    }

    if failures > 0 {
        println!(
            "{} {} of {} tasks failed",
            "[!]".yellow(),
            failures,
            futures.len()
        );
    }

    if let Some(path) = &args.report {
        let report = BenchReport {
            workers: args.workers,
            iterations: args.iterations,
            operations: args.operations.clone(),
            topology,
            tasks: futures.len(),
            failures,
            completion_us: completion.as_micros(),
            initialization_us: initialization.as_micros(),
            computation_us: computation.as_micros(),
            average_service_us: average_service.map(|d| d.as_micros()),
        };

        let json = serde_json::to_string_pretty(&report)?;
        fs::write(path, json)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        println!("{} Report written to {}", "[+]".green(), path.display());
    }

    Ok(())
}
