//! Mailwatch node
//!
//! Host side of the mailbox sensor. Each `wake` invocation is one wake-up of
//! a device that spends most of its life in deep sleep: it restores the
//! retained record, takes one measurement, reports if needed and stores the
//! record again.

use std::path::PathBuf;
use std::process;
use std::time::Instant;

use anyhow::{bail, Context as _};
use mailwatch_core::{logging, Config};
use mailwatch_detector::Processor;
use serde::Serialize;
use tracing::info;

mod clock;
mod cycle;
mod report;
mod sensor;
mod store;

use cycle::{finish_wake, run_wake};
use sensor::{parse_timed_trace, ReplaySensor};
use store::RetainedStore;

const NODE_PROTOCOL_VERSION: u32 = 1;

#[derive(Debug, Serialize)]
struct NodeVersionHandshake {
    version: &'static str,
    context_version: u16,
    protocol_version: u32,
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<Config> {
    match path {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => Ok(Config::default_config()),
    }
}

fn cmd_wake(store_path: PathBuf, trace: PathBuf, config: Option<PathBuf>) -> anyhow::Result<()> {
    let started = Instant::now();
    let config = load_config(config.as_ref())?;

    let retained = RetainedStore::load(&store_path)?;
    let boot_index = retained
        .as_ref()
        .map_or(0, |store| store.boot_count as usize + 1);
    let mut sensor = ReplaySensor::from_file(&trace)?.skip_to(boot_index);

    let mut outcome = run_wake(&config, retained, &mut sensor)?;
    for report in &outcome.reports {
        println!("{}", serde_json::to_string(report)?);
    }

    let active_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
    finish_wake(&mut outcome.store, active_us);
    outcome.store.save(&store_path)?;

    info!(
        awake_ms = active_us / 1000,
        sleep_ms = config.power.sleep_interval_ms,
        "Entering deep sleep"
    );
    Ok(())
}

fn cmd_replay(trace: PathBuf, config: Option<PathBuf>) -> anyhow::Result<()> {
    let config = load_config(config.as_ref())?;
    let raw = std::fs::read_to_string(&trace)
        .with_context(|| format!("failed to read trace {}", trace.display()))?;

    let mut processor = Processor::new(config.detector)?;
    for (t_ms, raw_cm) in parse_timed_trace(&raw)? {
        let reading = processor.process(raw_cm, t_ms.saturating_mul(1000));
        println!("{}", serde_json::to_string(&reading)?);
    }
    Ok(())
}

fn print_usage() {
    println!("Mailwatch node - mailbox sensor wake cycle");
    println!();
    println!("USAGE:");
    println!("    mailwatch-node wake --store <file> --trace <file> [--config <file>] [--json-logs]");
    println!("    mailwatch-node replay --trace <file> [--config <file>]");
    println!("    mailwatch-node --version-json");
    println!();
    println!("COMMANDS:");
    println!("    wake      Run one wake cycle against a retained store");
    println!("    replay    Feed a `t_ms raw_cm` trace through a fresh detector");
    println!();
    println!("EXAMPLES:");
    println!("    mailwatch-node wake --store rtc.json --trace distances.txt");
    println!("    mailwatch-node replay --trace delivery.txt --config mailbox.toml");
}

#[derive(Debug, Default)]
struct Args {
    store: Option<PathBuf>,
    trace: Option<PathBuf>,
    config: Option<PathBuf>,
    json_logs: bool,
}

fn parse_options(args: &[String]) -> anyhow::Result<Args> {
    let mut parsed = Args::default();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        let mut value = || {
            iter.next()
                .map(PathBuf::from)
                .with_context(|| format!("{arg} was provided without a path"))
        };
        match arg.as_str() {
            "--store" | "-s" => parsed.store = Some(value()?),
            "--trace" | "-t" => parsed.trace = Some(value()?),
            "--config" | "-c" => parsed.config = Some(value()?),
            "--json-logs" => parsed.json_logs = true,
            other => bail!("unknown argument {other}"),
        }
    }
    Ok(parsed)
}

fn run(command: &str, args: &[String]) -> anyhow::Result<()> {
    let options = parse_options(args)?;
    if options.json_logs {
        logging::init_json();
    } else {
        logging::init();
    }

    match command {
        "wake" => {
            let Some(store) = options.store else {
                bail!("missing --store argument");
            };
            let Some(trace) = options.trace else {
                bail!("missing --trace argument");
            };
            cmd_wake(store, trace, options.config)
        }
        "replay" => {
            let Some(trace) = options.trace else {
                bail!("missing --trace argument");
            };
            cmd_replay(trace, options.config)
        }
        other => bail!("unknown command {other}"),
    }
}

fn main() {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|arg| arg == "--version-json") {
        let handshake = NodeVersionHandshake {
            version: env!("CARGO_PKG_VERSION"),
            context_version: mailwatch_detector::CONTEXT_VERSION,
            protocol_version: NODE_PROTOCOL_VERSION,
        };
        match serde_json::to_string(&handshake) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("Error: {e}");
                process::exit(1);
            }
        }
        return;
    }

    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    if let Err(e) = run(&args[1], &args[2..]) {
        eprintln!("Error: {e:#}");
        println!();
        print_usage();
        process::exit(1);
    }
}
