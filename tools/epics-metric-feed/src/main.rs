// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! epics-metric-feed - push metric events through the EPICS metric sink
//!
//! Reads `name<TAB>type<TAB>value[<TAB>unit]` lines from stdin and sends each
//! one through an [`EpicsMetricSink`] backed by a loopback IOC that hosts the
//! channels given with `--channel`. Prints every put that reached the IOC.
//!
//! # Usage
//!
//! ```bash
//! printf 'Event Rate\tdouble\t12.5\tHz\n' \
//!     | epics-metric-feed --channel artdaq:Event_Rate
//!
//! # Show channel resolution and puts
//! RUST_LOG=epics_metric=debug epics-metric-feed --config sink.yaml -c artdaq:a
//! ```

mod event;

use anyhow::{Context, Result};
use clap::Parser;
use epics_metric::{EpicsMetricSink, LoopbackClient, MetricSink, SinkConfig};
use std::io::{self, BufRead};
use std::path::PathBuf;
use std::time::SystemTime;

#[derive(Parser, Debug)]
#[command(name = "epics-metric-feed")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Feed metric events through the EPICS metric sink against a loopback IOC")]
struct Args {
    /// YAML sink configuration
    #[arg(long)]
    config: Option<PathBuf>,

    /// Channel name prefix (overrides the configuration)
    #[arg(short, long)]
    prefix: Option<String>,

    /// Append the process id to every channel name
    #[arg(short, long)]
    unique: bool,

    /// Channel hosted by the loopback IOC (repeatable)
    #[arg(short, long = "channel")]
    channels: Vec<String>,

    /// Stop after the first malformed line instead of skipping it
    #[arg(long)]
    strict: bool,
}

fn main() {
    init_logging();
    let args = Args::parse();

    if let Err(e) = run(&args) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .try_init();
}

fn load_config(args: &Args) -> Result<SinkConfig> {
    let mut config = match &args.config {
        Some(path) => SinkConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => SinkConfig::default(),
    };
    if let Some(prefix) = &args.prefix {
        config.channel_name_prefix = prefix.clone();
    }
    if args.unique {
        config.unique_channel_names = true;
    }
    Ok(config)
}

fn run(args: &Args) -> Result<()> {
    let config = load_config(args)?;
    let client = LoopbackClient::hosting(args.channels.iter().cloned());
    let sink = EpicsMetricSink::new(config, client.clone());

    sink.start();
    let stdin = io::stdin();
    for (lineno, line) in stdin.lock().lines().enumerate() {
        let line = line.context("reading stdin")?;
        let event = match event::parse_line(&line) {
            Ok(Some(event)) => event,
            Ok(None) => continue,
            Err(e) if args.strict => {
                return Err(e).with_context(|| format!("line {}", lineno + 1));
            }
            Err(e) => {
                log::warn!("line {}: {}", lineno + 1, e);
                continue;
            }
        };

        log::debug!("{} -> {}", event.name, sink.channel_id(&event.name));
        sink.send_metric(&event.name, &event.value, &event.unit, SystemTime::now());
    }

    let stats = sink.stats();
    sink.stop();

    for put in client.puts() {
        println!("{}\t{}\t{}", put.channel, put.value.dbr_type(), put.value);
    }
    println!(
        "sent={} dropped={} write_errors={} channels_connected={} channels_failed={}",
        stats.metrics_sent,
        stats.metrics_dropped,
        stats.write_errors,
        stats.channels_connected,
        stats.channels_failed
    );
    Ok(())
}
