//! CLI entry point (§6 "CLI surface").

use std::process::ExitCode;

use clap::Parser;
use log::{error, LevelFilter};

use dns_collector::config::Config;
use dns_collector::output::{csv::CsvEncoder, pcap_dump::PcapDumpEncoder, proto::ProtoEncoder, Output, OutputManager};
use dns_collector::{drop_reason::DropReasonSet, run_pipeline};

/// DNS packet-capture post-processor.
#[derive(Parser, Debug)]
#[command(name = "dns-collector", version)]
struct Cli {
    /// PCAP input files, processed in order.
    inputs: Vec<String>,

    /// Path to the JSON configuration file.
    #[arg(short = 'c', long = "config")]
    config: String,

    /// Raise log verbosity; repeatable (-v, -vv, -vvv).
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    verbose: u8,
}

fn level_for(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

fn build_outputs(config: &Config) -> dns_collector::error::Result<OutputManager> {
    let global_filter = config.global_dump_reasons();

    let csv_outputs = config
        .outputs
        .csv
        .iter()
        .enumerate()
        .map(|(i, c)| Output::new(format!("csv[{i}]"), &c.common, global_filter, CsvEncoder))
        .collect();

    let proto_outputs = config
        .outputs
        .proto
        .iter()
        .enumerate()
        .map(|(i, c)| Output::new(format!("proto[{i}]"), &c.common, global_filter, ProtoEncoder))
        .collect();

    let pcap_outputs = config
        .outputs
        .pcap
        .iter()
        .enumerate()
        .map(|(i, c)| Output::new(format!("pcap[{i}]"), &c.common, global_filter, PcapDumpEncoder::new(c.snaplen)))
        .collect();

    OutputManager::new(csv_outputs, proto_outputs, pcap_outputs)
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(level_for(cli.verbose))
        .init();

    let mut config = match Config::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            error!("invalid configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    if !cli.inputs.is_empty() {
        config.inputs = cli.inputs.clone();
    }

    let outputs = match build_outputs(&config) {
        Ok(o) => o,
        Err(e) => {
            error!("failed to set up outputs: {e}");
            return ExitCode::FAILURE;
        }
    };

    match run_pipeline(std::sync::Arc::new(config), outputs) {
        Ok(stats) => {
            log::info!(
                "done: {} captured, {} dropped, {} inputs skipped",
                stats.packets_captured,
                stats.packets_dropped,
                stats.inputs_skipped
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}
