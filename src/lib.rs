//! DNS packet-capture post-processor: parses PCAP captures of raw IP/UDP
//! DNS traffic, matches responses to their requests, and emits the
//! resulting pairs through pluggable CSV/protobuf/PCAP-dump outputs.

pub mod clock;
pub mod collector;
pub mod config;
pub mod drop_reason;
pub mod error;
pub mod fingerprint;
pub mod frame;
pub mod frame_queue;
pub mod hash_index;
pub mod input;
pub mod matcher;
pub mod output;
pub mod packet;
pub mod parse;
pub mod stats;
pub mod timeframe;

use std::sync::{Arc, Mutex};

use config::Config;
use error::Result;
use stats::CollectorStats;

/// Wires up the collector and matcher threads and runs the pipeline to
/// completion. Shared by the CLI binary and integration tests.
pub fn run_pipeline(config: Arc<Config>, outputs: output::OutputManager) -> Result<CollectorStats> {
    let (tx, rx) = frame_queue::frame_queue(config.frame_queue_capacity);
    let fatal: collector::FatalFlag = Arc::new(Mutex::new(None));

    let matcher = matcher::Matcher::new(&config);
    let matcher_fatal = Arc::clone(&fatal);
    let matcher_handle = std::thread::spawn(move || -> Result<()> {
        let result = matcher.run(rx, outputs);
        if let Err(e) = &result {
            *matcher_fatal.lock().unwrap() = Some(match e {
                error::CollectorError::Io(err) => error::CollectorError::Io(std::io::Error::new(err.kind(), err.to_string())),
                other => error::CollectorError::Pcap(other.to_string()),
            });
        }
        result
    });

    let collector = collector::Collector::new(Arc::clone(&config), tx, fatal);
    let collector_result = collector.run();

    let matcher_result = matcher_handle
        .join()
        .unwrap_or_else(|_| Err(error::CollectorError::QueueDeadlock));

    collector_result.and_then(|stats| matcher_result.map(|_| stats))
}
