//! Process-wide, immutable configuration (§6, §9 "Global state").
//!
//! Loaded once at startup from a JSON file with `serde`/`serde_json`
//! (the pair `palantir_collector` already depends on), validated, and
//! from then on handed around by reference (`Arc<Config>`) — never read
//! from ambient/global state.

use serde::Deserialize;

use crate::drop_reason::DropReasonSet;
use crate::error::{CollectorError, Result};

#[derive(Debug, Deserialize)]
pub struct OutputCommonConfig {
    pub path_template: String,
    #[serde(default = "default_period_sec")]
    pub period_sec: f64,
    #[serde(default = "default_max_bytes")]
    pub max_bytes: u64,
    #[serde(default)]
    pub compression: bool,
    #[serde(default)]
    pub drop_reasons_bitmap: u32,
}

fn default_period_sec() -> f64 {
    3600.0
}

fn default_max_bytes() -> u64 {
    256 * 1024 * 1024
}

#[derive(Debug, Deserialize)]
pub struct CsvOutputConfig {
    #[serde(flatten)]
    pub common: OutputCommonConfig,
}

#[derive(Debug, Deserialize)]
pub struct ProtoOutputConfig {
    #[serde(flatten)]
    pub common: OutputCommonConfig,
}

#[derive(Debug, Deserialize)]
pub struct PcapOutputConfig {
    #[serde(flatten)]
    pub common: OutputCommonConfig,
    #[serde(default = "default_snaplen")]
    pub snaplen: u32,
}

fn default_snaplen() -> u32 {
    300
}

#[derive(Debug, Deserialize)]
pub struct OutputsConfig {
    #[serde(default)]
    pub csv: Vec<CsvOutputConfig>,
    #[serde(default)]
    pub proto: Vec<ProtoOutputConfig>,
    #[serde(default)]
    pub pcap: Vec<PcapOutputConfig>,
}

#[derive(Debug, Deserialize)]
pub struct Config {
    pub timeframe_length_sec: f64,
    pub matching_window_sec: f64,
    #[serde(default = "default_hash_order")]
    pub hash_order: u32,
    #[serde(default = "default_capture_limit")]
    pub capture_limit: u32,
    pub inputs: Vec<String>,
    #[serde(default)]
    pub outputs: OutputsConfig,
    /// Bitmap of drop reasons globally retained, merged into every
    /// output's own `drop_reasons_bitmap` (§6).
    #[serde(default)]
    pub dump_packet_reason: u32,
    /// Not part of the distilled §6 list; carried over from the original
    /// `dns_worker_packet_matcher_create` defaults (`worker_packet_matcher.c`),
    /// which the distillation dropped (§10.7).
    #[serde(default = "default_frame_max_duration_sec")]
    pub frame_max_duration_sec: f64,
    #[serde(default = "default_frame_max_size")]
    pub frame_max_size: usize,
    #[serde(default = "default_frame_queue_capacity")]
    pub frame_queue_capacity: usize,
}

fn default_hash_order() -> u32 {
    16
}

fn default_capture_limit() -> u32 {
    65535
}

fn default_frame_max_duration_sec() -> f64 {
    1.0
}

fn default_frame_max_size() -> usize {
    1024 * 1024
}

fn default_frame_queue_capacity() -> usize {
    crate::frame_queue::DEFAULT_CAPACITY
}

impl Default for OutputsConfig {
    fn default() -> Self {
        OutputsConfig {
            csv: Vec::new(),
            proto: Vec::new(),
            pcap: Vec::new(),
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Config> {
        let text = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&text)
            .map_err(|e| CollectorError::ConfigInvalid(format!("{path}: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.timeframe_length_sec <= 0.0 {
            return Err(CollectorError::ConfigInvalid(
                "timeframe_length_sec must be positive".into(),
            ));
        }
        if self.matching_window_sec <= 0.0 {
            return Err(CollectorError::ConfigInvalid(
                "matching_window_sec must be positive".into(),
            ));
        }
        if !(1..=28).contains(&self.hash_order) {
            return Err(CollectorError::ConfigInvalid(
                "hash_order must be between 1 and 28".into(),
            ));
        }
        if self.inputs.is_empty() {
            return Err(CollectorError::ConfigInvalid(
                "at least one input must be configured".into(),
            ));
        }
        if self.outputs.csv.is_empty() && self.outputs.proto.is_empty() && self.outputs.pcap.is_empty() {
            return Err(CollectorError::ConfigInvalid(
                "at least one output must be configured".into(),
            ));
        }
        if self.frame_max_duration_sec <= 0.0 {
            return Err(CollectorError::ConfigInvalid(
                "frame_max_duration_sec must be positive".into(),
            ));
        }
        if self.frame_max_size == 0 {
            return Err(CollectorError::ConfigInvalid(
                "frame_max_size must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn global_dump_reasons(&self) -> DropReasonSet {
        DropReasonSet(self.dump_packet_reason)
    }
}
