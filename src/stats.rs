//! Collector-side counters (§3 "Collector state"), exposed for logging
//! and for testable-property S6/"number of packets in" checks (§8.6).

use std::collections::HashMap;

use crate::drop_reason::DropReason;

#[derive(Default, Debug, Clone)]
pub struct CollectorStats {
    pub packets_captured: u64,
    pub packets_dropped: u64,
    pub drops_by_reason: HashMap<DropReason, u64>,
    pub inputs_skipped: u64,
}

impl CollectorStats {
    pub fn record_capture(&mut self) {
        self.packets_captured += 1;
    }

    pub fn record_drop(&mut self, reason: DropReason) {
        self.packets_dropped += 1;
        *self.drops_by_reason.entry(reason).or_insert(0) += 1;
    }

    pub fn record_input_skipped(&mut self) {
        self.inputs_skipped += 1;
    }
}
