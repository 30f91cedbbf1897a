//! Offline PCAP file adapter. Only `DLT_RAW` (linktype 101) captures are
//! accepted (§1 Non-goals: "the adapter only needs to support offline
//! captures with DLT_RAW linktype"); anything else is a fatal open-time
//! error (§6).

use pcap::{Capture, Offline};

use crate::clock::UsTime;
use crate::error::CollectorError;
use crate::input::{InputAdapter, NextOutcome, RawDatagram};

const DLT_RAW: i32 = 101;

pub struct PcapFileAdapter {
    capture: Capture<Offline>,
    capture_limit: usize,
}

impl PcapFileAdapter {
    pub fn open(path: &str, capture_limit: usize) -> crate::error::Result<Self> {
        let capture = Capture::from_file(path).map_err(|e| CollectorError::Pcap(e.to_string()))?;

        let linktype = capture.get_datalink();
        if linktype.0 != DLT_RAW {
            return Err(CollectorError::UnsupportedLinkType(format!(
                "{:?} ({})",
                linktype, linktype.0
            )));
        }

        Ok(PcapFileAdapter {
            capture,
            capture_limit,
        })
    }
}

impl InputAdapter for PcapFileAdapter {
    fn next(&mut self) -> crate::error::Result<NextOutcome> {
        match self.capture.next_packet() {
            Ok(pkt) => {
                let ts = UsTime::from_secs_micros(pkt.header.ts.tv_sec as i64, pkt.header.ts.tv_usec as i64);
                let wire_len = pkt.header.len;
                let keep = (pkt.header.caplen as usize).min(self.capture_limit).min(pkt.data.len());
                Ok(NextOutcome::Packet(RawDatagram {
                    ts,
                    cap_len: keep as u32,
                    wire_len,
                    data: pkt.data[..keep].to_vec(),
                }))
            }
            Err(pcap::Error::NoMorePackets) => Ok(NextOutcome::End),
            Err(pcap::Error::TimeoutExpired) => Ok(NextOutcome::Timeout),
            Err(e) => Err(CollectorError::Pcap(e.to_string())),
        }
    }
}
