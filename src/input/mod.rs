//! Input adapter contract (§6): a pull interface yielding raw captured
//! datagrams. PCAP file reading itself is treated as an external
//! collaborator; this module only defines the narrow interface and the
//! one adapter this crate ships (`pcap_file`).

pub mod pcap_file;

use crate::clock::UsTime;

pub struct RawDatagram {
    pub ts: UsTime,
    pub cap_len: u32,
    pub wire_len: u32,
    pub data: Vec<u8>,
}

pub enum NextOutcome {
    Packet(RawDatagram),
    Timeout,
    End,
}

/// Pull interface for an input source (§6 "Input adapter contract").
pub trait InputAdapter {
    fn next(&mut self) -> crate::error::Result<NextOutcome>;
}
