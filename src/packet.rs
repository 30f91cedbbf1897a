//! The captured packet representation (§3 "Packet").

use std::net::IpAddr;

use crate::clock::UsTime;
use crate::drop_reason::DropReason;
use crate::fingerprint::Fingerprint;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Endpoint {
    pub ip: IpAddr,
    pub port: u16,
}

/// The decoded DNS header and first question (§4.A: "RR sections are
/// not decoded").
#[derive(Clone, Debug)]
pub struct DnsFields {
    pub txn_id: u16,
    pub qr: bool,
    pub opcode: u8,
    pub rcode: u8,
    pub truncated: bool,
    /// Lowercased, dot-joined qname.
    pub qname: String,
    pub qtype: u16,
    pub qclass: u16,
}

/// One captured (and possibly parsed) datagram.
///
/// A response that is matched to a request is moved into that request's
/// `paired` slot; it is never separately owned elsewhere afterwards
/// (§9 "Cyclic references": ownership, not mutual reference).
#[derive(Debug)]
pub struct Packet {
    pub ts: UsTime,
    pub wire_len: u32,
    pub cap_len: u32,
    pub data: Vec<u8>,
    pub src: Endpoint,
    pub dst: Endpoint,
    pub dns: Option<DnsFields>,
    pub fingerprint: Option<Fingerprint>,
    pub drop_reason: Option<DropReason>,
    pub paired: Option<Box<Packet>>,
}

impl Packet {
    pub fn is_response(&self) -> bool {
        self.dns.as_ref().map(|d| d.qr).unwrap_or(false)
    }

    pub fn is_dropped(&self) -> bool {
        self.drop_reason.is_some()
    }

    /// In-memory footprint used against `frame_max_size` (§4.F): captured
    /// bytes plus a constant bookkeeping overhead, matching the source's
    /// `pkt->memory_size` role without exposing struct layout.
    pub fn memory_size(&self) -> usize {
        self.data.len() + 128
    }

    pub fn mark_dropped(&mut self, reason: DropReason) {
        self.drop_reason = Some(reason);
    }
}
