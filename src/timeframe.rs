//! Time-bounded in-flight packet container (§3 "Timeframe", §4.C).
//!
//! Invariant kept exactly as specified: the pending hash index contains
//! *only* request packets still unmatched in this frame. A response that
//! matches moves the completed request (now carrying the response in its
//! `paired` slot) into `packets` immediately — there is no "completed but
//! still indexed" state to model, since nothing outside this frame can
//! ever look it up again once matched.

use crate::clock::UsTime;
use crate::drop_reason::DropReason;
use crate::hash_index::PacketHashIndex;
use crate::packet::Packet;

pub struct Timeframe {
    pub time_start: UsTime,
    pub time_end: UsTime,
    packets: Vec<Packet>,
    pending: PacketHashIndex<Packet>,
}

impl Timeframe {
    pub fn create(time_start: UsTime, hash_order: u32) -> Self {
        Timeframe {
            time_start,
            // Provisional; set for real at rotation (`seal`).
            time_end: time_start,
            packets: Vec::new(),
            pending: PacketHashIndex::new(hash_order),
        }
    }

    /// Half-open upper bound, fixed at rotation time (§4.E: `time_end = t - 1`).
    pub fn seal(&mut self, time_end: UsTime) {
        self.time_end = time_end;
    }

    /// Appends an already-parsed, non-dropped packet, classifying it by
    /// its QR bit (§4.C).
    pub fn append(&mut self, pkt: Packet) {
        if pkt.is_response() {
            if let Err(pkt) = self.match_response(pkt) {
                self.packets.push(pkt); // unmatched response: orphan for now
            }
        } else {
            let fp = pkt.fingerprint.expect("non-dropped packet carries a fingerprint");
            self.pending.insert(fp, pkt);
        }
    }

    /// Packets that failed parsing never enter the hash index (no
    /// fingerprint to index by); they still need to ride the pipeline to
    /// the output manager so drop-filtered dump outputs can see them
    /// (§4.E step 3, reconciled with §5's "output manager is called from
    /// the matcher thread only" by routing them through the same frame
    /// queue instead of writing directly from the collector thread).
    pub fn append_drop(&mut self, pkt: Packet) {
        debug_assert!(pkt.drop_reason.is_some());
        self.packets.push(pkt);
    }

    /// Probes this frame's pending requests for a match to `pkt` (a
    /// response). Returns `Ok(())` if matched (ownership transferred into
    /// the matched request) or `Err(pkt)` to give the caller back
    /// ownership on a miss, so it can be tried against another frame or
    /// finally appended as an orphan.
    /// Pushes a response that missed every frame it was probed against, as
    /// a final orphan, without touching the pending request index.
    pub fn push_unmatched_response(&mut self, pkt: Packet) {
        self.packets.push(pkt);
    }

    pub fn match_response(&mut self, pkt: Packet) -> Result<(), Packet> {
        let fp = match pkt.fingerprint {
            Some(fp) => fp,
            None => return Err(pkt),
        };
        match self.pending.match_and_take(fp) {
            Some(mut req) => {
                req.paired = Some(Box::new(pkt));
                self.packets.push(req);
                Ok(())
            }
            None => Err(pkt),
        }
    }

    /// Flattens matched pairs, orphan responses, drop-routed packets, and
    /// now-final unmatched requests into arrival order for handoff to the
    /// frame queue.
    pub fn writeout(mut self) -> Vec<Packet> {
        let mut out = self.packets;
        for (_, pkt) in self.pending.drain() {
            out.push(pkt);
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty() && self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint;
    use crate::packet::{DnsFields, Endpoint};
    use std::net::{IpAddr, Ipv4Addr};

    fn endpoint(a: u8, b: u8, c: u8, d: u8, port: u16) -> Endpoint {
        Endpoint {
            ip: IpAddr::V4(Ipv4Addr::new(a, b, c, d)),
            port,
        }
    }

    fn make_packet(ts: i64, qr: bool, src: Endpoint, dst: Endpoint, id: u16) -> Packet {
        let fp = fingerprint::compute(&src, &dst, qr, id, "example.com", 1, 1);
        Packet {
            ts: UsTime(ts),
            wire_len: 10,
            cap_len: 10,
            data: vec![0; 10],
            src,
            dst,
            dns: Some(DnsFields {
                txn_id: id,
                qr,
                opcode: 0,
                rcode: 0,
                truncated: false,
                qname: "example.com".into(),
                qtype: 1,
                qclass: 1,
            }),
            fingerprint: Some(fp),
            drop_reason: None,
            paired: None,
        }
    }

    #[test]
    fn request_then_response_in_same_frame_matches() {
        let mut tf = Timeframe::create(UsTime(0), 4);
        let client = endpoint(10, 0, 0, 1, 5353);
        let server = endpoint(8, 8, 8, 8, 53);

        tf.append(make_packet(1_000_000, false, client, server, 42));
        tf.append(make_packet(1_010_000, true, server, client, 42));

        let out = tf.writeout();
        assert_eq!(out.len(), 1);
        assert!(out[0].paired.is_some());
    }

    #[test]
    fn unmatched_request_and_response_are_separate_orphans() {
        let mut tf = Timeframe::create(UsTime(0), 4);
        let client = endpoint(10, 0, 0, 1, 5353);
        let server = endpoint(8, 8, 8, 8, 53);

        tf.append(make_packet(1_000_000, false, client, server, 1));
        tf.append(make_packet(2_000_000, true, server, client, 2)); // different id, no match

        let out = tf.writeout();
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|p| p.paired.is_none()));
    }

    #[test]
    fn cross_frame_match_via_match_response_probe() {
        let mut tf_old = Timeframe::create(UsTime(0), 4);
        let client = endpoint(10, 0, 0, 1, 5353);
        let server = endpoint(8, 8, 8, 8, 53);
        tf_old.append(make_packet(999_990, false, client, server, 7));

        let response = make_packet(1_000_010, true, server, client, 7);
        let result = tf_old.match_response(response);
        assert!(result.is_ok());

        let out = tf_old.writeout();
        assert_eq!(out.len(), 1);
        assert!(out[0].paired.is_some());
    }

    #[test]
    fn append_drop_bypasses_hash_index() {
        let mut tf = Timeframe::create(UsTime(0), 4);
        let mut pkt = make_packet(1, false, endpoint(1, 1, 1, 1, 1), endpoint(2, 2, 2, 2, 2), 1);
        pkt.fingerprint = None;
        pkt.dns = None;
        pkt.mark_dropped(DropReason::Malformed);
        tf.append_drop(pkt);

        let out = tf.writeout();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].drop_reason, Some(DropReason::Malformed));
    }
}
