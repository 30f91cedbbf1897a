//! Packet parsing: raw IP datagram → UDP → DNS (§4.A).
//!
//! The pipeline is strict: any length-field inconsistency is a drop, never
//! a panic. Each stage returns a [`DropReason`] on failure so the collector
//! can route the datagram to drop-filtered outputs instead of discarding it
//! silently.

pub mod dns;
pub mod ip;
pub mod udp;

use crate::clock::UsTime;
use crate::drop_reason::DropReason;
use crate::fingerprint;
use crate::packet::Packet;

/// Parses a raw captured datagram (DLT_RAW: the bytes start at the IP
/// header) into a [`Packet`]. On any drop condition the returned packet
/// carries `drop_reason` set and `dns`/`fingerprint` left `None`; the
/// packet is still produced (never discarded outright) so dump outputs
/// can retain it.
pub fn parse_packet(data: &[u8], ts: UsTime, cap_len: u32, wire_len: u32) -> Packet {
    let mut pkt = Packet {
        ts,
        wire_len,
        cap_len,
        data: data.to_vec(),
        src: crate::packet::Endpoint {
            ip: std::net::IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED),
            port: 0,
        },
        dst: crate::packet::Endpoint {
            ip: std::net::IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED),
            port: 0,
        },
        dns: None,
        fingerprint: None,
        drop_reason: None,
        paired: None,
    };

    if let Err(reason) = parse_inner(data, &mut pkt) {
        pkt.mark_dropped(reason);
    }

    pkt
}

fn parse_inner(data: &[u8], pkt: &mut Packet) -> Result<(), DropReason> {
    let ip_info = ip::parse(data)?;
    pkt.src.ip = ip_info.src;
    pkt.dst.ip = ip_info.dst;

    let udp_info = udp::parse(ip_info.payload)?;
    pkt.src.port = udp_info.src_port;
    pkt.dst.port = udp_info.dst_port;

    if udp_info.src_port != 53 && udp_info.dst_port != 53 {
        return Err(DropReason::NotDns);
    }

    let fields = dns::parse(udp_info.payload)?;

    let fp = fingerprint::compute(
        &pkt.src,
        &pkt.dst,
        fields.qr,
        fields.txn_id,
        &fields.qname,
        fields.qtype,
        fields.qclass,
    );

    pkt.dns = Some(fields);
    pkt.fingerprint = Some(fp);
    Ok(())
}
