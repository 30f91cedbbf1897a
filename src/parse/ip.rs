//! Raw IP (v4/v6) decoding. Input is `DLT_RAW`: the slice starts at the IP
//! header, there is no link-layer framing (§6 "only link type raw IP is
//! accepted").

use etherparse::{Ipv4HeaderSlice, Ipv6HeaderSlice};
use std::net::IpAddr;

use crate::drop_reason::DropReason;

pub struct IpParsed<'a> {
    pub src: IpAddr,
    pub dst: IpAddr,
    pub payload: &'a [u8],
}

const PROTO_UDP: u8 = 17;
const IPV6_FRAGMENT_HEADER: u8 = 44;

pub fn parse(data: &[u8]) -> Result<IpParsed<'_>, DropReason> {
    if data.is_empty() {
        return Err(DropReason::Malformed);
    }

    match data[0] >> 4 {
        4 => parse_v4(data),
        6 => parse_v6(data),
        _ => Err(DropReason::NotIpv4OrIpv6),
    }
}

fn parse_v4(data: &[u8]) -> Result<IpParsed<'_>, DropReason> {
    let header = Ipv4HeaderSlice::from_slice(data).map_err(|_| DropReason::Malformed)?;

    let header_len = header.slice().len();
    let total_len = header.total_len() as usize;
    if total_len != data.len() || header_len > total_len {
        return Err(DropReason::Malformed);
    }

    // Only the initial, unfragmented datagram is accepted (§4.A).
    if header.more_fragments() || header.fragments_offset() != 0 {
        return Err(DropReason::Fragmented);
    }

    if header.protocol() != PROTO_UDP {
        return Err(DropReason::NotUdp);
    }

    Ok(IpParsed {
        src: IpAddr::V4(header.source_addr()),
        dst: IpAddr::V4(header.destination_addr()),
        payload: &data[header_len..total_len],
    })
}

fn parse_v6(data: &[u8]) -> Result<IpParsed<'_>, DropReason> {
    let header = Ipv6HeaderSlice::from_slice(data).map_err(|_| DropReason::Malformed)?;

    let header_len = header.slice().len();
    let total_len = header_len + header.payload_length() as usize;
    if total_len != data.len() {
        return Err(DropReason::Malformed);
    }

    if header.next_header() == IPV6_FRAGMENT_HEADER {
        return Err(DropReason::Fragmented);
    }

    if header.next_header() != PROTO_UDP {
        return Err(DropReason::NotUdp);
    }

    Ok(IpParsed {
        src: IpAddr::V6(header.source_addr()),
        dst: IpAddr::V6(header.destination_addr()),
        payload: &data[header_len..total_len],
    })
}
