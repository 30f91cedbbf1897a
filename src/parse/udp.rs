//! UDP header decoding. Only UDP is accepted as a DNS transport (§4.A);
//! TCP DNS is out of scope.

use crate::drop_reason::DropReason;

const UDP_HEADER_LEN: usize = 8;

pub struct UdpParsed<'a> {
    pub src_port: u16,
    pub dst_port: u16,
    pub payload: &'a [u8],
}

pub fn parse(data: &[u8]) -> Result<UdpParsed<'_>, DropReason> {
    if data.len() < UDP_HEADER_LEN {
        return Err(DropReason::BadUdp);
    }

    let src_port = u16::from_be_bytes([data[0], data[1]]);
    let dst_port = u16::from_be_bytes([data[2], data[3]]);
    let udp_len = u16::from_be_bytes([data[4], data[5]]) as usize;

    if udp_len < UDP_HEADER_LEN || udp_len > data.len() {
        return Err(DropReason::BadUdp);
    }

    Ok(UdpParsed {
        src_port,
        dst_port,
        payload: &data[UDP_HEADER_LEN..udp_len],
    })
}
