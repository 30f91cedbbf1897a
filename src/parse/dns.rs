//! DNS header and first-question decoding (§4.A). RR sections are never
//! decoded. Qname compression pointers resolve with a loop bound equal to
//! the remaining message length; any revisit or overrun is `bad_dns`.

use crate::drop_reason::DropReason;
use crate::packet::DnsFields;

const HEADER_LEN: usize = 12;

pub fn parse(msg: &[u8]) -> Result<DnsFields, DropReason> {
    if msg.len() < HEADER_LEN {
        return Err(DropReason::BadDns);
    }

    let txn_id = u16::from_be_bytes([msg[0], msg[1]]);
    let flags = u16::from_be_bytes([msg[2], msg[3]]);
    let qdcount = u16::from_be_bytes([msg[4], msg[5]]);

    if qdcount == 0 {
        return Err(DropReason::BadDns);
    }

    let qr = flags & 0x8000 != 0;
    let opcode = ((flags >> 11) & 0x0F) as u8;
    let truncated = flags & 0x0200 != 0;
    let rcode = (flags & 0x000F) as u8;

    let (qname, after_qname) = decode_qname(msg, HEADER_LEN)?;

    if after_qname + 4 > msg.len() {
        return Err(DropReason::BadDns);
    }
    let qtype = u16::from_be_bytes([msg[after_qname], msg[after_qname + 1]]);
    let qclass = u16::from_be_bytes([msg[after_qname + 2], msg[after_qname + 3]]);

    Ok(DnsFields {
        txn_id,
        qr,
        opcode,
        rcode,
        truncated,
        qname,
        qtype,
        qclass,
    })
}

/// Decodes a (possibly pointer-compressed) qname starting at `start`.
/// Returns the lowercased, dot-joined name and the offset immediately
/// following the qname *in the original, non-jumped stream*.
fn decode_qname(msg: &[u8], start: usize) -> Result<(String, usize), DropReason> {
    let mut labels: Vec<u8> = Vec::new();
    let mut pos = start;
    let mut jumped = false;
    let mut end_pos = None;
    // Bounds the number of compression jumps we'll follow; since each jump
    // must strictly decrease `pos`, this can never be exceeded by a
    // well-formed message, but it caps worst-case work on adversarial input.
    let max_iterations = msg.len() + 1;
    let mut iterations = 0;

    loop {
        iterations += 1;
        if iterations > max_iterations {
            return Err(DropReason::BadDns);
        }
        if pos >= msg.len() {
            return Err(DropReason::BadDns);
        }

        let len_byte = msg[pos];

        if len_byte == 0 {
            if !jumped {
                end_pos = Some(pos + 1);
            }
            break;
        }

        if len_byte & 0xC0 == 0xC0 {
            if pos + 1 >= msg.len() {
                return Err(DropReason::BadDns);
            }
            let target = (((len_byte as usize) & 0x3F) << 8) | msg[pos + 1] as usize;
            if !jumped {
                end_pos = Some(pos + 2);
            }
            // Pointers must point strictly backwards; this alone rules out
            // cycles (a revisit would require a non-decreasing jump).
            if target >= pos {
                return Err(DropReason::BadDns);
            }
            pos = target;
            jumped = true;
            continue;
        }

        if len_byte & 0xC0 != 0 {
            // Reserved label-length prefix bits.
            return Err(DropReason::BadDns);
        }

        let label_len = len_byte as usize;
        let label_start = pos + 1;
        let label_end = label_start + label_len;
        if label_end > msg.len() {
            return Err(DropReason::BadDns);
        }

        if !labels.is_empty() {
            labels.push(b'.');
        }
        labels.extend(msg[label_start..label_end].iter().map(|b| b.to_ascii_lowercase()));
        pos = label_end;
    }

    let qname = String::from_utf8_lossy(&labels).into_owned();
    Ok((qname, end_pos.expect("set before breaking out of the loop")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_name(name: &str) -> Vec<u8> {
        let mut buf = Vec::new();
        for label in name.split('.') {
            buf.push(label.len() as u8);
            buf.extend_from_slice(label.as_bytes());
        }
        buf.push(0);
        buf
    }

    fn header(id: u16, flags: u16, qdcount: u16) -> Vec<u8> {
        let mut h = vec![0u8; 12];
        h[0..2].copy_from_slice(&id.to_be_bytes());
        h[2..4].copy_from_slice(&flags.to_be_bytes());
        h[4..6].copy_from_slice(&qdcount.to_be_bytes());
        h
    }

    #[test]
    fn parses_simple_query() {
        let mut msg = header(7, 0x0100, 1);
        msg.extend(encode_name("Example.COM"));
        msg.extend_from_slice(&1u16.to_be_bytes());
        msg.extend_from_slice(&1u16.to_be_bytes());

        let fields = parse(&msg).unwrap();
        assert_eq!(fields.txn_id, 7);
        assert!(!fields.qr);
        assert_eq!(fields.qname, "example.com");
        assert_eq!(fields.qtype, 1);
        assert_eq!(fields.qclass, 1);
    }

    #[test]
    fn resolves_compression_pointer() {
        // Message: [header][root name "a.test" at offset 12][pointer to 12 for the question]
        let mut msg = header(1, 0x8000, 1);
        let name_offset = msg.len();
        msg.extend(encode_name("a.test"));
        // pointer back to name_offset
        let ptr = 0xC000u16 | (name_offset as u16);
        msg.extend_from_slice(&ptr.to_be_bytes());
        msg.extend_from_slice(&1u16.to_be_bytes());
        msg.extend_from_slice(&1u16.to_be_bytes());

        let fields = parse(&msg).unwrap();
        assert_eq!(fields.qname, "a.test");
        assert!(fields.qr);
    }

    #[test]
    fn forward_pointer_is_bad_dns() {
        let mut msg = header(1, 0, 1);
        // pointer to an offset ahead of itself
        let ptr = 0xC000u16 | 100;
        msg.extend_from_slice(&ptr.to_be_bytes());
        assert_eq!(parse(&msg).unwrap_err(), DropReason::BadDns);
    }

    #[test]
    fn zero_qdcount_is_bad_dns() {
        let msg = header(1, 0, 0);
        assert_eq!(parse(&msg).unwrap_err(), DropReason::BadDns);
    }

    #[test]
    fn truncated_label_overruns_message() {
        let mut msg = header(1, 0, 1);
        msg.push(10); // claims a 10-byte label
        msg.extend_from_slice(b"ab"); // only 2 bytes present
        assert_eq!(parse(&msg).unwrap_err(), DropReason::BadDns);
    }
}
