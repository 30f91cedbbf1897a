//! CSV encoder (§6 "CSV output"): one header line, then one row per
//! delivered packet. Hand-rolled rather than pulled from the `csv` crate,
//! since every field here is either numeric or a qname already validated
//! free of control characters by the DNS parser — no quoting is needed.

use std::io::{self, Write};

use crate::output::Encoder;
use crate::packet::Packet;

const HEADER: &str = "timestamp,client_ip,client_port,server_ip,server_port,proto,qname,qtype,qclass,response_code,flags,request_len,response_len,delay_us,drop_reason\n";

#[derive(Default)]
pub struct CsvEncoder;

impl Encoder for CsvEncoder {
    fn write_header(&mut self, w: &mut dyn Write) -> io::Result<()> {
        w.write_all(HEADER.as_bytes())
    }

    fn write_packet(&mut self, w: &mut dyn Write, pkt: &Packet) -> io::Result<()> {
        let (client, server) = if pkt.is_response() {
            (pkt.dst, pkt.src)
        } else {
            (pkt.src, pkt.dst)
        };

        let (qname, qtype, qclass, response_code, flags) = match &pkt.dns {
            Some(d) => (
                d.qname.clone(),
                d.qtype.to_string(),
                d.qclass.to_string(),
                d.rcode.to_string(),
                format!("{}{}", if d.qr { "R" } else { "Q" }, if d.truncated { "T" } else { "" }),
            ),
            None => (String::new(), String::new(), String::new(), String::new(), String::new()),
        };

        let request_len = pkt.wire_len;
        let (response_len, delay_us) = match &pkt.paired {
            Some(resp) => (resp.wire_len.to_string(), (resp.ts - pkt.ts).to_string()),
            None => (String::new(), String::new()),
        };

        let drop_reason = pkt.drop_reason.map(|r| r.as_str()).unwrap_or("");

        writeln!(
            w,
            "{timestamp},{client_ip},{client_port},{server_ip},{server_port},udp,{qname},{qtype},{qclass},{response_code},{flags},{request_len},{response_len},{delay_us},{drop_reason}",
            timestamp = pkt.ts.to_fsec(),
            client_ip = client.ip,
            client_port = client.port,
            server_ip = server.ip,
            server_port = server.port,
        )
    }
}
