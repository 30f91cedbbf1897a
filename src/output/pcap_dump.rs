//! PCAP-dump encoder for dropped packets (§4.G), grounded directly on
//! `output_pcap.c`'s local, libpcap-independent header structs (kept
//! local here too, so compression can wrap the stream without needing a
//! real file descriptor for `libpcap` to write through).

use std::io::{self, Write};

use crate::output::Encoder;
use crate::packet::Packet;

const MAGIC: u32 = 0xa1b2c3d4;
const VERSION_MAJOR: u16 = 2;
const VERSION_MINOR: u16 = 4;
const LINKTYPE_RAW: u32 = 101;

pub struct PcapDumpEncoder {
    snaplen: u32,
}

impl PcapDumpEncoder {
    pub fn new(snaplen: u32) -> Self {
        PcapDumpEncoder { snaplen }
    }
}

impl Encoder for PcapDumpEncoder {
    fn write_header(&mut self, w: &mut dyn Write) -> io::Result<()> {
        w.write_all(&MAGIC.to_le_bytes())?;
        w.write_all(&VERSION_MAJOR.to_le_bytes())?;
        w.write_all(&VERSION_MINOR.to_le_bytes())?;
        w.write_all(&0i32.to_le_bytes())?; // thiszone
        w.write_all(&0u32.to_le_bytes())?; // sigfigs
        w.write_all(&self.snaplen.to_le_bytes())?;
        w.write_all(&LINKTYPE_RAW.to_le_bytes())
    }

    fn write_packet(&mut self, w: &mut dyn Write, pkt: &Packet) -> io::Result<()> {
        // snaplen only bounds capture at input time (`output_pcap.c`'s
        // `sf_hdr.caplen` is always the packet's own caplen); it never
        // retroactively truncates bytes already captured.
        w.write_all(&(pkt.ts.unix_secs() as u32).to_le_bytes())?;
        w.write_all(&(pkt.ts.unix_micros_of_sec() as u32).to_le_bytes())?;
        w.write_all(&pkt.cap_len.to_le_bytes())?;
        w.write_all(&pkt.wire_len.to_le_bytes())?;
        w.write_all(&pkt.data[..pkt.cap_len as usize])
    }
}
