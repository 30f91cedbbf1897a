//! Output manager (§4.G): per-target rotation, drop-reason filtering, and
//! dispatch to an encoder. Called from the matcher thread only (§5);
//! nothing here is `Send`-shared across threads.

pub mod csv;
pub mod pcap_dump;
pub mod proto;

use std::fs::File;
use std::io::{self, BufWriter, Write};

use flate2::write::GzEncoder;
use flate2::Compression;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::clock::UsTime;
use crate::config::OutputCommonConfig;
use crate::drop_reason::DropReasonSet;
use crate::error::{CollectorError, Result};
use crate::packet::Packet;

/// An encoder owns only the wire format; rotation, filtering and the file
/// handle itself are common to every output kind (§4.G).
pub trait Encoder {
    /// Called once per opened file, before any packet is written.
    fn write_header(&mut self, w: &mut dyn Write) -> io::Result<()>;
    fn write_packet(&mut self, w: &mut dyn Write, pkt: &Packet) -> io::Result<()>;
    /// Called once before a file is closed, e.g. to emit a trailer.
    fn write_trailer(&mut self, _w: &mut dyn Write) -> io::Result<()> {
        Ok(())
    }
}

/// Counts bytes written through it, so rotation-by-size (`max_bytes`)
/// doesn't need to query filesystem metadata mid-write.
struct CountingWriter<W: Write> {
    inner: W,
    written: u64,
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

fn expand_path_template(template: &str, ts: UsTime) -> String {
    let dt = OffsetDateTime::from_unix_timestamp(ts.unix_secs()).unwrap_or(OffsetDateTime::UNIX_EPOCH);
    let stamp = dt.format(&Rfc3339).unwrap_or_else(|_| ts.unix_secs().to_string());
    let stamp = stamp.replace(':', "-"); // keep generated paths shell- and filesystem-friendly
    template.replace("{ts}", &stamp)
}

/// A file sink that knows how to finalize itself on close — plain writes
/// need nothing beyond a flush, but a gzip stream must write its trailer
/// via `GzEncoder::finish` (§4.G: "closing writes any encoder-specific
/// trailer").
trait StreamSink: Write + Send {
    fn finish(self: Box<Self>) -> io::Result<()>;
}

impl StreamSink for BufWriter<File> {
    fn finish(self: Box<Self>) -> io::Result<()> {
        Ok(())
    }
}

impl StreamSink for GzEncoder<BufWriter<File>> {
    fn finish(self: Box<Self>) -> io::Result<()> {
        (*self).finish().map(|_| ())
    }
}

fn open_target(path: &str, compression: bool) -> io::Result<Box<dyn StreamSink>> {
    let file = File::create(path)?;
    let buffered = BufWriter::new(file);
    if compression {
        Ok(Box::new(GzEncoder::new(buffered, Compression::default())))
    } else {
        Ok(Box::new(buffered))
    }
}

/// One rotating output target (§4.G / §3 "Output").
pub struct Output<E: Encoder> {
    name: String,
    path_template: String,
    period: UsTime,
    max_bytes: u64,
    compression: bool,
    filter: DropReasonSet,
    encoder: E,
    current: Option<CountingWriter<Box<dyn StreamSink>>>,
    current_period_start: UsTime,
}

impl<E: Encoder> Output<E> {
    pub fn new(name: impl Into<String>, common: &OutputCommonConfig, global_filter: DropReasonSet, encoder: E) -> Self {
        let mut filter = DropReasonSet(common.drop_reasons_bitmap);
        filter.0 |= global_filter.0;
        Output {
            name: name.into(),
            path_template: common.path_template.clone(),
            period: UsTime::from_fsec(common.period_sec),
            max_bytes: common.max_bytes,
            compression: common.compression,
            filter,
            encoder,
            current: None,
            current_period_start: UsTime::ZERO,
        }
    }

    fn check_rotation(&mut self, ts: UsTime) -> Result<()> {
        let needs_rotation = match &self.current {
            None => true,
            Some(w) => {
                ts - self.current_period_start >= self.period.0 || w.written >= self.max_bytes
            }
        };
        if needs_rotation {
            self.close()?;
            let path = expand_path_template(&self.path_template, ts);
            let writer = open_target(&path, self.compression).map_err(CollectorError::Io)?;
            let mut counting = CountingWriter { inner: writer, written: 0 };
            self.encoder
                .write_header(&mut counting)
                .map_err(CollectorError::Io)?;
            self.current = Some(counting);
            self.current_period_start = ts;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if let Some(mut w) = self.current.take() {
            self.encoder.write_trailer(&mut w).map_err(CollectorError::Io)?;
            w.flush().map_err(CollectorError::Io)?;
            w.inner.finish().map_err(CollectorError::Io)?;
        }
        Ok(())
    }

    /// Delivers one packet, applying rotation and the drop-reason filter
    /// (§4.G).
    pub fn deliver(&mut self, pkt: &Packet) -> Result<()> {
        if let Some(reason) = pkt.drop_reason {
            if !self.filter.contains(reason) {
                return Ok(());
            }
        }
        self.check_rotation(pkt.ts)?;
        if let Some(w) = &mut self.current {
            self.encoder.write_packet(w, pkt).map_err(CollectorError::Io)?;
        }
        Ok(())
    }

    pub fn shutdown(&mut self) -> Result<()> {
        self.close()
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Fans a packet out to every configured output. Owned and driven
/// exclusively by the matcher thread (§5).
pub struct OutputManager {
    csv: Vec<Output<csv::CsvEncoder>>,
    proto: Vec<Output<proto::ProtoEncoder>>,
    pcap: Vec<Output<pcap_dump::PcapDumpEncoder>>,
}

impl OutputManager {
    pub fn new(
        csv: Vec<Output<csv::CsvEncoder>>,
        proto: Vec<Output<proto::ProtoEncoder>>,
        pcap: Vec<Output<pcap_dump::PcapDumpEncoder>>,
    ) -> Result<Self> {
        if csv.is_empty() && proto.is_empty() && pcap.is_empty() {
            return Err(CollectorError::AllOutputsUnwritable);
        }
        Ok(OutputManager { csv, proto, pcap })
    }

    pub fn deliver(&mut self, pkt: &Packet) -> Result<()> {
        let mut any_ok = self.csv.is_empty() && self.proto.is_empty() && self.pcap.is_empty();
        for o in &mut self.csv {
            if o.deliver(pkt).is_ok() {
                any_ok = true;
            }
        }
        for o in &mut self.proto {
            if o.deliver(pkt).is_ok() {
                any_ok = true;
            }
        }
        for o in &mut self.pcap {
            if o.deliver(pkt).is_ok() {
                any_ok = true;
            }
        }
        if any_ok {
            Ok(())
        } else {
            Err(CollectorError::AllOutputsUnwritable)
        }
    }

    pub fn shutdown(&mut self) -> Result<()> {
        for o in &mut self.csv {
            o.shutdown()?;
        }
        for o in &mut self.proto {
            o.shutdown()?;
        }
        for o in &mut self.pcap {
            o.shutdown()?;
        }
        Ok(())
    }
}
