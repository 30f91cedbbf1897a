//! Collector (§4.E): drives the input adapter and the timeframe rotation
//! state machine, handing completed frames to the matcher over the frame
//! queue. Runs on its own thread; all parsing happens here (§5).

use std::sync::{Arc, Mutex};

use log::{error, info};

use crate::clock::UsTime;
use crate::config::Config;
use crate::error::{CollectorError, Result};
use crate::frame::{Frame, FrameMessage};
use crate::frame_queue::FrameQueueSender;
use crate::input::{pcap_file::PcapFileAdapter, InputAdapter, NextOutcome};
use crate::parse::parse_packet;
use crate::stats::CollectorStats;
use crate::timeframe::Timeframe;

/// Shared with the matcher thread so a fatal matcher-side error can stop
/// the collector early (§7: "the matcher thread, on fatal, enqueues a
/// sentinel tagged error so the collector can observe it and stop").
/// There is no frame-queue channel running matcher → collector, so this
/// flag is the one piece of state the two threads touch concurrently.
pub type FatalFlag = Arc<Mutex<Option<CollectorError>>>;

pub struct Collector {
    config: Arc<Config>,
    tx: FrameQueueSender,
    fatal: FatalFlag,
    stats: CollectorStats,
    tf_cur: Option<Timeframe>,
    tf_old: Option<Timeframe>,
}

impl Collector {
    pub fn new(config: Arc<Config>, tx: FrameQueueSender, fatal: FatalFlag) -> Self {
        Collector {
            config,
            tx,
            fatal,
            stats: CollectorStats::default(),
            tf_cur: None,
            tf_old: None,
        }
    }

    pub fn stats(&self) -> &CollectorStats {
        &self.stats
    }

    /// Runs every configured input to completion, then enqueues the final
    /// sentinel. Returns `Ok` even if some inputs were skipped (§7
    /// "Recoverable input"); only a fatal condition returns `Err`.
    pub fn run(mut self) -> Result<CollectorStats> {
        let frame_len = UsTime::from_fsec(self.config.timeframe_length_sec).0;

        for path in self.config.inputs.clone() {
            if self.check_fatal_flag()? {
                break;
            }

            let mut adapter = match PcapFileAdapter::open(&path, self.config.capture_limit as usize) {
                Ok(a) => a,
                Err(e) => {
                    error!("input {path} unreadable, skipping: {e}");
                    self.stats.record_input_skipped();
                    continue;
                }
            };

            if let Err(e) = self.drain_input(&mut adapter, frame_len) {
                error!("fatal error draining input {path}: {e}");
                self.tx.enqueue(FrameMessage::Final).ok();
                return Err(e);
            }
        }

        self.rotate_all(UsTime(i64::MAX))?;
        self.tx
            .enqueue(FrameMessage::Final)
            .map_err(|_| CollectorError::QueueDeadlock)?;
        info!(
            "collector done: {} captured, {} dropped, {} inputs skipped",
            self.stats.packets_captured, self.stats.packets_dropped, self.stats.inputs_skipped
        );
        Ok(self.stats)
    }

    fn check_fatal_flag(&self) -> Result<bool> {
        let guard = self.fatal.lock().unwrap();
        Ok(guard.is_some())
    }

    fn drain_input(&mut self, adapter: &mut dyn InputAdapter, frame_len: i64) -> Result<()> {
        loop {
            if self.check_fatal_flag()? {
                return Ok(());
            }
            match adapter.next()? {
                NextOutcome::Packet(raw) => {
                    self.ensure_timeframe_for(raw.ts, frame_len)?;

                    let pkt = parse_packet(&raw.data, raw.ts, raw.cap_len, raw.wire_len);
                    self.stats.record_capture();
                    if let Some(reason) = pkt.drop_reason {
                        self.stats.record_drop(reason);
                        self.tf_cur.as_mut().unwrap().append_drop(pkt);
                        continue;
                    }

                    if pkt.is_response() {
                        self.route_response(pkt);
                    } else {
                        self.tf_cur.as_mut().unwrap().append(pkt);
                    }
                }
                NextOutcome::Timeout => continue,
                NextOutcome::End => return Ok(()),
            }
        }
    }

    /// Probes `tf_old` first, then `tf_cur`, finally giving up and
    /// recording the response as an orphan in the current frame (§4.C).
    fn route_response(&mut self, pkt: crate::packet::Packet) {
        let pkt = match self.tf_old.as_mut() {
            Some(tf_old) => match tf_old.match_response(pkt) {
                Ok(()) => return,
                Err(pkt) => pkt,
            },
            None => pkt,
        };
        match self.tf_cur.as_mut().unwrap().match_response(pkt) {
            Ok(()) => {}
            Err(pkt) => self.tf_cur.as_mut().unwrap().push_unmatched_response(pkt),
        }
    }

    /// Gap-filling rotation loop (§4.E): opens timeframes back-to-back
    /// until one whose span covers `ts` is current, so idle periods still
    /// produce the right number of (possibly empty) rotations.
    fn ensure_timeframe_for(&mut self, ts: UsTime, frame_len: i64) -> Result<()> {
        if self.tf_cur.is_none() {
            self.tf_cur = Some(Timeframe::create(ts, self.config.hash_order));
        }

        while self.tf_cur.as_ref().unwrap().time_start.checked_add_micros(frame_len) <= ts {
            let next_start = self.tf_cur.as_ref().unwrap().time_start.checked_add_micros(frame_len);
            self.rotate(next_start)?;
        }
        Ok(())
    }

    fn rotate(&mut self, next_start: UsTime) -> Result<()> {
        let mut finishing = self.tf_cur.take().expect("rotate called with no current timeframe");
        finishing.seal(next_start);

        let outgoing = self.tf_old.replace(finishing);
        if let Some(tf) = outgoing {
            let time_start = tf.time_start;
            let time_end = tf.time_end;
            let packets = tf.writeout();
            self.tx
                .enqueue(FrameMessage::Data(Frame::new(time_start, time_end, packets)))
                .map_err(|_| CollectorError::QueueDeadlock)?;
        }

        self.tf_cur = Some(Timeframe::create(next_start, self.config.hash_order));
        Ok(())
    }

    fn rotate_all(&mut self, sentinel: UsTime) -> Result<()> {
        if let Some(mut tf) = self.tf_cur.take() {
            tf.seal(sentinel);
            if let Some(old) = self.tf_old.take() {
                let time_start = old.time_start;
                let time_end = old.time_end;
                let packets = old.writeout();
                self.tx
                    .enqueue(FrameMessage::Data(Frame::new(time_start, time_end, packets)))
                    .map_err(|_| CollectorError::QueueDeadlock)?;
            }
            let time_start = tf.time_start;
            let time_end = tf.time_end;
            let packets = tf.writeout();
            self.tx
                .enqueue(FrameMessage::Data(Frame::new(time_start, time_end, packets)))
                .map_err(|_| CollectorError::QueueDeadlock)?;
        }
        Ok(())
    }
}
