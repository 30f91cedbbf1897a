//! Matcher worker (§4.F): the single consumer of the frame queue.
//!
//! The original C left this stage's hash/queue interaction as an open
//! `// TODO` (`worker_packet_matcher.c`); Rust's ownership rules also rule
//! out its intrusive-list approach directly, so in-flight requests are
//! shared between the FIFO expiry queue and the hash index as
//! `Rc<RefCell<Packet>>` nodes. A request is removed from the index the
//! moment it's matched (by `match_and_take`) but stays in the queue until
//! its original expiry — matched pairs wait out the full matching window
//! before being flushed, same as an unmatched request would. Because both
//! structures are fed in arrival order and the index always yields the
//! oldest entry for a fingerprint, the queue's head, if still present in
//! the index, is always that same entry: `Rc::strong_count` tells us
//! whether the index side still needs clearing before we can reclaim the
//! packet with `Rc::try_unwrap`.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use log::warn;

use crate::clock::UsTime;
use crate::config::Config;
use crate::drop_reason::DropReason;
use crate::frame::{Frame, FrameMessage};
use crate::frame_queue::FrameQueueReceiver;
use crate::hash_index::PacketHashIndex;
use crate::output::OutputManager;
use crate::packet::Packet;

type Node = Rc<RefCell<Packet>>;

pub struct Matcher {
    matching_window: i64,
    frame_max_duration: i64,
    frame_max_size: usize,
    index: PacketHashIndex<Node>,
    queue: VecDeque<Node>,
    out_time_start: UsTime,
    out_packets: Vec<Packet>,
    out_size: usize,
    now: UsTime,
}

impl Matcher {
    pub fn new(config: &Config) -> Self {
        Matcher {
            matching_window: UsTime::from_fsec(config.matching_window_sec).0,
            frame_max_duration: UsTime::from_fsec(config.frame_max_duration_sec).0,
            frame_max_size: config.frame_max_size,
            index: PacketHashIndex::new(config.hash_order),
            queue: VecDeque::new(),
            out_time_start: UsTime::ZERO,
            out_packets: Vec::new(),
            out_size: 0,
            now: UsTime::ZERO,
        }
    }

    /// Drives the matcher to completion, reading frames off `rx` and
    /// delivering finished packets to `outputs`. Returns once the final
    /// sentinel has been observed and drained.
    pub fn run(mut self, mut rx: FrameQueueReceiver, mut outputs: OutputManager) -> crate::error::Result<()> {
        let mut started = false;
        while let Some(msg) = rx.dequeue() {
            match msg {
                FrameMessage::Data(frame) => {
                    if !started {
                        self.out_time_start = frame.time_start;
                        started = true;
                    }
                    self.ingest_frame(frame, &mut outputs)?;
                }
                FrameMessage::Final => {
                    let drain_to = self.now.checked_add_micros(self.matching_window + 1);
                    self.advance_time_to(drain_to, &mut outputs)?;
                    self.flush_output_frame(self.now, &mut outputs)?;
                    break;
                }
            }
        }
        outputs.shutdown()
    }

    fn ingest_frame(&mut self, frame: Frame, outputs: &mut OutputManager) -> crate::error::Result<()> {
        for pkt in frame.packets {
            self.advance_time_to(pkt.ts, outputs)?;
            self.insert(pkt, outputs)?;
        }
        Ok(())
    }

    fn insert(&mut self, pkt: Packet, outputs: &mut OutputManager) -> crate::error::Result<()> {
        if pkt.ts < self.now {
            warn!(
                "late packet at {:?}, current clock at {:?}; processing without rewinding",
                pkt.ts, self.now
            );
        }

        if pkt.is_dropped() || pkt.paired.is_some() {
            // Either unparseable, or already resolved by the collector's own
            // cross-frame probe (§4.C) — nothing left for this stage to do.
            let ts = pkt.ts;
            return self.append_to_output(pkt, ts, outputs);
        }

        let fp = match pkt.fingerprint {
            Some(fp) => fp,
            None => {
                let ts = pkt.ts;
                return self.append_to_output(pkt, ts, outputs);
            }
        };

        if pkt.is_response() {
            match self.index.match_and_take(fp) {
                Some(node) => {
                    node.borrow_mut().paired = Some(Box::new(pkt));
                    Ok(())
                }
                None => {
                    let ts = pkt.ts;
                    self.append_to_output(pkt, ts, outputs)
                }
            }
        } else {
            let node: Node = Rc::new(RefCell::new(pkt));
            self.index.insert(fp, Rc::clone(&node));
            self.queue.push_back(node);
            Ok(())
        }
    }

    /// Processes expiry/frame-boundary events until the logical clock
    /// reaches `target` (§4.F). On an exact tie the frame boundary fires
    /// first, so empty frames get emitted to keep the timeline continuous.
    fn advance_time_to(&mut self, target: UsTime, outputs: &mut OutputManager) -> crate::error::Result<()> {
        loop {
            let boundary = self.out_time_start.checked_add_micros(self.frame_max_duration);
            let expiry = self.head_expiry();

            let boundary_due = boundary <= target;
            let expiry_due = expiry.map(|e| e <= target).unwrap_or(false);

            if !boundary_due && !expiry_due {
                break;
            }

            if boundary_due && (!expiry_due || boundary <= expiry.unwrap()) {
                self.flush_output_frame(boundary, outputs)?;
                self.out_time_start = boundary;
            } else {
                self.pop_expired(outputs)?;
            }
        }
        self.now = target;
        Ok(())
    }

    fn head_expiry(&self) -> Option<UsTime> {
        self.queue
            .front()
            .map(|node| node.borrow().ts.checked_add_micros(self.matching_window))
    }

    fn pop_expired(&mut self, outputs: &mut OutputManager) -> crate::error::Result<()> {
        let ev_time = match self.head_expiry() {
            Some(t) => t,
            None => return Ok(()),
        };
        let node = self.queue.pop_front().expect("head_expiry implies a non-empty queue");

        let fp = node.borrow().fingerprint;
        if Rc::strong_count(&node) > 1 {
            if let Some(fp) = fp {
                let _ = self.index.match_and_take(fp);
            }
        }

        let mut pkt = Rc::try_unwrap(node)
            .unwrap_or_else(|_| unreachable!("matcher node outlives both the queue and the index"))
            .into_inner();
        if pkt.paired.is_none() {
            pkt.mark_dropped(DropReason::QrNotMatched);
        }
        self.append_to_output(pkt, ev_time, outputs)
    }

    /// `ev_time` is the event that triggered this delivery: the packet's
    /// own arrival time when appended directly, or `head(queue).ts +
    /// matching_window` when delivered via expiry (§4.F) — a size-triggered
    /// split opens the next output frame at `ev_time`, not the packet's
    /// raw timestamp.
    fn append_to_output(&mut self, pkt: Packet, ev_time: UsTime, outputs: &mut OutputManager) -> crate::error::Result<()> {
        if self.out_size + pkt.memory_size() > self.frame_max_size && !self.out_packets.is_empty() {
            self.flush_output_frame(ev_time, outputs)?;
        }
        self.out_size += pkt.memory_size();
        self.out_packets.push(pkt);
        Ok(())
    }

    fn flush_output_frame(&mut self, time_end: UsTime, outputs: &mut OutputManager) -> crate::error::Result<()> {
        let packets = std::mem::take(&mut self.out_packets);
        self.out_size = 0;
        for pkt in &packets {
            outputs.deliver(pkt)?;
        }
        self.out_time_start = time_end;
        Ok(())
    }
}
