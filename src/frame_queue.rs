//! Bounded blocking single-producer/single-consumer frame handoff (§4.D).
//!
//! `std::sync::mpsc::sync_channel` already provides exactly this contract
//! (bounded capacity, blocking send/recv, strict FIFO) without a hand-rolled
//! mutex/condvar pair, the same way the teacher reaches for a
//! `sync_channel` for its bounded, timeout-bearing reverse-DNS lookups.

use std::sync::mpsc::{self, Receiver, RecvError, SendError, SyncSender};

use crate::frame::FrameMessage;

pub struct FrameQueueSender {
    tx: SyncSender<FrameMessage>,
}

pub struct FrameQueueReceiver {
    rx: Receiver<FrameMessage>,
    finished: bool,
}

/// Default capacity per §4.D.
pub const DEFAULT_CAPACITY: usize = 8;

pub fn frame_queue(capacity: usize) -> (FrameQueueSender, FrameQueueReceiver) {
    let (tx, rx) = mpsc::sync_channel(capacity.max(1));
    (
        FrameQueueSender { tx },
        FrameQueueReceiver {
            rx,
            finished: false,
        },
    )
}

impl FrameQueueSender {
    /// Blocks the producer when the queue is full.
    pub fn enqueue(&self, msg: FrameMessage) -> Result<(), SendError<FrameMessage>> {
        self.tx.send(msg)
    }
}

impl FrameQueueReceiver {
    /// Blocks the consumer when the queue is empty. Returns `None` once
    /// the final sentinel has been observed; calling again afterwards is a
    /// programming error and also returns `None`.
    pub fn dequeue(&mut self) -> Option<FrameMessage> {
        if self.finished {
            return None;
        }
        match self.rx.recv() {
            Ok(FrameMessage::Final) => {
                self.finished = true;
                Some(FrameMessage::Final)
            }
            Ok(msg) => Some(msg),
            Err(RecvError) => {
                self.finished = true;
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::UsTime;
    use crate::frame::Frame;

    #[test]
    fn fifo_ordering_preserved() {
        let (tx, mut rx) = frame_queue(4);
        for i in 0..3 {
            tx.enqueue(FrameMessage::Data(Frame::new(UsTime(i), UsTime(i + 1), Vec::new())))
                .unwrap();
        }
        tx.enqueue(FrameMessage::Final).unwrap();

        for i in 0..3 {
            match rx.dequeue() {
                Some(FrameMessage::Data(f)) => assert_eq!(f.time_start.0, i),
                _ => panic!("expected data frame at index {i}"),
            }
        }
        assert!(matches!(rx.dequeue(), Some(FrameMessage::Final)));
        assert!(rx.dequeue().is_none());
    }

    #[test]
    fn blocks_producer_when_full_and_unblocks_on_consume() {
        let (tx, mut rx) = frame_queue(1);
        tx.enqueue(FrameMessage::Data(Frame::new(UsTime(0), UsTime(1), Vec::new())))
            .unwrap();

        let tx2 = tx;
        let handle = std::thread::spawn(move || {
            tx2.enqueue(FrameMessage::Data(Frame::new(UsTime(1), UsTime(2), Vec::new())))
                .unwrap();
        });

        // Drain the first frame, which unblocks the spawned producer.
        assert!(matches!(rx.dequeue(), Some(FrameMessage::Data(_))));
        handle.join().unwrap();
        assert!(matches!(rx.dequeue(), Some(FrameMessage::Data(_))));
    }
}
