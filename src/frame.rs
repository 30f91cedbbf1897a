//! The unit exchanged across the frame queue (§3 "Frame queue", §4.D).

use crate::clock::UsTime;
use crate::packet::Packet;

/// A batch of packets spanning `[time_start, time_end)`.
pub struct Frame {
    pub time_start: UsTime,
    pub time_end: UsTime,
    pub packets: Vec<Packet>,
}

impl Frame {
    pub fn new(time_start: UsTime, time_end: UsTime, packets: Vec<Packet>) -> Self {
        Frame {
            time_start,
            time_end,
            packets,
        }
    }
}

/// Message carried on the frame queue: either a data frame or the
/// end-of-input sentinel (§3, §4.D). After the sentinel is dequeued, no
/// further calls on the queue are valid (enforced by `FrameQueue`).
pub enum FrameMessage {
    Data(Frame),
    Final,
}
