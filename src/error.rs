//! Fatal error taxonomy (§7). Per-packet drops are never represented here;
//! see [`crate::drop_reason::DropReason`].

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CollectorError {
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("all configured outputs are unwritable")]
    AllOutputsUnwritable,

    #[error("frame queue deadlock detected")]
    QueueDeadlock,

    #[error("unsupported pcap link type: {0} (only DLT_RAW is supported)")]
    UnsupportedLinkType(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("pcap error: {0}")]
    Pcap(String),
}

pub type Result<T> = std::result::Result<T, CollectorError>;
