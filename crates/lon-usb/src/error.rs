use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UsbError {
    #[error("message length {0} exceeds the 255-byte code-packet payload limit")]
    MessageTooLong(usize),

    #[error("checksum mismatch: frame claimed {expected:#04x}, computed {actual:#04x}")]
    ChecksumMismatch { expected: u8, actual: u8 },

    #[error("frame too short: need at least {need} bytes, got {got}")]
    FrameTooShort { need: usize, got: usize },

    #[error("send queue ({0}) full, retry next pump iteration")]
    QueueFull(&'static str),

    #[error("interface unique-ID handshake exhausted all {0} retries")]
    UidHandshakeFailed(u32),

    #[error("ack timeout on sequence {0}, resyncing (NI_RESYNC)")]
    AckTimeout(u8),
}
