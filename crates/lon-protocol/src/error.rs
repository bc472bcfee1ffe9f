use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("payload length {0} outside 0..=228")]
    InvalidMessageLength(usize),

    #[error("invalid address-format code {0:#04x}")]
    InvalidAddressFormat(u8),

    #[error("frame too short: need at least {need} bytes, got {got}")]
    FrameTooShort { need: usize, got: usize },

    #[error("transaction control sublayer has no free entry")]
    NoFreeEntry,

    #[error("all retries exhausted without completion")]
    TooManyRetries,

    #[error("send queue for this stage is full, retry next pump iteration")]
    QueueFull,
}
