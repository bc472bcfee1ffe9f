use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LsUdpError {
    #[error("UDP payload too short: need at least {need} bytes, got {got}")]
    PayloadTooShort { need: usize, got: usize },

    #[error("domain length {0} has no derived-address rule; arbitrary addressing required")]
    NoDerivedAddress(usize),

    #[error(transparent)]
    Protocol(#[from] lon_protocol::ProtocolError),
}
