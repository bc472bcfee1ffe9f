//! The public error taxonomy (§7): the host application sees one flat
//! enum at the API boundary even though internal layers keep their own
//! precise, local errors.

use thiserror::Error;

use lon_persist::PersistError;
use lon_protocol::ProtocolError;
use lon_tcs::TcsError;
use lon_usb::UsbError;

#[derive(Debug, Error)]
pub enum IzotError {
    // Initialization
    #[error("stack initialization failed")]
    StackInitializationFailure,
    #[error("no IP address available")]
    NoIpAddress,
    #[error("device unique ID not available")]
    DeviceUniqueIdNotAvailable,

    // Parameter
    #[error("index {0} invalid")]
    IndexInvalid(u16),
    #[error("invalid parameter")]
    InvalidParameter,
    #[error("message length {0} invalid")]
    InvalidMessageLength(usize),
    #[error("invalid operation for current state")]
    InvalidOperation,

    // Transient protocol
    #[error("transaction timed out")]
    TransactionTimeout,
    #[error("too many retries")]
    TooManyRetries,

    // Persistence
    #[error("persistent file error: {0}")]
    PersistentFileError(#[from] PersistError),
    #[error("persistent store operation failed")]
    PersistentFailure,
    #[error("EEPROM write failed")]
    EepromWriteFail,
    #[error("configuration checksum error")]
    CnfgChecksumError,

    // Callback registration
    #[error("callback not registered")]
    CallbackNotRegistered,
    #[error("stack not initialized")]
    StackNotInitialized,

    // Lower-layer passthrough, so a host application can match on the
    // originating subsystem without this crate re-deriving every variant.
    #[error("protocol engine error: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("transaction control sublayer error: {0}")]
    Tcs(#[from] TcsError),
    #[error("USB link driver error: {0}")]
    Usb(#[from] UsbError),
}
