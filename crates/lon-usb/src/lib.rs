//! USB link driver (C8, §4.5): byte-stuffed framing to/from an external LON
//! transceiver, the U50/U61 wire profile split, sequenced ack/retry on the
//! send side, and the bounded priority/normal queues and per-interface
//! statistics both directions share.

pub mod driver;
pub mod downlink;
pub mod error;
pub mod frame;
pub mod profile;
pub mod stats;
pub mod uplink;

pub use driver::{UsbLinkDriver, MAX_UID_RETRIES, QUEUE_CAPACITY};
pub use downlink::{Downlink, DownlinkState, SendKind, ACK_WAIT_TIME_MS};
pub use error::UsbError;
pub use profile::WireProfile;
pub use stats::UsbStats;
pub use uplink::{CodePacket, UplinkItem, UplinkParser, MAX_BYTES_PER_ITERATION, MAX_BYTES_PER_WINDOW};
