//! Protocol engine (C6, §4.3): session/transport/auth/network layers
//! composed into bounded-queue send/receive pipelines, with transaction
//! control (retry/ack/request-response), authentication, and wire
//! addressing.

pub mod address;
pub mod auth;
pub mod delta_backlog;
pub mod engine;
pub mod error;
pub mod events;
pub mod npdu;
pub mod pipeline;
pub mod service;
pub mod transaction;

pub use address::WireAddress;
pub use auth::{AuthScheme, Challenge};
pub use engine::{EngineConfig, ProtocolEngine};
pub use error::ProtocolError;
pub use events::ProtocolEvent;
pub use npdu::{NpduFrame, PduFormat};
pub use service::ServiceType;
pub use transaction::{PendingTransaction, RetryOutcome};
