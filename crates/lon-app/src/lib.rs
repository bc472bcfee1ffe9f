//! Device lifecycle (C9), data-point registry & bindings (C10), and the
//! public API / event-dispatch surface (C11) that ties every lower layer
//! into one `StackContext` and its event pump (§2, §4.6, §4.7, §6, §9).

pub mod callbacks;
pub mod context;
pub mod datapoint;
pub mod error;
pub mod lifecycle;
pub mod reset;
pub mod status;

pub use callbacks::{CallbackTable, MsgArrivedInfo, PersistentSegmentHandler, ResponseArrivedInfo};
pub use context::{StackConfig, StackContext};
pub use datapoint::{DatapointRegistry, PropagateOutcome, RetryPolicy};
pub use error::IzotError;
pub use lifecycle::{AppMode, DeviceLifecycle, LifecycleEvent, LifecycleState, ModeRequest, ServiceLed};
pub use reset::ResetCause;
pub use status::StackStatus;
