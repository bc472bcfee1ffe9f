//! Thin facade over `lon-app`, the single public entry point for this
//! workspace (§1, §2).
//!
//! Downstream crates depend on `lon-stack` rather than reaching into the
//! individual layer crates directly; everything a host application needs
//! — `StackContext`, the error/status/callback surfaces, and the
//! data-point registry types — is re-exported here.

pub use lon_app::{
    AppMode, CallbackTable, DatapointRegistry, DeviceLifecycle, IzotError, LifecycleEvent,
    LifecycleState, ModeRequest, MsgArrivedInfo, PersistentSegmentHandler, PropagateOutcome,
    ResetCause, ResponseArrivedInfo, RetryPolicy, ServiceLed, StackConfig, StackContext,
    StackStatus,
};

pub use lon_config::{
    AddressEntry, AddressTable, AliasRecord, AliasTable, ConfigChecksum, ConfigImage, DatapointDef,
    Direction, DomainId, DomainRecord, Selector, ServiceKind, MAX_DOMAINS, MAX_DP_SIZE, NO_ADDRESS,
};

pub use lon_protocol::{
    AuthScheme, Challenge, EngineConfig, NpduFrame, PduFormat, ProtocolEngine, ProtocolError,
    ProtocolEvent, ServiceType, WireAddress,
};

pub use lon_lsudp::{
    decode as lsudp_decode, encode as lsudp_encode, ArbitrarySource, LsAddress, LsUdpError,
    MapState, MappingEntry, MappingTable,
};

pub use lon_usb::{UsbError, UsbLinkDriver, UsbStats, WireProfile};

pub use lon_persist::{InMemoryFlash, PersistError, RawFlash, Segment};

pub use lon_rt::timer::SystemClock;
pub use lon_rt::{BoundedQueue, ByteRing, Clock, MonotonicMillis, Timer};
