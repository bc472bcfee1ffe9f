//! Monotonic timers and bounded FIFO/ring-buffer primitives shared by every
//! layer of the LON stack. Nothing here touches a clock, a socket, or a
//! heap beyond the collections' own backing storage — the event pump
//! supplies "now" on every call, and callers size queues up front.

pub mod queue;
pub mod ring;
pub mod timer;

pub use queue::BoundedQueue;
pub use ring::ByteRing;
pub use timer::{Clock, MonotonicMillis, Timer};
