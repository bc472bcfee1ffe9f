//! Segment-based transactional non-volatile configuration store (C3).
//!
//! A [`Segment`] is a named, block-aligned region of raw flash. Each
//! segment is preceded by an 8-byte transaction record `{signature,
//! state}` that is the *only* source of truth for whether the segment's
//! payload is trustworthy: erased flash reads all-ones, writes may only
//! clear bits, so the record can be invalidated with a single write
//! (`enter_transaction`) and can only become valid again after the block
//! has been erased (`exit_transaction`).

pub mod error;
pub mod flash;
pub mod segment;
pub mod store;

pub use error::PersistError;
pub use flash::{InMemoryFlash, RawFlash};
pub use segment::{Segment, SegmentHeader, TransactionRecord, DATA_VALID, ERASED, TX_VALID};
pub use store::{PersistentStore, SegmentHandle, StoreLayout};
