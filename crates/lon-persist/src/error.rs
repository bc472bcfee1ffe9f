use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("segment {0:?} not found in store layout")]
    SegmentNotFound(crate::segment::Segment),

    #[error("requested size {requested} exceeds max size {max} for segment {segment:?}")]
    SegmentTooLarge {
        segment: crate::segment::Segment,
        requested: usize,
        max: usize,
    },

    #[error("segment {0:?} is not open for write")]
    NotInTransaction(crate::segment::Segment),

    #[error("exit_transaction on {0:?} requires an erase since the last enter_transaction")]
    NotErasedSinceEnter(crate::segment::Segment),

    #[error("read/write offset {offset} + len {len} exceeds segment capacity {capacity}")]
    OutOfBounds {
        offset: usize,
        len: usize,
        capacity: usize,
    },

    #[error("EEPROM/flash write failed for segment {0:?}")]
    EepromWriteFail(crate::segment::Segment),

    #[error("underlying flash I/O error: {0}")]
    FlashIo(String),
}
