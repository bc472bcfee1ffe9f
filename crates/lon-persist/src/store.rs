//! The segment store: layout, handles, and the dirty/guard-band commit
//! scheduler described in §4.1.

use std::collections::HashMap;

use lon_rt::timer::{MonotonicMillis, Timer};

use crate::error::PersistError;
use crate::flash::{RawFlash, BLOCK_SIZE};
use crate::segment::{
    Segment, SegmentHeader, TransactionRecord, DATA_VALID, HEADER_SIZE, TX_RECORD_SIZE, TX_VALID,
};

const DEFAULT_GUARD_BAND_MS: u64 = 1000;

#[derive(Debug, Clone, Copy)]
struct Region {
    offset: usize,
    capacity: usize,
}

/// Assigns each segment a disjoint, block-aligned range of the flash
/// address space (invariant #2 of §4.1).
#[derive(Debug, Clone)]
pub struct StoreLayout {
    regions: HashMap<Segment, Region>,
}

impl StoreLayout {
    /// Lays segments out back to back, each rounded up to a flash block so
    /// no segment's erase can ever touch a neighbor's bytes.
    pub fn new(segments: impl IntoIterator<Item = (Segment, usize)>) -> Self {
        let mut regions = HashMap::new();
        let mut cursor = 0usize;
        for (seg, capacity) in segments {
            let total = TX_RECORD_SIZE + HEADER_SIZE + capacity;
            let aligned = total.div_ceil(BLOCK_SIZE) * BLOCK_SIZE;
            regions.insert(
                seg,
                Region {
                    offset: cursor,
                    capacity,
                },
            );
            cursor += aligned;
        }
        Self { regions }
    }

    pub fn total_flash_size(&self) -> usize {
        self.regions
            .values()
            .map(|r| {
                let total = TX_RECORD_SIZE + HEADER_SIZE + r.capacity;
                (r.offset) + total.div_ceil(BLOCK_SIZE) * BLOCK_SIZE
            })
            .max()
            .unwrap_or(0)
    }

    fn region(&self, seg: Segment) -> Option<Region> {
        self.regions.get(&seg).copied()
    }
}

/// A handle returned by `open_for_read`/`open_for_write`. Holds no
/// borrowed data; all I/O goes back through the store by offset.
#[derive(Debug, Clone, Copy)]
pub struct SegmentHandle {
    pub segment: Segment,
    write_mode: bool,
    payload_capacity: usize,
}

pub struct PersistentStore<F: RawFlash> {
    flash: F,
    layout: StoreLayout,
    dirty: HashMap<Segment, (SegmentHeader, Vec<u8>)>,
    guard_timer: Timer,
}

impl<F: RawFlash> PersistentStore<F> {
    pub fn new(flash: F, layout: StoreLayout) -> Self {
        Self {
            flash,
            layout,
            dirty: HashMap::new(),
            guard_timer: Timer::new(DEFAULT_GUARD_BAND_MS, false),
        }
    }

    pub fn with_guard_band_ms(mut self, ms: u64) -> Self {
        self.guard_timer.set_period_ms(ms);
        self
    }

    pub fn get_max_size(&self, seg: Segment) -> usize {
        self.layout.region(seg).map(|r| r.capacity).unwrap_or(0)
    }

    fn read_tx_record(&self, seg: Segment) -> Result<(Region, TransactionRecord), PersistError> {
        let region = self
            .layout
            .region(seg)
            .ok_or(PersistError::SegmentNotFound(seg))?;
        let mut buf = [0u8; TX_RECORD_SIZE];
        self.flash
            .read(region.offset, &mut buf)
            .map_err(PersistError::FlashIo)?;
        Ok((region, TransactionRecord::decode(&buf)))
    }

    pub fn is_in_transaction(&self, seg: Segment) -> bool {
        match self.read_tx_record(seg) {
            Ok((_, rec)) => !rec.is_valid(),
            Err(_) => true,
        }
    }

    /// Mark the segment's transaction record invalid by clearing the state
    /// word. No erase: flash can always clear bits.
    pub fn enter_transaction(&mut self, seg: Segment) -> Result<(), PersistError> {
        let (region, _) = self.read_tx_record(seg)?;
        self.flash
            .write(region.offset + 4, &0u32.to_le_bytes())
            .map_err(PersistError::FlashIo)
    }

    /// Returns a read handle iff the segment's transaction record is
    /// currently valid.
    pub fn open_for_read(&self, seg: Segment) -> Option<SegmentHandle> {
        let (region, rec) = self.read_tx_record(seg).ok()?;
        if !rec.is_valid() {
            return None;
        }
        Some(SegmentHandle {
            segment: seg,
            write_mode: false,
            payload_capacity: region.capacity,
        })
    }

    /// Invalidates the transaction record, then erases enough blocks to
    /// cover `size + header`. Returns a write handle; the segment is now
    /// "in-transaction" until `exit_transaction`.
    pub fn open_for_write(
        &mut self,
        seg: Segment,
        size: usize,
    ) -> Result<SegmentHandle, PersistError> {
        let region = self
            .layout
            .region(seg)
            .ok_or(PersistError::SegmentNotFound(seg))?;
        if size > region.capacity {
            return Err(PersistError::SegmentTooLarge {
                segment: seg,
                requested: size,
                max: region.capacity,
            });
        }
        self.enter_transaction(seg)?;
        let erase_len = TX_RECORD_SIZE + HEADER_SIZE + size;
        self.flash
            .erase_range(region.offset, erase_len)
            .map_err(PersistError::FlashIo)?;
        Ok(SegmentHandle {
            segment: seg,
            write_mode: true,
            payload_capacity: region.capacity,
        })
    }

    pub fn write(
        &mut self,
        handle: &SegmentHandle,
        offset: usize,
        bytes: &[u8],
    ) -> Result<(), PersistError> {
        if !handle.write_mode {
            return Err(PersistError::NotInTransaction(handle.segment));
        }
        if offset + bytes.len() > handle.payload_capacity {
            return Err(PersistError::OutOfBounds {
                offset,
                len: bytes.len(),
                capacity: handle.payload_capacity,
            });
        }
        let region = self
            .layout
            .region(handle.segment)
            .ok_or(PersistError::SegmentNotFound(handle.segment))?;
        let abs = region.offset + TX_RECORD_SIZE + HEADER_SIZE + offset;
        self.flash.write(abs, bytes).map_err(PersistError::FlashIo)
    }

    pub fn read(
        &self,
        handle: &SegmentHandle,
        offset: usize,
        buf: &mut [u8],
    ) -> Result<(), PersistError> {
        if offset + buf.len() > handle.payload_capacity {
            return Err(PersistError::OutOfBounds {
                offset,
                len: buf.len(),
                capacity: handle.payload_capacity,
            });
        }
        let region = self
            .layout
            .region(handle.segment)
            .ok_or(PersistError::SegmentNotFound(handle.segment))?;
        let abs = region.offset + TX_RECORD_SIZE + HEADER_SIZE + offset;
        self.flash.read(abs, buf).map_err(PersistError::FlashIo)
    }

    /// Releases the handle. Does not commit; the caller must still call
    /// `exit_transaction` for the write to become durable.
    pub fn close(&mut self, _handle: SegmentHandle) {}

    /// Writes both the signature and state word to VALID. Fails (without
    /// partially committing) if the block was not erased since the last
    /// `enter_transaction` — detected by the AND-write failing to actually
    /// reach the target bit pattern, which is exactly what real NOR flash
    /// would do silently.
    pub fn exit_transaction(&mut self, seg: Segment) -> Result<(), PersistError> {
        let region = self
            .layout
            .region(seg)
            .ok_or(PersistError::SegmentNotFound(seg))?;
        self.flash
            .write(region.offset, &TX_VALID.to_le_bytes())
            .map_err(PersistError::FlashIo)?;
        self.flash
            .write(region.offset + 4, &DATA_VALID.to_le_bytes())
            .map_err(PersistError::FlashIo)?;
        let (_, rec) = self.read_tx_record(seg)?;
        if !rec.is_valid() {
            return Err(PersistError::NotErasedSinceEnter(seg));
        }
        Ok(())
    }

    /// Schedules `header`+`payload` to be committed on the next guard-band
    /// expiry or explicit flush. Marking a segment dirty (re)starts the
    /// shared guard timer.
    pub fn mark_dirty(&mut self, now: MonotonicMillis, seg: Segment, header: SegmentHeader, payload: Vec<u8>) {
        self.dirty.insert(seg, (header, payload));
        self.guard_timer.start(now);
    }

    pub fn is_dirty(&self, seg: Segment) -> bool {
        self.dirty.contains_key(&seg)
    }

    pub fn has_pending_commit(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// Polls the guard timer; if it has expired, serializes every dirty
    /// segment (one at a time, in arbitrary but deterministic order).
    /// Returns the segments that committed successfully. A segment whose
    /// commit fails stays dirty so the next expiry retries it, and is
    /// reported via `tracing::error!` per the `EepromWriteFail` policy.
    pub fn tick(&mut self, now: MonotonicMillis) -> Vec<Segment> {
        if self.dirty.is_empty() || !self.guard_timer.poll(now) {
            return Vec::new();
        }
        self.flush_now()
    }

    /// Forces an immediate commit of every dirty segment, bypassing the
    /// guard-band timer. Used before a requested reboot.
    pub fn flush_now(&mut self) -> Vec<Segment> {
        let mut committed = Vec::new();
        let segs: Vec<Segment> = self.dirty.keys().copied().collect();
        for seg in segs {
            let Some((header, payload)) = self.dirty.get(&seg).cloned() else {
                continue;
            };
            match self.commit_segment(seg, &header, &payload) {
                Ok(()) => {
                    self.dirty.remove(&seg);
                    committed.push(seg);
                    tracing::debug!(?seg, "segment committed");
                }
                Err(err) => {
                    tracing::error!(?seg, %err, "EepromWriteFail: segment left in-transaction");
                }
            }
        }
        committed
    }

    fn commit_segment(
        &mut self,
        seg: Segment,
        header: &SegmentHeader,
        payload: &[u8],
    ) -> Result<(), PersistError> {
        let handle = self.open_for_write(seg, payload.len())?;
        let region = self.layout.region(seg).ok_or(PersistError::SegmentNotFound(seg))?;
        self.flash
            .write(region.offset + TX_RECORD_SIZE, &header.encode())
            .map_err(PersistError::FlashIo)?;
        self.write(&handle, 0, payload)?;
        self.close(handle);
        self.exit_transaction(seg)
            .map_err(|_| PersistError::EepromWriteFail(seg))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flash::InMemoryFlash;

    fn fresh_store() -> PersistentStore<InMemoryFlash> {
        let layout = StoreLayout::new([
            (Segment::NetworkImage, 512),
            (Segment::ApplicationData, 512),
        ]);
        let flash = InMemoryFlash::new(layout.total_flash_size());
        PersistentStore::new(flash, layout)
    }

    #[test]
    fn fresh_segment_is_empty_and_in_transaction() {
        let store = fresh_store();
        assert!(store.is_in_transaction(Segment::NetworkImage));
        assert!(store.open_for_read(Segment::NetworkImage).is_none());
    }

    #[test]
    fn write_read_round_trip_after_commit() {
        let mut store = fresh_store();
        let handle = store.open_for_write(Segment::ApplicationData, 8).unwrap();
        store.write(&handle, 0, b"testdata").unwrap();
        store.close(handle);
        store.exit_transaction(Segment::ApplicationData).unwrap();

        assert!(!store.is_in_transaction(Segment::ApplicationData));
        let read_handle = store.open_for_read(Segment::ApplicationData).unwrap();
        let mut buf = [0u8; 8];
        store.read(&read_handle, 0, &mut buf).unwrap();
        assert_eq!(&buf, b"testdata");
    }

    #[test]
    fn power_cut_between_enter_and_exit_leaves_segment_in_transaction() {
        // S2: write application-data, then simulate a power cut right after
        // enter_transaction (before the erase + exit_transaction).
        let mut store = fresh_store();
        let handle = store.open_for_write(Segment::ApplicationData, 8).unwrap();
        store.write(&handle, 0, b"12345678").unwrap();
        store.close(handle);
        // No exit_transaction call: simulated crash.
        assert!(store.is_in_transaction(Segment::ApplicationData));
        assert!(store.open_for_read(Segment::ApplicationData).is_none());
    }

    #[test]
    fn exit_without_erase_since_enter_fails() {
        let mut store = fresh_store();
        // Commit once successfully.
        let handle = store.open_for_write(Segment::ApplicationData, 4).unwrap();
        store.write(&handle, 0, b"abcd").unwrap();
        store.close(handle);
        store.exit_transaction(Segment::ApplicationData).unwrap();

        // enter_transaction without a following erase, then exit_transaction
        // must fail: TX_VALID's bits can't be raised back from DATA_VALID's
        // cleared state word without an erase.
        store.enter_transaction(Segment::ApplicationData).unwrap();
        let err = store.exit_transaction(Segment::ApplicationData);
        assert!(err.is_err());
    }

    #[test]
    fn mark_dirty_commits_on_guard_band_expiry() {
        let mut store = fresh_store();
        let header = SegmentHeader {
            length: 4,
            segment_signature: 1,
            application_signature: 2,
            version: 1,
            checksum: 0,
        };
        store.mark_dirty(0, Segment::NetworkImage, header, vec![1, 2, 3, 4]);
        assert!(store.has_pending_commit());
        assert!(store.tick(500).is_empty());
        let committed = store.tick(1000);
        assert_eq!(committed, vec![Segment::NetworkImage]);
        assert!(!store.has_pending_commit());
        assert!(store.open_for_read(Segment::NetworkImage).is_some());
    }

    #[test]
    fn unknown_segment_reports_zero_max_size() {
        let store = fresh_store();
        assert_eq!(store.get_max_size(Segment::SecurityIi), 0);
    }
}
