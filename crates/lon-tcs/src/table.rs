//! Per-destination TID allocation and incoming duplicate detection (§4.2).
//!
//! Two independent tables live here because the source conflates them only
//! in naming, not in behavior: `new_trans`/`trans_done`/`override_trans`
//! allocate and track *outgoing* TIDs keyed by destination fingerprint,
//! while `validate_trans` checks an *incoming* TID against the last one
//! accepted for a priority class, exactly as its `(priority, tid)` signature
//! in §4.2 implies.

use lon_rt::timer::MonotonicMillis;

use crate::dest::Destination;

/// Entries older than this may be evicted from a full table to make room
/// for a new destination (§4.2 Eviction).
pub const EVICT_AGE_MS: u64 = 24_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    Normal,
    High,
}

impl Priority {
    fn slot(self) -> usize {
        match self {
            Priority::Normal => 0,
            Priority::High => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidateResult {
    /// Matches the last accepted incoming TID for this priority: a replay.
    Current,
    /// A new TID: process normally and record it.
    NotCurrent,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TcsError {
    #[error("no free TCS table entry (all entries younger than {EVICT_AGE_MS}ms)")]
    NoFreeEntry,
}

#[derive(Debug, Clone, Copy)]
struct DestEntry {
    fingerprint: u64,
    last_tid: u8,
    timestamp: MonotonicMillis,
}

/// Outgoing TID allocation table plus the per-priority "current outgoing
/// transaction" and "last accepted incoming TID" slots.
#[derive(Debug, Clone)]
pub struct TcsTable {
    capacity: usize,
    entries: Vec<DestEntry>,
    current_outgoing: [Option<u8>; 2],
    last_incoming: [Option<(u8, MonotonicMillis)>; 2],
}

impl TcsTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Vec::with_capacity(capacity),
            current_outgoing: [None, None],
            last_incoming: [None, None],
        }
    }

    fn find_entry(&mut self, fingerprint: u64) -> Option<usize> {
        self.entries.iter().position(|e| e.fingerprint == fingerprint)
    }

    /// Index of the oldest entry at least `EVICT_AGE_MS` old, if any.
    fn oldest_evictable(&self, now: MonotonicMillis) -> Option<usize> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, e)| now.saturating_sub(e.timestamp) >= EVICT_AGE_MS)
            .min_by_key(|(_, e)| e.timestamp)
            .map(|(i, _)| i)
    }

    /// Allocates a TID for `dest` distinct from the last one recorded for
    /// it, updating the table and the priority slot's current outgoing
    /// transaction.
    pub fn new_trans(
        &mut self,
        now: MonotonicMillis,
        priority: Priority,
        dest: &Destination,
    ) -> Result<u8, TcsError> {
        let fingerprint = dest.fingerprint();
        let tid = if let Some(idx) = self.find_entry(fingerprint) {
            let next = self.entries[idx].last_tid.wrapping_add(1);
            self.entries[idx].last_tid = next;
            self.entries[idx].timestamp = now;
            next
        } else if self.entries.len() < self.capacity {
            self.entries.push(DestEntry {
                fingerprint,
                last_tid: 0,
                timestamp: now,
            });
            0
        } else if let Some(idx) = self.oldest_evictable(now) {
            self.entries[idx] = DestEntry {
                fingerprint,
                last_tid: 0,
                timestamp: now,
            };
            0
        } else {
            return Err(TcsError::NoFreeEntry);
        };
        self.current_outgoing[priority.slot()] = Some(tid);
        Ok(tid)
    }

    /// Marks the current outgoing transaction on `priority` complete.
    pub fn trans_done(&mut self, priority: Priority) {
        self.current_outgoing[priority.slot()] = None;
    }

    /// Forces the next TID for `priority`'s slot (used on retry paths that
    /// must resend under the same TID).
    pub fn override_trans(&mut self, priority: Priority, tid: u8) {
        self.current_outgoing[priority.slot()] = Some(tid);
    }

    pub fn current_trans(&self, priority: Priority) -> Option<u8> {
        self.current_outgoing[priority.slot()]
    }

    /// Incoming duplicate check: `Current` iff `tid` matches the last
    /// accepted incoming TID for `priority` within the 24s window.
    pub fn validate_trans(
        &mut self,
        priority: Priority,
        now: MonotonicMillis,
        tid: u8,
    ) -> ValidateResult {
        let slot = &mut self.last_incoming[priority.slot()];
        match *slot {
            Some((last_tid, ts)) if last_tid == tid && now.saturating_sub(ts) < EVICT_AGE_MS => {
                ValidateResult::Current
            }
            _ => {
                *slot = Some((tid, now));
                ValidateResult::NotCurrent
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
