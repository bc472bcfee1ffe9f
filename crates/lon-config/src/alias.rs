//! Aliases: secondary selector+address bindings for an existing DP index,
//! letting one data-point participate in multiple connections.

use crate::address::NO_ADDRESS;
use crate::datapoint::Selector;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AliasRecord {
    pub dp_index: u16,
    pub selector: Selector,
    pub address_index: u16,
}

impl AliasRecord {
    pub fn unassigned() -> Self {
        Self {
            dp_index: NO_ADDRESS,
            selector: Selector::new(0),
            address_index: NO_ADDRESS,
        }
    }

    pub fn is_bound(&self) -> bool {
        self.dp_index != NO_ADDRESS && self.address_index != NO_ADDRESS
    }
}

#[derive(Debug, Clone)]
pub struct AliasTable {
    entries: Vec<AliasRecord>,
}

impl AliasTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: vec![AliasRecord::unassigned(); capacity],
        }
    }

    pub fn entries_for(&self, dp_index: u16) -> impl Iterator<Item = &AliasRecord> {
        self.entries.iter().filter(move |a| a.dp_index == dp_index)
    }

    pub fn any_bound_for(&self, dp_index: u16) -> bool {
        self.entries_for(dp_index).any(|a| a.is_bound())
    }

    pub fn set(&mut self, slot: usize, record: AliasRecord) -> Option<()> {
        let entry = self.entries.get_mut(slot)?;
        *entry = record;
        Some(())
    }

    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    /// All entries in slot order, for callers that need to fold the whole
    /// table into something else (the configuration checksum, a dump).
    pub fn iter(&self) -> impl Iterator<Item = &AliasRecord> {
        self.entries.iter()
    }
}
