//! The address table (§3): up to `capacity` entries resolving implicit
//! (bound) sends. Index `0xFFFF` means "no address" everywhere it's used
//! by a data-point or alias record.

use thiserror::Error;

pub const NO_ADDRESS: u16 = 0xFFFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AddressEntry {
    #[default]
    Unassigned,
    SubnetNode {
        subnet: u8,
        node: u8,
    },
    Broadcast {
        subnet: u8,
    },
    Group {
        group_id: u8,
        group_size: u8,
    },
    UniqueId {
        id: [u8; 6],
    },
}

#[derive(Debug, Error)]
pub enum AddressError {
    #[error("address index {0} out of range (capacity {1})")]
    IndexOutOfRange(u16, usize),
}

#[derive(Debug, Clone)]
pub struct AddressTable {
    entries: Vec<AddressEntry>,
}

impl AddressTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: vec![AddressEntry::Unassigned; capacity],
        }
    }

    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, index: u16) -> Option<AddressEntry> {
        if index == NO_ADDRESS {
            return None;
        }
        self.entries.get(index as usize).copied()
    }

    /// Created on update (management command or application write);
    /// destroyed by overwriting with `Unassigned`.
    pub fn set(&mut self, index: u16, entry: AddressEntry) -> Result<(), AddressError> {
        let slot = self
            .entries
            .get_mut(index as usize)
            .ok_or(AddressError::IndexOutOfRange(index, self.entries.len()))?;
        *slot = entry;
        Ok(())
    }

    pub fn clear(&mut self, index: u16) -> Result<(), AddressError> {
        self.set(index, AddressEntry::Unassigned)
    }

    pub fn is_bound(&self, index: u16) -> bool {
        index != NO_ADDRESS
            && !matches!(self.get(index), None | Some(AddressEntry::Unassigned))
    }

    /// All entries in slot order, for callers that need to fold the whole
    /// table into something else (the configuration checksum, a dump).
    pub fn iter(&self) -> impl Iterator<Item = &AddressEntry> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_address_sentinel_is_never_bound() {
        let table = AddressTable::new(15);
        assert!(!table.is_bound(NO_ADDRESS));
        assert_eq!(table.get(NO_ADDRESS), None);
    }

    #[test]
    fn overwrite_with_unassigned_destroys_entry() {
        let mut table = AddressTable::new(15);
        table
            .set(0, AddressEntry::SubnetNode { subnet: 1, node: 2 })
            .unwrap();
        assert!(table.is_bound(0));
        table.clear(0).unwrap();
        assert!(!table.is_bound(0));
    }

    #[test]
    fn out_of_range_index_errors() {
        let mut table = AddressTable::new(4);
        assert!(table.set(10, AddressEntry::Unassigned).is_err());
    }
}
