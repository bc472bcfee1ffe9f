//! Arbitrary-address support (§4.4): a table indexed by LS address that
//! records whether a peer is reachable at its derived IP or carries an
//! "arbitrary source" address instead, updated on every received frame
//! and decayed by a periodic aging timer.

use std::collections::HashMap;

use lon_config::DomainId;

/// Entries revert to `Available` after this many `age_tick` calls without
/// a fresh update.
pub const AGE_LIMIT: u32 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapState {
    Available,
    Derived,
    Arbitrary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LsAddress {
    pub subnet: u8,
    pub node: u8,
}

#[derive(Debug, Clone, Copy)]
pub struct MappingEntry {
    pub state: MapState,
    pub domain: DomainId,
    pub subnet: u8,
    pub node: u8,
    pub arbitrary_ip: Option<[u8; 4]>,
    pub age: u32,
}

#[derive(Debug, Clone, Default)]
pub struct MappingTable {
    entries: HashMap<LsAddress, MappingEntry>,
}

impl MappingTable {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    pub fn get(&self, subnet: u8, node: u8) -> Option<&MappingEntry> {
        self.entries.get(&LsAddress { subnet, node })
    }

    /// Updated on every received frame from `(domain, subnet, node)`.
    /// `arbitrary_ip` is `Some` iff the frame carried an arbitrary-source
    /// block; otherwise the peer is reachable at its derived address.
    pub fn update(&mut self, domain: DomainId, subnet: u8, node: u8, arbitrary_ip: Option<[u8; 4]>) {
        let state = if arbitrary_ip.is_some() {
            MapState::Arbitrary
        } else {
            MapState::Derived
        };
        self.entries.insert(
            LsAddress { subnet, node },
            MappingEntry {
                state,
                domain,
                subnet,
                node,
                arbitrary_ip,
                age: AGE_LIMIT,
            },
        );
    }

    /// Decrements every entry's age counter by one tick; entries that
    /// reach zero revert to `Available`, clearing their arbitrary IP.
    pub fn age_tick(&mut self) {
        for entry in self.entries.values_mut() {
            if entry.age > 0 {
                entry.age -= 1;
            }
            if entry.age == 0 && entry.state != MapState::Available {
                entry.state = MapState::Available;
                entry.arbitrary_ip = None;
            }
        }
    }

    /// Resolves the current destination IP for `(subnet, node)`: the
    /// arbitrary IP if the table knows one, otherwise the derived address.
    pub fn resolve(&self, domain: &DomainId, subnet: u8, node: u8) -> Option<[u8; 4]> {
        if let Some(entry) = self.get(subnet, node) {
            if entry.state == MapState::Arbitrary {
                return entry.arbitrary_ip;
            }
        }
        crate::derive::derive_unicast(domain, subnet, node)
    }
}
