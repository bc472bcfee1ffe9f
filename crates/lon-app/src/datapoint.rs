//! Data-point registry and bindings (C10, §4.7): static registration,
//! propagate/poll, update receipt, and the `IsBound` predicate.

use lon_config::address::{AddressEntry, AddressTable, NO_ADDRESS};
use lon_config::alias::AliasTable;
use lon_config::datapoint::{DatapointDef, Direction, ServiceKind};
use lon_config::domain::DomainId;
use lon_protocol::address::WireAddress;
use lon_protocol::engine::ProtocolEngine;
use lon_protocol::service::ServiceType;
use lon_rt::timer::MonotonicMillis;
use lon_tcs::dest::{Destination, DestinationAddress};

use crate::error::IzotError;

/// Default retry shape applied to a data-point's configured service kind
/// when resolving it to a wire [`ServiceType`]. spec.md names the service
/// kind per data-point (§3) but not its retry count/timeout, which in the
/// source comes from the bound address-table record's transmit-timer and
/// retry-count fields (§4.3); this crate takes them from `StackConfig`
/// instead of a second per-address table, so every data-point of a given
/// kind shares one retry policy.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub retries: u8,
    pub base_timeout_ms: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 3,
            base_timeout_ms: 200,
        }
    }
}

fn service_type(kind: ServiceKind, policy: RetryPolicy) -> ServiceType {
    match kind {
        ServiceKind::Unacknowledged => ServiceType::Unacknowledged,
        ServiceKind::Acknowledged => ServiceType::Acknowledged {
            retries: policy.retries,
            base_timeout_ms: policy.base_timeout_ms,
        },
        ServiceKind::Request => ServiceType::Request {
            retries: policy.retries,
            base_timeout_ms: policy.base_timeout_ms,
        },
    }
}

fn resolve_address(entry: AddressEntry) -> Option<(WireAddress, DestinationAddress)> {
    match entry {
        AddressEntry::Unassigned => None,
        AddressEntry::SubnetNode { subnet, node } => Some((
            WireAddress::SubnetNode { subnet, node },
            DestinationAddress::SubnetNode { subnet, node },
        )),
        AddressEntry::Broadcast { subnet } => Some((
            WireAddress::Broadcast { subnet },
            DestinationAddress::Broadcast { subnet },
        )),
        AddressEntry::Group { group_id, .. } => Some((
            WireAddress::Group { group_id },
            DestinationAddress::Group { group_id },
        )),
        AddressEntry::UniqueId { id } => Some((
            WireAddress::UniqueId { subnet: 0, id },
            DestinationAddress::UniqueId(id),
        )),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropagateOutcome {
    /// Enqueued for transmission under this correlation tag.
    Enqueued(u32),
    /// The data-point is unbound: no destination to send to.
    ImmediateSuccess,
}

struct DpEntry {
    def: DatapointDef,
    storage: Vec<u8>,
    /// "Send each" (true) vs "send latest only" (false, default):
    /// multiple `propagate` calls before the transport actually sends
    /// either queue individually or supersede the still-pending one.
    sync: bool,
    persistent_dirty: bool,
    pending_tag: Option<u32>,
}

pub struct DatapointRegistry {
    entries: Vec<DpEntry>,
    retry_policy: RetryPolicy,
}

impl DatapointRegistry {
    pub fn new(retry_policy: RetryPolicy) -> Self {
        Self {
            entries: Vec::new(),
            retry_policy,
        }
    }

    /// Static registration: captures the declaration, allocates backing
    /// storage sized to `declared_size * array_count`, and defaults the
    /// data-point to non-sync ("send latest").
    pub fn register(&mut self, def: DatapointDef) -> Result<u16, IzotError> {
        let index = def.index;
        if self.entries.iter().any(|e| e.def.index == index) {
            return Err(IzotError::InvalidParameter);
        }
        let size = def.declared_size as usize * def.array_count.max(1) as usize;
        self.entries.push(DpEntry {
            def,
            storage: vec![0u8; size],
            sync: false,
            persistent_dirty: false,
            pending_tag: None,
        });
        Ok(index)
    }

    pub fn set_sync(&mut self, index: u16, sync: bool) -> Result<(), IzotError> {
        self.entry_mut(index)?.sync = sync;
        Ok(())
    }

    fn entry(&self, index: u16) -> Result<&DpEntry, IzotError> {
        self.entries
            .iter()
            .find(|e| e.def.index == index)
            .ok_or(IzotError::IndexInvalid(index))
    }

    fn entry_mut(&mut self, index: u16) -> Result<&mut DpEntry, IzotError> {
        self.entries
            .iter_mut()
            .find(|e| e.def.index == index)
            .ok_or(IzotError::IndexInvalid(index))
    }

    pub fn def(&self, index: u16) -> Result<&DatapointDef, IzotError> {
        Ok(&self.entry(index)?.def)
    }

    pub fn storage(&self, index: u16) -> Result<&[u8], IzotError> {
        Ok(&self.entry(index)?.storage)
    }

    pub fn take_persistent_dirty(&mut self, index: u16) -> Result<bool, IzotError> {
        let entry = self.entry_mut(index)?;
        let dirty = entry.persistent_dirty;
        entry.persistent_dirty = false;
        Ok(dirty)
    }

    /// True iff the data-point's primary selector is bound, or its
    /// address-table index is set, or any alias is bound (§4.7).
    pub fn is_bound(&self, index: u16, address_table: &AddressTable, alias_table: &AliasTable) -> bool {
        let Ok(entry) = self.entry(index) else {
            return false;
        };
        entry.def.is_primary_bound()
            || address_table.is_bound(entry.def.address_index)
            || alias_table.any_bound_for(index)
    }

    /// Enqueues an outgoing update for `index` through `engine` if bound;
    /// otherwise completes immediately with success (§4.7). Respects the
    /// data-point's sync attribute: non-sync supersedes a still-queued
    /// earlier send of the same index. `tag` is allocated by the caller
    /// (`StackContext` shares one tag space across `propagate` and direct
    /// `send_msg` calls so completion events can be routed back correctly).
    #[allow(clippy::too_many_arguments)]
    pub fn propagate(
        &mut self,
        now: MonotonicMillis,
        index: u16,
        tag: u32,
        domain_id: DomainId,
        address_table: &AddressTable,
        engine: &mut ProtocolEngine,
    ) -> Result<PropagateOutcome, IzotError> {
        let policy = self.retry_policy;
        let entry = self.entry_mut(index)?;
        let Some(entry_addr) = address_table.get(entry.def.address_index) else {
            return Ok(PropagateOutcome::ImmediateSuccess);
        };
        let Some((wire_dest, dest_address)) = resolve_address(entry_addr) else {
            return Ok(PropagateOutcome::ImmediateSuccess);
        };

        if !entry.sync {
            if let Some(old_tag) = entry.pending_tag.take() {
                engine.supersede(old_tag);
            }
        }

        let entry = self.entry_mut(index)?;
        let payload = entry.storage.clone();
        let service = service_type(entry.def.service, policy);
        let priority = entry.def.priority;
        let authenticated = entry.def.authenticated;
        let expected_acks = if service.expects_confirmation() { 1 } else { 0 };

        engine
            .send_msg(
                now,
                tag,
                Destination {
                    domain_id,
                    address: dest_address,
                },
                wire_dest,
                service,
                payload,
                priority,
                authenticated,
                expected_acks,
            )
            .map_err(IzotError::Protocol)?;

        let entry = self.entry_mut(index)?;
        entry.pending_tag = Some(tag);
        Ok(PropagateOutcome::Enqueued(tag))
    }

    /// Copies `data` into `index`'s storage, flags a persistence commit if
    /// the data-point is configuration-class or persistent, and reports
    /// whether that flag was raised (§4.7 Update receipt).
    pub fn receive_update(&mut self, index: u16, data: &[u8]) -> Result<bool, IzotError> {
        let entry = self.entry_mut(index)?;
        if data.len() != entry.storage.len() {
            return Err(IzotError::InvalidMessageLength(data.len()));
        }
        entry.storage.copy_from_slice(data);
        let schedules_commit = entry.def.configuration_class || entry.def.persistent;
        if schedules_commit {
            entry.persistent_dirty = true;
        }
        Ok(schedules_commit)
    }

    pub fn indices(&self) -> impl Iterator<Item = u16> + '_ {
        self.entries.iter().map(|e| e.def.index)
    }

    pub fn direction(&self, index: u16) -> Result<Direction, IzotError> {
        Ok(self.entry(index)?.def.direction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lon_config::datapoint::Direction;
    use lon_protocol::engine::EngineConfig;
    use lon_protocol::auth::AuthScheme;

    fn engine() -> ProtocolEngine {
        ProtocolEngine::new(EngineConfig {
            domain_id: DomainId::new(&[1]).unwrap(),
            source_subnet: 1,
            source_node: 1,
            auth_key: [0u8; 12],
            auth_scheme: AuthScheme::Legacy,
            tcs_capacity: 8,
            queue_depth: 8,
        })
    }

    #[test]
    fn unbound_datapoint_propagates_immediately() {
        let mut registry = DatapointRegistry::new(RetryPolicy::default());
        let dp = DatapointDef::new(0, 2, Direction::Output).unwrap();
        registry.register(dp).unwrap();
        let addresses = AddressTable::new(4);
        let mut eng = engine();
        let outcome = registry
            .propagate(0, 0, 0, DomainId::new(&[1]).unwrap(), &addresses, &mut eng)
            .unwrap();
        assert_eq!(outcome, PropagateOutcome::ImmediateSuccess);
    }

    #[test]
    fn bound_datapoint_enqueues_a_send() {
        let mut registry = DatapointRegistry::new(RetryPolicy::default());
        let mut dp = DatapointDef::new(0, 2, Direction::Output).unwrap();
        dp.address_index = 0;
        registry.register(dp).unwrap();
        let mut addresses = AddressTable::new(4);
        addresses
            .set(0, AddressEntry::SubnetNode { subnet: 1, node: 2 })
            .unwrap();
        let mut eng = engine();
        let outcome = registry
            .propagate(0, 0, 0, DomainId::new(&[1]).unwrap(), &addresses, &mut eng)
            .unwrap();
        assert!(matches!(outcome, PropagateOutcome::Enqueued(_)));
    }

    #[test]
    fn non_sync_propagate_supersedes_the_earlier_pending_send() {
        let mut registry = DatapointRegistry::new(RetryPolicy::default());
        let mut dp = DatapointDef::new(0, 2, Direction::Output).unwrap();
        dp.address_index = 0;
        registry.register(dp).unwrap();
        let mut addresses = AddressTable::new(4);
        addresses
            .set(0, AddressEntry::SubnetNode { subnet: 1, node: 2 })
            .unwrap();
        let mut eng = engine();
        let domain = DomainId::new(&[1]).unwrap();
        let PropagateOutcome::Enqueued(first_tag) =
            registry.propagate(0, 0, 0, domain, &addresses, &mut eng).unwrap()
        else {
            panic!("expected enqueued outcome");
        };
        registry.propagate(0, 0, 1, domain, &addresses, &mut eng).unwrap();
        assert!(!eng.supersede(first_tag));
    }

    #[test]
    fn update_receipt_flags_persistence_for_persistent_dps() {
        let mut registry = DatapointRegistry::new(RetryPolicy::default());
        let mut dp = DatapointDef::new(0, 2, Direction::Input).unwrap();
        dp.persistent = true;
        registry.register(dp).unwrap();
        let scheduled = registry.receive_update(0, &[1, 2]).unwrap();
        assert!(scheduled);
        assert!(registry.take_persistent_dirty(0).unwrap());
        assert!(!registry.take_persistent_dirty(0).unwrap());
    }

    #[test]
    fn is_bound_checks_primary_address_and_aliases() {
        let mut registry = DatapointRegistry::new(RetryPolicy::default());
        let dp = DatapointDef::new(0, 2, Direction::Output).unwrap();
        registry.register(dp).unwrap();
        let addresses = AddressTable::new(4);
        let aliases = AliasTable::new(4);
        assert!(!registry.is_bound(0, &addresses, &aliases));
    }
}
