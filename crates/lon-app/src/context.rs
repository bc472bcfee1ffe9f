//! `StackContext` (§9): the explicit, non-global value every layer call
//! threads through, replacing the source's cyclic `gp`/`eep`/`nmp`/`cp`
//! globals. Owns every layer's live state and drives the event pump that
//! advances all of them once per invocation (§2, §5).

use lon_config::datapoint::DatapointDef;
use lon_config::domain::DomainId;
use lon_config::image::ConfigImage;
use lon_persist::flash::RawFlash;
use lon_persist::segment::{Segment, SegmentHeader};
use lon_persist::store::{PersistentStore, StoreLayout};
use lon_protocol::address::WireAddress;
use lon_protocol::auth::AuthScheme;
use lon_protocol::engine::{EngineConfig, ProtocolEngine};
use lon_protocol::events::ProtocolEvent;
use lon_protocol::service::ServiceType;
use lon_rt::timer::{MonotonicMillis, Timer};
use lon_tcs::dest::Destination;
use lon_usb::{UsbLinkDriver, WireProfile};

use std::collections::HashMap;

use crate::callbacks::{CallbackTable, MsgArrivedInfo, ResponseArrivedInfo};
use crate::datapoint::{DatapointRegistry, PropagateOutcome, RetryPolicy};
use crate::error::IzotError;
use crate::lifecycle::{DeviceLifecycle, LifecycleEvent, LifecycleState, ModeRequest};
use crate::reset::ResetCause;
use crate::status::StackStatus;

const CHECKSUM_CHECK_PERIOD_MS: u64 = 1000;

/// Stack construction takes an explicit config rather than compile-time
/// constants, the Rust replacement for the source's `#define`-based
/// `NUM_STACKS`/table-size configuration (§9 Design notes).
pub struct StackConfig {
    pub domain_id: DomainId,
    pub source_subnet: u8,
    pub source_node: u8,
    pub auth_key: [u8; 12],
    pub auth_scheme: AuthScheme,
    pub tcs_capacity: usize,
    pub queue_depth: usize,
    pub address_capacity: usize,
    pub alias_capacity: usize,
    pub architecture_number: u16,
    pub firmware_version: u16,
    pub usb_profile: Option<WireProfile>,
    pub commit_guard_band_ms: u64,
    pub retry_policy: RetryPolicy,
    pub segment_sizes: Vec<(Segment, usize)>,
}

pub struct StackContext<F: RawFlash> {
    domain_id: DomainId,
    engine: ProtocolEngine,
    persist: PersistentStore<F>,
    config_image: ConfigImage,
    datapoints: DatapointRegistry,
    lifecycle: DeviceLifecycle,
    callbacks: CallbackTable,
    status: StackStatus,
    usb: Option<UsbLinkDriver>,
    checksum_timer: Timer,
    next_tag: u32,
    dp_pending_tags: HashMap<u32, u16>,
}

impl<F: RawFlash> StackContext<F> {
    pub fn new(config: StackConfig, flash: F, reset_cause: ResetCause) -> Self {
        let layout = StoreLayout::new(config.segment_sizes.iter().copied());
        let mut persist =
            PersistentStore::new(flash, layout).with_guard_band_ms(config.commit_guard_band_ms);
        let mut checksum_timer = Timer::new(CHECKSUM_CHECK_PERIOD_MS, true);
        checksum_timer.start(0);

        let engine = ProtocolEngine::new(EngineConfig {
            domain_id: config.domain_id,
            source_subnet: config.source_subnet,
            source_node: config.source_node,
            auth_key: config.auth_key,
            auth_scheme: config.auth_scheme,
            tcs_capacity: config.tcs_capacity,
            queue_depth: config.queue_depth,
        });

        let initial_state = if reset_cause == ResetCause::PowerUp {
            LifecycleState::ApplicationUnconfig
        } else {
            LifecycleState::ConfigOnLine
        };

        let _ = persist.get_max_size(Segment::ApplicationData);

        Self {
            domain_id: config.domain_id,
            engine,
            persist,
            config_image: ConfigImage::new(config.address_capacity, config.alias_capacity),
            datapoints: DatapointRegistry::new(config.retry_policy),
            lifecycle: DeviceLifecycle::new(initial_state, reset_cause),
            callbacks: CallbackTable::new(),
            status: StackStatus::new(config.architecture_number, config.firmware_version),
            usb: config.usb_profile.map(UsbLinkDriver::new),
            checksum_timer,
            next_tag: 0,
            dp_pending_tags: HashMap::new(),
        }
    }

    fn allocate_tag(&mut self) -> u32 {
        let tag = self.next_tag;
        self.next_tag = self.next_tag.wrapping_add(1);
        tag
    }

    pub fn callbacks_mut(&mut self) -> &mut CallbackTable {
        &mut self.callbacks
    }

    pub fn status(&self) -> StackStatus {
        self.status
    }

    pub fn config_image(&self) -> &ConfigImage {
        &self.config_image
    }

    pub fn config_image_mut(&mut self) -> &mut ConfigImage {
        &mut self.config_image
    }

    pub fn usb(&self) -> Option<&UsbLinkDriver> {
        self.usb.as_ref()
    }

    pub fn register_datapoint(&mut self, def: DatapointDef) -> Result<u16, IzotError> {
        self.datapoints.register(def)
    }

    pub fn is_bound(&self, index: u16) -> bool {
        self.datapoints
            .is_bound(index, &self.config_image.address_table, &self.config_image.alias_table)
    }

    /// §4.7 Propagate(index). Fires `update_completed(index, true)`
    /// immediately when the data-point is unbound; otherwise the event
    /// arrives later from `pump` once the transport confirms (or exhausts
    /// retries on) the send.
    pub fn propagate_by_index(&mut self, now: MonotonicMillis, index: u16) -> Result<(), IzotError> {
        let tag = self.allocate_tag();
        let outcome = self.datapoints.propagate(
            now,
            index,
            tag,
            self.domain_id,
            &self.config_image.address_table,
            &mut self.engine,
        )?;
        match outcome {
            PropagateOutcome::ImmediateSuccess => {
                self.callbacks.fire_datapoint_update_completed(index, true);
            }
            PropagateOutcome::Enqueued(tag) => {
                self.dp_pending_tags.insert(tag, index);
            }
        }
        Ok(())
    }

    /// §4.7 Poll(index): requests the current value from the bound output.
    /// Results arrive via `update_occurred` once the peer's response is
    /// copied into storage by `receive_update`.
    pub fn poll_by_index(&mut self, now: MonotonicMillis, index: u16) -> Result<(), IzotError> {
        let def = self.datapoints.def(index)?.clone();
        let Some(entry_addr) = self.config_image.address_table.get(def.address_index) else {
            return Ok(());
        };
        let dest_address = match entry_addr {
            lon_config::address::AddressEntry::Unassigned => return Ok(()),
            lon_config::address::AddressEntry::SubnetNode { subnet, node } => {
                lon_tcs::dest::DestinationAddress::SubnetNode { subnet, node }
            }
            lon_config::address::AddressEntry::Broadcast { subnet } => {
                lon_tcs::dest::DestinationAddress::Broadcast { subnet }
            }
            lon_config::address::AddressEntry::Group { group_id, .. } => {
                lon_tcs::dest::DestinationAddress::Group { group_id }
            }
            lon_config::address::AddressEntry::UniqueId { id } => {
                lon_tcs::dest::DestinationAddress::UniqueId(id)
            }
        };
        let wire_dest = match entry_addr {
            lon_config::address::AddressEntry::Unassigned => return Ok(()),
            lon_config::address::AddressEntry::SubnetNode { subnet, node } => {
                WireAddress::SubnetNode { subnet, node }
            }
            lon_config::address::AddressEntry::Broadcast { subnet } => {
                WireAddress::Broadcast { subnet }
            }
            lon_config::address::AddressEntry::Group { group_id, .. } => {
                WireAddress::Group { group_id }
            }
            lon_config::address::AddressEntry::UniqueId { id } => {
                WireAddress::UniqueId { subnet: 0, id }
            }
        };
        let tag = self.allocate_tag();
        self.engine
            .send_msg(
                now,
                tag,
                Destination {
                    domain_id: self.domain_id,
                    address: dest_address,
                },
                wire_dest,
                ServiceType::Request {
                    retries: 3,
                    base_timeout_ms: 200,
                },
                Vec::new(),
                def.priority,
                def.authenticated,
                1,
            )
            .map_err(IzotError::Protocol)?;
        self.dp_pending_tags.insert(tag, index);
        Ok(())
    }

    /// Direct application message send (distinct from a data-point
    /// propagate): the host picks service type and destination itself.
    #[allow(clippy::too_many_arguments)]
    pub fn send_msg(
        &mut self,
        now: MonotonicMillis,
        dest: Destination,
        wire_dest: WireAddress,
        service: ServiceType,
        payload: Vec<u8>,
        priority: bool,
        authenticated: bool,
    ) -> Result<u32, IzotError> {
        let tag = self.allocate_tag();
        let expected_acks = if service.expects_confirmation() { 1 } else { 0 };
        self.engine
            .send_msg(now, tag, dest, wire_dest, service, payload, priority, authenticated, expected_acks)
            .map_err(IzotError::Protocol)?;
        Ok(tag)
    }

    /// §4.7 Update receipt: copies an incoming bound update into storage
    /// and schedules a persistence commit if the DP calls for one.
    pub fn receive_update(&mut self, now: MonotonicMillis, index: u16, data: &[u8]) -> Result<(), IzotError> {
        let schedules_commit = self.datapoints.receive_update(index, data)?;
        self.callbacks.fire_datapoint_update_occurred(index);
        if schedules_commit {
            self.schedule_application_data_commit(now);
        }
        Ok(())
    }

    fn schedule_application_data_commit(&mut self, now: MonotonicMillis) {
        let payload: Vec<u8> = self
            .datapoints
            .indices()
            .flat_map(|i| self.datapoints.storage(i).unwrap_or(&[]).to_vec())
            .collect();
        let header = SegmentHeader {
            length: payload.len() as u32,
            segment_signature: 0,
            application_signature: 0,
            version: 1,
            checksum: lon_config::checksum::compute(&payload),
        };
        self.persist.mark_dirty(now, Segment::ApplicationData, header, payload);
    }

    fn apply_lifecycle(&mut self, req: ModeRequest, now: MonotonicMillis) {
        let events = self.lifecycle.apply(req);
        for event in events {
            match event {
                LifecycleEvent::Offline => self.callbacks.fire_offline(),
                LifecycleEvent::Online => self.callbacks.fire_online(),
                LifecycleEvent::Reset { .. } => self.callbacks.fire_reset(),
                LifecycleEvent::ServiceLedChanged(led) => self.callbacks.fire_service_led_status(led),
                LifecycleEvent::ConfigPersistRequested => {
                    self.config_image.recompute_checksum();
                    let bytes = self.config_image.checksum_bytes();
                    let header = SegmentHeader {
                        length: bytes.len() as u32,
                        segment_signature: 0,
                        application_signature: 0,
                        version: 1,
                        checksum: self.config_image.checksum().value(),
                    };
                    self.persist.mark_dirty(now, Segment::NetworkImage, header, bytes);
                }
                LifecycleEvent::PhysicalResetRequested => {}
            }
        }
    }

    pub fn request_mode(&mut self, now: MonotonicMillis, req: ModeRequest) {
        self.apply_lifecycle(req, now);
    }

    pub fn lifecycle(&self) -> &DeviceLifecycle {
        &self.lifecycle
    }

    /// §4.6: safe to reboot once a physical reset was requested and no
    /// segment is still waiting on the commit guard-band timer.
    pub fn ready_for_board_reboot(&self) -> bool {
        self.lifecycle.ready_for_board_reboot(self.persist.has_pending_commit())
    }

    /// Forces every dirty segment to commit now, used before an imminent
    /// reboot rather than waiting on the guard-band timer (§4.1).
    pub fn flush_persistent_store(&mut self) {
        self.persist.flush_now();
    }

    fn dispatch_protocol_event(&mut self, event: ProtocolEvent) {
        match event {
            ProtocolEvent::MsgCompleted { tag, success } => {
                if let Some(index) = self.dp_pending_tags.remove(&tag) {
                    self.callbacks.fire_datapoint_update_completed(index, success);
                } else {
                    self.callbacks.fire_msg_completed(tag, success);
                }
                if !success {
                    self.status.record_transaction_timeout();
                }
            }
            ProtocolEvent::ResponseArrived { tag, source, data } => {
                let (source_subnet, source_node) = subnet_node(source);
                self.callbacks.fire_response_arrived(ResponseArrivedInfo {
                    tag,
                    source_subnet,
                    source_node,
                    data,
                });
            }
            ProtocolEvent::MsgArrived {
                correlator,
                source,
                tid,
                authenticated,
                wants_response: _,
                payload,
            } => {
                let (source_subnet, source_node) = subnet_node(source);
                self.callbacks.fire_msg_arrived(MsgArrivedInfo {
                    correlator,
                    source_subnet,
                    source_node,
                    tid,
                    authenticated,
                    payload,
                });
            }
            ProtocolEvent::ServicePin { .. } => {
                self.callbacks.fire_service_pin_pressed();
            }
            ProtocolEvent::Wink => self.callbacks.fire_wink(),
        }
    }

    /// A service-pin hold duration is measured by the CAL's debounce
    /// logic, not this crate; the host calls this directly once its own
    /// timing decides the press qualifies as "held" (§6
    /// `IzotServicePinHeld`).
    pub fn notify_service_pin_held(&mut self) {
        self.callbacks.fire_service_pin_held();
    }

    /// One event-pump iteration (§2, §5): advances the protocol engine's
    /// send/receive pipelines, dispatches the resulting events, runs the
    /// persistent-store commit check, and performs the 1 Hz configuration
    /// checksum integrity check. Returns the encoded frames ready for
    /// whatever link transport (USB, LS/UDP) the host has wired up.
    pub fn pump(&mut self, now: MonotonicMillis) -> Vec<(u32, Vec<u8>)> {
        let (frames, events) = self.engine.pump(now);
        for event in events {
            self.dispatch_protocol_event(event);
        }

        self.persist.tick(now);

        if self.checksum_timer.poll(now) && !self.config_image.verify_checksum() {
            // S6: checksum self-heal. Force unconfigured, go offline, and
            // request a software reset; the host reboots once
            // ready_for_board_reboot() (driven by PhysicalReset) is true.
            tracing::warn!("configuration checksum mismatch: forcing ApplicationUnconfig");
            self.apply_lifecycle(ModeRequest::ChangeState(LifecycleState::ApplicationUnconfig), now);
            self.apply_lifecycle(ModeRequest::AppOffLine, now);
            self.apply_lifecycle(ModeRequest::AppReset, now);
        }

        frames
    }
}

fn subnet_node(addr: WireAddress) -> (u8, u8) {
    match addr {
        WireAddress::SubnetNode { subnet, node } => (subnet, node),
        WireAddress::Broadcast { subnet } => (subnet, 0),
        WireAddress::UniqueId { subnet, .. } => (subnet, 0),
        _ => (0, 0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lon_config::datapoint::Direction;
    use lon_persist::flash::InMemoryFlash;

    fn config() -> StackConfig {
        StackConfig {
            domain_id: DomainId::new(&[1]).unwrap(),
            source_subnet: 1,
            source_node: 1,
            auth_key: [0u8; 12],
            auth_scheme: AuthScheme::Legacy,
            tcs_capacity: 16,
            queue_depth: 8,
            address_capacity: 15,
            alias_capacity: 15,
            architecture_number: 1,
            firmware_version: 1,
            usb_profile: None,
            commit_guard_band_ms: 1000,
            retry_policy: RetryPolicy::default(),
            segment_sizes: vec![(Segment::NetworkImage, 256), (Segment::ApplicationData, 256)],
        }
    }

    fn context() -> StackContext<InMemoryFlash> {
        StackContext::new(config(), InMemoryFlash::new(4096), ResetCause::PowerUp)
    }

    #[test]
    fn fresh_stack_boots_application_unconfig() {
        let ctx = context();
        assert_eq!(ctx.lifecycle().state(), LifecycleState::ApplicationUnconfig);
    }

    #[test]
    fn unbound_propagate_completes_immediately_via_callback() {
        use std::sync::{Arc, Mutex};
        let mut ctx = context();
        let dp = DatapointDef::new(0, 2, Direction::Output).unwrap();
        ctx.register_datapoint(dp).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen2 = seen.clone();
        ctx.callbacks_mut().on_datapoint_update_completed = Some(Box::new(move |(idx, ok)| {
            seen2.lock().unwrap().push((idx, ok));
        }));
        ctx.propagate_by_index(0, 0).unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![(0, true)]);
    }

    #[test]
    fn checksum_mismatch_drives_unconfigured_transition() {
        let mut ctx = context();
        ctx.apply_lifecycle(ModeRequest::ChangeState(LifecycleState::ConfigOnLine), 0);
        ctx.config_image_mut().domains[0].subnet_id = 9;
        ctx.pump(1000);
        assert_eq!(ctx.lifecycle().state(), LifecycleState::ApplicationUnconfig);
    }

    #[test]
    fn reboot_gate_requires_no_pending_commit() {
        let mut ctx = context();
        // A config-state change schedules a network-image commit; a
        // physical reset must wait for it to drain before it is safe.
        ctx.request_mode(0, ModeRequest::ChangeState(LifecycleState::ConfigOnLine));
        ctx.request_mode(0, ModeRequest::PhysicalReset);
        assert!(!ctx.ready_for_board_reboot());
        ctx.flush_persistent_store();
        assert!(ctx.ready_for_board_reboot());
    }
}
