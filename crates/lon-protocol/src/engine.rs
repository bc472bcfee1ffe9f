//! The protocol engine (C6): session/transport/auth/network layers
//! composed into the send/receive pipelines of §4.3, duplicate detection
//! via the transaction control sublayer, and the service-pin/wink
//! announcements.

use std::collections::HashMap;

use lon_config::{DomainId, MAX_DP_SIZE};
use lon_rt::timer::MonotonicMillis;
use lon_tcs::{Destination, Priority as TcsPriority, TcsTable, ValidateResult};

use crate::address::WireAddress;
use crate::auth::{AuthScheme, Challenge};
use crate::delta_backlog;
use crate::error::ProtocolError;
use crate::events::ProtocolEvent;
use crate::npdu::{NpduFrame, PduFormat};
use crate::pipeline::Pipeline;
use crate::service::ServiceType;
use crate::transaction::{PendingTransaction, RetryOutcome};

/// The five-hop send pipeline carries a tag through the first four stages
/// unchanged; the final (Network→Link) stage turns it into an encoded
/// frame ready for the link driver.
#[derive(Debug, Clone)]
enum OutgoingItem {
    Tag(u32),
    Frame { tag: u32, bytes: Vec<u8> },
}

pub struct EngineConfig {
    pub domain_id: DomainId,
    pub source_subnet: u8,
    pub source_node: u8,
    pub auth_key: [u8; 12],
    pub auth_scheme: AuthScheme,
    pub tcs_capacity: usize,
    pub queue_depth: usize,
}

pub struct ProtocolEngine {
    cfg: EngineConfig,
    tcs: TcsTable,
    pending: HashMap<u32, PendingTransaction>,
    priority_pipeline: Pipeline<OutgoingItem>,
    normal_pipeline: Pipeline<OutgoingItem>,
    next_correlator: u32,
    next_nonce: u64,
}

impl ProtocolEngine {
    pub fn new(cfg: EngineConfig) -> Self {
        let depth = cfg.queue_depth;
        Self {
            tcs: TcsTable::new(cfg.tcs_capacity),
            pending: HashMap::new(),
            priority_pipeline: Pipeline::new(&[depth; 6]),
            normal_pipeline: Pipeline::new(&[depth; 6]),
            next_correlator: 0,
            next_nonce: 0,
            cfg,
        }
    }

    /// Enqueues a new outgoing message. Returns the allocated TID. Callers
    /// build `dest` (for TCS fingerprinting) and `wire_dest` (the on-wire
    /// address encoding) separately since they may differ in shape (e.g. a
    /// group destination's member index is wire-only).
    #[allow(clippy::too_many_arguments)]
    pub fn send_msg(
        &mut self,
        now: MonotonicMillis,
        tag: u32,
        dest: Destination,
        wire_dest: WireAddress,
        service: ServiceType,
        payload: Vec<u8>,
        priority: bool,
        authenticated: bool,
        expected_acks: u32,
    ) -> Result<u8, ProtocolError> {
        if payload.len() > MAX_DP_SIZE {
            return Err(ProtocolError::InvalidMessageLength(payload.len()));
        }
        let tcs_priority = if priority {
            TcsPriority::High
        } else {
            TcsPriority::Normal
        };
        let tid = self
            .tcs
            .new_trans(now, tcs_priority, &dest)
            .map_err(|_| ProtocolError::NoFreeEntry)?;

        let expected_acks = if service.expects_confirmation() {
            expected_acks.max(1)
        } else {
            0
        };
        let txn = PendingTransaction::new(
            now,
            tag,
            tid,
            service,
            wire_dest,
            payload,
            expected_acks,
            authenticated,
            priority,
        );
        self.pending.insert(tag, txn);

        let pipeline = if priority {
            &mut self.priority_pipeline
        } else {
            &mut self.normal_pipeline
        };
        pipeline
            .push_input(OutgoingItem::Tag(tag))
            .map_err(|_| ProtocolError::QueueFull)?;
        Ok(tid)
    }

    /// Supersedes a still-queued (not yet sent) transaction, e.g. a fresh
    /// non-sync `propagate` of the same data-point. Returns `true` if the
    /// older send was actually dropped.
    pub fn supersede(&mut self, tag: u32) -> bool {
        self.pending.get_mut(&tag).map(|t| t.supersede()).unwrap_or(false)
    }

    fn advance_send_pipeline(
        pipeline: &mut Pipeline<OutgoingItem>,
        pending: &mut HashMap<u32, PendingTransaction>,
        cfg: &EngineConfig,
        next_nonce: &mut u64,
    ) -> Vec<(u32, Vec<u8>)> {
        // Stage 0 (App -> Session): pass through.
        pipeline.pump_stage(0, Some);
        // Stage 1 (Session -> Transport): pass through; TID already
        // allocated at send time.
        pipeline.pump_stage(1, Some);
        // Stage 2 (Transport -> Auth): drop transactions superseded
        // before their first wire copy.
        let pending_ref = &*pending;
        pipeline.pump_stage(2, |item| match &item {
            OutgoingItem::Tag(tag) => {
                if pending_ref.get(tag).map(|t| t.is_superseded()).unwrap_or(true) {
                    None
                } else {
                    Some(item)
                }
            }
            _ => Some(item),
        });
        // Stage 3 (Auth -> Network): attach a challenge nonce when the
        // transaction is authenticated.
        pipeline.pump_stage(3, |item| {
            if let OutgoingItem::Tag(tag) = &item {
                if let Some(txn) = pending.get_mut(tag) {
                    if txn.authenticated && txn.challenge_nonce.is_none() {
                        txn.challenge_nonce = Some(*next_nonce);
                        *next_nonce = next_nonce.wrapping_add(1);
                    }
                }
            }
            Some(item)
        });
        // Stage 4 (Network -> Link): build the encoded frame, computing
        // delta-backlog from the current pending-transaction count.
        let pending_count = pending.len();
        let backlog = delta_backlog::compute(pending_count);
        pipeline.pump_stage(4, |item| {
            let OutgoingItem::Tag(tag) = item else {
                return Some(item);
            };
            let Some(txn) = pending.get_mut(&tag) else {
                return None;
            };
            let frame = NpduFrame {
                priority: txn.priority,
                altpath: false,
                delta_backlog: backlog,
                pdu_format: PduFormat::Apdu,
                version: 0,
                domain_id: cfg.domain_id,
                source_subnet: cfg.source_subnet,
                source_node: cfg.source_node,
                destination: txn.dest,
                payload: txn.payload.clone(),
            };
            let bytes = frame.encode().ok()?;
            txn.mark_sent();
            Some(OutgoingItem::Frame { tag, bytes })
        });

        let mut out = Vec::new();
        while let Some(OutgoingItem::Frame { tag, bytes }) = pipeline.pop_output() {
            out.push((tag, bytes));
        }
        out
    }

    /// One pump iteration: advances both send pipelines (priority first),
    /// retires/retransmits pending transactions, and returns completion
    /// events alongside the frames ready for the link driver.
    pub fn pump(&mut self, now: MonotonicMillis) -> (Vec<(u32, Vec<u8>)>, Vec<ProtocolEvent>) {
        let mut ready = Self::advance_send_pipeline(
            &mut self.priority_pipeline,
            &mut self.pending,
            &self.cfg,
            &mut self.next_nonce,
        );
        ready.extend(Self::advance_send_pipeline(
            &mut self.normal_pipeline,
            &mut self.pending,
            &self.cfg,
            &mut self.next_nonce,
        ));

        let mut events = Vec::new();
        let mut retransmit_tags = Vec::new();
        let mut done_tags = Vec::new();
        for (&tag, txn) in self.pending.iter_mut() {
            if txn.is_superseded() {
                // The older send never reached the wire (§5 Cancellation);
                // its `propagate`/`send_msg` call already returned success,
                // so it still owes exactly one completion event (§8
                // invariant #1) rather than vanishing silently.
                events.push(ProtocolEvent::MsgCompleted { tag, success: true });
                done_tags.push(tag);
                continue;
            }
            match txn.poll_retry(now) {
                RetryOutcome::Wait => {}
                RetryOutcome::Retransmit => retransmit_tags.push(tag),
                RetryOutcome::Done(success) => {
                    events.push(ProtocolEvent::MsgCompleted { tag, success });
                    done_tags.push(tag);
                }
            }
        }
        for tag in retransmit_tags {
            if let Some(txn) = self.pending.get(&tag) {
                let pipeline = if txn.priority {
                    &mut self.priority_pipeline
                } else {
                    &mut self.normal_pipeline
                };
                let _ = pipeline.push_input(OutgoingItem::Tag(tag));
            }
        }
        for tag in done_tags {
            self.pending.remove(&tag);
        }
        (ready, events)
    }

    /// Records a received ack/response for `tag`'s outstanding
    /// transaction. Returns `false` if no such transaction is pending
    /// (already completed or never sent by this engine).
    pub fn receive_ack(&mut self, tag: u32, response: Option<Vec<u8>>) -> bool {
        match self.pending.get_mut(&tag) {
            Some(txn) => {
                match response {
                    Some(data) => txn.record_response(data),
                    None => txn.record_ack(),
                }
                true
            }
            None => false,
        }
    }

    /// Like [`receive_ack`](Self::receive_ack) for a `Request` service's
    /// response, but also surfaces the payload immediately as a
    /// [`ProtocolEvent::ResponseArrived`] rather than waiting for the
    /// transaction to complete (a multicast request may fan in several
    /// responses the application wants to see as they land).
    pub fn receive_response(
        &mut self,
        tag: u32,
        source: WireAddress,
        data: Vec<u8>,
    ) -> Option<ProtocolEvent> {
        let txn = self.pending.get_mut(&tag)?;
        txn.record_response(data.clone());
        Some(ProtocolEvent::ResponseArrived { tag, source, data })
    }

    /// Processes a fully decoded incoming frame addressed to this node
    /// (§4.3's receive pipeline, Link -> Network -> Auth -> Transport ->
    /// Session -> App). `tid`/`wants_response`/`authenticated` come from
    /// the transport/session header this crate does not itself parse out
    /// of `frame.payload`. Returns `None` when the frame is a duplicate
    /// the transaction control sublayer already has cached a response
    /// for (§4.3 Duplicate detection, S3): the caller resends that cached
    /// response rather than invoking the application again.
    pub fn receive_frame(
        &mut self,
        now: MonotonicMillis,
        frame: &NpduFrame,
        tid: u8,
        wants_response: bool,
        authenticated: bool,
    ) -> Option<ProtocolEvent> {
        if self.validate_incoming(now, frame.priority, tid) == ValidateResult::Current {
            return None;
        }
        Some(ProtocolEvent::MsgArrived {
            correlator: self.next_correlator(),
            source: WireAddress::SubnetNode {
                subnet: frame.source_subnet,
                node: frame.source_node,
            },
            tid,
            authenticated,
            wants_response,
            payload: frame.payload.clone(),
        })
    }

    /// A service-pin message arrived (§4.3): wraps the node's identity
    /// into the event the application subscribes to, unconditionally
    /// (unlike `receive_frame`, service-pin messages are never duplicate
    /// suppressed).
    pub fn receive_service_pin(&self, unique_id: [u8; 6], program_id: [u8; 8]) -> ProtocolEvent {
        ProtocolEvent::ServicePin {
            unique_id,
            program_id,
        }
    }

    /// A wink request arrived (§4.3/§6): the application flashes its
    /// service LED or equivalent.
    pub fn receive_wink(&self) -> ProtocolEvent {
        ProtocolEvent::Wink
    }

    /// Validates an incoming acknowledged/request frame's TID for
    /// duplicate suppression (§4.3 Duplicate detection, S3). `Current`
    /// means this is a replay: the caller should resend the cached
    /// response rather than invoking the application.
    pub fn validate_incoming(
        &mut self,
        now: MonotonicMillis,
        priority: bool,
        tid: u8,
    ) -> ValidateResult {
        let p = if priority { TcsPriority::High } else { TcsPriority::Normal };
        self.tcs.validate_trans(p, now, tid)
    }

    /// Allocates a fresh correlator for an incoming request that expects a
    /// `send_response`/`release_correlator` from the application.
    pub fn next_correlator(&mut self) -> u32 {
        let c = self.next_correlator;
        self.next_correlator = self.next_correlator.wrapping_add(1);
        c
    }

    /// Verifies an authentication response against the engine's domain
    /// key, as recorded by `challenge_nonce` when the outgoing challenge
    /// was attached.
    pub fn verify_auth_response(&self, tag: u32, response: &[u8; 8]) -> bool {
        let Some(txn) = self.pending.get(&tag) else {
            return false;
        };
        let Some(nonce) = txn.challenge_nonce else {
            return false;
        };
        Challenge::new(nonce).verify(&self.cfg.auth_key, self.cfg.auth_scheme, response)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lon_tcs::dest::DestinationAddress;

    fn cfg() -> EngineConfig {
        EngineConfig {
            domain_id: DomainId::new(&[1]).unwrap(),
            source_subnet: 1,
            source_node: 1,
            auth_key: [9u8; 12],
            auth_scheme: AuthScheme::Legacy,
            tcs_capacity: 16,
            queue_depth: 8,
        }
    }

    fn dest(node: u8) -> Destination {
        Destination {
            domain_id: DomainId::new(&[1]).unwrap(),
            address: DestinationAddress::SubnetNode { subnet: 1, node },
        }
    }

    #[test]
    fn unacknowledged_send_completes_after_one_pump() {
        let mut engine = ProtocolEngine::new(cfg());
        engine
            .send_msg(
                0,
                1,
                dest(2),
                WireAddress::SubnetNode { subnet: 1, node: 2 },
                ServiceType::Unacknowledged,
                vec![1, 2, 3],
                false,
                false,
                0,
            )
            .unwrap();
        let (frames, events) = engine.pump(0);
        assert_eq!(frames.len(), 1);
        assert!(events
            .iter()
            .any(|e| matches!(e, ProtocolEvent::MsgCompleted { tag: 1, success: true })));
    }

    #[test]
    fn acknowledged_send_waits_for_ack_then_completes() {
        let mut engine = ProtocolEngine::new(cfg());
        engine
            .send_msg(
                0,
                5,
                dest(2),
                WireAddress::SubnetNode { subnet: 1, node: 2 },
                ServiceType::Acknowledged {
                    retries: 2,
                    base_timeout_ms: 100,
                },
                vec![9],
                false,
                false,
                1,
            )
            .unwrap();
        let (frames, events) = engine.pump(0);
        assert_eq!(frames.len(), 1);
        assert!(events.is_empty());

        engine.receive_ack(5, None);
        let (_, events) = engine.pump(0);
        assert_eq!(
            events,
            vec![ProtocolEvent::MsgCompleted {
                tag: 5,
                success: true
            }]
        );
    }

    #[test]
    fn no_ack_exhausts_retries_and_fails() {
        let mut engine = ProtocolEngine::new(cfg());
        engine
            .send_msg(
                0,
                7,
                dest(2),
                WireAddress::SubnetNode { subnet: 1, node: 2 },
                ServiceType::Acknowledged {
                    retries: 1,
                    base_timeout_ms: 100,
                },
                vec![9],
                false,
                false,
                1,
            )
            .unwrap();
        engine.pump(0);
        engine.pump(100);
        let (_, events) = engine.pump(300);
        assert_eq!(
            events,
            vec![ProtocolEvent::MsgCompleted {
                tag: 7,
                success: false
            }]
        );
    }

    #[test]
    fn priority_pipeline_drains_before_normal() {
        let mut engine = ProtocolEngine::new(cfg());
        engine
            .send_msg(
                0,
                1,
                dest(2),
                WireAddress::SubnetNode { subnet: 1, node: 2 },
                ServiceType::Unacknowledged,
                vec![1],
                false,
                false,
                0,
            )
            .unwrap();
        engine
            .send_msg(
                0,
                2,
                dest(3),
                WireAddress::SubnetNode { subnet: 1, node: 3 },
                ServiceType::Unacknowledged,
                vec![2],
                true,
                false,
                0,
            )
            .unwrap();
        let (frames, _) = engine.pump(0);
        assert_eq!(frames[0].0, 2);
        assert_eq!(frames[1].0, 1);
    }

    #[test]
    fn superseded_transaction_still_completes_and_is_reclaimed() {
        let mut engine = ProtocolEngine::new(cfg());
        engine
            .send_msg(
                0,
                1,
                dest(2),
                WireAddress::SubnetNode { subnet: 1, node: 2 },
                ServiceType::Unacknowledged,
                vec![1],
                false,
                false,
                0,
            )
            .unwrap();
        // Supersede before the first pump ever sends it (§5 Cancellation).
        assert!(engine.supersede(1));
        let (frames, events) = engine.pump(0);
        assert!(frames.is_empty());
        assert_eq!(
            events,
            vec![ProtocolEvent::MsgCompleted {
                tag: 1,
                success: true
            }]
        );
        assert_eq!(engine.pending_count(), 0);
    }

    #[test]
    fn receive_frame_reports_msg_arrived_once_per_tid() {
        let mut engine = ProtocolEngine::new(cfg());
        let frame = NpduFrame {
            priority: false,
            altpath: false,
            delta_backlog: 0,
            pdu_format: crate::npdu::PduFormat::Apdu,
            version: 0,
            domain_id: DomainId::new(&[1]).unwrap(),
            source_subnet: 1,
            source_node: 9,
            destination: WireAddress::SubnetNode { subnet: 1, node: 1 },
            payload: vec![42],
        };
        let first = engine.receive_frame(0, &frame, 5, true, false);
        assert!(matches!(
            first,
            Some(ProtocolEvent::MsgArrived { tid: 5, wants_response: true, .. })
        ));
        // Same tid replayed inside the duplicate-detection window: suppressed.
        assert_eq!(engine.receive_frame(100, &frame, 5, true, false), None);
    }

    #[test]
    fn receive_response_surfaces_payload_for_outstanding_request() {
        let mut engine = ProtocolEngine::new(cfg());
        engine
            .send_msg(
                0,
                11,
                dest(2),
                WireAddress::SubnetNode { subnet: 1, node: 2 },
                ServiceType::Request {
                    retries: 2,
                    base_timeout_ms: 100,
                },
                vec![1],
                false,
                false,
                1,
            )
            .unwrap();
        let source = WireAddress::SubnetNode { subnet: 1, node: 2 };
        let event = engine.receive_response(11, source, vec![7, 8]);
        assert_eq!(
            event,
            Some(ProtocolEvent::ResponseArrived {
                tag: 11,
                source,
                data: vec![7, 8]
            })
        );
        assert_eq!(engine.receive_response(999, source, vec![]), None);
    }

    #[test]
    fn duplicate_incoming_request_is_suppressed() {
        let mut engine = ProtocolEngine::new(cfg());
        assert_eq!(
            engine.validate_incoming(0, false, 5),
            ValidateResult::NotCurrent
        );
        assert_eq!(
            engine.validate_incoming(1000, false, 5),
            ValidateResult::Current
        );
        assert_eq!(
            engine.validate_incoming(1001, false, 6),
            ValidateResult::NotCurrent
        );
    }
}
