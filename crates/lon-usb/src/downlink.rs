//! Downlink (send) sequencing state machine (§4.5): on the U50 profile,
//! every outbound frame carries a 3-bit sequence number and waits for the
//! peer to ack it within `ACK_WAIT_TIME`; a timeout triggers resync
//! (`NI_RESYNC`) rather than a blind retransmit, since the peer may have
//! missed the frame or the ack.
//!
//! States: `START → IDLE → CP_ACK_WAIT | MSG_ACK_WAIT | CP_MSG_REQ_ACK_WAIT
//! | CP_RESPONSE_WAIT → IDLE`. `CpMsgReqAckWait`/`CpResponseWait` cover a
//! code packet that itself solicits a message-shaped response (the
//! interface unique-ID read during startup is one such exchange).

use lon_rt::timer::{MonotonicMillis, Timer};

use crate::profile::WireProfile;
use crate::stats::UsbStats;

pub const ACK_WAIT_TIME_MS: u64 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownlinkState {
    Start,
    Idle,
    CpAckWait,
    MsgAckWait,
    CpMsgReqAckWait,
    CpResponseWait,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendKind {
    CodePacket,
    Message,
    CodePacketRequestingResponse,
}

pub struct Downlink {
    profile: WireProfile,
    state: DownlinkState,
    sequence: u8,
    ack_timer: Timer,
    pending_sequence: Option<u8>,
}

impl Downlink {
    pub fn new(profile: WireProfile) -> Self {
        Self {
            profile,
            state: DownlinkState::Start,
            sequence: 0,
            ack_timer: Timer::new(ACK_WAIT_TIME_MS, false),
            pending_sequence: None,
        }
    }

    /// Completes the startup handshake (`START` -> `IDLE`); called once
    /// the interface unique-ID has been read.
    pub fn mark_started(&mut self) {
        self.state = DownlinkState::Idle;
    }

    pub fn state(&self) -> DownlinkState {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == DownlinkState::Idle
    }

    /// Begins sending a frame of `kind`. Returns the sequence number to
    /// stamp on the wire frame (always 0 on the U61 profile, which has no
    /// sequencing). No-ops (returns `None`) if a prior send is still
    /// outstanding.
    pub fn begin_send(&mut self, now: MonotonicMillis, kind: SendKind) -> Option<u8> {
        if !self.is_idle() {
            return None;
        }
        if !self.profile.uses_sequencing() {
            // U61 is fire-and-forget: no ack wait, stay IDLE.
            return Some(0);
        }
        let seq = self.sequence;
        self.pending_sequence = Some(seq);
        self.sequence = (self.sequence + 1) % 8;
        self.state = match kind {
            SendKind::CodePacket => DownlinkState::CpAckWait,
            SendKind::Message => DownlinkState::MsgAckWait,
            SendKind::CodePacketRequestingResponse => DownlinkState::CpMsgReqAckWait,
        };
        self.ack_timer.start(now);
        Some(seq)
    }

    /// Records the peer's ack for `sequence`. Returns `true` iff it
    /// matched the outstanding send, which also returns the state to
    /// `IDLE` (or, for a code packet requesting a response, advances to
    /// `CP_RESPONSE_WAIT` to await the reply payload).
    pub fn on_ack(&mut self, sequence: u8) -> bool {
        if self.pending_sequence != Some(sequence) {
            return false;
        }
        self.pending_sequence = None;
        self.ack_timer.cancel();
        self.state = match self.state {
            DownlinkState::CpMsgReqAckWait => DownlinkState::CpResponseWait,
            _ => DownlinkState::Idle,
        };
        true
    }

    /// The response payload for a `CpMsgReqAckWait` exchange has arrived:
    /// return to `IDLE`.
    pub fn on_response(&mut self) {
        if self.state == DownlinkState::CpResponseWait {
            self.state = DownlinkState::Idle;
        }
    }

    /// Polls the ack-wait timer. On expiry, resyncs back to `IDLE`
    /// (`NI_RESYNC`) and reports the timeout via `stats`.
    pub fn poll_timeout(&mut self, now: MonotonicMillis, stats: &mut UsbStats) -> bool {
        if matches!(self.state, DownlinkState::Idle | DownlinkState::Start) {
            return false;
        }
        if self.ack_timer.poll(now) {
            stats.ack_timeout_errors();
            self.pending_sequence = None;
            self.state = DownlinkState::Idle;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn u50_send_waits_for_matching_ack() {
        let mut dl = Downlink::new(WireProfile::U50);
        dl.mark_started();
        let seq = dl.begin_send(0, SendKind::Message).unwrap();
        assert_eq!(dl.state(), DownlinkState::MsgAckWait);
        assert!(!dl.on_ack(seq.wrapping_add(1)));
        assert!(dl.on_ack(seq));
        assert!(dl.is_idle());
    }

    #[test]
    fn ack_timeout_resyncs_to_idle_and_counts_error() {
        let mut dl = Downlink::new(WireProfile::U50);
        dl.mark_started();
        dl.begin_send(0, SendKind::CodePacket).unwrap();
        let mut stats = UsbStats::default();
        assert!(!dl.poll_timeout(100, &mut stats));
        assert!(dl.poll_timeout(ACK_WAIT_TIME_MS, &mut stats));
        assert!(dl.is_idle());
        assert_eq!(stats.ack_timeout_errors, 1);
    }

    #[test]
    fn u61_has_no_sequencing_and_never_waits() {
        let mut dl = Downlink::new(WireProfile::U61);
        dl.mark_started();
        let seq = dl.begin_send(0, SendKind::Message).unwrap();
        assert_eq!(seq, 0);
        assert!(dl.is_idle());
    }

    #[test]
    fn second_send_is_rejected_while_one_is_outstanding() {
        let mut dl = Downlink::new(WireProfile::U50);
        dl.mark_started();
        dl.begin_send(0, SendKind::Message).unwrap();
        assert!(dl.begin_send(0, SendKind::Message).is_none());
    }

    #[test]
    fn code_packet_requesting_response_waits_for_both_ack_and_response() {
        let mut dl = Downlink::new(WireProfile::U50);
        dl.mark_started();
        let seq = dl
            .begin_send(0, SendKind::CodePacketRequestingResponse)
            .unwrap();
        assert!(dl.on_ack(seq));
        assert_eq!(dl.state(), DownlinkState::CpResponseWait);
        dl.on_response();
        assert!(dl.is_idle());
    }

    #[test]
    fn sequence_wraps_at_eight() {
        let mut dl = Downlink::new(WireProfile::U50);
        dl.mark_started();
        for expected in 0..16u8 {
            let seq = dl.begin_send(0, SendKind::Message).unwrap();
            assert_eq!(seq, expected % 8);
            dl.on_ack(seq);
        }
    }
}
