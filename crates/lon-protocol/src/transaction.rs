//! Outgoing transaction lifecycle: retry/ack bookkeeping for a single
//! send, keyed by an application-supplied correlation tag (§4.3, §5
//! Cancellation).

use lon_rt::timer::{MonotonicMillis, Timer};

use crate::address::WireAddress;
use crate::service::ServiceType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryOutcome {
    /// Still waiting on the current timer.
    Wait,
    /// Timer expired with retries remaining: retransmit the same payload.
    Retransmit,
    /// Terminal: `true` iff every expected destination acked in budget
    /// (or, for `Unacknowledged`/`Repeated`, once all copies were sent).
    Done(bool),
}

#[derive(Debug, Clone)]
pub struct PendingTransaction {
    pub tag: u32,
    pub tid: u8,
    pub service: ServiceType,
    pub dest: WireAddress,
    pub payload: Vec<u8>,
    pub expected_acks: u32,
    pub acks_received: u32,
    pub responses: Vec<Vec<u8>>,
    pub authenticated: bool,
    pub priority: bool,
    pub challenge_nonce: Option<u64>,
    attempt: u32,
    sent_once: bool,
    superseded: bool,
    timer: Timer,
}

impl PendingTransaction {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        now: MonotonicMillis,
        tag: u32,
        tid: u8,
        service: ServiceType,
        dest: WireAddress,
        payload: Vec<u8>,
        expected_acks: u32,
        authenticated: bool,
        priority: bool,
    ) -> Self {
        let mut timer = Timer::new(service.timeout_for_attempt(0), false);
        timer.start(now);
        Self {
            tag,
            tid,
            service,
            dest,
            payload,
            expected_acks,
            acks_received: 0,
            responses: Vec::new(),
            authenticated,
            priority,
            challenge_nonce: None,
            attempt: 0,
            sent_once: false,
            superseded: false,
            timer,
        }
    }

    pub fn mark_sent(&mut self) {
        self.sent_once = true;
    }

    pub fn was_sent(&self) -> bool {
        self.sent_once
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Drop this transaction before its first wire copy goes out, e.g. a
    /// fresh `propagate` of the same non-sync data-point superseding an
    /// older one still queued (§5 Cancellation). No-op once sent, and
    /// `false` on a repeat call once already superseded (nothing new was
    /// dropped).
    pub fn supersede(&mut self) -> bool {
        if self.sent_once || self.superseded {
            return false;
        }
        self.superseded = true;
        true
    }

    pub fn is_superseded(&self) -> bool {
        self.superseded
    }

    pub fn record_ack(&mut self) {
        self.acks_received = self.acks_received.saturating_add(1);
    }

    pub fn record_response(&mut self, data: Vec<u8>) {
        self.acks_received = self.acks_received.saturating_add(1);
        self.responses.push(data);
    }

    pub fn is_satisfied(&self) -> bool {
        self.acks_received >= self.expected_acks
    }

    fn max_attempts(&self) -> u32 {
        match self.service {
            ServiceType::Repeated { count, .. } => count as u32,
            ServiceType::Acknowledged { retries, .. } | ServiceType::Request { retries, .. } => {
                retries as u32
            }
            ServiceType::Unacknowledged => 0,
        }
    }

    /// Repeated fires a fixed count regardless of acks; everything else
    /// completes once acked (Unacknowledged has `expected_acks == 0`, so
    /// it is trivially satisfied as soon as it is sent).
    fn is_done(&self) -> bool {
        match self.service {
            ServiceType::Repeated { .. } => self.sent_once && self.attempt >= self.max_attempts(),
            _ => self.is_satisfied(),
        }
    }

    fn completion_success(&self) -> bool {
        match self.service {
            ServiceType::Unacknowledged | ServiceType::Repeated { .. } => true,
            _ => self.is_satisfied(),
        }
    }

    /// Polls the retry timer. Returns `Retransmit` when another wire copy
    /// is due, `Done(success)` once satisfied or retries are exhausted.
    pub fn poll_retry(&mut self, now: MonotonicMillis) -> RetryOutcome {
        if self.is_done() {
            return RetryOutcome::Done(self.completion_success());
        }
        if !self.sent_once || !self.timer.poll(now) {
            return RetryOutcome::Wait;
        }
        if self.attempt >= self.max_attempts() {
            return RetryOutcome::Done(self.completion_success());
        }
        self.attempt += 1;
        self.timer = Timer::new(self.service.timeout_for_attempt(self.attempt), false);
        self.timer.start(now);
        RetryOutcome::Retransmit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn svc() -> ServiceType {
        ServiceType::Acknowledged {
            retries: 2,
            base_timeout_ms: 100,
        }
    }

    fn fresh(service: ServiceType, expected_acks: u32) -> PendingTransaction {
        let mut t = PendingTransaction::new(0, 1, 0, service, WireAddress::None, vec![], expected_acks, false, false);
        t.mark_sent();
        t
    }

    #[test]
    fn satisfied_transaction_completes_successfully() {
        let mut t = fresh(svc(), 1);
        t.record_ack();
        assert_eq!(t.poll_retry(0), RetryOutcome::Done(true));
    }

    #[test]
    fn exhausted_retries_complete_as_failure() {
        let mut t = fresh(svc(), 1);
        assert_eq!(t.poll_retry(100), RetryOutcome::Retransmit);
        assert_eq!(t.poll_retry(300), RetryOutcome::Retransmit);
        assert_eq!(t.poll_retry(700), RetryOutcome::Done(false));
    }

    #[test]
    fn repeated_service_fires_count_times_then_completes() {
        let mut t = fresh(
            ServiceType::Repeated {
                count: 3,
                interval_ms: 50,
            },
            0,
        );
        assert_eq!(t.poll_retry(50), RetryOutcome::Retransmit);
        assert_eq!(t.poll_retry(100), RetryOutcome::Retransmit);
        assert_eq!(t.poll_retry(150), RetryOutcome::Done(true));
    }

    #[test]
    fn unacknowledged_completes_once_sent() {
        let mut t = fresh(ServiceType::Unacknowledged, 0);
        assert_eq!(t.poll_retry(0), RetryOutcome::Done(true));
    }

    #[test]
    fn unsent_transaction_never_retries() {
        let t = PendingTransaction::new(0, 1, 0, svc(), WireAddress::None, vec![], 1, false, false);
        assert!(!t.was_sent());
    }

    #[test]
    fn supersede_before_send_succeeds_after_send_fails() {
        let mut t = PendingTransaction::new(0, 1, 0, svc(), WireAddress::None, vec![], 1, false, false);
        assert!(t.supersede());
        assert!(t.is_superseded());

        let mut t2 = PendingTransaction::new(0, 2, 0, svc(), WireAddress::None, vec![], 1, false, false);
        t2.mark_sent();
        assert!(!t2.supersede());
    }
}
