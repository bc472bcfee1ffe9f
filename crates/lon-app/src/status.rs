//! Status query surface (§6). spec.md lists the fields prose-style; this
//! gives them a concrete struct returned by `StackContext::status()`.

use crate::lifecycle::{AppMode, LifecycleState, ServiceLed};
use crate::reset::ResetCause;

#[derive(Debug, Clone, Copy, Default)]
pub struct StackStatus {
    pub transmit_errors: u32,
    pub transaction_timeouts: u32,
    pub receive_transactions_full: u32,
    pub lost_messages: u32,
    pub missed_messages: u32,
    pub reset_cause: ResetCause,
    pub node_state: Option<LifecycleState>,
    pub app_mode: Option<AppMode>,
    pub service_led: Option<ServiceLed>,
    pub architecture_number: u16,
    pub firmware_version: u16,
    pub error_log: u32,
    pub lost_events: u32,
}

impl StackStatus {
    pub fn new(architecture_number: u16, firmware_version: u16) -> Self {
        Self {
            architecture_number,
            firmware_version,
            reset_cause: ResetCause::PowerUp,
            ..Default::default()
        }
    }

    pub fn record_transmit_error(&mut self) {
        self.transmit_errors = self.transmit_errors.saturating_add(1);
    }

    pub fn record_transaction_timeout(&mut self) {
        self.transaction_timeouts = self.transaction_timeouts.saturating_add(1);
    }

    pub fn record_receive_transactions_full(&mut self) {
        self.receive_transactions_full = self.receive_transactions_full.saturating_add(1);
    }

    pub fn record_lost_message(&mut self) {
        self.lost_messages = self.lost_messages.saturating_add(1);
    }

    pub fn record_missed_message(&mut self) {
        self.missed_messages = self.missed_messages.saturating_add(1);
    }

    pub fn record_error_log_entry(&mut self) {
        self.error_log = self.error_log.saturating_add(1);
    }

    pub fn record_lost_event(&mut self) {
        self.lost_events = self.lost_events.saturating_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_saturate_rather_than_wrap() {
        let mut status = StackStatus::new(1, 1);
        status.transmit_errors = u32::MAX;
        status.record_transmit_error();
        assert_eq!(status.transmit_errors, u32::MAX);
    }

    #[test]
    fn new_status_carries_power_up_reset_cause() {
        let status = StackStatus::new(3, 7);
        assert_eq!(status.reset_cause, ResetCause::PowerUp);
        assert_eq!(status.architecture_number, 3);
        assert_eq!(status.firmware_version, 7);
    }
}
