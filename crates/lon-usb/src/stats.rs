//! Per-interface counters (§4.5): saturating at `u32::MAX` rather than
//! wrapping, so a long-running interface's error counts stay meaningful.

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UsbStats {
    pub rx_packets: u32,
    pub rx_bytes: u32,
    pub checksum_errors: u32,
    pub crc_errors: u32,
    pub frame_errors: u32,
    pub ack_timeout_errors: u32,
    pub duplicates: u32,
    pub tx_aborts: u32,
    pub tx_rejects: u32,
    pub ring_high_water_mark: u32,
    pub ring_drop_count: u32,
}

macro_rules! counter_bump {
    ($name:ident) => {
        pub fn $name(&mut self) {
            self.$name = self.$name.saturating_add(1);
        }
    };
}

impl UsbStats {
    counter_bump!(checksum_errors);
    counter_bump!(crc_errors);
    counter_bump!(frame_errors);
    counter_bump!(ack_timeout_errors);
    counter_bump!(duplicates);
    counter_bump!(tx_aborts);
    counter_bump!(tx_rejects);

    pub fn record_rx(&mut self, bytes: usize) {
        self.rx_packets = self.rx_packets.saturating_add(1);
        self.rx_bytes = self.rx_bytes.saturating_add(bytes as u32);
    }

    pub fn sync_ring(&mut self, high_water_mark: usize, drop_count: u64) {
        self.ring_high_water_mark = high_water_mark as u32;
        self.ring_drop_count = drop_count.min(u32::MAX as u64) as u32;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_saturate_instead_of_wrapping() {
        let mut stats = UsbStats {
            checksum_errors: u32::MAX,
            ..Default::default()
        };
        stats.checksum_errors();
        assert_eq!(stats.checksum_errors, u32::MAX);
    }

    #[test]
    fn rx_counters_accumulate() {
        let mut stats = UsbStats::default();
        stats.record_rx(10);
        stats.record_rx(5);
        assert_eq!(stats.rx_packets, 2);
        assert_eq!(stats.rx_bytes, 15);
    }
}
