//! Ties the framing state machines to the per-interface queues (§4.5, §5).
//!
//! §5's concurrency note singles out the USB driver as the one place in the
//! stack that needs real locks: bytes arrive off an interrupt or a host
//! thread outside the cooperative pump, so [`UsbLinkDriver`] guards its
//! ring buffer and send queues with `Mutex` rather than relying on the
//! single-threaded-pump convention the rest of the stack uses.

use std::sync::Mutex;

use lon_rt::queue::BoundedQueue;
use lon_rt::ring::ByteRing;
use lon_rt::timer::MonotonicMillis;

use crate::downlink::{Downlink, SendKind};
use crate::error::UsbError;
use crate::profile::WireProfile;
use crate::stats::UsbStats;
use crate::uplink::{UplinkItem, UplinkParser};

pub const QUEUE_CAPACITY: usize = 16;
pub const MAX_UID_RETRIES: u32 = 5;
const RING_CAPACITY: usize = 4096;

struct FrameState {
    ring: ByteRing,
    uplink: UplinkParser,
    downlink: Downlink,
    stats: UsbStats,
}

struct Queues {
    tx_priority: BoundedQueue<(SendKind, Vec<u8>)>,
    tx_normal: BoundedQueue<Vec<u8>>,
    rx_priority: BoundedQueue<UplinkItem>,
    rx_normal: BoundedQueue<UplinkItem>,
}

impl Queues {
    fn new() -> Self {
        Self {
            tx_priority: BoundedQueue::new(QUEUE_CAPACITY),
            tx_normal: BoundedQueue::new(QUEUE_CAPACITY),
            rx_priority: BoundedQueue::new(QUEUE_CAPACITY),
            rx_normal: BoundedQueue::new(QUEUE_CAPACITY),
        }
    }
}

/// The USB serial link to an external LON transceiver: byte-stuffed
/// framing, U50/U61 profile handling, and bounded priority/normal queues
/// on both the send and receive side.
pub struct UsbLinkDriver {
    profile: WireProfile,
    frame: Mutex<FrameState>,
    queues: Mutex<Queues>,
}

impl UsbLinkDriver {
    pub fn new(profile: WireProfile) -> Self {
        Self {
            profile,
            frame: Mutex::new(FrameState {
                ring: ByteRing::new(RING_CAPACITY),
                uplink: UplinkParser::new(profile),
                downlink: Downlink::new(profile),
                stats: UsbStats::default(),
            }),
            queues: Mutex::new(Queues::new()),
        }
    }

    /// Runs the interface unique-ID handshake, retrying `attempt` up to
    /// [`MAX_UID_RETRIES`] times with exponential backoff between tries.
    /// `attempt` returns `true` on success; `backoff` is told the delay in
    /// milliseconds it should wait before the next call (the caller owns
    /// actually sleeping, since this runs outside the cooperative pump).
    pub fn start<A, B>(&self, mut attempt: A, mut backoff: B) -> Result<(), UsbError>
    where
        A: FnMut() -> bool,
        B: FnMut(u64),
    {
        for try_number in 0..MAX_UID_RETRIES {
            if attempt() {
                self.frame.lock().unwrap().downlink.mark_started();
                return Ok(());
            }
            if try_number + 1 < MAX_UID_RETRIES {
                backoff(100u64 << try_number);
            }
        }
        Err(UsbError::UidHandshakeFailed(MAX_UID_RETRIES))
    }

    /// Pushes newly arrived bytes into the ring buffer. Called from the
    /// ISR or host-side read thread; never from inside a pump iteration.
    pub fn on_bytes_received(&self, bytes: &[u8]) -> usize {
        self.frame.lock().unwrap().ring.push_slice(bytes)
    }

    /// Enqueues a frame for transmission. Code packets (acks, control)
    /// take the priority lane since sequencing depends on them draining
    /// first; messages take the normal lane.
    pub fn enqueue_tx(&self, kind: SendKind, frame: Vec<u8>) -> Result<(), UsbError> {
        let mut queues = self.queues.lock().unwrap();
        match kind {
            SendKind::CodePacket | SendKind::CodePacketRequestingResponse => queues
                .tx_priority
                .push((kind, frame))
                .map_err(|_| UsbError::QueueFull("tx_priority")),
            SendKind::Message => queues
                .tx_normal
                .push(frame)
                .map_err(|_| UsbError::QueueFull("tx_normal")),
        }
    }

    /// One pump iteration: parses whatever the ring currently holds and
    /// routes completed items into the receive queues, priority lane
    /// first. Returns what was actually enqueued (anything dropped for a
    /// full queue is still counted in `stats.rx_bytes`/`rx_packets`, but
    /// the caller sees fewer items than bytes parsed).
    pub fn pump_uplink(&self) -> Vec<UplinkItem> {
        let items = {
            let mut frame = self.frame.lock().unwrap();
            let FrameState { ring, uplink, stats, .. } = &mut *frame;
            uplink.pump(ring, stats)
        };
        let mut queues = self.queues.lock().unwrap();
        let mut delivered = Vec::with_capacity(items.len());
        for item in items {
            let lane = match &item {
                UplinkItem::CodePacket(_) => &mut queues.rx_priority,
                UplinkItem::Message(_) => &mut queues.rx_normal,
            };
            if lane.push(item.clone()).is_ok() {
                delivered.push(item);
            }
        }
        delivered
    }

    /// Drains the receive queues, priority lane fully before normal (S5).
    pub fn drain_rx(&self) -> Vec<UplinkItem> {
        let mut queues = self.queues.lock().unwrap();
        let mut out: Vec<UplinkItem> = queues.rx_priority.drain().collect();
        out.extend(queues.rx_normal.drain());
        out
    }

    /// Pops and hands the next send-lane frame to a transmitter, priority
    /// lane first. Returns `None` once both lanes are drained or a send is
    /// already outstanding on the downlink state machine.
    pub fn next_tx(&self, now: MonotonicMillis) -> Option<(SendKind, Vec<u8>)> {
        let mut frame = self.frame.lock().unwrap();
        if !frame.downlink.is_idle() {
            return None;
        }
        let mut queues = self.queues.lock().unwrap();
        if let Some((kind, f)) = queues.tx_priority.pop() {
            frame.downlink.begin_send(now, kind);
            return Some((kind, f));
        }
        if let Some(f) = queues.tx_normal.pop() {
            frame.downlink.begin_send(now, SendKind::Message);
            return Some((SendKind::Message, f));
        }
        None
    }

    pub fn on_ack(&self, sequence: u8) -> bool {
        self.frame.lock().unwrap().downlink.on_ack(sequence)
    }

    /// Polls the downlink ack-wait timer; resyncs and counts a timeout in
    /// `stats` on expiry.
    pub fn poll_ack_timeout(&self, now: MonotonicMillis) -> bool {
        let mut frame = self.frame.lock().unwrap();
        let FrameState { downlink, stats, .. } = &mut *frame;
        downlink.poll_timeout(now, stats)
    }

    pub fn stats(&self) -> UsbStats {
        self.frame.lock().unwrap().stats
    }

    pub fn profile(&self) -> WireProfile {
        self.profile
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame;

    #[test]
    fn handshake_succeeds_within_retry_budget() {
        let driver = UsbLinkDriver::new(WireProfile::U50);
        let mut calls = 0;
        let mut backoffs = Vec::new();
        let result = driver.start(
            || {
                calls += 1;
                calls == 3
            },
            |ms| backoffs.push(ms),
        );
        assert!(result.is_ok());
        assert_eq!(calls, 3);
        assert_eq!(backoffs, vec![100, 200]);
    }

    #[test]
    fn handshake_exhausts_retries_and_reports_failure() {
        let driver = UsbLinkDriver::new(WireProfile::U50);
        let mut calls = 0;
        let result = driver.start(
            || {
                calls += 1;
                false
            },
            |_| {},
        );
        assert_eq!(result, Err(UsbError::UidHandshakeFailed(MAX_UID_RETRIES)));
        assert_eq!(calls, MAX_UID_RETRIES);
    }

    #[test]
    fn tx_queue_full_is_reported_per_lane() {
        let driver = UsbLinkDriver::new(WireProfile::U61);
        for _ in 0..QUEUE_CAPACITY {
            driver.enqueue_tx(SendKind::Message, vec![0]).unwrap();
        }
        assert_eq!(
            driver.enqueue_tx(SendKind::Message, vec![0]),
            Err(UsbError::QueueFull("tx_normal"))
        );
    }

    #[test]
    fn code_packet_requesting_response_reaches_response_wait() {
        let driver = UsbLinkDriver::new(WireProfile::U61);
        driver
            .enqueue_tx(SendKind::CodePacketRequestingResponse, vec![9])
            .unwrap();

        let (kind, bytes) = driver.next_tx(0).unwrap();
        assert_eq!(kind, SendKind::CodePacketRequestingResponse);
        assert_eq!(bytes, vec![9]);
        assert!(!driver.frame.lock().unwrap().downlink.is_idle());
    }

    #[test]
    fn uplink_items_route_to_priority_and_normal_lanes() {
        let driver = UsbLinkDriver::new(WireProfile::U61);
        let mut raw = vec![0x7Eu8, 0x00, 5];
        frame::escape_into(b"hello", &mut raw);
        raw.push(frame::checksum(b"hello"));
        driver.on_bytes_received(&raw);

        let delivered = driver.pump_uplink();
        assert_eq!(delivered, vec![UplinkItem::Message(b"hello".to_vec())]);

        let drained = driver.drain_rx();
        assert_eq!(drained, vec![UplinkItem::Message(b"hello".to_vec())]);
        assert!(driver.drain_rx().is_empty());
    }
}
