//! Uplink (receive) framing state machine (§4.5): drains the receive ring
//! buffer in bounded chunks so a burst of bytes from the transceiver
//! cannot stall the cooperative pump, and reassembles complete frames
//! byte-by-byte through the six named states:
//!
//! `IDLE → FRAME_CODE → FRAME_PARAMETER → CODE_PACKET_CHECKSUM → MESSAGE
//! → ESCAPED_DATA → IDLE`
//!
//! `FRAME_PARAMETER`/`CODE_PACKET_CHECKSUM` apply only when the code byte
//! marks a control frame (ack/resync, U50 profile only); a code byte that
//! instead marks "message follows" goes straight from `FRAME_CODE` to
//! `MESSAGE`, which reads the one-byte length prefix `ESCAPED_DATA`
//! unescapes up to, with a trailing unescaped checksum closing the frame
//! back out to `IDLE`. Nothing in spec.md's §6 literally numbers where
//! the message length lives in the byte stream; a length prefix is the
//! implementation-defined resolution (SPEC_FULL.md) needed to find a
//! message's end inside a byte-stuffed stream.

use lon_rt::ring::ByteRing;

use crate::frame::{self, ESCAPE, SYNC};
use crate::profile::WireProfile;
use crate::stats::UsbStats;

pub const MAX_BYTES_PER_ITERATION: usize = 128;
pub const MAX_BYTES_PER_WINDOW: usize = 512;
const WINDOW_ITERATIONS: u32 = (MAX_BYTES_PER_WINDOW / MAX_BYTES_PER_ITERATION) as u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    FrameCode,
    FrameParameter,
    CodePacketChecksum,
    Message,
    EscapedData,
    MessageChecksum,
}

/// A fully reassembled code packet: U50 profile's 3-bit-sequence,
/// ack-bit, 4-bit-command control frame, with no message payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodePacket {
    pub sequence: u8,
    pub ack: bool,
    pub command: u8,
    pub parameter: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UplinkItem {
    CodePacket(CodePacket),
    Message(Vec<u8>),
}

/// Command nibble reserved to mean "a message frame follows this code
/// byte" rather than "this code byte is itself a complete control frame".
const COMMAND_MESSAGE_FOLLOWS: u8 = 0x0F;

pub struct UplinkParser {
    profile: WireProfile,
    state: State,
    code_byte: u8,
    parameter: u8,
    message_len: usize,
    escaped_buf: Vec<u8>,
    escape_pending: bool,
    window_iterations: u32,
    window_bytes_used: usize,
}

impl UplinkParser {
    pub fn new(profile: WireProfile) -> Self {
        Self {
            profile,
            state: State::Idle,
            code_byte: 0,
            parameter: 0,
            message_len: 0,
            escaped_buf: Vec::new(),
            escape_pending: false,
            window_iterations: 0,
            window_bytes_used: 0,
        }
    }

    fn window_budget(&mut self) -> usize {
        if self.window_iterations == 0 {
            self.window_bytes_used = 0;
        }
        self.window_iterations = (self.window_iterations + 1) % WINDOW_ITERATIONS.max(1);
        MAX_BYTES_PER_WINDOW.saturating_sub(self.window_bytes_used)
    }

    /// One pump iteration: drains at most [`MAX_BYTES_PER_ITERATION`]
    /// bytes from `ring`, bounded additionally by the rolling
    /// [`MAX_BYTES_PER_WINDOW`] budget, returning every message or code
    /// packet completed along the way.
    pub fn pump(&mut self, ring: &mut ByteRing, stats: &mut UsbStats) -> Vec<UplinkItem> {
        stats.sync_ring(ring.high_water_mark(), ring.drop_count());
        let budget = self.window_budget().min(MAX_BYTES_PER_ITERATION);
        let mut chunk = vec![0u8; budget];
        let drained = ring.pop_into(&mut chunk, budget);
        chunk.truncate(drained);
        self.window_bytes_used += drained;

        let mut out = Vec::new();
        for b in chunk {
            if let Some(item) = self.feed(b, stats) {
                out.push(item);
            }
        }
        out
    }

    fn feed(&mut self, b: u8, stats: &mut UsbStats) -> Option<UplinkItem> {
        // A bare SYNC outside of escaped-data restarts framing: recovery
        // from a dropped or corrupted byte.
        if !matches!(self.state, State::Idle | State::EscapedData) && b == SYNC {
            stats.frame_errors();
            self.reset();
            self.state = State::FrameCode;
            return None;
        }
        match self.state {
            State::Idle => {
                if b == SYNC {
                    self.state = State::FrameCode;
                }
                None
            }
            State::FrameCode => {
                self.code_byte = b;
                self.state = if self.profile.uses_sequencing() {
                    State::FrameParameter
                } else {
                    State::Message
                };
                None
            }
            State::FrameParameter => {
                self.parameter = b;
                let command = self.code_byte & 0x0F;
                self.state = if command == COMMAND_MESSAGE_FOLLOWS {
                    State::Message
                } else {
                    State::CodePacketChecksum
                };
                None
            }
            State::CodePacketChecksum => {
                let expected = frame::checksum(&[self.code_byte, self.parameter]);
                self.state = State::Idle;
                if b != expected {
                    stats.checksum_errors();
                    return None;
                }
                Some(UplinkItem::CodePacket(CodePacket {
                    sequence: (self.code_byte >> 5) & 0x07,
                    ack: self.code_byte & 0x10 != 0,
                    command: self.code_byte & 0x0F,
                    parameter: self.parameter,
                }))
            }
            State::Message => {
                self.message_len = b as usize;
                self.escaped_buf.clear();
                self.escape_pending = false;
                self.state = if self.message_len == 0 {
                    State::MessageChecksum
                } else {
                    State::EscapedData
                };
                None
            }
            State::EscapedData => {
                if self.escape_pending {
                    self.escaped_buf.push(b);
                    self.escape_pending = false;
                } else if b == ESCAPE {
                    self.escape_pending = true;
                    return None;
                } else {
                    self.escaped_buf.push(b);
                }
                if self.escaped_buf.len() >= self.message_len {
                    self.state = State::MessageChecksum;
                }
                None
            }
            State::MessageChecksum => {
                self.state = State::Idle;
                let computed = frame::checksum(&self.escaped_buf);
                if b != computed {
                    stats.checksum_errors();
                    return None;
                }
                let message = std::mem::take(&mut self.escaped_buf);
                stats.record_rx(message.len());
                Some(UplinkItem::Message(message))
            }
        }
    }

    fn reset(&mut self) {
        self.state = State::Idle;
        self.escaped_buf.clear();
        self.escape_pending = false;
    }
}
