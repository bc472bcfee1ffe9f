//! Segment kinds, the on-flash transaction record, and the content header
//! that follows it.

/// The persisted segment kinds named in §3. `SecurityIi` corresponds to
/// the source's conditionally-compiled Security II table; per the
/// resolved Open Question in §9 its `get_max_size` is 0 when the caller's
/// layout doesn't provision it, rather than being ambiguous.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Segment {
    NetworkImage,
    ApplicationData,
    SecurityIi,
    NodeDefinition,
    UniqueId,
    IsiConnections,
    IsiPersistent,
}

impl Segment {
    pub const ALL: [Segment; 7] = [
        Segment::NetworkImage,
        Segment::ApplicationData,
        Segment::SecurityIi,
        Segment::NodeDefinition,
        Segment::UniqueId,
        Segment::IsiConnections,
        Segment::IsiPersistent,
    ];
}

/// Marks, per segment, whether the durable payload should be trusted.
/// Lives immediately before the content header so it can be invalidated
/// (`enter_transaction`) with a single bit-clearing write and can only be
/// restored to both-valid (`exit_transaction`) after an erase.
pub const TX_VALID: u32 = 0xA5A5_A5A5;
pub const DATA_VALID: u32 = 0x5A5A_5A5A;
pub const ERASED: u32 = 0xFFFF_FFFF;

pub const TX_RECORD_SIZE: usize = 8;
pub const HEADER_SIZE: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionRecord {
    pub signature: u32,
    pub state: u32,
}

impl TransactionRecord {
    pub fn is_valid(&self) -> bool {
        self.signature == TX_VALID && self.state == DATA_VALID
    }

    pub fn encode(&self) -> [u8; TX_RECORD_SIZE] {
        let mut out = [0u8; TX_RECORD_SIZE];
        out[0..4].copy_from_slice(&self.signature.to_le_bytes());
        out[4..8].copy_from_slice(&self.state.to_le_bytes());
        out
    }

    pub fn decode(bytes: &[u8; TX_RECORD_SIZE]) -> Self {
        Self {
            signature: u32::from_le_bytes(bytes[0..4].try_into().unwrap()),
            state: u32::from_le_bytes(bytes[4..8].try_into().unwrap()),
        }
    }
}

/// The content header from §6: `{length, segment-signature,
/// application-signature, version, checksum}`, 16 bytes, little-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentHeader {
    pub length: u32,
    pub segment_signature: u32,
    pub application_signature: u32,
    pub version: u16,
    pub checksum: u16,
}

impl SegmentHeader {
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[0..4].copy_from_slice(&self.length.to_le_bytes());
        out[4..8].copy_from_slice(&self.segment_signature.to_le_bytes());
        out[8..12].copy_from_slice(&self.application_signature.to_le_bytes());
        out[12..14].copy_from_slice(&self.version.to_le_bytes());
        out[14..16].copy_from_slice(&self.checksum.to_le_bytes());
        out
    }

    pub fn decode(bytes: &[u8; HEADER_SIZE]) -> Self {
        Self {
            length: u32::from_le_bytes(bytes[0..4].try_into().unwrap()),
            segment_signature: u32::from_le_bytes(bytes[4..8].try_into().unwrap()),
            application_signature: u32::from_le_bytes(bytes[8..12].try_into().unwrap()),
            version: u16::from_le_bytes(bytes[12..14].try_into().unwrap()),
            checksum: u16::from_le_bytes(bytes[14..16].try_into().unwrap()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transaction_record_round_trips() {
        let rec = TransactionRecord {
            signature: TX_VALID,
            state: DATA_VALID,
        };
        assert!(rec.is_valid());
        assert_eq!(TransactionRecord::decode(&rec.encode()), rec);
    }

    #[test]
    fn erased_record_is_invalid() {
        let rec = TransactionRecord {
            signature: ERASED,
            state: ERASED,
        };
        assert!(!rec.is_valid());
    }

    #[test]
    fn header_round_trips() {
        let hdr = SegmentHeader {
            length: 100,
            segment_signature: 0x1234,
            application_signature: 0xdead_beef,
            version: 3,
            checksum: 0xabcd,
        };
        assert_eq!(SegmentHeader::decode(&hdr.encode()), hdr);
    }
}
