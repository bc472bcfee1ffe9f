//! Native layer-3 frame (NPDU) encoding, per ISO/IEC 14908-1 as summarized
//! in §6: header byte `{priority, altpath, delta-backlog}`, second byte
//! `{pdu-format, address-format, version, domain-length}`, source
//! subnet+node, destination fields by address-format, domain-ID bytes,
//! then payload.

use lon_config::{DomainId, MAX_DP_SIZE};

use crate::address::WireAddress;
use crate::error::ProtocolError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PduFormat {
    Tpdu,
    Spdu,
    Apdu,
    Npdu,
}

impl PduFormat {
    pub fn code(self) -> u8 {
        match self {
            PduFormat::Tpdu => 0,
            PduFormat::Spdu => 1,
            PduFormat::Apdu => 2,
            PduFormat::Npdu => 3,
        }
    }

    pub fn from_code(code: u8) -> Self {
        match code & 0b11 {
            0 => PduFormat::Tpdu,
            1 => PduFormat::Spdu,
            2 => PduFormat::Apdu,
            _ => PduFormat::Npdu,
        }
    }
}

fn domain_len_code(len: usize) -> u8 {
    match len {
        0 => 0,
        1 => 1,
        3 => 2,
        6 => 3,
        _ => unreachable!("DomainId only allows 0/1/3/6"),
    }
}

fn domain_len_from_code(code: u8) -> usize {
    match code & 0b11 {
        0 => 0,
        1 => 1,
        2 => 3,
        _ => 6,
    }
}

/// A decoded native frame, minus the CAL's own physical-layer framing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NpduFrame {
    pub priority: bool,
    pub altpath: bool,
    pub delta_backlog: u8,
    pub pdu_format: PduFormat,
    pub version: u8,
    pub domain_id: DomainId,
    pub source_subnet: u8,
    pub source_node: u8,
    pub destination: WireAddress,
    pub payload: Vec<u8>,
}

impl NpduFrame {
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        if self.payload.len() > MAX_DP_SIZE {
            return Err(ProtocolError::InvalidMessageLength(self.payload.len()));
        }
        let mut out = Vec::with_capacity(8 + self.payload.len());
        let header0 = ((self.priority as u8) << 7)
            | ((self.altpath as u8) << 6)
            | (self.delta_backlog.min(0x3F) & 0x3F);
        out.push(header0);

        let mut dest_bytes = Vec::new();
        let addr_format = self.destination.encode(&mut dest_bytes);

        let header1 = (self.pdu_format.code() << 6)
            | ((addr_format & 0b111) << 3)
            | ((self.version & 0b1) << 2)
            | domain_len_code(self.domain_id.len());
        out.push(header1);

        out.push(self.source_subnet);
        out.push(self.source_node);
        out.extend_from_slice(&dest_bytes);
        out.extend_from_slice(self.domain_id.as_bytes());
        out.extend_from_slice(&self.payload);
        Ok(out)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        if bytes.len() < 4 {
            return Err(ProtocolError::FrameTooShort {
                need: 4,
                got: bytes.len(),
            });
        }
        let header0 = bytes[0];
        let priority = header0 & 0x80 != 0;
        let altpath = header0 & 0x40 != 0;
        let delta_backlog = header0 & 0x3F;

        let header1 = bytes[1];
        let pdu_format = PduFormat::from_code(header1 >> 6);
        let addr_format_code = (header1 >> 3) & 0b111;
        let version = (header1 >> 2) & 0b1;
        let domain_len = domain_len_from_code(header1);

        let source_subnet = bytes[2];
        let source_node = bytes[3];

        let (destination, dest_len) = WireAddress::decode(addr_format_code, &bytes[4..])?;
        let dest_end = 4 + dest_len;
        if bytes.len() < dest_end + domain_len {
            return Err(ProtocolError::FrameTooShort {
                need: dest_end + domain_len,
                got: bytes.len(),
            });
        }
        let domain_id = DomainId::new(&bytes[dest_end..dest_end + domain_len])
            .expect("domain_len_from_code only yields 0/1/3/6");
        let payload_start = dest_end + domain_len;
        let payload = bytes[payload_start..].to_vec();
        if payload.len() > MAX_DP_SIZE {
            return Err(ProtocolError::InvalidMessageLength(payload.len()));
        }

        Ok(Self {
            priority,
            altpath,
            delta_backlog,
            pdu_format,
            version,
            domain_id,
            source_subnet,
            source_node,
            destination,
            payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(payload: Vec<u8>) -> NpduFrame {
        NpduFrame {
            priority: true,
            altpath: false,
            delta_backlog: 12,
            pdu_format: PduFormat::Apdu,
            version: 0,
            domain_id: DomainId::new(&[1, 2, 3]).unwrap(),
            source_subnet: 3,
            source_node: 17,
            destination: WireAddress::SubnetNode { subnet: 5, node: 9 },
            payload,
        }
    }

    #[test]
    fn round_trips_for_legal_payload_sizes() {
        for len in [0usize, 1, 100, 228] {
            let frame = sample(vec![0xAB; len]);
            let encoded = frame.encode().unwrap();
            let decoded = NpduFrame::decode(&encoded).unwrap();
            assert_eq!(decoded, frame);
        }
    }

    #[test]
    fn payload_229_is_rejected() {
        let frame = sample(vec![0u8; 229]);
        assert_eq!(
            frame.encode(),
            Err(ProtocolError::InvalidMessageLength(229))
        );
    }

    #[test]
    fn empty_domain_round_trips() {
        let mut frame = sample(vec![1, 2, 3]);
        frame.domain_id = DomainId::new(&[]).unwrap();
        let encoded = frame.encode().unwrap();
        let decoded = NpduFrame::decode(&encoded).unwrap();
        assert_eq!(decoded.domain_id.len(), 0);
    }

    #[test]
    fn truncated_frame_is_rejected() {
        assert!(NpduFrame::decode(&[0, 0, 0]).is_err());
    }
}
