//! The LS/UDP payload format (§4.4, §6): a two-byte header `{version,
//! pdu-format, address-format, priority, MCR}`, an optional enclosed
//! destination address, an optional arbitrary-source block, then the
//! native frame's payload with its addressing bytes stripped (those are
//! either recovered from the IP source address or carried explicitly in
//! the arbitrary-source block).

use lon_config::DomainId;
use lon_protocol::{NpduFrame, PduFormat, WireAddress};

use crate::error::LsUdpError;

/// An LS device that cannot use its derived IP carries its own source
/// subnet/node (and optionally its domain-ID) here instead of relying on
/// IP-prefix recovery (§4.4 Arbitrary-address support).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArbitrarySource {
    pub subnet: u8,
    pub node: u8,
    pub domain: Option<DomainId>,
}

impl ArbitrarySource {
    fn domain_len_code(len: usize) -> u8 {
        match len {
            0 => 0,
            1 => 1,
            3 => 2,
            _ => 3,
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

    fn encode(&self, out: &mut Vec<u8>) {
        let domain_present = self.domain.is_some();
        let len_code = self.domain.map(|d| Self::domain_len_code(d.len())).unwrap_or(0);
        out.push(((domain_present as u8) << 2) | len_code);
        out.push(self.subnet);
        out.push(self.node);
        if let Some(d) = self.domain {
            out.extend_from_slice(d.as_bytes());
        }
    }

    fn decode(bytes: &[u8]) -> Result<(Self, usize), LsUdpError> {
        if bytes.len() < 3 {
            return Err(LsUdpError::PayloadTooShort {
                need: 3,
                got: bytes.len(),
            });
        }
        let flag_byte = bytes[0];
        let domain_present = flag_byte & 0b100 != 0;
        let subnet = bytes[1];
        let node = bytes[2];
        let mut offset = 3;
        let domain = if domain_present {
            let len = Self::domain_len_from_code(flag_byte);
            if bytes.len() < offset + len {
                return Err(LsUdpError::PayloadTooShort {
                    need: offset + len,
                    got: bytes.len(),
                });
            }
            let d = DomainId::new(&bytes[offset..offset + len]).expect("2-bit code only yields 0/1/3/6");
            offset += len;
            Some(d)
        } else {
            None
        };
        Ok((Self { subnet, node, domain }, offset))
    }
}

/// Recovers the sender's domain-ID from the source IP prefix (§4.4): the
/// inverse of [`crate::derive::derive_unicast`].
pub fn recover_domain_from_ip(ip: [u8; 4]) -> DomainId {
    if ip[0] == 192 && ip[1] == 168 {
        DomainId::new(&[]).unwrap()
    } else if ip[0] == 10 {
        DomainId::new(&[ip[1]]).unwrap()
    } else {
        DomainId::new(&[ip[0], ip[1]]).unwrap()
    }
}

pub fn recover_subnet_node_from_ip(ip: [u8; 4]) -> (u8, u8) {
    (ip[2], ip[3])
}

/// Encodes `frame` as an LS/UDP payload. `arbitrary` is attached when the
/// sender cannot rely on IP-prefix recovery at the far end. Native-only
/// fields with no LS/UDP header slot (`altpath`, `delta_backlog`) are not
/// carried; a decoded frame always reports them as `false`/`0`.
pub fn encode(frame: &NpduFrame, arbitrary: Option<ArbitrarySource>) -> Vec<u8> {
    let mut dest_bytes = Vec::new();
    let addr_code = frame.destination.encode(&mut dest_bytes);
    let mcr = matches!(frame.destination, WireAddress::Group { .. });

    let byte0 = ((frame.version & 0b11) << 6)
        | ((frame.pdu_format.code() & 0b11) << 4)
        | ((addr_code & 0b111) << 1)
        | (frame.priority as u8);
    let byte1 = ((mcr as u8) << 7) | ((arbitrary.is_some() as u8) << 6);

    let mut out = vec![byte0, byte1];
    out.extend_from_slice(&dest_bytes);
    if let Some(src) = arbitrary {
        src.encode(&mut out);
    }
    out.extend_from_slice(&frame.payload);
    out
}

/// Decodes an LS/UDP payload received from `source_ip`, recovering the
/// sender's domain/subnet/node either from the IP prefix or from a
/// carried arbitrary-source block.
pub fn decode(source_ip: [u8; 4], bytes: &[u8]) -> Result<NpduFrame, LsUdpError> {
    if bytes.len() < 2 {
        return Err(LsUdpError::PayloadTooShort {
            need: 2,
            got: bytes.len(),
        });
    }
    let byte0 = bytes[0];
    let byte1 = bytes[1];
    let version = (byte0 >> 6) & 0b11;
    let pdu_format = PduFormat::from_code((byte0 >> 4) & 0b11);
    let addr_code = (byte0 >> 1) & 0b111;
    let priority = byte0 & 0b1 != 0;
    let arbitrary_present = byte1 & 0x40 != 0;

    let mut offset = 2;
    let (destination, dest_len) = WireAddress::decode(addr_code, &bytes[offset..])?;
    offset += dest_len;

    let arbitrary = if arbitrary_present {
        let (src, len) = ArbitrarySource::decode(&bytes[offset..])?;
        offset += len;
        Some(src)
    } else {
        None
    };
    let payload = bytes[offset..].to_vec();

    let (domain_id, source_subnet, source_node) = match arbitrary {
        Some(src) => (
            src.domain.unwrap_or_else(|| recover_domain_from_ip(source_ip)),
            src.subnet,
            src.node,
        ),
        None => {
            let (subnet, node) = recover_subnet_node_from_ip(source_ip);
            (recover_domain_from_ip(source_ip), subnet, node)
        }
    };

    Ok(NpduFrame {
        priority,
        altpath: false,
        delta_backlog: 0,
        pdu_format,
        version,
        domain_id,
        source_subnet,
        source_node,
        destination,
        payload,
    })
}
