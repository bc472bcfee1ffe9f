//! Wire addressing formats (§4.3): the tag that selects how a frame's
//! destination fields are encoded, distinct from the configuration-table
//! [`lon_config::AddressEntry`] a bound send resolves through.

use crate::error::ProtocolError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireAddress {
    Broadcast { subnet: u8 },
    Group { group_id: u8 },
    SubnetNode { subnet: u8, node: u8 },
    UniqueId { subnet: u8, id: [u8; 6] },
    GroupAck { group_id: u8, member_index: u8 },
    Turnaround,
    None,
}

impl WireAddress {
    fn format_code(&self) -> u8 {
        match self {
            WireAddress::Broadcast { .. } => 0,
            WireAddress::Group { .. } => 1,
            WireAddress::SubnetNode { .. } => 2,
            WireAddress::UniqueId { .. } => 3,
            WireAddress::GroupAck { .. } => 4,
            WireAddress::Turnaround => 5,
            WireAddress::None => 6,
        }
    }

    pub fn encode(&self, out: &mut Vec<u8>) -> u8 {
        match *self {
            WireAddress::Broadcast { subnet } => out.push(subnet),
            WireAddress::Group { group_id } => out.push(group_id),
            WireAddress::SubnetNode { subnet, node } => {
                out.push(subnet);
                out.push(node);
            }
            WireAddress::UniqueId { subnet, id } => {
                out.push(subnet);
                out.extend_from_slice(&id);
            }
            WireAddress::GroupAck {
                group_id,
                member_index,
            } => {
                out.push(group_id);
                out.push(member_index);
            }
            WireAddress::Turnaround | WireAddress::None => {}
        }
        self.format_code()
    }

    pub fn decode(code: u8, bytes: &[u8]) -> Result<(Self, usize), ProtocolError> {
        let need = |n: usize| {
            if bytes.len() < n {
                Err(ProtocolError::FrameTooShort {
                    need: n,
                    got: bytes.len(),
                })
            } else {
                Ok(())
            }
        };
        Ok(match code {
            0 => {
                need(1)?;
                (WireAddress::Broadcast { subnet: bytes[0] }, 1)
            }
            1 => {
                need(1)?;
                (WireAddress::Group { group_id: bytes[0] }, 1)
            }
            2 => {
                need(2)?;
                (
                    WireAddress::SubnetNode {
                        subnet: bytes[0],
                        node: bytes[1],
                    },
                    2,
                )
            }
            3 => {
                need(7)?;
                let mut id = [0u8; 6];
                id.copy_from_slice(&bytes[1..7]);
                (
                    WireAddress::UniqueId {
                        subnet: bytes[0],
                        id,
                    },
                    7,
                )
            }
            4 => {
                need(2)?;
                (
                    WireAddress::GroupAck {
                        group_id: bytes[0],
                        member_index: bytes[1],
                    },
                    2,
                )
            }
            5 => (WireAddress::Turnaround, 0),
            6 => (WireAddress::None, 0),
            other => return Err(ProtocolError::InvalidAddressFormat(other)),
        })
    }

    pub fn is_multicast(&self) -> bool {
        matches!(
            self,
            WireAddress::Broadcast { .. } | WireAddress::Group { .. } | WireAddress::GroupAck { .. }
        )
    }
}
