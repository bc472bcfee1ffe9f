//! Destination identity: the tuple TID allocation is keyed on.

use std::hash::{Hash, Hasher};

use lon_config::DomainId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestinationAddress {
    SubnetNode { subnet: u8, node: u8 },
    Group { group_id: u8 },
    Broadcast { subnet: u8 },
    UniqueId([u8; 6]),
}

#[derive(Debug, Clone, Copy)]
pub struct Destination {
    pub domain_id: DomainId,
    pub address: DestinationAddress,
}

impl Destination {
    /// Hash over `{address-format, domain-ID, subnet/node|group|broadcast|
    /// unique-ID}`, used as the TCS table key (§4.2).
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        self.domain_id.as_bytes().hash(&mut hasher);
        match self.address {
            DestinationAddress::SubnetNode { subnet, node } => {
                0u8.hash(&mut hasher);
                subnet.hash(&mut hasher);
                node.hash(&mut hasher);
            }
            DestinationAddress::Group { group_id } => {
                1u8.hash(&mut hasher);
                group_id.hash(&mut hasher);
            }
            DestinationAddress::Broadcast { subnet } => {
                2u8.hash(&mut hasher);
                subnet.hash(&mut hasher);
            }
            DestinationAddress::UniqueId(id) => {
                3u8.hash(&mut hasher);
                id.hash(&mut hasher);
            }
        }
        hasher.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distinct_destinations_fingerprint_differently() {
        let domain = DomainId::new(&[1, 2, 3]).unwrap();
        let a = Destination {
            domain_id: domain,
            address: DestinationAddress::SubnetNode { subnet: 1, node: 2 },
        };
        let b = Destination {
            domain_id: domain,
            address: DestinationAddress::SubnetNode { subnet: 1, node: 3 },
        };
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn identical_destinations_fingerprint_equal() {
        let domain = DomainId::new(&[]).unwrap();
        let a = Destination {
            domain_id: domain,
            address: DestinationAddress::Group { group_id: 42 },
        };
        let b = Destination {
            domain_id: domain,
            address: DestinationAddress::Group { group_id: 42 },
        };
        assert_eq!(a.fingerprint(), b.fingerprint());
    }
}
