//! Domain records (§3). A device carries up to two.

pub const MAX_DOMAINS: usize = 2;

/// Variable-length domain identifier: 0, 1, 3, or 6 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DomainId {
    len: u8,
    bytes: [u8; 6],
}

impl DomainId {
    pub fn new(bytes: &[u8]) -> Option<Self> {
        match bytes.len() {
            0 | 1 | 3 | 6 => {
                let mut arr = [0u8; 6];
                arr[..bytes.len()].copy_from_slice(bytes);
                Some(Self {
                    len: bytes.len() as u8,
                    bytes: arr,
                })
            }
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DomainRecord {
    pub domain_id: DomainId,
    pub subnet_id: u8,
    pub node_id: u8,
    pub authentication_mode: bool,
    pub encrypted_auth_type: bool,
    pub clone: bool,
    pub dhcp: bool,
    pub invalid: bool,
    pub auth_key: [u8; 12],
}

impl DomainRecord {
    pub fn unassigned() -> Self {
        Self {
            domain_id: DomainId::default(),
            subnet_id: 0,
            node_id: 0,
            authentication_mode: false,
            encrypted_auth_type: false,
            clone: false,
            dhcp: false,
            invalid: true,
            auth_key: [0u8; 12],
        }
    }

    /// Domain valid and subnet/node both nonzero ⇒ device addressable on
    /// this domain (§3 invariant).
    pub fn is_addressable(&self) -> bool {
        !self.invalid && self.subnet_id != 0 && self.node_id != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_id_rejects_invalid_lengths() {
        assert!(DomainId::new(&[1, 2]).is_none());
        assert!(DomainId::new(&[1, 2, 4, 5]).is_none());
        assert!(DomainId::new(&[]).is_some());
        assert!(DomainId::new(&[1]).is_some());
        assert!(DomainId::new(&[1, 2, 3]).is_some());
        assert!(DomainId::new(&[1, 2, 3, 4, 5, 6]).is_some());
    }

    #[test]
    fn addressability_requires_nonzero_subnet_and_node() {
        let mut d = DomainRecord::unassigned();
        d.invalid = false;
        assert!(!d.is_addressable());
        d.subnet_id = 3;
        assert!(!d.is_addressable());
        d.node_id = 17;
        assert!(d.is_addressable());
    }
}
