//! Derived addressing (§4.4, S1): an LS device's IP address mechanically
//! computed from its `(domain, subnet, node)` triple, with no mapping
//! table lookup required.

use lon_config::DomainId;

/// `prefix(domain) || subnet || node`. Domain lengths 0, 1, and 3 each
/// have a derivation rule; length 6 does not fit in an IPv4 host address
/// and must fall back to arbitrary addressing (§4.4).
pub fn derive_unicast(domain: &DomainId, subnet: u8, node: u8) -> Option<[u8; 4]> {
    let bytes = domain.as_bytes();
    match domain.len() {
        0 => Some([192, 168, subnet, node]),
        1 => Some([10, bytes[0], subnet, node]),
        3 => Some([bytes[0], bytes[1], subnet, node]),
        _ => None,
    }
}

/// `239.192.0.<subnet>`; `subnet == 0` is the whole-domain broadcast.
pub fn derive_broadcast(subnet: u8) -> [u8; 4] {
    [239, 192, 0, subnet]
}

/// `239.192.1.<group_id>`.
pub fn derive_group(group_id: u8) -> [u8; 4] {
    [239, 192, 1, group_id]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s1_derived_address_mapping() {
        let domain = DomainId::new(&[]).unwrap();
        assert_eq!(derive_unicast(&domain, 3, 17), Some([192, 168, 3, 17]));
        assert_eq!(derive_broadcast(0), [239, 192, 0, 0]);
        assert_eq!(derive_broadcast(3), [239, 192, 0, 3]);
        assert_eq!(derive_group(42), [239, 192, 1, 42]);
    }

    #[test]
    fn domain_length_one_uses_10_prefix() {
        let domain = DomainId::new(&[7]).unwrap();
        assert_eq!(derive_unicast(&domain, 1, 2), Some([10, 7, 1, 2]));
    }

    #[test]
    fn domain_length_three_uses_first_two_bytes() {
        let domain = DomainId::new(&[1, 2, 3]).unwrap();
        assert_eq!(derive_unicast(&domain, 1, 2), Some([1, 2, 1, 2]));
    }

    #[test]
    fn domain_length_six_has_no_derivation() {
        let domain = DomainId::new(&[1, 2, 3, 4, 5, 6]).unwrap();
        assert_eq!(derive_unicast(&domain, 1, 2), None);
    }
}
