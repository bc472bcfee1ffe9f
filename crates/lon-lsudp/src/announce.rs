//! Periodic mapping announcements (§4.4): a special application-message
//! code multicast so peers learn this device's current address-mapping
//! state. Announcement frames update the receiver's mapping table but are
//! never forwarded up to the application.

use lon_config::DomainId;
use lon_protocol::{NpduFrame, PduFormat, WireAddress};

/// Application-message code reserved for LS/UDP mapping announcements.
pub const ANNOUNCEMENT_CODE: u8 = 0x7F;

pub fn is_announcement(payload: &[u8]) -> bool {
    payload.first() == Some(&ANNOUNCEMENT_CODE)
}

/// Builds the domain-broadcast announcement frame for `(domain, subnet,
/// node)`, carrying nothing beyond the reserved code byte: the mapping
/// table learns everything it needs from the LS/UDP header and the
/// transport-level source IP.
pub fn build(domain: DomainId, subnet: u8, node: u8) -> NpduFrame {
    NpduFrame {
        priority: false,
        altpath: false,
        delta_backlog: 0,
        pdu_format: PduFormat::Apdu,
        version: 0,
        domain_id: domain,
        source_subnet: subnet,
        source_node: node,
        destination: WireAddress::Broadcast { subnet: 0 },
        payload: vec![ANNOUNCEMENT_CODE],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn announcement_is_recognized_by_its_code_byte() {
        let frame = build(DomainId::new(&[]).unwrap(), 1, 2);
        assert!(is_announcement(&frame.payload));
        assert!(!is_announcement(&[0x01, 0x02]));
    }
}
