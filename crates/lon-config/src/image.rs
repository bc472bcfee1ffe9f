//! Aggregates the domain, address, and alias tables into one
//! checksummed configuration image (§3). The data-point table itself
//! lives in `lon-app` (it owns live storage pointers); callers append its
//! serialized bytes to `checksum_bytes()` before computing the whole-image
//! checksum, keeping this crate free of any dependency on DP storage.

use crate::address::{AddressEntry, AddressTable};
use crate::alias::AliasTable;
use crate::checksum::ConfigChecksum;
use crate::domain::{DomainRecord, MAX_DOMAINS};

#[derive(Debug, Clone)]
pub struct ConfigImage {
    pub domains: [DomainRecord; MAX_DOMAINS],
    pub address_table: AddressTable,
    pub alias_table: AliasTable,
    checksum: ConfigChecksum,
}

impl ConfigImage {
    pub fn new(address_capacity: usize, alias_capacity: usize) -> Self {
        let mut image = Self {
            domains: [DomainRecord::unassigned(); MAX_DOMAINS],
            address_table: AddressTable::new(address_capacity),
            alias_table: AliasTable::new(alias_capacity),
            checksum: ConfigChecksum::recompute(&[]),
        };
        image.recompute_checksum();
        image
    }

    /// Bytes over which the checksum is computed: domain records, then the
    /// address-table tag bytes, then the alias-table tag bytes — the full
    /// configuration image (§3), so corruption anywhere in it is caught by
    /// the 1 Hz integrity check. Callers that also want DP-table bytes in
    /// the running checksum append them and call `ConfigChecksum::recompute`
    /// directly; this method exists so that call can reuse the same
    /// encoding this struct uses internally.
    pub fn checksum_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        for d in &self.domains {
            bytes.extend_from_slice(d.domain_id.as_bytes());
            bytes.push(d.subnet_id);
            bytes.push(d.node_id);
            bytes.push(d.authentication_mode as u8);
            bytes.push(d.encrypted_auth_type as u8);
            bytes.push(d.clone as u8);
            bytes.push(d.dhcp as u8);
            bytes.push(d.invalid as u8);
            bytes.extend_from_slice(&d.auth_key);
        }
        for entry in self.address_table.iter() {
            match entry {
                AddressEntry::Unassigned => bytes.push(0),
                AddressEntry::SubnetNode { subnet, node } => {
                    bytes.extend_from_slice(&[1, *subnet, *node]);
                }
                AddressEntry::Broadcast { subnet } => {
                    bytes.extend_from_slice(&[2, *subnet]);
                }
                AddressEntry::Group {
                    group_id,
                    group_size,
                } => {
                    bytes.extend_from_slice(&[3, *group_id, *group_size]);
                }
                AddressEntry::UniqueId { id } => {
                    bytes.push(4);
                    bytes.extend_from_slice(id);
                }
            }
        }
        for alias in self.alias_table.iter() {
            bytes.extend_from_slice(&alias.dp_index.to_le_bytes());
            bytes.extend_from_slice(&alias.selector.raw().to_le_bytes());
            bytes.extend_from_slice(&alias.address_index.to_le_bytes());
        }
        bytes
    }

    pub fn recompute_checksum(&mut self) {
        let bytes = self.checksum_bytes();
        self.checksum = ConfigChecksum::recompute(&bytes);
    }

    pub fn checksum(&self) -> ConfigChecksum {
        self.checksum
    }

    /// Verify the checksum against the image's current bytes. Returns
    /// `false` on mismatch — the caller (lifecycle state machine) is
    /// responsible for the unconfigured/reset response (§4.6, S6).
    pub fn verify_checksum(&self) -> bool {
        self.checksum.verify(&self.checksum_bytes())
    }

    /// Replacing the image with its own current contents recomputes the
    /// checksum but changes nothing else externally observable.
    pub fn update_config_data(&mut self, domains: [DomainRecord; MAX_DOMAINS]) {
        self.domains = domains;
        self.recompute_checksum();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn self_update_is_a_checksum_only_no_op() {
        let mut image = ConfigImage::new(15, 15);
        let before = image.checksum().value();
        let domains = image.domains;
        image.update_config_data(domains);
        assert_eq!(image.checksum().value(), before);
        assert!(image.verify_checksum());
    }

    #[test]
    fn external_corruption_fails_verification() {
        let mut image = ConfigImage::new(15, 15);
        image.domains[0].subnet_id = 5;
        // Corrupt without recomputing the checksum, simulating external
        // memory corruption between the 1 Hz integrity checks.
        assert!(!image.verify_checksum());
    }

    #[test]
    fn address_table_corruption_fails_verification() {
        let mut image = ConfigImage::new(15, 15);
        image
            .address_table
            .set(0, AddressEntry::SubnetNode { subnet: 1, node: 2 })
            .unwrap();
        // Bound without a matching recompute: the whole-image checksum
        // must cover the address table, not just the domain records.
        assert!(!image.verify_checksum());
    }

    #[test]
    fn alias_table_corruption_fails_verification() {
        use crate::alias::AliasRecord;
        use crate::datapoint::Selector;

        let mut image = ConfigImage::new(15, 15);
        image
            .alias_table
            .set(
                0,
                AliasRecord {
                    dp_index: 3,
                    selector: Selector::new(10),
                    address_index: 1,
                },
            )
            .unwrap();
        assert!(!image.verify_checksum());
    }
}
