//! Configuration data model (§3, C4): domain, address, data-point, and
//! alias tables, plus the whole-image checksum used for the 1 Hz
//! integrity check.

pub mod address;
pub mod alias;
pub mod checksum;
pub mod datapoint;
pub mod domain;
pub mod image;

pub use address::{AddressEntry, AddressTable, NO_ADDRESS};
pub use alias::{AliasRecord, AliasTable};
pub use checksum::ConfigChecksum;
pub use datapoint::{DatapointDef, Direction, Selector, ServiceKind, MAX_DP_SIZE};
pub use domain::{DomainId, DomainRecord, MAX_DOMAINS};
pub use image::ConfigImage;
