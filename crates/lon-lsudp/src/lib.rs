//! LS/UDP translation layer (C7, §4.4): rewrites native layer-3 frames to
//! and from a UDP-carried payload, deriving or tracking the IP address
//! each LS `(domain, subnet, node)` triple maps to.
//!
//! [`header::encode`]/[`header::decode`] do the per-frame rewrite;
//! [`mapping::MappingTable`] is the peer-address cache that [`announce`]
//! keeps in sync across the domain; [`derive`] holds the pure address
//! arithmetic both depend on.

pub mod announce;
pub mod derive;
pub mod error;
pub mod header;
pub mod mapping;

pub use announce::{build as build_announcement, is_announcement, ANNOUNCEMENT_CODE};
pub use derive::{derive_broadcast, derive_group, derive_unicast};
pub use error::LsUdpError;
pub use header::{decode, encode, recover_domain_from_ip, recover_subnet_node_from_ip, ArbitrarySource};
pub use mapping::{LsAddress, MapState, MappingEntry, MappingTable, AGE_LIMIT};
