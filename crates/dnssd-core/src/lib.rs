//! # dnssd-core
//!
//! Core types shared across the dnssd crates.
//!
//! This crate provides:
//! - Service-type parsing (`_name._protocol`, subtype forms)
//! - The TXT record key/value codec
//! - Typed DNS-SD resource records and decoded packets
//! - The transport and host-lookup contracts implemented by `dnssd-net`
//! - Common error types

pub mod error;
pub mod host;
pub mod packet;
pub mod record;
pub mod service_type;
pub mod transport;
pub mod txt;

pub use error::{CodecError, Error, Result, ServiceError, ServiceTypeError};
pub use host::{HostInfo, InterfaceAddr};
pub use packet::{Packet, Question, RemoteInfo};
pub use record::{first_label, names_equal, Record, RecordData, RecordKind};
pub use service_type::ServiceType;
pub use transport::{Inbound, MdnsConfig, Transport, MDNS_GROUP_V4, MDNS_PORT};
pub use txt::{TxtMap, TxtValue};

/// Top-level domain for all link-local names.
pub const LOCAL_TLD: &str = "local";

/// Reserved name answering service-type enumeration queries (RFC 6763 §9).
pub const WILDCARD_NAME: &str = "_services._dns-sd._udp.local";
