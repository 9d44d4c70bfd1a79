//! Error types shared across the dnssd crates.

use thiserror::Error;

/// Primary error type for all mDNS/DNS-SD operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("service type error: {0}")]
    ServiceType(#[from] ServiceTypeError),

    #[error("service error: {0}")]
    Service(#[from] ServiceError),

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    #[error("service name {name:?} is already in use on the network")]
    NameConflict { name: String },
}

/// Malformed service-type strings, raised at parse time.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceTypeError {
    #[error("empty service type string")]
    Empty,

    #[error("service type {0:?} is missing a name or protocol label")]
    MissingLabels(String),

    #[error("service type {0:?} starts with the subtype marker")]
    LeadingSubtypeMarker(String),
}

/// Invalid service configuration, raised at construction and never sent
/// to the network.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("port {0} is out of range (1-65535)")]
    PortOutOfRange(u16),

    #[error("service instance name cannot be empty")]
    EmptyName,

    #[error("the endpoint has been destroyed")]
    Destroyed,
}

/// Wire encode/decode failures reported by the packet codec.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("failed to decode DNS message: {0}")]
    Decode(String),

    #[error("failed to encode DNS message: {0}")]
    Encode(String),
}

/// Convenience Result type.
pub type Result<T> = std::result::Result<T, Error>;
