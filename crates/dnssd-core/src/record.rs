//! Typed DNS-SD resource records.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// DNS record types used by DNS-SD.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RecordKind {
    Ptr,
    Srv,
    Txt,
    A,
    Aaaa,
    /// Wildcard question type (QTYPE 255).
    Any,
}

impl RecordKind {
    /// Whether a question of this type selects records of `other`.
    pub fn matches(self, other: RecordKind) -> bool {
        self == RecordKind::Any || self == other
    }
}

/// Per-type record data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordData {
    /// Pointer to another DNS name.
    Ptr(String),
    /// Service endpoint. Priority and weight are fixed at zero.
    Srv { port: u16, target: String },
    /// Opaque `key=value` byte strings.
    Txt(Vec<Vec<u8>>),
    /// IPv4 host address.
    A(Ipv4Addr),
    /// IPv6 host address.
    Aaaa(Ipv6Addr),
}

impl RecordData {
    pub fn kind(&self) -> RecordKind {
        match self {
            RecordData::Ptr(_) => RecordKind::Ptr,
            RecordData::Srv { .. } => RecordKind::Srv,
            RecordData::Txt(_) => RecordKind::Txt,
            RecordData::A(_) => RecordKind::A,
            RecordData::Aaaa(_) => RecordKind::Aaaa,
        }
    }
}

/// A single resource record: owner name, TTL in seconds, typed data.
///
/// A TTL of zero is a goodbye record (RFC 6762 §10.1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub name: String,
    pub ttl: u32,
    pub data: RecordData,
}

impl Record {
    pub fn ptr(name: impl Into<String>, target: impl Into<String>, ttl: u32) -> Record {
        Record {
            name: name.into(),
            ttl,
            data: RecordData::Ptr(target.into()),
        }
    }

    pub fn srv(name: impl Into<String>, target: impl Into<String>, port: u16, ttl: u32) -> Record {
        Record {
            name: name.into(),
            ttl,
            data: RecordData::Srv {
                port,
                target: target.into(),
            },
        }
    }

    pub fn txt(name: impl Into<String>, entries: Vec<Vec<u8>>, ttl: u32) -> Record {
        Record {
            name: name.into(),
            ttl,
            data: RecordData::Txt(entries),
        }
    }

    pub fn address(name: impl Into<String>, addr: IpAddr, ttl: u32) -> Record {
        let data = match addr {
            IpAddr::V4(v4) => RecordData::A(v4),
            IpAddr::V6(v6) => RecordData::Aaaa(v6),
        };
        Record {
            name: name.into(),
            ttl,
            data,
        }
    }

    pub fn kind(&self) -> RecordKind {
        self.data.kind()
    }

    pub fn is_goodbye(&self) -> bool {
        self.ttl == 0
    }

    /// Whether two records describe the same entry: equal kind, name and
    /// data, ignoring TTL.
    pub fn same_entry(&self, other: &Record) -> bool {
        names_equal(&self.name, &other.name) && self.data == other.data
    }
}

/// Case-insensitive DNS name comparison.
///
/// Only ASCII A-Z fold (RFC 6762 §9.2); names carrying non-ASCII bytes
/// compare byte-exact.
pub fn names_equal(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

/// First label of a DNS name.
pub fn first_label(name: &str) -> &str {
    name.split('.').next().unwrap_or(name)
}
