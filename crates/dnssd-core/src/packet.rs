//! Decoded DNS message model exchanged with the transport.
//!
//! The wire format (RFC 1035 encoding) is handled by the `dnssd-net` codec;
//! everything above the transport works with these decoded shapes.

use crate::record::{Record, RecordKind};
use std::net::SocketAddr;

/// A single DNS question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub name: String,
    pub kind: RecordKind,
}

/// A decoded DNS message.
#[derive(Debug, Clone, Default)]
pub struct Packet {
    pub is_response: bool,
    pub questions: Vec<Question>,
    pub answers: Vec<Record>,
    pub additionals: Vec<Record>,
}

impl Packet {
    /// A query carrying a single question.
    pub fn query(name: impl Into<String>, kind: RecordKind) -> Packet {
        Packet {
            is_response: false,
            questions: vec![Question {
                name: name.into(),
                kind,
            }],
            ..Packet::default()
        }
    }

    /// A response carrying answers and additionals.
    pub fn response(answers: Vec<Record>, additionals: Vec<Record>) -> Packet {
        Packet {
            is_response: true,
            answers,
            additionals,
            ..Packet::default()
        }
    }

    /// Answers and additionals as one sequence.
    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.answers.iter().chain(self.additionals.iter())
    }
}

/// Network source information attached to a received response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteInfo {
    pub addr: SocketAddr,
    /// Size of the received datagram in bytes.
    pub size: usize,
}

impl RemoteInfo {
    pub fn family(&self) -> &'static str {
        if self.addr.is_ipv4() {
            "IPv4"
        } else {
            "IPv6"
        }
    }
}
