//! Transport contract between the core and the network layer.
//!
//! The core never touches sockets or wire bytes. It sends questions and
//! responses through this trait and consumes decoded inbound traffic from a
//! broadcast subscription; `dnssd-net` provides the UDP multicast
//! implementation.

use crate::packet::{Packet, RemoteInfo};
use crate::record::{Record, RecordKind};
use async_trait::async_trait;
use std::net::{IpAddr, Ipv4Addr};
use tokio::sync::broadcast;

/// Standard mDNS IPv4 multicast group (RFC 6762 §3).
pub const MDNS_GROUP_V4: Ipv4Addr = Ipv4Addr::new(224, 0, 0, 251);

/// Standard mDNS UDP port.
pub const MDNS_PORT: u16 = 5353;

/// Endpoint configuration recognized by the top-level constructor.
#[derive(Debug, Clone)]
pub struct MdnsConfig {
    /// Multicast group address.
    pub ip: IpAddr,
    /// UDP port.
    pub port: u16,
    /// With multicast disabled, traffic is sent to the loopback unicast
    /// address instead (tests, single-host setups).
    pub multicast: bool,
}

impl Default for MdnsConfig {
    fn default() -> Self {
        MdnsConfig {
            ip: IpAddr::V4(MDNS_GROUP_V4),
            port: MDNS_PORT,
            multicast: true,
        }
    }
}

/// An inbound mDNS message.
#[derive(Debug, Clone)]
pub enum Inbound {
    /// A query made by a peer (or looped back from this host).
    Query(Packet),
    /// A response, with the sender's network information.
    Response(Packet, RemoteInfo),
}

/// Message transport shared by the responder, publishers and browsers of
/// one endpoint.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a single question.
    async fn query(&self, name: &str, kind: RecordKind) -> std::io::Result<()>;

    /// Send a response message carrying answers and additionals.
    async fn respond(&self, answers: Vec<Record>, additionals: Vec<Record>)
        -> std::io::Result<()>;

    /// Subscribe to inbound traffic. Only messages received after the call
    /// are delivered.
    fn subscribe(&self) -> broadcast::Receiver<Inbound>;
}
