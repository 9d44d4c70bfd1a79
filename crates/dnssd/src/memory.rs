//! In-memory transport for tests and single-process setups.
//!
//! A [`MemoryHub`] behaves like a multicast segment: every endpoint sees
//! everything any endpoint sends, including its own traffic, which mirrors
//! the multicast-loop behavior of the UDP transport.

use async_trait::async_trait;
use dnssd_core::{Inbound, Packet, Record, RecordKind, RemoteInfo, Transport, MDNS_PORT};
use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use tokio::sync::broadcast;

const HUB_CHANNEL_CAPACITY: usize = 1024;

/// A shared in-memory "network segment".
#[derive(Clone)]
pub struct MemoryHub {
    inbound: broadcast::Sender<Inbound>,
}

impl MemoryHub {
    pub fn new() -> Self {
        let (inbound, _) = broadcast::channel(HUB_CHANNEL_CAPACITY);
        MemoryHub { inbound }
    }

    /// Create a new endpoint attached to this segment.
    pub fn endpoint(&self) -> Arc<MemoryTransport> {
        Arc::new(MemoryTransport {
            inbound: self.inbound.clone(),
        })
    }
}

impl Default for MemoryHub {
    fn default() -> Self {
        MemoryHub::new()
    }
}

/// One endpoint on a [`MemoryHub`].
pub struct MemoryTransport {
    inbound: broadcast::Sender<Inbound>,
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn query(&self, name: &str, kind: RecordKind) -> io::Result<()> {
        let _ = self.inbound.send(Inbound::Query(Packet::query(name, kind)));
        Ok(())
    }

    async fn respond(
        &self,
        answers: Vec<Record>,
        additionals: Vec<Record>,
    ) -> io::Result<()> {
        let packet = Packet::response(answers, additionals);
        // There is no datagram here; fabricate loopback sender info.
        let remote = RemoteInfo {
            addr: SocketAddr::from((Ipv4Addr::LOCALHOST, MDNS_PORT)),
            size: 0,
        };
        let _ = self.inbound.send(Inbound::Response(packet, remote));
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<Inbound> {
        self.inbound.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn every_endpoint_sees_every_send() {
        let hub = MemoryHub::new();
        let a = hub.endpoint();
        let b = hub.endpoint();

        let mut rx_a = a.subscribe();
        let mut rx_b = b.subscribe();

        a.query("_http._tcp.local", RecordKind::Ptr).await.unwrap();

        for rx in [&mut rx_a, &mut rx_b] {
            match rx.recv().await.unwrap() {
                Inbound::Query(packet) => {
                    assert_eq!(packet.questions[0].name, "_http._tcp.local")
                }
                Inbound::Response(..) => panic!("expected a query"),
            }
        }
    }

    #[tokio::test]
    async fn subscription_only_sees_later_traffic() {
        let hub = MemoryHub::new();
        let endpoint = hub.endpoint();

        endpoint
            .query("_early._tcp.local", RecordKind::Ptr)
            .await
            .unwrap();
        let mut rx = endpoint.subscribe();
        endpoint
            .query("_late._tcp.local", RecordKind::Ptr)
            .await
            .unwrap();

        match rx.recv().await.unwrap() {
            Inbound::Query(packet) => assert_eq!(packet.questions[0].name, "_late._tcp.local"),
            Inbound::Response(..) => panic!("expected a query"),
        }
    }
}
