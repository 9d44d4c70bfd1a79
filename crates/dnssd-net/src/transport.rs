//! UDP transport implementing the core [`Transport`] contract.

use crate::{codec, socket};
use async_trait::async_trait;
use dnssd_core::{
    HostInfo, Inbound, MdnsConfig, Packet, Record, RecordKind, RemoteInfo, Transport,
};
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

const RECV_BUFFER_SIZE: usize = 4096;
const INBOUND_CHANNEL_CAPACITY: usize = 256;

/// UDP multicast endpoint shared by all sessions of one handle.
///
/// A background task decodes inbound datagrams and fans them out as
/// [`Inbound`] events; queries and responses sent by this host loop back
/// through the same stream, which is what lets probing detect same-host
/// conflicts.
pub struct UdpTransport {
    socket: UdpSocket,
    dest: SocketAddr,
    inbound: broadcast::Sender<Inbound>,
    cancel: CancellationToken,
}

impl UdpTransport {
    /// Bind the endpoint and start the reader task.
    pub fn bind(config: &MdnsConfig, host: &dyn HostInfo) -> io::Result<Arc<Self>> {
        let std_socket = if config.multicast {
            let group = match config.ip {
                IpAddr::V4(v4) => v4,
                IpAddr::V6(_) => {
                    return Err(io::Error::new(
                        io::ErrorKind::Unsupported,
                        "IPv6 multicast groups are not supported by this transport",
                    ))
                }
            };
            socket::bind_multicast(group, config.port, &host.interfaces())?
        } else {
            socket::bind_unicast(config.port)?
        };

        let dest = if config.multicast {
            SocketAddr::new(config.ip, config.port)
        } else {
            SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), config.port)
        };

        let (inbound, _) = broadcast::channel(INBOUND_CHANNEL_CAPACITY);
        let transport = Arc::new(UdpTransport {
            socket: UdpSocket::from_std(std_socket)?,
            dest,
            inbound,
            cancel: CancellationToken::new(),
        });
        transport.clone().spawn_reader();
        Ok(transport)
    }

    /// Stop the reader task. Idempotent.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    fn spawn_reader(self: Arc<Self>) {
        tokio::spawn(async move {
            let mut buf = [0u8; RECV_BUFFER_SIZE];
            loop {
                tokio::select! {
                    _ = self.cancel.cancelled() => {
                        debug!("mDNS transport shutting down");
                        break;
                    }
                    received = self.socket.recv_from(&mut buf) => match received {
                        Ok((size, from)) => {
                            match codec::decode(&buf[..size]) {
                                Ok(packet) => {
                                    let event = if packet.is_response {
                                        Inbound::Response(packet, RemoteInfo { addr: from, size })
                                    } else {
                                        Inbound::Query(packet)
                                    };
                                    // No subscribers is fine; traffic is simply dropped.
                                    let _ = self.inbound.send(event);
                                }
                                Err(e) => debug!("dropping undecodable packet from {from}: {e}"),
                            }
                        }
                        Err(e) => {
                            warn!("mDNS receive error: {e}");
                            tokio::time::sleep(Duration::from_millis(100)).await;
                        }
                    }
                }
            }
        });
    }

    async fn send(&self, packet: &Packet) -> io::Result<()> {
        let bytes = codec::encode(packet)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
        self.socket.send_to(&bytes, self.dest).await?;
        Ok(())
    }
}

impl Drop for UdpTransport {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[async_trait]
impl Transport for UdpTransport {
    async fn query(&self, name: &str, kind: RecordKind) -> io::Result<()> {
        self.send(&Packet::query(name, kind)).await
    }

    async fn respond(
        &self,
        answers: Vec<Record>,
        additionals: Vec<Record>,
    ) -> io::Result<()> {
        self.send(&Packet::response(answers, additionals)).await
    }

    fn subscribe(&self) -> broadcast::Receiver<Inbound> {
        self.inbound.subscribe()
    }
}
