//! Multicast UDP socket construction.

use dnssd_core::InterfaceAddr;
use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};
use tracing::debug;

/// Build a reusable UDP socket bound to the mDNS port and joined to the
/// multicast group on every non-internal IPv4 interface.
pub fn bind_multicast(
    group: Ipv4Addr,
    port: u16,
    interfaces: &[InterfaceAddr],
) -> io::Result<UdpSocket> {
    let socket = reusable_socket()?;
    socket.bind(&SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)).into())?;
    let socket: UdpSocket = socket.into();

    let mut joined = false;
    for iface in interfaces {
        if iface.internal {
            continue;
        }
        if let IpAddr::V4(v4) = iface.address {
            match socket.join_multicast_v4(&group, &v4) {
                Ok(()) => {
                    debug!("joined multicast {group} on {v4}");
                    joined = true;
                }
                Err(e) => debug!("failed to join {group} on {v4}: {e}"),
            }
        }
    }
    // Fall back to the default interface when nothing joined.
    if !joined {
        socket.join_multicast_v4(&group, &Ipv4Addr::UNSPECIFIED)?;
    }

    socket.set_multicast_loop_v4(true)?;
    socket.set_nonblocking(true)?;
    Ok(socket)
}

/// Build a loopback unicast socket (the `multicast: false` mode used by
/// tests and single-host setups).
pub fn bind_unicast(port: u16) -> io::Result<UdpSocket> {
    let socket = reusable_socket()?;
    socket.bind(&SocketAddr::from((Ipv4Addr::LOCALHOST, port)).into())?;
    let socket: UdpSocket = socket.into();
    socket.set_nonblocking(true)?;
    Ok(socket)
}

fn reusable_socket() -> io::Result<Socket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    #[cfg(unix)]
    socket.set_reuse_port(true)?;
    Ok(socket)
}
