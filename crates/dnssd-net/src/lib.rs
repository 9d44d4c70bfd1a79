//! # dnssd-net
//!
//! Network collaborators for the dnssd stack.
//!
//! This crate provides:
//! - The RFC 1035 wire codec on top of `hickory-proto`
//! - A UDP multicast transport implementing the core transport contract
//! - Host name and interface lookup backed by the operating system

pub mod codec;
pub mod iface;
pub mod socket;
pub mod transport;

pub use iface::SystemHost;
pub use transport::UdpTransport;
