//! # dnssd
//!
//! Multicast DNS service discovery (RFC 6762 / RFC 6763): advertise local
//! services and browse for services advertised by peers, over link-local
//! multicast.
//!
//! This crate provides:
//! - [`Mdns`], the endpoint handle owning one transport and one responder
//! - Publishing with probing, announcements and goodbyes
//! - Browsing with match filters and TTL-based lifecycle events
//!
//! ## Example
//!
//! ```ignore
//! use dnssd::{Mdns, ServiceConfig, ServiceFilter};
//! use std::time::Duration;
//!
//! let mdns = Mdns::new(Default::default())?;
//! let service = mdns.publish(ServiceConfig::new("My Server", "http", 3000))?;
//!
//! if let Some(peer) = mdns
//!     .find_one(ServiceFilter::new("http", "tcp"), Duration::from_secs(5))
//!     .await
//! {
//!     println!("found {} at {}:{}", peer.name, peer.host, peer.port);
//! }
//! ```

pub mod browser;
pub mod discovery;
pub mod filter;
pub mod memory;
pub mod responder;
pub mod service;

mod registry;

pub use browser::{BrowseEvent, Browser};
pub use discovery::DiscoveredService;
pub use filter::{NameMatch, ServiceFilter, TxtMatch};
pub use memory::{MemoryHub, MemoryTransport};
pub use responder::{Responded, Responder};
pub use service::{Service, ServiceConfig, ServiceEvent, DEFAULT_TTL};

pub use dnssd_core::{
    CodecError, Error, HostInfo, Inbound, InterfaceAddr, MdnsConfig, Packet, Question, Record,
    RecordData, RecordKind, RemoteInfo, Result, ServiceError, ServiceType, ServiceTypeError,
    Transport, TxtMap, TxtValue, LOCAL_TLD, WILDCARD_NAME,
};

use dnssd_net::{SystemHost, UdpTransport};
use registry::RegistryInner;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

struct MdnsInner {
    transport: Arc<dyn Transport>,
    host: Arc<dyn HostInfo>,
    responder: Arc<Responder>,
    registry: Arc<RegistryInner>,
    cancel: CancellationToken,
}

/// One mDNS endpoint: a transport, a responder answering queries for all
/// published services, and the set of publisher sessions.
///
/// Must be created inside a tokio runtime; background tasks are spawned on
/// it and never keep the process alive on their own.
#[derive(Clone)]
pub struct Mdns {
    inner: Arc<MdnsInner>,
}

impl Mdns {
    /// Open a UDP endpoint with the given configuration.
    pub fn new(config: MdnsConfig) -> Result<Mdns> {
        let host: Arc<dyn HostInfo> = Arc::new(SystemHost);
        let transport = UdpTransport::bind(&config, host.as_ref())?;
        Ok(Mdns::with_transport(transport, host))
    }

    /// Build an endpoint over any transport and host lookup; used by tests
    /// and single-process setups.
    pub fn with_transport(transport: Arc<dyn Transport>, host: Arc<dyn HostInfo>) -> Mdns {
        let responder = Arc::new(Responder::new(Arc::clone(&transport)));
        let cancel = CancellationToken::new();
        responder.spawn(cancel.child_token());
        let registry = Arc::new(RegistryInner::new(
            Arc::clone(&transport),
            Arc::clone(&responder),
        ));
        Mdns {
            inner: Arc::new(MdnsInner {
                transport,
                host,
                responder,
                registry,
                cancel,
            }),
        }
    }

    /// Publish a service: validate, then probe (when configured) and
    /// announce in the background. Subscribe to [`Service::events`] to
    /// observe the `Up` transition.
    pub fn publish(&self, config: ServiceConfig) -> Result<Service> {
        let service = Service::new(
            config,
            Arc::clone(&self.inner.host),
            Arc::downgrade(&self.inner.registry),
        )?;
        registry::publish(&self.inner.registry, service.clone())?;
        Ok(service)
    }

    /// Start browsing. With no filter, everything advertised on the
    /// network is reported.
    pub fn browse(&self, filter: Option<ServiceFilter>) -> Browser {
        Browser::start(Arc::clone(&self.inner.transport), filter)
    }

    /// Resolve with the first service matching the filter, or `None` once
    /// the timeout runs out. The internal browser is stopped either way.
    pub async fn find_one(
        &self,
        filter: ServiceFilter,
        timeout: Duration,
    ) -> Option<DiscoveredService> {
        let browser = self.browse(Some(filter));
        let mut events = browser.events();
        let found = tokio::time::timeout(timeout, async {
            loop {
                match events.recv().await {
                    Ok(BrowseEvent::Up(service)) => break Some(service),
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(_)) => {}
                    Err(broadcast::error::RecvError::Closed) => break None,
                }
            }
        })
        .await
        .unwrap_or(None);
        browser.stop();
        found
    }

    /// Send goodbyes for all published services and clear the set. The set
    /// is cleared even when a transmit fails; the first error is reported.
    pub async fn unpublish_all(&self) -> Result<()> {
        registry::unpublish_all(&self.inner.registry).await
    }

    /// Tear the endpoint down: mark every service destroyed and stop the
    /// responder. No goodbyes are sent; call [`Mdns::unpublish_all`] first
    /// for a graceful exit.
    pub fn destroy(&self) {
        registry::destroy(&self.inner.registry);
        self.inner.cancel.cancel();
    }

    /// The responder holding this endpoint's authoritative records.
    pub fn responder(&self) -> &Responder {
        &self.inner.responder
    }
}
