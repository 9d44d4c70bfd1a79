//! Browsing: active queries, response ingestion and TTL-based lifecycle.

use crate::discovery::{extract_services, DiscoveredService};
use crate::filter::ServiceFilter;
use dnssd_core::{
    names_equal, Inbound, Packet, RecordData, RecordKind, RemoteInfo, Transport, WILDCARD_NAME,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Event emitted while browsing.
#[derive(Debug, Clone)]
pub enum BrowseEvent {
    /// New service discovered.
    Up(DiscoveredService),
    /// Known service re-announced with fresh data.
    Update(DiscoveredService),
    /// Service went away (goodbye or TTL expiry).
    Down(DiscoveredService),
}

impl BrowseEvent {
    /// The service carried by any event.
    pub fn service(&self) -> &DiscoveredService {
        match self {
            BrowseEvent::Up(s) | BrowseEvent::Update(s) | BrowseEvent::Down(s) => s,
        }
    }

    pub fn is_up(&self) -> bool {
        matches!(self, BrowseEvent::Up(_))
    }

    pub fn is_update(&self) -> bool {
        matches!(self, BrowseEvent::Update(_))
    }

    pub fn is_down(&self) -> bool {
        matches!(self, BrowseEvent::Down(_))
    }
}

struct KnownService {
    service: DiscoveredService,
    /// Cancels the pending TTL expiry timer.
    expiry: CancellationToken,
}

struct BrowserInner {
    transport: Arc<dyn Transport>,
    filter: Option<ServiceFilter>,
    query_names: Vec<String>,
    known: Mutex<Vec<KnownService>>,
    events: broadcast::Sender<BrowseEvent>,
    cancel: CancellationToken,
}

/// A running browse session.
///
/// Emits `Up`/`Update`/`Down` events for services passing the filter; with
/// no filter, queries the service-type enumeration name and accepts
/// everything.
#[derive(Clone)]
pub struct Browser {
    inner: Arc<BrowserInner>,
}

impl Browser {
    pub(crate) fn start(transport: Arc<dyn Transport>, filter: Option<ServiceFilter>) -> Browser {
        let query_names = match &filter {
            Some(filter) => filter.query_names(),
            None => vec![WILDCARD_NAME.to_string()],
        };
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let inner = Arc::new(BrowserInner {
            transport,
            filter,
            query_names,
            known: Mutex::new(Vec::new()),
            events,
            cancel: CancellationToken::new(),
        });

        // Listen first, then ask; the subscription must exist before the
        // initial queries go out.
        let mut inbound = inner.transport.subscribe();
        let listener = Arc::clone(&inner);
        tokio::spawn(async move {
            listener.send_queries().await;
            loop {
                tokio::select! {
                    _ = listener.cancel.cancelled() => break,
                    event = inbound.recv() => match event {
                        Ok(Inbound::Response(packet, remote)) => {
                            listener.handle_response(&packet, remote);
                        }
                        Ok(Inbound::Query(_)) => {}
                        Err(broadcast::error::RecvError::Lagged(missed)) => {
                            warn!("browser lagged behind inbound traffic, missed {missed} packets");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            }
        });

        Browser { inner }
    }

    /// Subscribe to browse events.
    pub fn events(&self) -> broadcast::Receiver<BrowseEvent> {
        self.inner.events.subscribe()
    }

    /// Browse events as a stream.
    pub fn stream(&self) -> BroadcastStream<BrowseEvent> {
        BroadcastStream::new(self.events())
    }

    /// Snapshot of the currently known services.
    pub fn services(&self) -> Vec<DiscoveredService> {
        let known = self.inner.known.lock().unwrap();
        known.iter().map(|entry| entry.service.clone()).collect()
    }

    /// Re-issue the PTR queries (manual refresh).
    pub async fn update(&self) {
        self.inner.send_queries().await;
    }

    /// Detach the listener, cancel all TTL timers and drop the known set.
    /// Idempotent.
    pub fn stop(&self) {
        self.inner.cancel.cancel();
        self.inner.known.lock().unwrap().clear();
    }
}

impl BrowserInner {
    async fn send_queries(&self) {
        for name in &self.query_names {
            debug!("browsing for {name:?}");
            if let Err(e) = self.transport.query(name, RecordKind::Ptr).await {
                warn!("browse query for {name:?} failed: {e}");
            }
        }
    }

    fn handle_response(self: &Arc<Self>, packet: &Packet, remote: RemoteInfo) {
        // Goodbye sweep first: a zero-TTL PTR withdraws its instance.
        for record in packet.records() {
            if let RecordData::Ptr(instance) = &record.data {
                if record.ttl == 0 {
                    self.remove_service(instance);
                }
            }
        }

        for service in extract_services(packet, remote) {
            let exists = {
                let known = self.known.lock().unwrap();
                known
                    .iter()
                    .any(|entry| names_equal(&entry.service.fqdn, &service.fqdn))
            };
            if exists {
                self.update_service(service);
            } else {
                self.add_service(service);
            }
        }
    }

    fn add_service(self: &Arc<Self>, service: DiscoveredService) {
        if let Some(filter) = &self.filter {
            if !filter.matches(&service) {
                return;
            }
        }
        let expiry = self.cancel.child_token();
        self.arm_expiry(service.fqdn.clone(), service.ttl, expiry.clone());
        self.known.lock().unwrap().push(KnownService {
            service: service.clone(),
            expiry,
        });
        let _ = self.events.send(BrowseEvent::Up(service));
    }

    fn update_service(self: &Arc<Self>, service: DiscoveredService) {
        if let Some(filter) = &self.filter {
            if !filter.matches(&service) {
                // The replacement no longer matches; drop the service.
                self.remove_service(&service.fqdn);
                return;
            }
        }

        let expiry = self.cancel.child_token();
        {
            let mut known = self.known.lock().unwrap();
            let Some(entry) = known
                .iter_mut()
                .find(|entry| names_equal(&entry.service.fqdn, &service.fqdn))
            else {
                drop(known);
                self.add_service(service);
                return;
            };
            entry.expiry.cancel();
            entry.service = service.clone();
            entry.expiry = expiry.clone();
        }
        self.arm_expiry(service.fqdn.clone(), service.ttl, expiry);
        let _ = self.events.send(BrowseEvent::Update(service));
    }

    fn remove_service(self: &Arc<Self>, fqdn: &str) {
        let removed = {
            let mut known = self.known.lock().unwrap();
            known
                .iter()
                .position(|entry| names_equal(&entry.service.fqdn, fqdn))
                .map(|at| known.remove(at))
        };
        if let Some(entry) = removed {
            entry.expiry.cancel();
            let _ = self.events.send(BrowseEvent::Down(entry.service));
        }
    }

    /// Remove the service after its TTL runs out, unless refreshed (an
    /// update cancels this timer and arms a new one).
    fn arm_expiry(self: &Arc<Self>, fqdn: String, ttl: u32, token: CancellationToken) {
        let inner = Arc::clone(self);
        // Fire just past the deadline so the expiry check sees it elapsed.
        let deadline = Duration::from_secs(u64::from(ttl)) + Duration::from_millis(1);
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(deadline) => {
                    let expired = {
                        let known = inner.known.lock().unwrap();
                        known
                            .iter()
                            .find(|entry| names_equal(&entry.service.fqdn, &fqdn))
                            .map(|entry| entry.service.expired(tokio::time::Instant::now()))
                    };
                    if expired.unwrap_or(false) {
                        debug!("service {fqdn:?} expired");
                        inner.remove_service(&fqdn);
                    }
                }
            }
        });
    }
}
