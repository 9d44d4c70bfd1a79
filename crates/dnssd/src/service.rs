//! Advertised services: configuration, lifecycle handle and record-set
//! builder.

use crate::registry::{self, RegistryInner};
use dnssd_core::{
    txt, Error, HostInfo, Record, Result, ServiceError, ServiceType, TxtMap, LOCAL_TLD,
    WILDCARD_NAME,
};
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

/// Default record TTL in seconds.
pub const DEFAULT_TTL: u32 = 28_800;

const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Options for a service to advertise.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Instance name, e.g. `"My Web Server"`. Dots are sanitized to dashes.
    pub name: String,
    /// Service type name, e.g. `"http"`.
    pub service_type: String,
    /// Transport protocol label, `"tcp"` or `"udp"`.
    pub protocol: String,
    /// Subtype labels to advertise selective-discovery pointers for.
    pub subtypes: Vec<String>,
    /// Port the service listens on (1-65535).
    pub port: u16,
    /// Host name to advertise; defaults to the machine's `.local` name.
    pub host: Option<String>,
    /// TXT metadata.
    pub txt: TxtMap,
    /// Record TTL in seconds.
    pub ttl: u32,
    /// Probe for name uniqueness before announcing (RFC 6762 §8.1).
    pub probe: bool,
    /// On probe conflict, retry with `"<name> (2)"`, `"<name> (3)"`, ….
    pub probe_auto_resolve: bool,
    /// Skip AAAA records when advertising interface addresses.
    pub disable_ipv6: bool,
}

impl ServiceConfig {
    pub fn new(name: impl Into<String>, service_type: impl Into<String>, port: u16) -> Self {
        ServiceConfig {
            name: name.into(),
            service_type: service_type.into(),
            protocol: "tcp".to_string(),
            subtypes: Vec::new(),
            port,
            host: None,
            txt: TxtMap::new(),
            ttl: DEFAULT_TTL,
            probe: true,
            probe_auto_resolve: true,
            disable_ipv6: false,
        }
    }
}

/// Lifecycle events emitted by a published service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceEvent {
    /// The first announcement went out.
    Up,
    /// The goodbye went out.
    Down,
}

#[derive(Debug)]
struct ServiceState {
    name: String,
    fqdn: String,
    started: bool,
    published: bool,
    destroyed: bool,
    /// Cancels the probe/announce tasks of the current start.
    session: Option<CancellationToken>,
    /// Why the last start failed (e.g. an unresolved name conflict).
    error: Option<Error>,
}

pub(crate) struct ServiceInner {
    service_type: ServiceType,
    subtypes: Vec<String>,
    port: u16,
    host: String,
    txt: TxtMap,
    ttl: u32,
    probe: bool,
    probe_auto_resolve: bool,
    disable_ipv6: bool,
    host_info: Arc<dyn HostInfo>,
    registry: Weak<RegistryInner>,
    state: Mutex<ServiceState>,
    events: broadcast::Sender<ServiceEvent>,
}

/// Handle to an advertised service.
///
/// Cloning is cheap; all clones share the same underlying state.
#[derive(Clone)]
pub struct Service {
    inner: Arc<ServiceInner>,
}

impl std::fmt::Debug for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Service").finish()
    }
}

impl Service {
    pub(crate) fn new(
        config: ServiceConfig,
        host_info: Arc<dyn HostInfo>,
        registry: Weak<RegistryInner>,
    ) -> Result<Service> {
        if config.port == 0 {
            return Err(ServiceError::PortOutOfRange(config.port).into());
        }
        if config.name.is_empty() {
            return Err(ServiceError::EmptyName.into());
        }
        let service_type = ServiceType::new(config.service_type, config.protocol)?;

        // Dots would break the instance-label/type-label split.
        let name = config.name.replace('.', "-");
        let host = config
            .host
            .unwrap_or_else(|| host_info.hostname());
        let fqdn = fqdn_of(&name, &service_type);

        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Ok(Service {
            inner: Arc::new(ServiceInner {
                service_type,
                subtypes: config.subtypes,
                port: config.port,
                host,
                txt: config.txt,
                ttl: config.ttl,
                probe: config.probe,
                probe_auto_resolve: config.probe_auto_resolve,
                disable_ipv6: config.disable_ipv6,
                host_info,
                registry,
                state: Mutex::new(ServiceState {
                    name,
                    fqdn,
                    started: false,
                    published: false,
                    destroyed: false,
                    session: None,
                    error: None,
                }),
                events,
            }),
        })
    }

    /// Current instance name (may change during probe auto-resolve).
    pub fn name(&self) -> String {
        self.inner.state.lock().unwrap().name.clone()
    }

    /// Current fully qualified instance name.
    pub fn fqdn(&self) -> String {
        self.inner.state.lock().unwrap().fqdn.clone()
    }

    pub fn port(&self) -> u16 {
        self.inner.port
    }

    pub fn host(&self) -> &str {
        &self.inner.host
    }

    pub fn service_type(&self) -> &ServiceType {
        &self.inner.service_type
    }

    pub fn published(&self) -> bool {
        self.inner.state.lock().unwrap().published
    }

    pub fn started(&self) -> bool {
        self.inner.state.lock().unwrap().started
    }

    pub fn destroyed(&self) -> bool {
        self.inner.state.lock().unwrap().destroyed
    }

    /// Subscribe to `Up`/`Down` transitions.
    pub fn events(&self) -> broadcast::Receiver<ServiceEvent> {
        self.inner.events.subscribe()
    }

    /// Why the last start failed, if it did. Clears the stored error.
    pub fn take_error(&self) -> Option<Error> {
        self.inner.state.lock().unwrap().error.take()
    }

    /// The full authoritative record set for this service, in announcement
    /// order.
    pub fn records(&self) -> Vec<Record> {
        self.records_with_ttl(self.inner.ttl)
    }

    /// Re-start announcing after a stop.
    pub fn start(&self) -> Result<()> {
        let Some(registry) = self.inner.registry.upgrade() else {
            return Ok(());
        };
        registry::start_service(&registry, self)
    }

    /// Stop the service: abort probing, and send a goodbye when it had been
    /// published. A stop on a service that never published is a no-op.
    pub async fn stop(&self) -> Result<()> {
        let Some(registry) = self.inner.registry.upgrade() else {
            return Ok(());
        };
        registry::stop_service(&registry, self).await
    }

    pub(crate) fn records_with_ttl(&self, ttl: u32) -> Vec<Record> {
        let fqdn = self.fqdn();
        let inner = &self.inner;
        let type_name = format!("{}.{}", inner.service_type.base(), LOCAL_TLD);

        let mut records = vec![
            Record::ptr(&type_name, &fqdn, ttl),
            Record::srv(&fqdn, &inner.host, inner.port, ttl),
            Record::txt(&fqdn, txt::encode(&inner.txt), ttl),
            Record::ptr(WILDCARD_NAME, &type_name, ttl),
        ];
        for subtype in &inner.subtypes {
            records.push(Record::ptr(format!("_{subtype}._sub.{type_name}"), &fqdn, ttl));
        }
        for iface in inner.host_info.interfaces() {
            if !iface.advertisable() {
                continue;
            }
            if inner.disable_ipv6 && iface.address.is_ipv6() {
                continue;
            }
            records.push(Record::address(&inner.host, iface.address, ttl));
        }
        records
    }

    pub(crate) fn probe_enabled(&self) -> bool {
        self.inner.probe
    }

    pub(crate) fn probe_auto_resolve(&self) -> bool {
        self.inner.probe_auto_resolve
    }

    pub(crate) fn ttl(&self) -> u32 {
        self.inner.ttl
    }

    pub(crate) fn set_error(&self, error: Error) {
        self.inner.state.lock().unwrap().error = Some(error);
    }

    /// Rename during probe auto-resolve; the fqdn is recomputed.
    pub(crate) fn set_name(&self, name: String) {
        let mut state = self.inner.state.lock().unwrap();
        state.fqdn = fqdn_of(&name, &self.inner.service_type);
        state.name = name;
    }

    /// Mark started and install a fresh session token. Returns `None` when
    /// the service is destroyed or already started.
    pub(crate) fn begin_session(&self) -> Option<CancellationToken> {
        let mut state = self.inner.state.lock().unwrap();
        if state.destroyed || state.started {
            return None;
        }
        let token = CancellationToken::new();
        state.started = true;
        state.session = Some(token.clone());
        Some(token)
    }

    /// Leave the started state, cancelling any session tasks. Returns
    /// whether the service had been started.
    pub(crate) fn end_session(&self) -> bool {
        let mut state = self.inner.state.lock().unwrap();
        if let Some(session) = state.session.take() {
            session.cancel();
        }
        std::mem::replace(&mut state.started, false)
    }

    /// First successful announcement: flip to published and emit `Up` once.
    pub(crate) fn mark_published(&self) -> bool {
        let mut state = self.inner.state.lock().unwrap();
        if state.published {
            return false;
        }
        state.published = true;
        drop(state);
        let _ = self.inner.events.send(ServiceEvent::Up);
        true
    }

    /// Goodbye sent: flip to unpublished and emit `Down` once.
    pub(crate) fn mark_unpublished(&self) -> bool {
        let mut state = self.inner.state.lock().unwrap();
        if !state.published {
            return false;
        }
        state.published = false;
        drop(state);
        let _ = self.inner.events.send(ServiceEvent::Down);
        true
    }

    /// Destroy the service: cancel session tasks and inhibit all future
    /// probe/announce work. No goodbye is sent.
    pub(crate) fn mark_destroyed(&self) {
        let mut state = self.inner.state.lock().unwrap();
        state.destroyed = true;
        state.started = false;
        if let Some(session) = state.session.take() {
            session.cancel();
        }
    }
}

fn fqdn_of(name: &str, service_type: &ServiceType) -> String {
    format!("{name}.{}.{LOCAL_TLD}", service_type.base())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dnssd_core::{Error, InterfaceAddr, RecordData, RecordKind};
    use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

    mockall::mock! {
        Host {}

        impl HostInfo for Host {
            fn hostname(&self) -> String;
            fn interfaces(&self) -> Vec<InterfaceAddr>;
        }
    }

    fn test_host(addresses: Vec<IpAddr>) -> Arc<MockHost> {
        let mut host = MockHost::new();
        host.expect_hostname()
            .returning(|| "test-host.local".to_string());
        host.expect_interfaces().returning(move || {
            let mut interfaces = vec![InterfaceAddr {
                address: IpAddr::V4(Ipv4Addr::LOCALHOST),
                mac: None,
                internal: true,
            }];
            interfaces.extend(addresses.iter().map(|&address| InterfaceAddr {
                address,
                mac: Some([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]),
                internal: false,
            }));
            interfaces
        });
        Arc::new(host)
    }

    fn make_service(config: ServiceConfig, addresses: Vec<IpAddr>) -> Result<Service> {
        Service::new(config, test_host(addresses), Weak::new())
    }

    mod validation {
        use super::*;

        #[test]
        fn zero_port_is_rejected() {
            let err = make_service(ServiceConfig::new("Foo", "http", 0), vec![]).unwrap_err();
            assert!(matches!(
                err,
                Error::Service(ServiceError::PortOutOfRange(0))
            ));
        }

        #[test]
        fn empty_name_is_rejected() {
            let err = make_service(ServiceConfig::new("", "http", 80), vec![]).unwrap_err();
            assert!(matches!(err, Error::Service(ServiceError::EmptyName)));
        }

        #[test]
        fn dots_in_name_become_dashes() {
            let service =
                make_service(ServiceConfig::new("node.js server", "http", 80), vec![]).unwrap();
            assert_eq!(service.name(), "node-js server");
            assert_eq!(service.fqdn(), "node-js server._http._tcp.local");
        }

        #[test]
        fn ttl_defaults_to_eight_hours() {
            let config = ServiceConfig::new("Foo", "http", 80);
            assert_eq!(config.ttl, 28_800);
            assert!(config.probe);
            assert!(config.probe_auto_resolve);
        }
    }

    mod record_set {
        use super::*;

        #[test]
        fn minimal_service_records_in_order() {
            let addr = IpAddr::V4(Ipv4Addr::new(192, 168, 1, 10));
            let service =
                make_service(ServiceConfig::new("Foo Bar", "http", 3000), vec![addr]).unwrap();
            let records = service.records();

            assert_eq!(
                records[0],
                Record::ptr("_http._tcp.local", "Foo Bar._http._tcp.local", 28_800)
            );
            assert_eq!(
                records[1],
                Record::srv("Foo Bar._http._tcp.local", "test-host.local", 3000, 28_800)
            );
            assert_eq!(
                records[2],
                Record::txt("Foo Bar._http._tcp.local", vec![], 28_800)
            );
            assert_eq!(
                records[3],
                Record::ptr("_services._dns-sd._udp.local", "_http._tcp.local", 28_800)
            );
            assert_eq!(records[4], Record::address("test-host.local", addr, 28_800));
            assert_eq!(records.len(), 5);
            assert!(records.iter().all(|record| record.ttl == 28_800));
        }

        #[test]
        fn txt_subtypes_and_ttl() {
            let mut config = ServiceConfig::new("Foo Bar", "http", 3000);
            config.ttl = 120;
            config.txt.insert("foo", "bar");
            config.subtypes = vec!["foo".to_string(), "bar".to_string()];
            let service = make_service(config, vec![]).unwrap();
            let records = service.records();

            assert_eq!(
                records[2].data,
                RecordData::Txt(vec![b"foo=bar".to_vec()])
            );
            assert_eq!(
                records[4],
                Record::ptr(
                    "_foo._sub._http._tcp.local",
                    "Foo Bar._http._tcp.local",
                    120
                )
            );
            assert_eq!(
                records[5],
                Record::ptr(
                    "_bar._sub._http._tcp.local",
                    "Foo Bar._http._tcp.local",
                    120
                )
            );
            assert!(records.iter().all(|record| record.ttl == 120));
        }

        #[test]
        fn internal_interfaces_are_skipped() {
            let service = make_service(ServiceConfig::new("Foo", "http", 80), vec![]).unwrap();
            let records = service.records();
            assert!(records
                .iter()
                .all(|record| record.kind() != RecordKind::A));
        }

        #[test]
        fn disable_ipv6_drops_aaaa_records() {
            let v4 = IpAddr::V4(Ipv4Addr::new(192, 168, 1, 10));
            let v6 = IpAddr::V6(Ipv6Addr::new(0xfe80, 0, 0, 0, 0, 0, 0, 1));

            let mut config = ServiceConfig::new("Foo", "http", 80);
            config.disable_ipv6 = true;
            let service = make_service(config, vec![v4, v6]).unwrap();
            let records = service.records();
            assert!(records
                .iter()
                .all(|record| record.kind() != RecordKind::Aaaa));
            assert!(records
                .iter()
                .any(|record| record.kind() == RecordKind::A));
        }

        #[test]
        fn goodbye_set_has_zero_ttl() {
            let service = make_service(ServiceConfig::new("Foo", "http", 80), vec![]).unwrap();
            assert!(service
                .records_with_ttl(0)
                .iter()
                .all(|record| record.is_goodbye()));
        }
    }

    mod renaming {
        use super::*;

        #[test]
        fn set_name_recomputes_fqdn() {
            let service = make_service(ServiceConfig::new("Foo", "http", 80), vec![]).unwrap();
            service.set_name("Foo (2)".to_string());
            assert_eq!(service.name(), "Foo (2)");
            assert_eq!(service.fqdn(), "Foo (2)._http._tcp.local");
        }
    }
}
