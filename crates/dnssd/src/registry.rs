//! Publisher state machine: probe, announce, re-announce, goodbye.

use crate::responder::Responder;
use crate::service::Service;
use dnssd_core::{names_equal, Error, Inbound, RecordKind, Result, ServiceError, Transport};
use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Largest startup jitter before the first probe (RFC 6762 §8.1).
const PROBE_STARTUP_JITTER_MS: u64 = 250;
/// Spacing between probe queries.
const PROBE_INTERVAL_MS: u64 = 250;
/// Number of probe queries per attempt.
const PROBE_COUNT: u32 = 3;
/// Name-conflict auto-resolution gives up after this many attempts.
const MAX_PROBE_ATTEMPTS: u32 = 10;

/// First re-announce delay (RFC 6762 §8.3).
const ANNOUNCE_INITIAL_DELAY_MS: u64 = 1_000;
/// Re-announce delay multiplier.
const ANNOUNCE_DELAY_FACTOR: u64 = 3;
/// No re-announce is scheduled once the delay reaches one hour.
const ANNOUNCE_MAX_DELAY_MS: u64 = 3_600_000;

/// Shared state of all publisher sessions of one endpoint.
pub(crate) struct RegistryInner {
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) responder: Arc<Responder>,
    services: Mutex<Vec<Service>>,
    destroyed: AtomicBool,
}

impl RegistryInner {
    pub(crate) fn new(transport: Arc<dyn Transport>, responder: Arc<Responder>) -> Self {
        RegistryInner {
            transport,
            responder,
            services: Mutex::new(Vec::new()),
            destroyed: AtomicBool::new(false),
        }
    }
}

/// Track a new service and start its session.
pub(crate) fn publish(inner: &Arc<RegistryInner>, service: Service) -> Result<()> {
    if inner.destroyed.load(Ordering::SeqCst) {
        return Err(ServiceError::Destroyed.into());
    }
    inner.services.lock().unwrap().push(service.clone());
    start_service(inner, &service)
}

/// Start (or restart) a service session: probe when configured, then
/// announce. Already-started services are left alone.
pub(crate) fn start_service(inner: &Arc<RegistryInner>, service: &Service) -> Result<()> {
    if inner.destroyed.load(Ordering::SeqCst) || service.destroyed() {
        return Err(ServiceError::Destroyed.into());
    }
    let Some(session) = service.begin_session() else {
        return Ok(());
    };
    let inner = Arc::clone(inner);
    let service = service.clone();
    tokio::spawn(async move {
        run_session(inner, service, session).await;
    });
    Ok(())
}

/// Stop a service. Sends a goodbye (and emits `Down`) only when the
/// service had been published; otherwise this is a no-op.
pub(crate) async fn stop_service(inner: &Arc<RegistryInner>, service: &Service) -> Result<()> {
    if !service.end_session() {
        return Ok(());
    }
    if !service.published() {
        return Ok(());
    }

    let goodbye = service.records_with_ttl(0);
    inner.responder.unregister(&goodbye);
    let result = inner.transport.respond(goodbye, Vec::new()).await;
    service.mark_unpublished();
    info!("service {:?} is down", service.fqdn());
    result.map_err(Error::from)
}

/// Stop every tracked service and clear the set, even when a goodbye
/// transmit fails. The first error is reported.
pub(crate) async fn unpublish_all(inner: &Arc<RegistryInner>) -> Result<()> {
    let services: Vec<Service> = inner.services.lock().unwrap().drain(..).collect();
    let mut first_error = None;
    for service in services {
        if let Err(e) = stop_service(inner, &service).await {
            warn!("goodbye for {:?} failed: {e}", service.fqdn());
            first_error.get_or_insert(e);
        }
    }
    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Mark every tracked service destroyed. Pending probe and re-announce
/// work observes the flag and becomes a no-op; no goodbyes are sent.
pub(crate) fn destroy(inner: &Arc<RegistryInner>) {
    inner.destroyed.store(true, Ordering::SeqCst);
    for service in inner.services.lock().unwrap().drain(..) {
        service.mark_destroyed();
    }
}

enum ProbeOutcome {
    Unique,
    Conflict,
    Aborted,
}

async fn run_session(inner: Arc<RegistryInner>, service: Service, cancel: CancellationToken) {
    if service.probe_enabled() {
        match probe_for_unique_name(&inner, &service, &cancel).await {
            ProbeOutcome::Unique => {}
            ProbeOutcome::Conflict => {
                let conflict = Error::NameConflict {
                    name: service.name(),
                };
                error!("cannot publish {:?}: {conflict}", service.fqdn());
                service.set_error(conflict);
                service.end_session();
                return;
            }
            ProbeOutcome::Aborted => return,
        }
    }
    announce(&inner, &service, &cancel).await;
}

/// Probe until a free name is confirmed, renaming on conflicts when
/// auto-resolution is enabled.
async fn probe_for_unique_name(
    inner: &Arc<RegistryInner>,
    service: &Service,
    cancel: &CancellationToken,
) -> ProbeOutcome {
    let original = service.name();
    for attempt in 1..=MAX_PROBE_ATTEMPTS {
        match probe_once(inner.transport.as_ref(), &service.fqdn(), cancel).await {
            ProbeOutcome::Conflict
                if service.probe_auto_resolve() && attempt < MAX_PROBE_ATTEMPTS =>
            {
                let renamed = format!("{original} ({})", attempt + 1);
                debug!(
                    "probe conflict for {:?}, retrying as {renamed:?}",
                    service.fqdn()
                );
                service.set_name(renamed);
            }
            outcome => return outcome,
        }
    }
    ProbeOutcome::Conflict
}

/// One probe attempt: a uniform 0-250 ms startup jitter, then three ANY
/// queries 250 ms apart while listening for a response naming the fqdn.
/// Responses received before the first query goes out are ignored.
async fn probe_once(
    transport: &dyn Transport,
    fqdn: &str,
    cancel: &CancellationToken,
) -> ProbeOutcome {
    let jitter = rand::thread_rng().gen_range(0..=PROBE_STARTUP_JITTER_MS);
    tokio::select! {
        _ = cancel.cancelled() => return ProbeOutcome::Aborted,
        _ = tokio::time::sleep(Duration::from_millis(jitter)) => {}
    }

    let mut responses = transport.subscribe();
    for _ in 0..PROBE_COUNT {
        // A failed send is a soft failure; keep probing.
        if let Err(e) = transport.query(fqdn, RecordKind::Any).await {
            warn!("probe query for {fqdn:?} failed: {e}");
        }

        let deadline = tokio::time::Instant::now() + Duration::from_millis(PROBE_INTERVAL_MS);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return ProbeOutcome::Aborted,
                _ = tokio::time::sleep_until(deadline) => break,
                event = responses.recv() => match event {
                    Ok(Inbound::Response(packet, _)) => {
                        if packet.records().any(|record| names_equal(&record.name, fqdn)) {
                            return ProbeOutcome::Conflict;
                        }
                    }
                    Ok(Inbound::Query(_)) => {}
                    Err(broadcast::error::RecvError::Lagged(_)) => {}
                    Err(broadcast::error::RecvError::Closed) => {
                        tokio::select! {
                            _ = cancel.cancelled() => return ProbeOutcome::Aborted,
                            _ = tokio::time::sleep_until(deadline) => {}
                        }
                        break;
                    }
                }
            }
        }
    }
    ProbeOutcome::Unique
}

/// Register records and transmit them, re-transmitting with a delay that
/// starts at one second and triples until it reaches one hour. Destroyed
/// services stop transmitting; the first successful transmit flips the
/// service to published.
async fn announce(inner: &Arc<RegistryInner>, service: &Service, cancel: &CancellationToken) {
    let records = service.records();
    inner.responder.register(&records);
    debug!("announcing {:?}", service.fqdn());

    let mut delay = ANNOUNCE_INITIAL_DELAY_MS;
    loop {
        if service.destroyed() || cancel.is_cancelled() {
            return;
        }
        match inner.transport.respond(records.clone(), Vec::new()).await {
            Ok(()) => {
                if service.mark_published() {
                    info!("service {:?} is up", service.fqdn());
                }
            }
            Err(e) => warn!("announcement for {:?} failed: {e}", service.fqdn()),
        }

        if delay >= ANNOUNCE_MAX_DELAY_MS {
            return;
        }
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(Duration::from_millis(delay)) => {}
        }
        delay *= ANNOUNCE_DELAY_FACTOR;
    }
}
