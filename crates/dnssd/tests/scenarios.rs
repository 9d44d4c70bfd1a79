//! End-to-end scenarios over an in-memory network segment: publishers and
//! browsers on distinct endpoints wired through one `MemoryHub`.

use dnssd::{
    BrowseEvent, HostInfo, InterfaceAddr, Mdns, MemoryHub, ServiceConfig, ServiceEvent,
    ServiceFilter,
};
use regex::Regex;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

struct FakeHost;

impl HostInfo for FakeHost {
    fn hostname(&self) -> String {
        "test-host.local".to_string()
    }

    fn interfaces(&self) -> Vec<InterfaceAddr> {
        vec![InterfaceAddr {
            address: IpAddr::V4(Ipv4Addr::new(192, 168, 1, 10)),
            mac: Some([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]),
            internal: false,
        }]
    }
}

fn endpoint(hub: &MemoryHub) -> Mdns {
    Mdns::with_transport(hub.endpoint(), Arc::new(FakeHost))
}

async fn wait_until_published(service: &dnssd::Service) {
    let mut events = service.events();
    if service.published() {
        return;
    }
    loop {
        match tokio::time::timeout(Duration::from_secs(30), events.recv())
            .await
            .expect("timed out waiting for the service to publish")
        {
            Ok(ServiceEvent::Up) => return,
            Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
            Err(broadcast::error::RecvError::Closed) => panic!("service event channel closed"),
        }
    }
}

async fn next_up(events: &mut broadcast::Receiver<BrowseEvent>) -> dnssd::DiscoveredService {
    loop {
        let event = tokio::time::timeout(Duration::from_secs(30), events.recv())
            .await
            .expect("timed out waiting for an up event")
            .expect("browse event channel closed");
        if let BrowseEvent::Up(service) = event {
            return service;
        }
    }
}

/// Drain events for a while, returning the `Up` names seen.
async fn collect_ups(events: &mut broadcast::Receiver<BrowseEvent>, window: Duration) -> Vec<String> {
    let mut names = Vec::new();
    let deadline = tokio::time::Instant::now() + window;
    loop {
        let event = tokio::select! {
            _ = tokio::time::sleep_until(deadline) => break,
            event = events.recv() => event,
        };
        match event {
            Ok(BrowseEvent::Up(service)) => names.push(service.name),
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(_)) => {}
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
    names
}

#[tokio::test(start_paused = true)]
async fn conflicting_names_auto_resolve_to_distinct_instances() {
    let hub = MemoryHub::new();
    let publisher = endpoint(&hub);

    let first = publisher
        .publish(ServiceConfig::new("ConflictService", "test", 1234))
        .unwrap();
    wait_until_published(&first).await;

    let second = publisher
        .publish(ServiceConfig::new("ConflictService", "test", 4321))
        .unwrap();
    wait_until_published(&second).await;

    assert!(first.published());
    assert!(second.published());
    assert_eq!(first.name(), "ConflictService");
    assert_eq!(second.name(), "ConflictService (2)");
}

#[tokio::test(start_paused = true)]
async fn ttl_runs_out_once_announcements_stop() {
    let hub = MemoryHub::new();
    let publisher = endpoint(&hub);
    let observer = endpoint(&hub);

    let browser = observer.browse(Some(ServiceFilter::new("test", "tcp")));
    let mut events = browser.events();

    let mut config = ServiceConfig::new("TTLExpireTest", "test", 3000);
    config.ttl = 1;
    config.probe = false;
    let service = publisher.publish(config).unwrap();
    wait_until_published(&service).await;

    assert_eq!(next_up(&mut events).await.name, "TTLExpireTest");

    // No goodbye is sent on destroy; the browser entry ages out instead.
    publisher.destroy();
    loop {
        let event = tokio::time::timeout(Duration::from_secs(30), events.recv())
            .await
            .expect("timed out waiting for the ttl expiry")
            .unwrap();
        if let BrowseEvent::Down(service) = event {
            assert_eq!(service.name, "TTLExpireTest");
            break;
        }
    }
    assert!(browser.services().is_empty());
}

#[tokio::test(start_paused = true)]
async fn browser_reports_only_matching_services() {
    let hub = MemoryHub::new();
    let publisher = endpoint(&hub);
    let observer = endpoint(&hub);

    let browser = observer.browse(Some(ServiceFilter::new("test", "tcp")));
    let mut events = browser.events();

    for (name, type_name, protocol) in [
        ("TcpTest", "test", "tcp"),
        ("UdpTest", "test", "udp"),
        ("OtherType", "test2", "tcp"),
    ] {
        let mut config = ServiceConfig::new(name, type_name, 3000);
        config.protocol = protocol.to_string();
        config.probe = false;
        let service = publisher.publish(config).unwrap();
        wait_until_published(&service).await;
    }

    let ups = collect_ups(&mut events, Duration::from_secs(5)).await;
    assert_eq!(ups, vec!["TcpTest".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn name_pattern_selects_matching_instances() {
    let hub = MemoryHub::new();
    let publisher = endpoint(&hub);
    let observer = endpoint(&hub);

    let filter = ServiceFilter::new("test", "tcp").name(Regex::new("-service$").unwrap());
    let browser = observer.browse(Some(filter));
    let mut events = browser.events();

    for name in ["alpha-service", "beta-service", "gamma-worker"] {
        let mut config = ServiceConfig::new(name, "test", 3000);
        config.probe = false;
        let service = publisher.publish(config).unwrap();
        wait_until_published(&service).await;
    }

    let mut ups = collect_ups(&mut events, Duration::from_secs(5)).await;
    ups.sort();
    assert_eq!(
        ups,
        vec!["alpha-service".to_string(), "beta-service".to_string()]
    );
}

#[tokio::test(start_paused = true)]
async fn subtype_filters_browse_with_subtype_queries() {
    let hub = MemoryHub::new();
    let publisher = endpoint(&hub);
    let observer = endpoint(&hub);

    let browser = observer.browse(Some(ServiceFilter::new("http", "tcp").subtype("printer")));
    let mut events = browser.events();

    let mut with_subtype = ServiceConfig::new("HasSub", "http", 631);
    with_subtype.subtypes = vec!["printer".to_string()];
    with_subtype.probe = false;
    let service = publisher.publish(with_subtype).unwrap();
    wait_until_published(&service).await;

    let mut plain = ServiceConfig::new("NoSub", "http", 80);
    plain.probe = false;
    let service = publisher.publish(plain).unwrap();
    wait_until_published(&service).await;

    let ups = collect_ups(&mut events, Duration::from_secs(5)).await;
    assert_eq!(ups, vec!["HasSub".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn find_one_returns_the_first_match() {
    let hub = MemoryHub::new();
    let publisher = endpoint(&hub);
    let observer = endpoint(&hub);

    let mut config = ServiceConfig::new("Findable", "http", 8080);
    config.probe = false;
    config.txt.insert("path", "/api");
    let service = publisher.publish(config).unwrap();
    wait_until_published(&service).await;

    let found = observer
        .find_one(ServiceFilter::new("http", "tcp"), Duration::from_secs(10))
        .await
        .expect("the published service should be found");
    assert_eq!(found.name, "Findable");
    assert_eq!(found.port, 8080);
    assert_eq!(found.host, "test-host.local");
    assert_eq!(
        found.addresses,
        vec![IpAddr::V4(Ipv4Addr::new(192, 168, 1, 10))]
    );
}

#[tokio::test(start_paused = true)]
async fn find_one_times_out_quietly() {
    let hub = MemoryHub::new();
    let observer = endpoint(&hub);

    let found = observer
        .find_one(ServiceFilter::new("nothing", "tcp"), Duration::from_secs(2))
        .await;
    assert!(found.is_none());
}

#[tokio::test(start_paused = true)]
async fn unpublish_all_says_goodbye_to_every_service() {
    let hub = MemoryHub::new();
    let publisher = endpoint(&hub);
    let observer = endpoint(&hub);

    let browser = observer.browse(Some(ServiceFilter::new("test", "tcp")));
    let mut events = browser.events();

    for name in ["First", "Second"] {
        let mut config = ServiceConfig::new(name, "test", 3000);
        config.probe = false;
        let service = publisher.publish(config).unwrap();
        wait_until_published(&service).await;
    }
    assert_eq!(
        collect_ups(&mut events, Duration::from_secs(2)).await.len(),
        2
    );

    publisher.unpublish_all().await.unwrap();

    let mut down = Vec::new();
    while down.len() < 2 {
        let event = tokio::time::timeout(Duration::from_secs(30), events.recv())
            .await
            .expect("timed out waiting for goodbyes")
            .unwrap();
        if let BrowseEvent::Down(service) = event {
            down.push(service.name);
        }
    }
    down.sort();
    assert_eq!(down, vec!["First".to_string(), "Second".to_string()]);
    assert!(browser.services().is_empty());
}

#[tokio::test(start_paused = true)]
async fn publishing_after_destroy_is_rejected() {
    let hub = MemoryHub::new();
    let publisher = endpoint(&hub);

    publisher.destroy();
    assert!(publisher
        .publish(ServiceConfig::new("TooLate", "http", 80))
        .is_err());
}
