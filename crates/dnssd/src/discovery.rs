//! Building service views out of response packets.

use dnssd_core::{
    first_label, names_equal, txt, Packet, Record, RecordData, RemoteInfo, ServiceType, TxtMap,
};
use std::net::IpAddr;
use std::time::Duration;
use tokio::time::Instant;

/// A service discovered on the network.
#[derive(Debug, Clone)]
pub struct DiscoveredService {
    /// Instance name (first label of the fqdn).
    pub name: String,
    /// Fully qualified instance name.
    pub fqdn: String,
    /// Host the service runs on (SRV target).
    pub host: String,
    pub port: u16,
    pub service_type: ServiceType,
    pub subtypes: Vec<String>,
    /// Host addresses advertised alongside the service.
    pub addresses: Vec<IpAddr>,
    /// TXT metadata, string view (lossily decoded).
    pub txt: TxtMap,
    /// TXT metadata, raw bytes (authoritative).
    pub txt_raw: Vec<Vec<u8>>,
    /// Where the response came from.
    pub referer: RemoteInfo,
    /// Advertised TTL in seconds (taken from the PTR record).
    pub ttl: u32,
    /// When this view was built or last refreshed.
    pub last_seen: Instant,
}

impl DiscoveredService {
    /// Whether the advertised TTL has run out at `now`.
    pub fn expired(&self, now: Instant) -> bool {
        now > self.last_seen + Duration::from_secs(u64::from(self.ttl))
    }
}

/// Extract every advertised service from a response packet.
///
/// Answers and additionals are treated as one pool; goodbye records
/// (TTL 0) are skipped here and handled by the browser's goodbye sweep.
/// The PTR TTL stands in for the whole service's TTL.
pub(crate) fn extract_services(packet: &Packet, referer: RemoteInfo) -> Vec<DiscoveredService> {
    let live: Vec<&Record> = packet.records().filter(|record| record.ttl > 0).collect();

    let mut services = Vec::new();
    for pointer in &live {
        let RecordData::Ptr(instance) = &pointer.data else {
            continue;
        };

        // A service needs an endpoint; PTRs without one (e.g. the
        // service-type enumeration pointer) are skipped.
        let Some((fqdn, port, host)) = live.iter().find_map(|record| match &record.data {
            RecordData::Srv { port, target } if names_equal(&record.name, instance) => {
                Some((record.name.clone(), *port, target.clone()))
            }
            _ => None,
        }) else {
            continue;
        };

        let labels: Vec<&str> = fqdn.split('.').collect();
        if labels.len() < 3 {
            continue;
        }
        let Ok(service_type) = labels[1..labels.len() - 1].join(".").parse::<ServiceType>()
        else {
            continue;
        };

        let txt_raw = live.iter().find_map(|record| match &record.data {
            RecordData::Txt(entries) if names_equal(&record.name, &fqdn) => {
                Some(entries.clone())
            }
            _ => None,
        });

        let mut subtypes: Vec<String> = Vec::new();
        for record in &live {
            let RecordData::Ptr(target) = &record.data else {
                continue;
            };
            if !record.name.contains("._sub") || !names_equal(target, instance) {
                continue;
            }
            if let Ok(subtyped) = record.name.parse::<ServiceType>() {
                if let Some(subtype) = subtyped.subtype() {
                    if !subtypes.iter().any(|s| s == subtype) {
                        subtypes.push(subtype.to_string());
                    }
                }
            }
        }

        let addresses: Vec<IpAddr> = live
            .iter()
            .filter_map(|record| match &record.data {
                RecordData::A(v4) if names_equal(&record.name, &host) => {
                    Some(IpAddr::V4(*v4))
                }
                RecordData::Aaaa(v6) if names_equal(&record.name, &host) => {
                    Some(IpAddr::V6(*v6))
                }
                _ => None,
            })
            .collect();

        services.push(DiscoveredService {
            name: first_label(&fqdn).to_string(),
            fqdn,
            host,
            port,
            service_type,
            subtypes,
            addresses,
            txt: txt::decode(txt_raw.as_deref().unwrap_or(&[]), false),
            txt_raw: txt_raw.unwrap_or_default(),
            referer,
            ttl: pointer.ttl,
            last_seen: Instant::now(),
        });
    }
    services
}

#[cfg(test)]
mod tests {
    use super::*;
    use dnssd_core::{TxtValue, WILDCARD_NAME};
    use std::net::{Ipv4Addr, SocketAddr};

    fn referer() -> RemoteInfo {
        RemoteInfo {
            addr: SocketAddr::from((Ipv4Addr::new(192, 168, 1, 20), 5353)),
            size: 240,
        }
    }

    fn announcement(ttl: u32) -> Packet {
        Packet::response(
            vec![
                Record::ptr("_http._tcp.local", "Web._http._tcp.local", ttl),
                Record::ptr(WILDCARD_NAME, "_http._tcp.local", ttl),
            ],
            vec![
                Record::srv("Web._http._tcp.local", "box.local", 8080, ttl),
                Record::txt("Web._http._tcp.local", vec![b"path=/api".to_vec()], ttl),
                Record::address("box.local", Ipv4Addr::new(192, 168, 1, 20).into(), ttl),
            ],
        )
    }

    #[tokio::test]
    async fn builds_a_full_view_from_an_announcement() {
        let services = extract_services(&announcement(120), referer());
        assert_eq!(services.len(), 1);

        let service = &services[0];
        assert_eq!(service.name, "Web");
        assert_eq!(service.fqdn, "Web._http._tcp.local");
        assert_eq!(service.host, "box.local");
        assert_eq!(service.port, 8080);
        assert_eq!(service.service_type.name(), "http");
        assert_eq!(service.service_type.protocol(), "tcp");
        assert_eq!(service.ttl, 120);
        assert_eq!(
            service.addresses,
            vec![IpAddr::V4(Ipv4Addr::new(192, 168, 1, 20))]
        );
        assert_eq!(
            service.txt.get("path"),
            Some(&TxtValue::Text("/api".to_string()))
        );
        assert_eq!(service.txt_raw, vec![b"path=/api".to_vec()]);
    }

    #[tokio::test]
    async fn ptr_without_srv_is_skipped() {
        let packet = Packet::response(
            vec![Record::ptr("_http._tcp.local", "Lonely._http._tcp.local", 120)],
            vec![],
        );
        assert!(extract_services(&packet, referer()).is_empty());
    }

    #[tokio::test]
    async fn goodbye_records_are_ignored() {
        assert!(extract_services(&announcement(0), referer()).is_empty());
    }

    #[tokio::test]
    async fn subtype_pointers_are_collected() {
        let mut packet = announcement(120);
        packet.answers.push(Record::ptr(
            "_printer._sub._http._tcp.local",
            "Web._http._tcp.local",
            120,
        ));

        let services = extract_services(&packet, referer());
        assert!(services
            .iter()
            .all(|service| service.subtypes == vec!["printer".to_string()]));
    }

    #[tokio::test]
    async fn srv_name_match_is_case_insensitive() {
        let packet = Packet::response(
            vec![Record::ptr("_http._tcp.local", "WEB._HTTP._TCP.LOCAL", 120)],
            vec![Record::srv("Web._http._tcp.local", "box.local", 80, 120)],
        );
        let services = extract_services(&packet, referer());
        assert_eq!(services.len(), 1);
        assert_eq!(services[0].port, 80);
    }

    #[tokio::test]
    async fn ttl_expiry_uses_the_ptr_ttl() {
        let services = extract_services(&announcement(1), referer());
        let service = &services[0];
        assert!(!service.expired(service.last_seen));
        assert!(service.expired(service.last_seen + Duration::from_millis(1_001)));
    }

    #[tokio::test]
    async fn enumeration_pointer_alone_yields_nothing() {
        let packet = Packet::response(
            vec![Record::ptr(WILDCARD_NAME, "_http._tcp.local", 120)],
            vec![],
        );
        assert!(extract_services(&packet, referer()).is_empty());
    }

    #[tokio::test]
    async fn missing_txt_yields_empty_views() {
        let packet = Packet::response(
            vec![Record::ptr("_http._tcp.local", "Bare._http._tcp.local", 120)],
            vec![Record::srv("Bare._http._tcp.local", "box.local", 80, 120)],
        );
        let services = extract_services(&packet, referer());
        assert!(services[0].txt.is_empty());
        assert!(services[0].txt_raw.is_empty());
    }
}
