//! System host name and interface enumeration.

use dnssd_core::{HostInfo, InterfaceAddr};
use tracing::warn;

/// Host lookup backed by the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemHost;

impl HostInfo for SystemHost {
    /// The machine's host name as a `.local` DNS name, sanitized to DNS
    /// label characters.
    fn hostname(&self) -> String {
        let raw = hostname::get()
            .map(|h| h.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "localhost".to_string());

        let sanitized: String = raw
            .to_lowercase()
            .replace(' ', "-")
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '.')
            .collect();
        let sanitized = sanitized.trim_matches('.');

        if sanitized.is_empty() {
            "localhost.local".to_string()
        } else if sanitized.ends_with(".local") {
            sanitized.to_string()
        } else {
            // Keep only the first label of multi-label host names.
            let label = sanitized.split('.').next().unwrap_or(sanitized);
            format!("{label}.local")
        }
    }

    /// All local interface addresses. `if-addrs` does not expose hardware
    /// addresses, so `mac` stays unknown here.
    fn interfaces(&self) -> Vec<InterfaceAddr> {
        match if_addrs::get_if_addrs() {
            Ok(ifaces) => ifaces
                .into_iter()
                .map(|iface| InterfaceAddr {
                    address: iface.ip(),
                    mac: None,
                    internal: iface.is_loopback(),
                })
                .collect(),
            Err(e) => {
                warn!("could not enumerate network interfaces: {e}");
                Vec::new()
            }
        }
    }
}
