//! Match filters for browsing.

use crate::discovery::DiscoveredService;
use dnssd_core::LOCAL_TLD;
use regex::Regex;

/// Instance-name matcher: exact (case-insensitive) or pattern.
#[derive(Debug, Clone)]
pub enum NameMatch {
    Exact(String),
    Pattern(Regex),
}

impl From<&str> for NameMatch {
    fn from(value: &str) -> Self {
        NameMatch::Exact(value.to_string())
    }
}

impl From<String> for NameMatch {
    fn from(value: String) -> Self {
        NameMatch::Exact(value)
    }
}

impl From<Regex> for NameMatch {
    fn from(value: Regex) -> Self {
        NameMatch::Pattern(value)
    }
}

/// TXT value matcher: string equality or pattern.
#[derive(Debug, Clone)]
pub enum TxtMatch {
    Exact(String),
    Pattern(Regex),
}

impl From<&str> for TxtMatch {
    fn from(value: &str) -> Self {
        TxtMatch::Exact(value.to_string())
    }
}

impl From<String> for TxtMatch {
    fn from(value: String) -> Self {
        TxtMatch::Exact(value)
    }
}

impl From<Regex> for TxtMatch {
    fn from(value: Regex) -> Self {
        TxtMatch::Pattern(value)
    }
}

/// Selects which discovered services a browser reports.
#[derive(Debug, Clone)]
pub struct ServiceFilter {
    service_type: String,
    protocol: String,
    subtypes: Vec<String>,
    name: Option<NameMatch>,
    txt: Vec<(String, TxtMatch)>,
}

impl ServiceFilter {
    /// Filter on a service type name and protocol, e.g. `("http", "tcp")`.
    pub fn new(service_type: impl Into<String>, protocol: impl Into<String>) -> Self {
        ServiceFilter {
            service_type: service_type.into(),
            protocol: protocol.into(),
            subtypes: Vec::new(),
            name: None,
            txt: Vec::new(),
        }
    }

    /// Require a subtype; queries go out per subtype.
    pub fn subtype(mut self, subtype: impl Into<String>) -> Self {
        self.subtypes.push(subtype.into());
        self
    }

    /// Require an instance name, exact or by pattern.
    pub fn name(mut self, name: impl Into<NameMatch>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Require a TXT entry, by equality or pattern.
    pub fn txt(mut self, key: impl Into<String>, value: impl Into<TxtMatch>) -> Self {
        self.txt.push((key.into(), value.into()));
        self
    }

    /// Whether a discovered service passes this filter.
    pub fn matches(&self, service: &DiscoveredService) -> bool {
        if !service
            .service_type
            .protocol()
            .eq_ignore_ascii_case(&self.protocol)
        {
            return false;
        }
        if !service
            .service_type
            .name()
            .eq_ignore_ascii_case(&self.service_type)
        {
            return false;
        }
        for subtype in &self.subtypes {
            if !service
                .subtypes
                .iter()
                .any(|s| s.eq_ignore_ascii_case(subtype))
            {
                return false;
            }
        }
        if let Some(name) = &self.name {
            let passes = match name {
                NameMatch::Exact(wanted) => service.name.eq_ignore_ascii_case(wanted),
                NameMatch::Pattern(pattern) => pattern.is_match(&service.name),
            };
            if !passes {
                return false;
            }
        }
        for (key, matcher) in &self.txt {
            let Some(value) = service.txt.get(key).and_then(|v| v.as_text()) else {
                return false;
            };
            let passes = match matcher {
                TxtMatch::Exact(wanted) => value == wanted,
                TxtMatch::Pattern(pattern) => pattern.is_match(value),
            };
            if !passes {
                return false;
            }
        }
        true
    }

    /// The PTR question names this filter browses with.
    pub(crate) fn query_names(&self) -> Vec<String> {
        let base = format!("_{}._{}.{LOCAL_TLD}", self.service_type, self.protocol);
        let mut names = if self.subtypes.is_empty() {
            vec![base.clone()]
        } else {
            self.subtypes
                .iter()
                .map(|subtype| format!("_{subtype}._sub.{base}"))
                .collect()
        };
        if let Some(NameMatch::Exact(name)) = &self.name {
            names = names
                .into_iter()
                .map(|query_name| format!("{name}.{query_name}"))
                .collect();
        }
        names
    }
}
