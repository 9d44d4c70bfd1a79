//! Service-type parsing: `_name._protocol`, optionally `_subtype._sub._name._protocol`.

use crate::error::ServiceTypeError;
use std::fmt;
use std::str::FromStr;

/// A DNS-SD service type: a name/protocol pair with an optional subtype.
///
/// The canonical string form is `_<name>._<protocol>`, or
/// `_<subtype>._sub._<name>._<protocol>` when a subtype is present.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceType {
    name: String,
    protocol: String,
    subtype: Option<String>,
}

impl ServiceType {
    /// Create a service type from a name and protocol.
    pub fn new(
        name: impl Into<String>,
        protocol: impl Into<String>,
    ) -> Result<Self, ServiceTypeError> {
        let name = name.into();
        let protocol = protocol.into();
        if name.is_empty() || protocol.is_empty() {
            return Err(ServiceTypeError::MissingLabels(format!(
                "_{name}._{protocol}"
            )));
        }
        Ok(ServiceType {
            name,
            protocol,
            subtype: None,
        })
    }

    /// Attach a subtype label.
    pub fn with_subtype(mut self, subtype: impl Into<String>) -> Self {
        self.subtype = Some(subtype.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    pub fn subtype(&self) -> Option<&str> {
        self.subtype.as_deref()
    }

    /// The type string without any subtype, e.g. `_http._tcp`.
    pub fn base(&self) -> String {
        format!("_{}._{}", self.name, self.protocol)
    }
}

impl FromStr for ServiceType {
    type Err = ServiceTypeError;

    /// Parse a service-type string.
    ///
    /// Labels are split on `.`, trimmed, and one leading underscore is
    /// stripped per label. A `sub` label marks the preceding label as the
    /// subtype; the name and protocol are then the two labels after it.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Err(ServiceTypeError::Empty);
        }

        let labels: Vec<&str> = s
            .split('.')
            .map(str::trim)
            .map(|label| label.strip_prefix('_').unwrap_or(label))
            .collect();

        let (subtype, name, protocol) = match labels.iter().position(|label| *label == "sub") {
            Some(0) => return Err(ServiceTypeError::LeadingSubtypeMarker(s.to_string())),
            Some(marker) => (
                Some(labels[marker - 1]),
                labels.get(marker + 1).copied(),
                labels.get(marker + 2).copied(),
            ),
            None => (None, labels.first().copied(), labels.get(1).copied()),
        };

        match (name, protocol) {
            (Some(name), Some(protocol)) if !name.is_empty() && !protocol.is_empty() => {
                Ok(ServiceType {
                    name: name.to_string(),
                    protocol: protocol.to_string(),
                    subtype: subtype.map(str::to_string),
                })
            }
            _ => Err(ServiceTypeError::MissingLabels(s.to_string())),
        }
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(subtype) = &self.subtype {
            write!(f, "_{subtype}._sub.")?;
        }
        write!(f, "_{}._{}", self.name, self.protocol)
    }
}
