/**
 * entry.rs
 * One `label_or_port:internal_port` declaration from a service's ports list
 *
 * Examples:
 * - "8080:80"    → label Pending, declared host port 8080, source "80"
 * - "myapi:3000" → label Named("myapi"), no declared host port, source "3000"
 * - "70000:80"   → label Pending, no usable declared port, source "80"
 */

use std::fmt;

use crate::errors::{PortrouteError, Result};
use crate::port::HostPort;

/// Public route name of a port entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteLabel {
    /// Human-readable route name
    Named(String),
    /// Numeric placeholder, waiting for a name before it can be routed
    Pending,
}

impl RouteLabel {
    /// Classify the left-hand token of a port declaration
    pub fn from_token(token: &str) -> Self {
        if token.bytes().all(|b| b.is_ascii_digit()) {
            RouteLabel::Pending
        } else {
            RouteLabel::Named(token.to_string())
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            RouteLabel::Named(name) => Some(name),
            RouteLabel::Pending => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, RouteLabel::Pending)
    }
}

impl fmt::Display for RouteLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteLabel::Named(name) => write!(f, "{}", name),
            RouteLabel::Pending => write!(f, "<pending>"),
        }
    }
}

/// Port declaration of a compose service
///
/// The internal (container) port is fixed at parse time and has no setter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServicePortEntry {
    raw: String,
    label: RouteLabel,
    source_port: String,
    declared_port: Option<HostPort>,
    destination_port: Option<HostPort>,
}

impl ServicePortEntry {
    /// Parse a `label_or_port:internal_port` declaration
    ///
    /// # Errors
    /// `MalformedDocument` unless the declaration splits into exactly two
    /// non-empty tokens.
    pub fn parse(raw: &str) -> Result<Self> {
        let malformed = || {
            PortrouteError::MalformedDocument(format!(
                "port entry '{}' is not of the form label:internal_port",
                raw
            ))
        };

        let (left, right) = raw.split_once(':').ok_or_else(malformed)?;
        if left.is_empty() || right.is_empty() || right.contains(':') {
            return Err(malformed());
        }

        let declared_port = HostPort::parse(left);

        Ok(ServicePortEntry {
            raw: raw.to_string(),
            label: RouteLabel::from_token(left),
            source_port: right.to_string(),
            declared_port,
            destination_port: declared_port,
        })
    }

    /// Declaration text as loaded from the document
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn label(&self) -> &RouteLabel {
        &self.label
    }

    /// Internal container port (right-hand token)
    pub fn source_port(&self) -> &str {
        &self.source_port
    }

    /// Host port the user pinned, if the left-hand token was a usable port
    pub fn declared_port(&self) -> Option<HostPort> {
        self.declared_port
    }

    /// Current host port assignment
    pub fn destination_port(&self) -> Option<HostPort> {
        self.destination_port
    }

    pub(crate) fn assign_destination(&mut self, port: HostPort) {
        self.destination_port = Some(port);
    }

    /// Give a pending entry its public name
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.label = RouteLabel::Named(name.into());
    }

    /// Declaration text to write back: `{destination}:{source}`
    pub fn rendered(&self) -> String {
        match self.destination_port {
            Some(port) => format!("{}:{}", port, self.source_port),
            None => self.raw.clone(),
        }
    }

    /// True once the rendered declaration differs from the loaded one
    pub fn is_changed(&self) -> bool {
        self.rendered() != self.raw
    }
}
