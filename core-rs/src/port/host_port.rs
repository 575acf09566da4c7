//! Host port value type
//!
//! A host port is a TCP listening port on the host, always within [1, 65535].
//! Port 0 is never a valid assignment.

use serde::{Deserialize, Serialize};
use std::fmt;

/// TCP listening port on the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct HostPort(u16);

impl HostPort {
    /// Highest assignable port
    pub const MAX: u32 = 65535;

    /// Create a host port, rejecting 0
    pub fn new(port: u16) -> Option<Self> {
        if port == 0 {
            None
        } else {
            Some(HostPort(port))
        }
    }

    /// Create a host port from a wider probe candidate
    ///
    /// Returns None for 0 and for anything above 65535.
    pub fn from_u32(port: u32) -> Option<Self> {
        u16::try_from(port).ok().and_then(Self::new)
    }

    /// Parse a purely numeric token (`"8080"`)
    ///
    /// Signs, whitespace and out-of-range values are rejected.
    pub fn parse(token: &str) -> Option<Self> {
        if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        token.parse::<u32>().ok().and_then(Self::from_u32)
    }

    pub fn get(self) -> u16 {
        self.0
    }
}

impl fmt::Display for HostPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u16> for HostPort {
    type Error = String;

    fn try_from(port: u16) -> Result<Self, Self::Error> {
        HostPort::new(port).ok_or_else(|| "host port must be within 1-65535".to_string())
    }
}

impl From<HostPort> for u16 {
    fn from(port: HostPort) -> Self {
        port.0
    }
}
