/**
 * table.rs
 * Host ports already taken during a remap pass
 *
 * Seeded from the live wildcard bindings, then extended with every port the
 * pass assigns, so each assignment sees all earlier ones. The table is owned
 * by the pass that uses it and handed back in the outcome.
 */

use std::collections::BTreeMap;
use std::fmt;

use super::HostPort;
use crate::observe::{ContainerPortBinding, PortObservationSet};

/// Holder of an occupied host port
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Occupant {
    /// Live binding of a running container
    Container(ContainerPortBinding),
    /// Port entry assigned earlier in the same run
    Entry { service: String, source_port: String },
}

impl fmt::Display for Occupant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Occupant::Container(b) => write!(f, "container {} ({})", b.container_name, b.internal_port),
            Occupant::Entry {
                service,
                source_port,
            } => write!(f, "service {}:{}", service, source_port),
        }
    }
}

/// Occupied host ports and who holds them
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OccupiedPortTable {
    ports: BTreeMap<HostPort, Occupant>,
}

impl OccupiedPortTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table holding every observed wildcard binding
    ///
    /// When several containers report the same host port the first one is kept.
    pub fn seeded(observations: &PortObservationSet) -> Self {
        let mut table = Self::new();
        for binding in observations.iter() {
            table.occupy(binding.host_port, Occupant::Container(binding.clone()));
        }
        table
    }

    pub fn contains(&self, port: HostPort) -> bool {
        self.ports.contains_key(&port)
    }

    pub fn occupant(&self, port: HostPort) -> Option<&Occupant> {
        self.ports.get(&port)
    }

    /// Mark `port` as taken by `occupant`
    ///
    /// An existing occupant is never replaced. Returns true if the port was free.
    pub fn occupy(&mut self, port: HostPort, occupant: Occupant) -> bool {
        if self.ports.contains_key(&port) {
            return false;
        }
        self.ports.insert(port, occupant);
        true
    }

    /// Occupied ports in ascending order
    pub fn iter(&self) -> impl Iterator<Item = (HostPort, &Occupant)> {
        self.ports.iter().map(|(port, occupant)| (*port, occupant))
    }

    pub fn len(&self) -> usize {
        self.ports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }
}
