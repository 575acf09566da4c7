/**
 * bindings.rs
 * Wildcard-interface port bindings observed on the host
 *
 * Only bindings published on 0.0.0.0 are kept. Bindings on a specific
 * interface (127.0.0.1, ::, a LAN address) are invisible to the conflict
 * check and never collide with compose declarations.
 */

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::docker::RunningContainer;
use crate::port::HostPort;

/// Host interface that makes a binding relevant for conflict resolution
pub const WILDCARD_INTERFACE: &str = "0.0.0.0";

/// One host port held by a running container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerPortBinding {
    pub container_name: String,
    /// Container-side port spec, e.g. "80/tcp"
    pub internal_port: String,
    pub host_port: HostPort,
    pub host_interface: String,
}

/// Read-only snapshot of wildcard bindings, taken once per run
#[derive(Debug, Clone, Default)]
pub struct PortObservationSet {
    bindings: Vec<ContainerPortBinding>,
}

impl PortObservationSet {
    /// Build a snapshot, dropping every non-wildcard binding
    pub fn new(bindings: Vec<ContainerPortBinding>) -> Self {
        let bindings = bindings
            .into_iter()
            .filter(|b| b.host_interface == WILDCARD_INTERFACE)
            .collect();
        PortObservationSet { bindings }
    }

    /// Flatten the runtime's container listing into wildcard bindings
    ///
    /// Host ports that are not valid numbers in [1, 65535] are skipped.
    pub fn from_containers(containers: &[RunningContainer]) -> Self {
        let mut bindings = Vec::new();

        for container in containers {
            for (internal_port, host_bindings) in &container.port_bindings {
                for binding in host_bindings {
                    if binding.host_interface != WILDCARD_INTERFACE {
                        continue;
                    }
                    let Some(host_port) = HostPort::parse(&binding.host_port) else {
                        debug!(
                            container = %container.name,
                            host_port = %binding.host_port,
                            "skipping unparsable host port"
                        );
                        continue;
                    };
                    bindings.push(ContainerPortBinding {
                        container_name: container.name.clone(),
                        internal_port: internal_port.clone(),
                        host_port,
                        host_interface: binding.host_interface.clone(),
                    });
                }
            }
        }

        PortObservationSet { bindings }
    }

    pub fn bindings(&self) -> &[ContainerPortBinding] {
        &self.bindings
    }

    pub fn iter(&self) -> impl Iterator<Item = &ContainerPortBinding> {
        self.bindings.iter()
    }

    /// True when some container holds `port` on the wildcard interface
    pub fn contains(&self, port: HostPort) -> bool {
        self.bindings.iter().any(|b| b.host_port == port)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
