//! Container runtime observer
//!
//! The runtime is consulted once per run for the live port bindings of every
//! running container. `DockerCli` does this through the docker command line
//! (`docker ps` then `docker inspect`) so no daemon socket access is needed
//! beyond what the CLI already has.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::process::Command;
use tracing::debug;

use crate::errors::{PortrouteError, Result};

/// One host-side binding of a container port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostBinding {
    pub host_interface: String,
    pub host_port: String,
}

/// Running container with its published ports
///
/// `port_bindings` maps the container-side port spec ("80/tcp") to the
/// host bindings publishing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunningContainer {
    pub name: String,
    pub port_bindings: BTreeMap<String, Vec<HostBinding>>,
}

/// Source of running containers
pub trait ContainerRuntime {
    /// List every running container and its port bindings
    fn list_running_containers(&self) -> Result<Vec<RunningContainer>>;
}

/// Docker CLI backed runtime observer
#[derive(Debug, Clone)]
pub struct DockerCli {
    program: String,
}

impl DockerCli {
    pub fn new(program: impl Into<String>) -> Self {
        DockerCli {
            program: program.into(),
        }
    }

    fn run(&self, args: &[&str]) -> Result<String> {
        debug!(program = %self.program, ?args, "querying container runtime");

        let output = Command::new(&self.program).args(args).output().map_err(|e| {
            PortrouteError::Runtime(format!("Failed to run {}: {}", self.program, e))
        })?;

        if !output.status.success() {
            return Err(PortrouteError::Runtime(format!(
                "{} {} exited with {}: {}",
                self.program,
                args.join(" "),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Default for DockerCli {
    fn default() -> Self {
        DockerCli::new("docker")
    }
}

impl ContainerRuntime for DockerCli {
    fn list_running_containers(&self) -> Result<Vec<RunningContainer>> {
        let ids_output = self.run(&["ps", "-q", "--no-trunc"])?;
        let ids: Vec<&str> = ids_output
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect();

        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut args = vec!["inspect"];
        args.extend(ids.iter().copied());
        let inspect_output = self.run(&args)?;

        parse_inspect_output(&inspect_output)
    }
}

#[derive(Debug, Deserialize)]
struct InspectRecord {
    #[serde(rename = "Name", default)]
    name: String,
    #[serde(rename = "NetworkSettings", default)]
    network_settings: Option<InspectNetworkSettings>,
}

#[derive(Debug, Deserialize)]
struct InspectNetworkSettings {
    #[serde(rename = "Ports", default)]
    ports: Option<BTreeMap<String, Option<Vec<InspectBinding>>>>,
}

#[derive(Debug, Deserialize)]
struct InspectBinding {
    #[serde(rename = "HostIp", default)]
    host_ip: String,
    #[serde(rename = "HostPort", default)]
    host_port: String,
}

/// Parse the JSON array printed by `docker inspect`
///
/// Exposed container ports without a host binding (`"443/tcp": null`) are
/// dropped. The leading slash docker puts on container names is stripped.
pub fn parse_inspect_output(json: &str) -> Result<Vec<RunningContainer>> {
    let records: Vec<InspectRecord> = serde_json::from_str(json)?;

    let containers = records
        .into_iter()
        .map(|record| {
            let mut port_bindings = BTreeMap::new();

            let ports = record
                .network_settings
                .and_then(|settings| settings.ports)
                .unwrap_or_default();

            for (internal_port, bindings) in ports {
                let Some(bindings) = bindings else { continue };
                let bindings: Vec<HostBinding> = bindings
                    .into_iter()
                    .map(|b| HostBinding {
                        host_interface: b.host_ip,
                        host_port: b.host_port,
                    })
                    .collect();
                port_bindings.insert(internal_port, bindings);
            }

            RunningContainer {
                name: record.name.trim_start_matches('/').to_string(),
                port_bindings,
            }
        })
        .collect();

    Ok(containers)
}
