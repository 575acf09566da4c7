/**
 * model.rs
 * Compose document loading and in-place port rewriting
 *
 * Format:
 * ```yaml
 * version: "3.8"
 * services:
 *   web:
 *     image: nginx
 *     ports:
 *       - "8080:80"
 *       - "myapi:3000"
 * ```
 *
 * Only the `ports` list of services whose declarations changed is rewritten.
 * The rest of the document tree is kept as loaded, including key order.
 * A rewrite re-emits the whole file: comments are lost and quoting and
 * indentation follow serde_yaml's output.
 */

use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::entry::{RouteLabel, ServicePortEntry};
use crate::errors::{PortrouteError, Result};
use crate::proxy::validate_route_name;

/// Compose schema versions this tool understands
pub const SUPPORTED_VERSIONS: &[&str] = &["3.8"];

/// Where `persist` writes the document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PersistMode {
    /// Overwrite the original compose file
    #[default]
    InPlace,
    /// Write a derived copy and leave the original alone (not supported)
    Ephemeral,
}

/// Service with its ordered port declarations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposeService {
    pub name: String,
    pub ports: Vec<ServicePortEntry>,
}

impl ComposeService {
    /// True when any port declaration will be written differently
    pub fn is_touched(&self) -> bool {
        self.ports.iter().any(ServicePortEntry::is_changed)
    }
}

/// Loaded compose document
#[derive(Debug, Clone)]
pub struct ComposeModel {
    document_path: PathBuf,
    document: Value,
    services: Vec<ComposeService>,
}

impl ComposeModel {
    /// Load a compose file
    ///
    /// # Errors
    /// - `FileNotFound` if `path` does not exist
    /// - `UnsupportedVersion` if `version` is missing or not supported
    /// - `MalformedDocument` if a service has no `ports` list or an entry
    ///   is not `label:internal_port`
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(PortrouteError::FileNotFound(
                path.to_string_lossy().to_string(),
            ));
        }

        let content = fs::read_to_string(path)?;
        Self::parse(path, &content)
    }

    /// Build a model from document text, remembering `path` for `persist`
    pub fn parse<P: AsRef<Path>>(path: P, content: &str) -> Result<Self> {
        let document: Value = serde_yaml::from_str(content)?;

        let root = document.as_mapping().ok_or_else(|| {
            PortrouteError::MalformedDocument("document root is not a mapping".to_string())
        })?;

        check_version(root.get("version"))?;

        let services_node = root
            .get("services")
            .and_then(Value::as_mapping)
            .ok_or_else(|| {
                PortrouteError::MalformedDocument("missing 'services' mapping".to_string())
            })?;

        let services = parse_services(services_node)?;

        debug!(
            path = %path.as_ref().display(),
            services = services.len(),
            "loaded compose document"
        );

        Ok(ComposeModel {
            document_path: path.as_ref().to_path_buf(),
            document,
            services,
        })
    }

    pub fn document_path(&self) -> &Path {
        &self.document_path
    }

    /// Services in declaration order
    pub fn services(&self) -> &[ComposeService] {
        &self.services
    }

    pub fn services_mut(&mut self) -> &mut [ComposeService] {
        &mut self.services
    }

    pub fn service(&self, name: &str) -> Option<&ComposeService> {
        self.services.iter().find(|s| s.name == name)
    }

    /// Every (service, entry) pair in declaration order
    pub fn entries(&self) -> impl Iterator<Item = (&ComposeService, &ServicePortEntry)> {
        self.services
            .iter()
            .flat_map(|s| s.ports.iter().map(move |p| (s, p)))
    }

    /// Entries still carrying a placeholder label, with their service name
    pub fn pending_entries_mut(&mut self) -> impl Iterator<Item = (&str, &mut ServicePortEntry)> {
        self.services.iter_mut().flat_map(|s| {
            let name = s.name.as_str();
            s.ports
                .iter_mut()
                .filter(|p| p.label().is_pending())
                .map(move |p| (name, p))
        })
    }

    /// Check the route names written in the document
    ///
    /// Returns each named label with the service declaring it. Pending
    /// entries are skipped; they are named after persist.
    ///
    /// # Errors
    /// `InvalidRouteName` for a label that is not a valid host name,
    /// `DuplicateRoute` when two entries carry the same label.
    pub fn validate_named_routes(&self) -> Result<BTreeMap<&str, &str>> {
        let mut named = BTreeMap::new();

        for (service, entry) in self.entries() {
            let RouteLabel::Named(name) = entry.label() else {
                continue;
            };
            validate_route_name(name)?;

            if let Some(first) = named.insert(name.as_str(), service.name.as_str()) {
                return Err(PortrouteError::DuplicateRoute(format!(
                    "'{}' is declared by both {} and {}",
                    name, first, service.name
                )));
            }
        }

        Ok(named)
    }

    /// Write changed `ports` lists back to the document
    ///
    /// Returns the number of services whose ports were rewritten. The file is
    /// left alone when nothing changed.
    ///
    /// # Errors
    /// `NotImplemented` for `PersistMode::Ephemeral`; nothing is written.
    pub fn persist(&mut self, mode: PersistMode) -> Result<usize> {
        if mode == PersistMode::Ephemeral {
            return Err(PortrouteError::NotImplemented(
                "ephemeral mode (writing to a copy of the compose file)".to_string(),
            ));
        }

        let mut touched = 0;

        for service in &self.services {
            if !service.is_touched() {
                continue;
            }

            let ports: Vec<Value> = service
                .ports
                .iter()
                .map(|p| Value::String(p.rendered()))
                .collect();

            let node = self
                .document
                .get_mut("services")
                .and_then(|s| s.get_mut(service.name.as_str()))
                .and_then(Value::as_mapping_mut)
                .ok_or_else(|| {
                    PortrouteError::MalformedDocument(format!(
                        "service '{}' disappeared from the document",
                        service.name
                    ))
                })?;

            node.insert(Value::String("ports".to_string()), Value::Sequence(ports));
            touched += 1;
        }

        if touched == 0 {
            debug!(path = %self.document_path.display(), "compose document unchanged");
            return Ok(0);
        }

        let yaml = serde_yaml::to_string(&self.document)?;
        fs::write(&self.document_path, yaml)?;

        debug!(
            path = %self.document_path.display(),
            touched,
            "persisted compose document"
        );

        Ok(touched)
    }
}

fn check_version(version: Option<&Value>) -> Result<()> {
    let declared = match version {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(other) => format!("{:?}", other),
        None => return Err(PortrouteError::UnsupportedVersion("<missing>".to_string())),
    };

    if SUPPORTED_VERSIONS.contains(&declared.as_str()) {
        Ok(())
    } else {
        Err(PortrouteError::UnsupportedVersion(declared))
    }
}

fn parse_services(node: &Mapping) -> Result<Vec<ComposeService>> {
    let mut services = Vec::with_capacity(node.len());

    for (key, value) in node {
        let name = key.as_str().ok_or_else(|| {
            PortrouteError::MalformedDocument(format!("service name {:?} is not a string", key))
        })?;

        let ports = value
            .get("ports")
            .and_then(Value::as_sequence)
            .ok_or_else(|| {
                PortrouteError::MalformedDocument(format!(
                    "service '{}' has no ports list",
                    name
                ))
            })?;

        let ports = ports
            .iter()
            .map(|item| {
                let raw = item.as_str().ok_or_else(|| {
                    PortrouteError::MalformedDocument(format!(
                        "service '{}' has a non-string port entry {:?}",
                        name, item
                    ))
                })?;
                ServicePortEntry::parse(raw)
            })
            .collect::<Result<Vec<_>>>()?;

        services.push(ComposeService {
            name: name.to_string(),
            ports,
        });
    }

    Ok(services)
}
