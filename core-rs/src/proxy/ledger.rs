/**
 * ledger.rs
 * Routes generated per compose target (JSON file)
 *
 * The compose document only keeps `{host}:{internal}` after a run, so route
 * names live here. The ledger gives each rerun:
 * - the unit names to clean before regenerating a target
 * - the name previously chosen for a (service, internal port) pair
 *
 * Format:
 * ```json
 * {
 *   "targets": {
 *     "/srv/app/docker-compose.yml": {
 *       "updatedAt": "2026-10-18T09:12:44Z",
 *       "routes": [
 *         {"publicName": "myapi", "service": "api", "internalPort": "3000", "hostPort": 1025}
 *       ]
 *     }
 *   }
 * }
 * ```
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use super::route::{ProxyRoute, ProxyRouteSet};
use crate::errors::{PortrouteError, Result};
use crate::port::HostPort;

/// Route as stored in the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordedRoute {
    pub public_name: String,
    pub service: String,
    pub internal_port: String,
    pub host_port: HostPort,
}

impl From<&ProxyRoute> for RecordedRoute {
    fn from(route: &ProxyRoute) -> Self {
        RecordedRoute {
            public_name: route.public_name.clone(),
            service: route.service.clone(),
            internal_port: route.internal_port.clone(),
            host_port: route.host_port,
        }
    }
}

/// Routes last generated for one compose target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetRoutes {
    pub updated_at: DateTime<Utc>,
    pub routes: Vec<RecordedRoute>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct LedgerFile {
    #[serde(default)]
    targets: BTreeMap<String, TargetRoutes>,
}

/// Route ledger
#[derive(Debug)]
pub struct RouteLedger {
    path: PathBuf,
    file: LedgerFile,
}

impl RouteLedger {
    /// Load the ledger at `path`
    ///
    /// Returns an empty ledger if the file doesn't exist.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let file = if path.exists() {
            let content = fs::read_to_string(&path)?;
            serde_json::from_str(&content).map_err(|e| {
                PortrouteError::Config(format!(
                    "Invalid route ledger {}: {}",
                    path.display(),
                    e
                ))
            })?
        } else {
            LedgerFile::default()
        };

        Ok(RouteLedger { path, file })
    }

    /// Save the ledger, creating its directory if needed
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_string_pretty(&self.file)?;
        fs::write(&self.path, json)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn key(target: &Path) -> String {
        target.to_string_lossy().to_string()
    }

    /// Routes recorded for a compose target
    pub fn routes_for(&self, target: &Path) -> &[RecordedRoute] {
        self.file
            .targets
            .get(&Self::key(target))
            .map(|t| t.routes.as_slice())
            .unwrap_or(&[])
    }

    /// Unit names recorded for a compose target
    pub fn names_for(&self, target: &Path) -> Vec<String> {
        self.routes_for(target)
            .iter()
            .map(|r| r.public_name.clone())
            .collect()
    }

    /// Unit names recorded for `target` and for no other target
    ///
    /// Only these units may be removed when `target` is regenerated or stopped.
    pub fn exclusive_names_for(&self, target: &Path) -> Vec<String> {
        self.routes_for(target)
            .iter()
            .filter(|r| self.owner_of(&r.public_name, target).is_none())
            .map(|r| r.public_name.clone())
            .collect()
    }

    /// Name previously used for a service port of `target`
    pub fn previous_name(&self, target: &Path, service: &str, internal_port: &str) -> Option<&str> {
        self.routes_for(target)
            .iter()
            .find(|r| r.service == service && r.internal_port == internal_port)
            .map(|r| r.public_name.as_str())
    }

    /// Another target already publishing `public_name`, if any
    pub fn owner_of(&self, public_name: &str, except: &Path) -> Option<&str> {
        let except = Self::key(except);
        self.file
            .targets
            .iter()
            .find(|(key, t)| {
                **key != except && t.routes.iter().any(|r| r.public_name == public_name)
            })
            .map(|(key, _)| key.as_str())
    }

    /// Replace the recorded routes of a target
    pub fn record(&mut self, target: &Path, routes: &ProxyRouteSet) {
        let entry = TargetRoutes {
            updated_at: Utc::now(),
            routes: routes.iter().map(RecordedRoute::from).collect(),
        };
        self.file.targets.insert(Self::key(target), entry);
    }

    /// Drop a target, returning what was recorded for it
    pub fn forget(&mut self, target: &Path) -> Option<TargetRoutes> {
        self.file.targets.remove(&Self::key(target))
    }

    /// Recorded targets in key order
    pub fn targets(&self) -> impl Iterator<Item = (&str, &TargetRoutes)> {
        self.file.targets.iter().map(|(k, v)| (k.as_str(), v))
    }
}
