/**
 * config.rs
 * Parser for portroute.yaml (YAML format)
 *
 * Format (every key optional):
 * ```yaml
 * proxyCompose: ./docker-compose.yml
 * generatedDir: ./nginx/generated
 * ledgerPath: ./nginx/.portroute-routes.json
 * upstreamHost: host.docker.internal
 * composeCommand: [docker, compose]
 * dockerCommand: docker
 * tls:
 *   certificate: /etc/nginx/certi.crt
 *   certificateKey: /etc/nginx/certi.key
 * ```
 */

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::{PortrouteError, Result};

/// Default config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "portroute.yaml";

/// Fixed TLS parameters written into every generated unit
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct TlsSettings {
    pub certificate: String,
    pub certificate_key: String,
    pub ecdh_curve: String,
    pub protocols: String,
    pub ciphers: String,
    pub prefer_server_ciphers: bool,
    pub session_cache: String,
}

impl Default for TlsSettings {
    fn default() -> Self {
        TlsSettings {
            certificate: "/etc/nginx/certi.crt".to_string(),
            certificate_key: "/etc/nginx/certi.key".to_string(),
            ecdh_curve: "secp384r1".to_string(),
            protocols: "TLSv1.3".to_string(),
            ciphers: "ECDHE-RSA-AES256-GCM-SHA512:DHE-RSA-AES256-GCM-SHA512:ECDHE-RSA-AES256-GCM-SHA384:DHE-RSA-AES256-GCM-SHA384:ECDHE-RSA-AES256-SHA384".to_string(),
            prefer_server_ciphers: true,
            session_cache: "shared:SSL:10m".to_string(),
        }
    }
}

/// Run configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct RunConfig {
    /// Compose file of the reverse-proxy stack itself
    pub proxy_compose: PathBuf,
    /// Directory holding generated proxy units
    pub generated_dir: PathBuf,
    /// Record of routes generated per compose target
    pub ledger_path: PathBuf,
    /// Host the proxy forwards to
    pub upstream_host: String,
    /// Program and leading args used to drive compose stacks
    pub compose_command: Vec<String>,
    /// Docker CLI used to observe running containers
    pub docker_command: String,
    pub tls: TlsSettings,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            proxy_compose: PathBuf::from("./docker-compose.yml"),
            generated_dir: PathBuf::from("./nginx/generated"),
            ledger_path: PathBuf::from("./nginx/.portroute-routes.json"),
            upstream_host: "host.docker.internal".to_string(),
            compose_command: vec!["docker-compose".to_string()],
            docker_command: "docker".to_string(),
            tls: TlsSettings::default(),
        }
    }
}

impl RunConfig {
    /// Load portroute.yaml from specified path
    ///
    /// # Example
    /// ```no_run
    /// use portroute_core::RunConfig;
    ///
    /// let config = RunConfig::load("portroute.yaml").unwrap();
    /// assert!(!config.upstream_host.is_empty());
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(PortrouteError::FileNotFound(
                path.to_string_lossy().to_string(),
            ));
        }

        let content = fs::read_to_string(path)?;

        let config: RunConfig = if content.trim().is_empty() {
            RunConfig::default()
        } else {
            serde_yaml::from_str(&content).map_err(|e| {
                PortrouteError::Config(format!("Invalid {}: {}", path.display(), e))
            })?
        };

        config.validate()?;

        Ok(config)
    }

    /// Load `path` if given, else `portroute.yaml` in `dir` if present, else defaults
    pub fn discover<P: AsRef<Path>>(path: Option<&Path>, dir: P) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }

        let candidate = dir.as_ref().join(DEFAULT_CONFIG_FILE);
        if candidate.exists() {
            Self::load(candidate)
        } else {
            Ok(RunConfig::default())
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.compose_command.is_empty() || self.compose_command[0].trim().is_empty() {
            return Err(PortrouteError::Config(
                "composeCommand cannot be empty".to_string(),
            ));
        }

        if self.docker_command.trim().is_empty() {
            return Err(PortrouteError::Config(
                "dockerCommand cannot be empty".to_string(),
            ));
        }

        if self.upstream_host.trim().is_empty() {
            return Err(PortrouteError::Config(
                "upstreamHost cannot be empty".to_string(),
            ));
        }

        if self.generated_dir.as_os_str().is_empty() {
            return Err(PortrouteError::Config(
                "generatedDir cannot be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Save configuration to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        fs::write(path.as_ref(), yaml)?;
        Ok(())
    }
}
