/**
 * writer.rs
 * Renders proxy routes into nginx server blocks, one unit file per route
 *
 * Layout:
 * - {output_dir}/{public_name}.conf
 *
 * Every unit starts with GENERATED_MARKER. Units without it were not written
 * here and are never overwritten or removed.
 */

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::route::{validate_route_name, ProxyRoute, ProxyRouteSet};
use crate::config::{RunConfig, TlsSettings};
use crate::errors::{PortrouteError, Result};

/// First line of every generated unit
pub const GENERATED_MARKER: &str = "# generated by portroute, do not edit";

const TEMPLATE: &str = r#"%marker%
# route %name% -> %service%:%internal%
server {
    listen 443 ssl;

    ssl_certificate %cert%;
    ssl_certificate_key %cert_key%;
    ssl_ecdh_curve %curve%;
    ssl_protocols %protocols%;
    ssl_ciphers %ciphers%;
    ssl_prefer_server_ciphers %prefer%;
    ssl_session_cache %session_cache%;

    server_name %server_name%;

    location / {
        proxy_pass http://%upstream%:%port%;
    }
}
"#;

/// Proxy unit writer
#[derive(Debug, Clone)]
pub struct ProxyConfigWriter {
    output_dir: PathBuf,
    upstream_host: String,
    tls: TlsSettings,
    suffix: Option<String>,
}

impl ProxyConfigWriter {
    pub fn new<P: AsRef<Path>>(
        output_dir: P,
        upstream_host: impl Into<String>,
        tls: TlsSettings,
    ) -> Self {
        ProxyConfigWriter {
            output_dir: output_dir.as_ref().to_path_buf(),
            upstream_host: upstream_host.into(),
            tls,
            suffix: None,
        }
    }

    pub fn from_config(config: &RunConfig) -> Self {
        Self::new(
            &config.generated_dir,
            config.upstream_host.clone(),
            config.tls.clone(),
        )
    }

    /// Append `.{suffix}` to every virtual host name
    pub fn with_suffix(mut self, suffix: Option<String>) -> Self {
        self.suffix = suffix.filter(|s| !s.is_empty());
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Unit file path for a route name
    pub fn unit_path(&self, public_name: &str) -> PathBuf {
        self.output_dir.join(format!("{}.conf", public_name))
    }

    /// Virtual host the route answers on
    pub fn server_name(&self, route: &ProxyRoute) -> String {
        match &self.suffix {
            Some(suffix) => format!("{}.{}", route.public_name, suffix),
            None => route.public_name.clone(),
        }
    }

    /// Render the unit text for a route
    ///
    /// Output depends only on the route and the writer settings.
    pub fn render(&self, route: &ProxyRoute) -> String {
        let prefer = if self.tls.prefer_server_ciphers { "on" } else { "off" };

        TEMPLATE
            .replace("%marker%", GENERATED_MARKER)
            .replace("%name%", &route.public_name)
            .replace("%service%", &route.service)
            .replace("%internal%", &route.internal_port)
            .replace("%cert%", &self.tls.certificate)
            .replace("%cert_key%", &self.tls.certificate_key)
            .replace("%curve%", &self.tls.ecdh_curve)
            .replace("%protocols%", &self.tls.protocols)
            .replace("%ciphers%", &self.tls.ciphers)
            .replace("%prefer%", prefer)
            .replace("%session_cache%", &self.tls.session_cache)
            .replace("%server_name%", &self.server_name(route))
            .replace("%upstream%", &self.upstream_host)
            .replace("%port%", &route.host_port.to_string())
    }

    /// Write the unit for `route`, replacing an earlier generated unit of the same name
    ///
    /// A hand-written unit occupying the same file name is left untouched and
    /// reported as an invalid route name.
    pub fn write(&self, route: &ProxyRoute) -> Result<PathBuf> {
        validate_route_name(&route.public_name)?;

        let path = self.unit_path(&route.public_name);
        if path.exists() && !is_generated(&path)? {
            return Err(PortrouteError::InvalidRouteName(format!(
                "'{}' is already used by a hand-written unit at {}",
                route.public_name,
                path.display()
            )));
        }

        fs::create_dir_all(&self.output_dir)?;
        fs::write(&path, self.render(route))?;

        debug!(route = %route.public_name, path = %path.display(), "wrote proxy unit");
        Ok(path)
    }

    /// Write every route of a set
    pub fn write_all(&self, routes: &ProxyRouteSet) -> Result<Vec<PathBuf>> {
        routes.iter().map(|route| self.write(route)).collect()
    }

    /// Remove a generated unit
    ///
    /// Returns true if a unit was removed. A missing unit is not an error.
    pub fn clean(&self, public_name: &str) -> Result<bool> {
        if validate_route_name(public_name).is_err() {
            warn!(route = public_name, "refusing to clean unit with invalid name");
            return Ok(false);
        }

        let path = self.unit_path(public_name);
        if !path.exists() {
            return Ok(false);
        }

        if !is_generated(&path)? {
            warn!(path = %path.display(), "leaving hand-written unit in place");
            return Ok(false);
        }

        fs::remove_file(&path)?;
        debug!(route = public_name, "removed proxy unit");
        Ok(true)
    }

    /// Remove several generated units, returning how many were removed
    pub fn clean_all<I, S>(&self, names: I) -> Result<usize>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut removed = 0;
        for name in names {
            if self.clean(name.as_ref())? {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

fn is_generated(path: &Path) -> Result<bool> {
    let content = fs::read_to_string(path)?;
    Ok(content.starts_with(GENERATED_MARKER))
}
