//! Proxy routes
//!
//! Every port entry becomes exactly one route once it carries a name.
//! Route names double as virtual host names and unit file names, so they
//! must be host labels (`api`, `grafana.internal`) and never purely numeric.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;

use crate::compose::{ComposeModel, RouteLabel};
use crate::errors::{PortrouteError, Result};
use crate::port::HostPort;

static ROUTE_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)*$")
        .expect("route name pattern is valid")
});

/// Check that `name` can be used as a public route name
pub fn validate_route_name(name: &str) -> Result<()> {
    if name.len() > 253 || !ROUTE_NAME.is_match(name) {
        return Err(PortrouteError::InvalidRouteName(format!(
            "'{}' is not a valid host name",
            name
        )));
    }

    if name.bytes().all(|b| b.is_ascii_digit()) {
        return Err(PortrouteError::InvalidRouteName(format!(
            "'{}' is numeric and would be read as a port",
            name
        )));
    }

    Ok(())
}

/// Public name → service port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyRoute {
    pub public_name: String,
    pub service: String,
    /// Container-side port of the service
    pub internal_port: String,
    /// Host port the proxy forwards to
    pub host_port: HostPort,
}

/// Routes of one compose target, in declaration order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProxyRouteSet {
    routes: Vec<ProxyRoute>,
}

impl ProxyRouteSet {
    /// Build a route set, rejecting invalid and duplicate names
    pub fn new(routes: Vec<ProxyRoute>) -> Result<Self> {
        let mut seen = BTreeSet::new();

        for route in &routes {
            validate_route_name(&route.public_name)?;
            if !seen.insert(route.public_name.as_str()) {
                return Err(PortrouteError::DuplicateRoute(route.public_name.clone()));
            }
        }

        Ok(ProxyRouteSet { routes })
    }

    /// One route per port entry of a remapped, fully named model
    ///
    /// # Errors
    /// `UnresolvedRoute` if an entry is still pending a name or has no
    /// host port.
    pub fn from_model(model: &ComposeModel) -> Result<Self> {
        let routes = model
            .entries()
            .map(|(service, entry)| {
                let public_name = match entry.label() {
                    RouteLabel::Named(name) => name.clone(),
                    RouteLabel::Pending => {
                        return Err(PortrouteError::UnresolvedRoute(format!(
                            "{}:{} has no name yet",
                            service.name,
                            entry.source_port()
                        )))
                    }
                };

                let host_port = entry.destination_port().ok_or_else(|| {
                    PortrouteError::UnresolvedRoute(format!(
                        "{}:{} has no host port assigned",
                        service.name,
                        entry.source_port()
                    ))
                })?;

                Ok(ProxyRoute {
                    public_name,
                    service: service.name.clone(),
                    internal_port: entry.source_port().to_string(),
                    host_port,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Self::new(routes)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProxyRoute> {
        self.routes.iter()
    }

    pub fn get(&self, public_name: &str) -> Option<&ProxyRoute> {
        self.routes.iter().find(|r| r.public_name == public_name)
    }

    pub fn names(&self) -> BTreeSet<&str> {
        self.routes.iter().map(|r| r.public_name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl<'a> IntoIterator for &'a ProxyRouteSet {
    type Item = &'a ProxyRoute;
    type IntoIter = std::slice::Iter<'a, ProxyRoute>;

    fn into_iter(self) -> Self::IntoIter {
        self.routes.iter()
    }
}
