/**
 * proxy module
 * Reverse-proxy routes derived from the remapped compose model
 */

pub mod ledger;
pub mod route;
pub mod writer;

pub use ledger::{RecordedRoute, RouteLedger, TargetRoutes};
pub use route::{validate_route_name, ProxyRoute, ProxyRouteSet};
pub use writer::{ProxyConfigWriter, GENERATED_MARKER};
