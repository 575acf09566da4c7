//! # portroute core
//!
//! Reconciles the host ports declared in a compose file against the ports
//! already bound by running containers, moves colliding declarations to free
//! ports, and regenerates the reverse-proxy routes for the result.
//!
//! ## Run
//!
//! ```text
//! ┌──────────┐   ┌───────────┐   ┌───────┐   ┌─────────┐
//! │ Observe  │──▶│ LoadModel │──▶│ Remap │──▶│ Persist │
//! └──────────┘   └───────────┘   └───────┘   └────┬────┘
//!                                                 ▼
//!                  ┌─────────┐   ┌──────────────┐   ┌──────┐
//!                  │ Restart │◀──│ RenderRoutes │◀──│ Name │
//!                  └─────────┘   └──────────────┘   └──────┘
//! ```
//!
//! Observe, LoadModel and Remap never touch the host. The remap pass is a
//! pure function of the observed bindings and the compose model, so its
//! guarantees (no two entries share a host port, internal ports never change)
//! can be tested without docker.

pub mod compose;
pub mod config;
pub mod errors;
pub mod naming;
pub mod observe;
pub mod orchestrator;
pub mod port;
pub mod process;
pub mod proxy;

pub use compose::{ComposeModel, ComposeService, PersistMode, RouteLabel, ServicePortEntry};
pub use config::{RunConfig, TlsSettings};
pub use errors::PortrouteError;
pub use naming::{ChainedNamer, NamingResolver, PromptNamer, StaticNamer};
pub use observe::{
    ContainerPortBinding, ContainerRuntime, DockerCli, HostBinding, PortObservationSet,
    RunningContainer,
};
pub use orchestrator::{Orchestrator, RunOptions, RunSummary, Stage};
pub use port::{
    probe_free_port, Advisory, HostPort, Occupant, OccupiedPortTable, PortRemapper, RemapAction,
    RemapOutcome, RemapPolicy, RemapRecord,
};
pub use process::{ComposeCli, StackControl};
pub use proxy::{ProxyConfigWriter, ProxyRoute, ProxyRouteSet, RouteLedger};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
