//! Run orchestration
//!
//! A run is a straight line of stages:
//!
//! ```text
//! Observe → LoadModel → Remap → Persist → Name → RenderRoutes → Restart
//! ```
//!
//! Everything up to Remap happens in memory. The first write is Persist, so
//! any failure before it leaves the host untouched. A failure after it is not
//! rolled back: the compose file keeps its new ports while proxy units or
//! running stacks may still reflect the previous run.

use colored::Colorize;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::compose::{ComposeModel, PersistMode};
use crate::config::RunConfig;
use crate::errors::{PortrouteError, Result};
use crate::naming::NamingResolver;
use crate::observe::{ContainerRuntime, PortObservationSet};
use crate::port::{Advisory, OccupiedPortTable, PortRemapper, RemapPolicy, RemapRecord};
use crate::process::StackControl;
use crate::proxy::{validate_route_name, ProxyConfigWriter, ProxyRouteSet, RouteLedger};

/// Step of a run, announced before it starts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Observe,
    LoadModel,
    Remap,
    Persist,
    Name,
    RenderRoutes,
    Restart,
    StopStack,
    CleanRoutes,
    RestartProxy,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Stage::Observe => "Loading container bindings...",
            Stage::LoadModel => "Loading compose file...",
            Stage::Remap => "Checking for remap candidates...",
            Stage::Persist => "Writing compose file...",
            Stage::Name => "Naming routes...",
            Stage::RenderRoutes => "Generating proxy config...",
            Stage::Restart => "Restarting patched stack and proxy...",
            Stage::StopStack => "Stopping stack...",
            Stage::CleanRoutes => "Removing proxy routes...",
            Stage::RestartProxy => "Restarting proxy...",
        };
        write!(f, "{}", text)
    }
}

/// Options of a single run
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub compose_path: PathBuf,
    pub policy: RemapPolicy,
    pub persist_mode: PersistMode,
    /// Appended to every virtual host name
    pub suffix: Option<String>,
    /// Restart the target and proxy stacks at the end
    pub restart: bool,
}

impl RunOptions {
    pub fn new<P: AsRef<Path>>(compose_path: P) -> Self {
        RunOptions {
            compose_path: compose_path.as_ref().to_path_buf(),
            policy: RemapPolicy::Conservative,
            persist_mode: PersistMode::InPlace,
            suffix: None,
            restart: true,
        }
    }

    pub fn aggressive(mut self, aggressive: bool) -> Self {
        self.policy = if aggressive {
            RemapPolicy::Aggressive
        } else {
            RemapPolicy::Conservative
        };
        self
    }

    pub fn ephemeral(mut self, ephemeral: bool) -> Self {
        self.persist_mode = if ephemeral {
            PersistMode::Ephemeral
        } else {
            PersistMode::InPlace
        };
        self
    }

    pub fn suffix(mut self, suffix: Option<String>) -> Self {
        self.suffix = suffix;
        self
    }

    pub fn restart(mut self, restart: bool) -> Self {
        self.restart = restart;
        self
    }
}

/// What a run did
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub records: Vec<RemapRecord>,
    pub advisories: Vec<Advisory>,
    pub routes: ProxyRouteSet,
    /// Virtual host of each route, in route order
    pub server_names: Vec<String>,
    pub touched_services: usize,
    pub named: usize,
    pub removed_units: usize,
}

/// Sequences a run against injected collaborators
pub struct Orchestrator {
    config: RunConfig,
    runtime: Box<dyn ContainerRuntime>,
    stacks: Box<dyn StackControl>,
    namer: Box<dyn NamingResolver>,
}

impl Orchestrator {
    pub fn new(
        config: RunConfig,
        runtime: Box<dyn ContainerRuntime>,
        stacks: Box<dyn StackControl>,
        namer: Box<dyn NamingResolver>,
    ) -> Self {
        Orchestrator {
            config,
            runtime,
            stacks,
            namer,
        }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    fn announce(&self, stage: Stage) {
        println!("{} {}", "==>".cyan().bold(), stage);
        debug!(?stage, "entering stage");
    }

    /// Reconcile one compose target and regenerate its routes
    pub fn run(&mut self, options: &RunOptions) -> Result<RunSummary> {
        let target = options.compose_path.as_path();
        info!(target = %target.display(), policy = ?options.policy, "starting run");

        self.announce(Stage::Observe);
        let containers = self.runtime.list_running_containers()?;
        let observations = PortObservationSet::from_containers(&containers);
        info!(
            containers = containers.len(),
            bindings = observations.len(),
            "observed wildcard bindings"
        );

        self.announce(Stage::LoadModel);
        let mut model = ComposeModel::load(target)?;
        let mut ledger = RouteLedger::load(&self.config.ledger_path)?;

        self.announce(Stage::Remap);
        let table = OccupiedPortTable::seeded(&observations);
        let outcome = PortRemapper::new(options.policy).remap(table, &mut model)?;

        for record in &outcome.records {
            println!("    {}", record);
        }
        for advisory in outcome.collisions() {
            if let Some(occupant) = &advisory.occupant {
                warn!(
                    service = %advisory.service,
                    port = %advisory.port,
                    "pinned port kept although {} holds it; the route will forward to it anyway",
                    occupant
                );
            }
        }

        check_named_routes(&model, &ledger, target)?;

        self.announce(Stage::Persist);
        let touched_services = model.persist(options.persist_mode)?;

        self.announce(Stage::Name);
        let named = self.name_pending(&mut model, &ledger, target)?;

        self.announce(Stage::RenderRoutes);
        let routes = ProxyRouteSet::from_model(&model)?;

        let writer =
            ProxyConfigWriter::from_config(&self.config).with_suffix(options.suffix.clone());
        let removed_units = writer.clean_all(ledger.exclusive_names_for(target))?;
        writer.write_all(&routes)?;
        ledger.record(target, &routes);
        ledger.save()?;

        let server_names = routes.iter().map(|r| writer.server_name(r)).collect();

        if options.restart {
            self.announce(Stage::Restart);
            self.stacks.restart_stack(target)?;
            self.stacks.restart_stack(&self.config.proxy_compose)?;
        }

        info!(
            routes = routes.len(),
            removed_units, touched_services, "run complete"
        );

        Ok(RunSummary {
            records: outcome.records,
            advisories: outcome.advisories,
            routes,
            server_names,
            touched_services,
            named,
            removed_units,
        })
    }

    /// Give every pending entry a name
    ///
    /// A name recorded for the same service port in an earlier run is reused
    /// before the resolver is asked.
    fn name_pending(
        &mut self,
        model: &mut ComposeModel,
        ledger: &RouteLedger,
        target: &Path,
    ) -> Result<usize> {
        let mut named = 0;

        for (service, entry) in model.pending_entries_mut() {
            let name = match ledger.previous_name(target, service, entry.source_port()) {
                Some(previous) => {
                    debug!(service, port = entry.source_port(), name = previous, "reusing route name");
                    previous.to_string()
                }
                None => self
                    .namer
                    .resolve(service, entry.source_port(), entry.destination_port())?,
            };

            let name = name.trim().to_string();
            validate_route_name(&name)?;
            if let Some(owner) = ledger.owner_of(&name, target) {
                return Err(PortrouteError::DuplicateRoute(format!(
                    "'{}' for {}:{} is already published by {}",
                    name,
                    service,
                    entry.source_port(),
                    owner
                )));
            }
            entry.set_name(name);
            named += 1;
        }

        Ok(named)
    }

    /// Stop a compose target and withdraw its routes
    ///
    /// Returns the number of proxy units removed.
    pub fn stop(&mut self, compose_path: &Path, restart_proxy: bool) -> Result<usize> {
        info!(target = %compose_path.display(), "stopping target");

        self.announce(Stage::StopStack);
        self.stacks.stop_stack(compose_path)?;

        self.announce(Stage::CleanRoutes);
        let mut ledger = RouteLedger::load(&self.config.ledger_path)?;
        let writer = ProxyConfigWriter::from_config(&self.config);
        let removed = writer.clean_all(ledger.exclusive_names_for(compose_path))?;
        ledger.forget(compose_path);
        ledger.save()?;

        if restart_proxy {
            self.announce(Stage::RestartProxy);
            self.stacks.restart_stack(&self.config.proxy_compose)?;
        }

        Ok(removed)
    }
}

/// Reject named labels that cannot be published for `target`
///
/// Must run before Persist: the labels are gone from the document after it.
fn check_named_routes(model: &ComposeModel, ledger: &RouteLedger, target: &Path) -> Result<()> {
    for (name, service) in model.validate_named_routes()? {
        if let Some(owner) = ledger.owner_of(name, target) {
            return Err(PortrouteError::DuplicateRoute(format!(
                "'{}' declared by {} is already published by {}",
                name, service, owner
            )));
        }
    }
    Ok(())
}
