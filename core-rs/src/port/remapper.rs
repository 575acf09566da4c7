/**
 * remapper.rs
 * Deterministic host port reassignment
 *
 * Single pass over services, then over each service's ports, in declaration
 * order:
 * - Pinned port (numeric label), conservative policy: kept as declared, with
 *   an advisory. Aggressive policy: probe upward from the pinned port.
 * - No usable pinned port: probe upward from 1025.
 * - Every assigned port enters the table before the next entry is handled.
 *
 * Probing walks up one port at a time until a port is free in the table.
 * Passing 65535 is fatal for the whole run.
 */

use std::fmt;
use tracing::{debug, info, warn};

use super::{HostPort, Occupant, OccupiedPortTable};
use crate::compose::ComposeModel;
use crate::errors::{PortrouteError, Result};

/// First port handed out to entries without a pinned port
pub const EPHEMERAL_FLOOR: u16 = 1025;

/// Which entries may be moved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RemapPolicy {
    /// Only entries without a pinned host port are reassigned
    #[default]
    Conservative,
    /// Pinned host ports are reassigned too, starting from the pinned value
    Aggressive,
}

/// What happened to one entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemapAction {
    /// Pinned port left as declared
    Kept,
    /// Pinned port moved to the next free port
    Moved,
    /// No pinned port; assigned from the ephemeral floor
    Assigned,
}

impl fmt::Display for RemapAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RemapAction::Kept => "kept",
            RemapAction::Moved => "moved",
            RemapAction::Assigned => "assigned",
        };
        write!(f, "{}", s)
    }
}

/// Before/after host port of one entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemapRecord {
    pub service: String,
    pub source_port: String,
    pub before: Option<HostPort>,
    pub after: HostPort,
    pub action: RemapAction,
}

impl fmt::Display for RemapRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let before = self
            .before
            .map(|p| p.to_string())
            .unwrap_or_else(|| "-".to_string());
        write!(
            f,
            "{}:{} {} -> {} ({})",
            self.service, self.source_port, before, self.after, self.action
        )
    }
}

/// Pinned port left alone under the conservative policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advisory {
    pub service: String,
    pub source_port: String,
    pub port: HostPort,
    /// Holder of `port` at the time the entry was reached, if any
    pub occupant: Option<Occupant>,
}

impl Advisory {
    pub fn is_collision(&self) -> bool {
        self.occupant.is_some()
    }
}

/// Result of a remap pass
#[derive(Debug, Clone)]
pub struct RemapOutcome {
    pub table: OccupiedPortTable,
    pub records: Vec<RemapRecord>,
    pub advisories: Vec<Advisory>,
}

impl RemapOutcome {
    /// Advisories whose pinned port is held by someone else
    pub fn collisions(&self) -> impl Iterator<Item = &Advisory> {
        self.advisories.iter().filter(|a| a.is_collision())
    }
}

/// Lowest port at or above `start` that the table does not hold
///
/// # Errors
/// `PortExhaustion` once the candidate passes 65535.
pub fn probe_free_port(table: &OccupiedPortTable, start: u32) -> Result<HostPort> {
    let mut candidate = start.max(1);

    loop {
        let port = HostPort::from_u32(candidate)
            .ok_or_else(|| PortrouteError::PortExhaustion { start })?;
        if !table.contains(port) {
            return Ok(port);
        }
        candidate += 1;
    }
}

/// Port remapper
#[derive(Debug, Clone, Copy, Default)]
pub struct PortRemapper {
    policy: RemapPolicy,
}

impl PortRemapper {
    pub fn new(policy: RemapPolicy) -> Self {
        PortRemapper { policy }
    }

    pub fn policy(&self) -> RemapPolicy {
        self.policy
    }

    /// Assign a collision-free host port to every entry of `model`
    ///
    /// `table` should be seeded from the current observations. It is returned
    /// in the outcome holding every port the pass assigned.
    pub fn remap(
        &self,
        mut table: OccupiedPortTable,
        model: &mut ComposeModel,
    ) -> Result<RemapOutcome> {
        let mut records = Vec::new();
        let mut advisories = Vec::new();

        for service in model.services_mut() {
            for entry in service.ports.iter_mut() {
                let holder = Occupant::Entry {
                    service: service.name.clone(),
                    source_port: entry.source_port().to_string(),
                };
                let before = entry.declared_port();

                let (after, action) = match (before, self.policy) {
                    (Some(pinned), RemapPolicy::Conservative) => {
                        let occupant = table.occupant(pinned).cloned();
                        match &occupant {
                            Some(current) => warn!(
                                service = %service.name,
                                port = %pinned,
                                "pinned port is held by {}, the service may not work",
                                current
                            ),
                            None => info!(
                                service = %service.name,
                                port = %pinned,
                                "skipping pinned port, the service may not work if it is taken"
                            ),
                        }
                        advisories.push(Advisory {
                            service: service.name.clone(),
                            source_port: entry.source_port().to_string(),
                            port: pinned,
                            occupant,
                        });
                        (pinned, RemapAction::Kept)
                    }
                    (Some(pinned), RemapPolicy::Aggressive) => {
                        let port = probe_free_port(&table, u32::from(pinned.get()))?;
                        let action = if port == pinned {
                            RemapAction::Kept
                        } else {
                            RemapAction::Moved
                        };
                        (port, action)
                    }
                    (None, _) => (
                        probe_free_port(&table, u32::from(EPHEMERAL_FLOOR))?,
                        RemapAction::Assigned,
                    ),
                };

                entry.assign_destination(after);
                table.occupy(after, holder);

                debug!(
                    service = %service.name,
                    source = entry.source_port(),
                    destination = %after,
                    %action,
                    "remapped port"
                );

                records.push(RemapRecord {
                    service: service.name.clone(),
                    source_port: entry.source_port().to_string(),
                    before,
                    after,
                    action,
                });
            }
        }

        Ok(RemapOutcome {
            table,
            records,
            advisories,
        })
    }
}
