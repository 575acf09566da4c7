/**
 * port module
 * Collision-free host port assignment for compose port declarations
 */

pub mod host_port;
pub mod remapper;
pub mod table;

pub use host_port::HostPort;
pub use remapper::{
    probe_free_port, Advisory, PortRemapper, RemapAction, RemapOutcome, RemapPolicy, RemapRecord,
    EPHEMERAL_FLOOR,
};
pub use table::{Occupant, OccupiedPortTable};
