/**
 * compose module
 * In-memory compose document: services and their host port declarations
 */

pub mod entry;
pub mod model;

pub use entry::{RouteLabel, ServicePortEntry};
pub use model::{ComposeModel, ComposeService, PersistMode, SUPPORTED_VERSIONS};
