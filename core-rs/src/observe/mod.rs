/**
 * observe module
 * Snapshot of host ports held by running containers
 */

pub mod bindings;
pub mod docker;

pub use bindings::{ContainerPortBinding, PortObservationSet, WILDCARD_INTERFACE};
pub use docker::{ContainerRuntime, DockerCli, HostBinding, RunningContainer};
