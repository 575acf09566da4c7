//! Stack process control
//!
//! Compose stacks are stopped and started through the compose command line.
//! Calls are synchronous with no timeout; a failed command fails the run.

use std::path::Path;
use std::process::Command;
use tracing::debug;

use crate::errors::{PortrouteError, Result};

/// Stops and starts a compose stack
pub trait StackControl {
    fn stop_stack(&self, compose_file: &Path) -> Result<()>;
    fn start_stack(&self, compose_file: &Path) -> Result<()>;

    /// Stop then start
    fn restart_stack(&self, compose_file: &Path) -> Result<()> {
        self.stop_stack(compose_file)?;
        self.start_stack(compose_file)
    }
}

/// `docker-compose -f <file> down` / `up -d`
#[derive(Debug, Clone)]
pub struct ComposeCli {
    program: String,
    leading_args: Vec<String>,
}

impl ComposeCli {
    /// Build from a command line such as `["docker", "compose"]`
    ///
    /// # Errors
    /// `Config` if the command line is empty.
    pub fn new(command: &[String]) -> Result<Self> {
        let (program, leading_args) = command.split_first().ok_or_else(|| {
            PortrouteError::Config("compose command cannot be empty".to_string())
        })?;

        Ok(ComposeCli {
            program: program.clone(),
            leading_args: leading_args.to_vec(),
        })
    }

    fn args_for(&self, compose_file: &Path, action: &[&str]) -> Vec<String> {
        let mut args = self.leading_args.clone();
        args.push("-f".to_string());
        args.push(compose_file.to_string_lossy().to_string());
        args.extend(action.iter().map(|a| a.to_string()));
        args
    }

    fn run(&self, compose_file: &Path, action: &[&str]) -> Result<()> {
        let args = self.args_for(compose_file, action);
        debug!(program = %self.program, ?args, "running compose command");

        let status = Command::new(&self.program).args(&args).status().map_err(|e| {
            PortrouteError::Process(format!("Failed to run {}: {}", self.program, e))
        })?;

        if !status.success() {
            return Err(PortrouteError::Process(format!(
                "{} {} exited with {}",
                self.program,
                args.join(" "),
                status
            )));
        }

        Ok(())
    }
}

impl StackControl for ComposeCli {
    fn stop_stack(&self, compose_file: &Path) -> Result<()> {
        self.run(compose_file, &["down"])
    }

    fn start_stack(&self, compose_file: &Path) -> Result<()> {
        self.run(compose_file, &["up", "-d"])
    }
}
