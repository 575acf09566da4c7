//! Naming of pending routes
//!
//! Entries declared with a bare host port have no public name. Before routes
//! are rendered each of them is handed to a `NamingResolver`.

use std::collections::HashMap;
use std::io::{self, BufRead, Stdin, Stdout, Write};

use crate::errors::{PortrouteError, Result};
use crate::port::HostPort;
use crate::proxy::validate_route_name;

/// Supplies a public name for a service port
pub trait NamingResolver {
    fn resolve(
        &mut self,
        service: &str,
        internal_port: &str,
        host_port: Option<HostPort>,
    ) -> Result<String>;
}

/// Asks for names on a terminal
///
/// Invalid answers are reported and asked again. End of input is an error.
pub struct PromptNamer<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> PromptNamer<R, W> {
    pub fn new(input: R, output: W) -> Self {
        PromptNamer { input, output }
    }
}

impl PromptNamer<io::StdinLock<'static>, Stdout> {
    /// Prompt on stdout, read answers from stdin
    pub fn stdio() -> Self {
        let stdin: Stdin = io::stdin();
        PromptNamer::new(stdin.lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> NamingResolver for PromptNamer<R, W> {
    fn resolve(
        &mut self,
        service: &str,
        internal_port: &str,
        host_port: Option<HostPort>,
    ) -> Result<String> {
        let host = host_port
            .map(|p| p.to_string())
            .unwrap_or_else(|| "unassigned".to_string());

        loop {
            write!(
                self.output,
                "Enter a name for {}:{} ({}): ",
                service, internal_port, host
            )?;
            self.output.flush()?;

            let mut line = String::new();
            if self.input.read_line(&mut line)? == 0 {
                return Err(PortrouteError::Naming(format!(
                    "input closed before {}:{} was named",
                    service, internal_port
                )));
            }

            let name = line.trim();
            match validate_route_name(name) {
                Ok(()) => return Ok(name.to_string()),
                Err(e) => writeln!(self.output, "{}", e)?,
            }
        }
    }
}

/// Names given up front, keyed by `service:internal_port`
#[derive(Debug, Clone, Default)]
pub struct StaticNamer {
    names: HashMap<(String, String), String>,
}

impl StaticNamer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, service: &str, internal_port: &str, name: &str) -> Self {
        self.insert(service, internal_port, name);
        self
    }

    pub fn insert(&mut self, service: &str, internal_port: &str, name: &str) {
        self.names.insert(
            (service.to_string(), internal_port.to_string()),
            name.to_string(),
        );
    }

    /// Parse `service:internal_port=name`
    pub fn parse_assignment(assignment: &str) -> Result<(String, String, String)> {
        let invalid = || {
            PortrouteError::Naming(format!(
                "'{}' is not of the form service:port=name",
                assignment
            ))
        };

        let (target, name) = assignment.split_once('=').ok_or_else(invalid)?;
        let (service, port) = target.split_once(':').ok_or_else(invalid)?;
        let name = name.trim();

        if service.is_empty() || port.is_empty() || name.is_empty() {
            return Err(invalid());
        }
        validate_route_name(name)?;

        Ok((service.to_string(), port.to_string(), name.to_string()))
    }

    /// Build from a list of `service:internal_port=name` assignments
    pub fn from_assignments<I, S>(assignments: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut namer = Self::new();
        for assignment in assignments {
            let (service, port, name) = Self::parse_assignment(assignment.as_ref())?;
            namer.insert(&service, &port, &name);
        }
        Ok(namer)
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl NamingResolver for StaticNamer {
    fn resolve(
        &mut self,
        service: &str,
        internal_port: &str,
        _host_port: Option<HostPort>,
    ) -> Result<String> {
        self.names
            .get(&(service.to_string(), internal_port.to_string()))
            .cloned()
            .ok_or_else(|| {
                PortrouteError::Naming(format!(
                    "no name given for {}:{} (use --name {}:{}=<name>)",
                    service, internal_port, service, internal_port
                ))
            })
    }
}

/// Static names first, then the fallback
pub struct ChainedNamer<A, B> {
    first: A,
    fallback: B,
}

impl<A: NamingResolver, B: NamingResolver> ChainedNamer<A, B> {
    pub fn new(first: A, fallback: B) -> Self {
        ChainedNamer { first, fallback }
    }
}

impl<A: NamingResolver, B: NamingResolver> NamingResolver for ChainedNamer<A, B> {
    fn resolve(
        &mut self,
        service: &str,
        internal_port: &str,
        host_port: Option<HostPort>,
    ) -> Result<String> {
        match self.first.resolve(service, internal_port, host_port) {
            Ok(name) => Ok(name),
            Err(PortrouteError::Naming(_)) => {
                self.fallback.resolve(service, internal_port, host_port)
            }
            Err(e) => Err(e),
        }
    }
}
