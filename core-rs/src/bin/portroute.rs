//! portroute - reconcile compose host ports and regenerate proxy routes
//!
//! Command-line interface for the core library

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use portroute_core::{
    ChainedNamer, ComposeCli, DockerCli, NamingResolver, Orchestrator, PromptNamer, RunConfig,
    RunOptions, StaticNamer,
};

#[derive(Parser)]
#[command(name = "portroute")]
#[command(version)]
#[command(about = "Resolve compose port conflicts and regenerate reverse-proxy routes", long_about = None)]
struct Cli {
    /// Configuration file (defaults to ./portroute.yaml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fix port conflicts of a compose file, route it and (re)start it
    Start {
        /// Also move explicitly declared host ports that collide
        #[arg(long)]
        aggressive: bool,
        /// Work on a copy of the compose file instead of the original
        #[arg(long)]
        ephemeral: bool,
        /// Append a suffix to every virtual host (e.g. --suffix dev)
        #[arg(long)]
        suffix: Option<String>,
        /// Name a numeric port without prompting (service:port=name)
        #[arg(long = "name", value_name = "SERVICE:PORT=NAME")]
        names: Vec<String>,
        /// Do not restart the target and proxy stacks
        #[arg(long)]
        no_restart: bool,
        /// Target compose file
        target: PathBuf,
    },
    /// Stop a compose file and withdraw its routes
    Stop {
        /// Do not restart the proxy stack
        #[arg(long)]
        no_restart: bool,
        /// Target compose file
        target: PathBuf,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose {
        "portroute=debug,portroute_core=debug"
    } else {
        "portroute=info,portroute_core=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr)
                .compact(),
        )
        .init();
}

/// Absolute path of an existing target, or exit with "File not found"
fn resolve_target(target: &Path) -> PathBuf {
    match target.canonicalize() {
        Ok(path) if path.is_file() => path,
        _ => {
            eprintln!("{} File not found: {}", "✗".red(), target.display());
            std::process::exit(1);
        }
    }
}

fn build_namer(assignments: &[String]) -> Result<Box<dyn NamingResolver>> {
    let names = StaticNamer::from_assignments(assignments).context("invalid --name")?;

    if std::io::stdin().is_terminal() {
        Ok(Box::new(ChainedNamer::new(names, PromptNamer::stdio())))
    } else {
        Ok(Box::new(names))
    }
}

fn build_orchestrator(config: RunConfig, namer: Box<dyn NamingResolver>) -> Result<Orchestrator> {
    let runtime = DockerCli::new(config.docker_command.clone());
    let stacks = ComposeCli::new(&config.compose_command)?;
    Ok(Orchestrator::new(
        config,
        Box::new(runtime),
        Box::new(stacks),
        namer,
    ))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let cwd = std::env::current_dir()?;
    let config = RunConfig::discover(cli.config.as_deref(), &cwd)
        .context("failed to load configuration")?;

    match cli.command {
        Commands::Start {
            aggressive,
            ephemeral,
            suffix,
            names,
            no_restart,
            target,
        } => {
            let target = resolve_target(&target);
            println!("Starting portroute...");

            let namer = build_namer(&names)?;
            let mut orchestrator = build_orchestrator(config, namer)?;

            let options = RunOptions::new(&target)
                .aggressive(aggressive)
                .ephemeral(ephemeral)
                .suffix(suffix)
                .restart(!no_restart);

            let summary = orchestrator
                .run(&options)
                .with_context(|| format!("run failed for {}", target.display()))?;

            for advisory in summary.advisories.iter().filter(|a| a.is_collision()) {
                println!(
                    "{} {}:{} kept on port {} which is already in use",
                    "!".yellow().bold(),
                    advisory.service,
                    advisory.source_port,
                    advisory.port
                );
            }

            println!("\n{} portroute is up, available services:", "✓".green());
            for (route, server_name) in summary.routes.iter().zip(&summary.server_names) {
                println!(
                    "  https://{}/  -> {}:{} (host port {})",
                    server_name, route.service, route.internal_port, route.host_port
                );
            }
        }

        Commands::Stop { no_restart, target } => {
            let target = resolve_target(&target);
            println!("Stopping portroute...");

            let mut orchestrator = build_orchestrator(config, Box::new(StaticNamer::new()))?;
            let removed = orchestrator
                .stop(&target, !no_restart)
                .with_context(|| format!("stop failed for {}", target.display()))?;

            println!("\n{} Stopped {} ({} routes removed)", "✓".green(), target.display(), removed);
        }
    }

    Ok(())
}
