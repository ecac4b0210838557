//! `vessel run` — Create and start a container from an image.

use clap::Args;
use vessel_common::config::VesselConfig;
use vessel_common::types::{MountSpec, NetworkMode, PortMapping, ResourceLimits};
use vessel_runtime::engine::{Engine, RunConfig, RunningContainer};

/// Arguments for the `run` command.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Image to run.
    pub image: String,

    /// Command to execute; defaults to the image's configured command.
    #[arg(trailing_var_arg = true)]
    pub command: Vec<String>,

    /// Run in detached mode, capturing output to the container log.
    #[arg(short, long)]
    pub detach: bool,

    /// Container name; defaults to the short container ID.
    #[arg(long)]
    pub name: Option<String>,

    /// Memory limit in megabytes.
    #[arg(short, long)]
    pub memory: Option<u64>,

    /// CPU limit as a fraction of one core (0.5 = half a core).
    #[arg(long)]
    pub cpu: Option<f64>,

    /// Network mode: `bridge` or `none`; defaults to the configured
    /// default network.
    #[arg(long)]
    pub net: Option<NetworkMode>,

    /// Mount a host path or named volume (SOURCE:DEST[:ro]).
    #[arg(short = 'v', long = "volume")]
    pub volumes: Vec<MountSpec>,

    /// Publish a container port (HOST:CONTAINER[/PROTOCOL]).
    #[arg(short = 'p', long = "publish")]
    pub ports: Vec<PortMapping>,
}

/// Executes the `run` command.
///
/// # Errors
///
/// Returns an error if the container cannot be created or started.
pub fn execute(engine: &Engine, defaults: &VesselConfig, args: RunArgs) -> anyhow::Result<()> {
    let config = RunConfig {
        image: args.image,
        command: args.command,
        name: args.name,
        detach: args.detach,
        limits: ResourceLimits {
            memory_mb: args.memory.or(defaults.default_limits.memory_mb),
            cpu_fraction: args.cpu.or(defaults.default_limits.cpu_fraction),
        },
        network: args.net.unwrap_or(defaults.default_network),
        mounts: args.volumes,
        ports: args.ports,
    };

    if config.detach {
        run_detached(engine, &config)
    } else {
        run_attached(engine, &config)
    }
}

/// Runs the container in the foreground: the CLI process owns the init
/// process, forwards Ctrl+C as a stop request, and exits with the
/// container's exit code.
fn run_attached(engine: &Engine, config: &RunConfig) -> anyhow::Result<()> {
    let RunningContainer { record, supervisor } = engine.run(config)?;

    let handler_engine = engine.clone();
    let handler_id = record.id.to_string();
    ctrlc::set_handler(move || {
        if let Err(e) = handler_engine.stop(&handler_id) {
            tracing::warn!(error = %e, "stop on Ctrl+C failed");
        }
    })
    .map_err(|e| anyhow::anyhow!("failed to set Ctrl+C handler: {e}"))?;

    let exit_code = supervisor
        .join()
        .map_err(|_| anyhow::anyhow!("container supervisor panicked"))?;
    std::process::exit(exit_code);
}

/// Runs the container in the background: the CLI forks into a daemon
/// that owns the init process and performs teardown when it exits.
#[cfg(target_os = "linux")]
fn run_detached(engine: &Engine, config: &RunConfig) -> anyhow::Result<()> {
    use std::io::Write;

    // Printed before the fork; the daemon has no terminal.
    let mut stdout = std::io::stdout();
    writeln!(
        stdout,
        "starting '{}' detached; inspect it with `vessel ps`",
        config.image
    )?;
    stdout.flush()?;

    // Returns only in the daemonized child. The child keeps running
    // until the container exits so its supervisor can release the
    // container's resources.
    nix::unistd::daemon(false, false)?;

    match engine.run(config) {
        Ok(RunningContainer { record, supervisor }) => {
            tracing::info!(id = %record.id, "detached container started");
            let exit_code = supervisor.join().unwrap_or(1);
            std::process::exit(exit_code);
        }
        Err(e) => {
            tracing::error!(error = %e, "detached start failed");
            std::process::exit(1);
        }
    }
}

#[cfg(not(target_os = "linux"))]
fn run_detached(_engine: &Engine, _config: &RunConfig) -> anyhow::Result<()> {
    Err(anyhow::anyhow!("detached mode requires Linux"))
}
