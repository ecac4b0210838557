//! CLI command definitions and dispatch.

pub mod exec;
pub mod images;
pub mod logs;
pub mod port;
pub mod ps;
pub mod rm;
pub mod run;
pub mod stats;
pub mod stop;
pub mod volume;

use clap::{Parser, Subcommand};
use vessel_common::config::VesselConfig;
use vessel_runtime::engine::Engine;

/// Vessel — daemon-less container runtime for Linux.
#[derive(Parser, Debug)]
#[command(name = "vessel", version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Override the data directory.
    #[arg(long, global = true, env = "VESSEL_DATA_DIR")]
    pub data_dir: Option<String>,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create and start a container from an image.
    Run(run::RunArgs),
    /// List containers.
    Ps(ps::PsArgs),
    /// Stop a running container with SIGTERM.
    Stop(stop::StopArgs),
    /// Remove a container and its resources.
    Rm(rm::RmArgs),
    /// Execute a command inside a running container.
    Exec(exec::ExecArgs),
    /// View captured container output.
    Logs(logs::LogsArgs),
    /// Show memory usage of a running container.
    Stats(stats::StatsArgs),
    /// Show a container's port mappings.
    Port(port::PortArgs),
    /// Manage the local image catalog.
    Images(images::ImagesArgs),
    /// Manage named volumes.
    Volume(volume::VolumeArgs),
}

/// Dispatches the parsed CLI command to its handler.
///
/// # Errors
///
/// Returns an error if the command execution fails.
pub fn execute(cli: Cli) -> anyhow::Result<()> {
    let engine = match &cli.data_dir {
        Some(dir) => Engine::open(dir)?,
        None => Engine::open_default()?,
    };
    let config = VesselConfig::load(&engine.data_dir().join("config.json"))?;

    match cli.command {
        Command::Run(args) => run::execute(&engine, &config, args),
        Command::Ps(args) => ps::execute(&engine, &args),
        Command::Stop(args) => stop::execute(&engine, &args),
        Command::Rm(args) => rm::execute(&engine, &args),
        Command::Exec(args) => exec::execute(&engine, &args),
        Command::Logs(args) => logs::execute(&engine, &args),
        Command::Stats(args) => stats::execute(&engine, &args),
        Command::Port(args) => port::execute(&engine, &args),
        Command::Images(args) => images::execute(&engine, &args),
        Command::Volume(args) => volume::execute(&engine, &args),
    }
}
