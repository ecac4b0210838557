//! `vessel ps` — List containers.

use clap::Args;
use vessel_common::types::ContainerState;
use vessel_runtime::engine::Engine;

use crate::output::format_ports;

/// Arguments for the `ps` command.
#[derive(Args, Debug)]
pub struct PsArgs {
    /// Show all containers (default shows just running).
    #[arg(short, long)]
    pub all: bool,
}

/// Executes the `ps` command.
///
/// # Errors
///
/// Returns an error if the container records cannot be listed.
pub fn execute(engine: &Engine, args: &PsArgs) -> anyhow::Result<()> {
    let containers = engine.list()?;
    let filtered: Vec<_> = containers
        .into_iter()
        .filter(|c| args.all || c.state == ContainerState::Running)
        .collect();

    if filtered.is_empty() {
        println!("No containers found.");
        return Ok(());
    }

    println!(
        "{:<14} {:<16} {:<16} {:<9} {:<7} {:<16} {:<24}",
        "CONTAINER ID", "NAME", "IMAGE", "STATE", "PID", "IP", "PORTS"
    );
    for c in &filtered {
        println!(
            "{:<14} {:<16} {:<16} {:<9} {:<7} {:<16} {:<24}",
            c.id.short(),
            c.name,
            c.image,
            c.state,
            if c.pid == 0 {
                "-".to_string()
            } else {
                c.pid.to_string()
            },
            c.ip_address.as_deref().unwrap_or("-"),
            format_ports(&c.ports)
        );
    }

    Ok(())
}
