//! `vessel port` — Show a container's port mappings.

use clap::Args;
use vessel_runtime::engine::Engine;

/// Arguments for the `port` command.
#[derive(Args, Debug)]
pub struct PortArgs {
    /// Container ID or name.
    pub container: String,
}

/// Executes the `port` command.
///
/// # Errors
///
/// Returns an error if the container cannot be resolved.
pub fn execute(engine: &Engine, args: &PortArgs) -> anyhow::Result<()> {
    let mappings = engine.port_mappings(&args.container)?;
    if mappings.is_empty() {
        println!("No published ports for container: {}", args.container);
        return Ok(());
    }
    for mapping in &mappings {
        println!(
            "{}/{} -> 0.0.0.0:{}",
            mapping.container_port, mapping.protocol, mapping.host_port
        );
    }
    Ok(())
}
