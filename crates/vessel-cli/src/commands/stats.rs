//! `vessel stats` — Show memory usage of a running container.

use clap::Args;
use vessel_runtime::engine::Engine;

use crate::output::format_bytes;

/// Arguments for the `stats` command.
#[derive(Args, Debug)]
pub struct StatsArgs {
    /// Container ID or name.
    pub container: String,
}

/// Executes the `stats` command.
///
/// # Errors
///
/// Returns an error if the container is not running or has no
/// accounting group.
pub fn execute(engine: &Engine, args: &StatsArgs) -> anyhow::Result<()> {
    let stats = engine.stats(&args.container)?;
    let limit = stats
        .limit_bytes
        .map_or_else(|| "unlimited".to_string(), format_bytes);
    println!("MEMORY USED    LIMIT");
    println!("{:<14} {limit}", format_bytes(stats.used_bytes));
    Ok(())
}
