//! `vessel rm` — Remove containers and their resources.

use clap::Args;
use vessel_runtime::engine::Engine;

/// Arguments for the `rm` command.
#[derive(Args, Debug)]
pub struct RmArgs {
    /// Container IDs or names to remove.
    #[arg(required = true)]
    pub containers: Vec<String>,

    /// Kill a running container before removing it.
    #[arg(short, long)]
    pub force: bool,
}

/// Executes the `rm` command.
///
/// # Errors
///
/// Returns an error if any container cannot be removed.
pub fn execute(engine: &Engine, args: &RmArgs) -> anyhow::Result<()> {
    for reference in &args.containers {
        let record = engine.remove(reference, args.force)?;
        println!("{}", record.id.short());
    }
    Ok(())
}
