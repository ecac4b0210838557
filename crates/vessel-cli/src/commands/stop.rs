//! `vessel stop` — Stop running containers with SIGTERM.

use clap::Args;
use vessel_runtime::engine::Engine;

/// Arguments for the `stop` command.
#[derive(Args, Debug)]
pub struct StopArgs {
    /// Container IDs or names to stop.
    #[arg(required = true)]
    pub containers: Vec<String>,
}

/// Executes the `stop` command.
///
/// # Errors
///
/// Returns an error if any container cannot be stopped.
pub fn execute(engine: &Engine, args: &StopArgs) -> anyhow::Result<()> {
    for reference in &args.containers {
        let record = engine.stop(reference)?;
        println!("{}", record.id.short());
    }
    Ok(())
}
