//! `vessel logs` — View captured container output.

use clap::Args;
use vessel_runtime::engine::Engine;

/// Arguments for the `logs` command.
#[derive(Args, Debug)]
pub struct LogsArgs {
    /// Container ID or name.
    pub container: String,
}

/// Executes the `logs` command.
///
/// # Errors
///
/// Returns an error if the container is not found or its log cannot be
/// read.
pub fn execute(engine: &Engine, args: &LogsArgs) -> anyhow::Result<()> {
    let logs = engine.logs(&args.container)?;
    if logs.is_empty() {
        println!("No logs captured for container: {}", args.container);
    } else {
        print!("{logs}");
    }
    Ok(())
}
