//! `vessel volume` — Manage named volumes.

use clap::{Args, Subcommand};
use vessel_runtime::engine::Engine;

/// Arguments for the `volume` command.
#[derive(Args, Debug)]
pub struct VolumeArgs {
    /// Volume operation.
    #[command(subcommand)]
    pub action: VolumeAction,
}

/// Volume operations.
#[derive(Subcommand, Debug)]
pub enum VolumeAction {
    /// Create a named volume.
    Create {
        /// Volume name.
        name: String,
    },
    /// List volumes.
    Ls,
    /// Remove a volume and its data.
    Rm {
        /// Volume name.
        name: String,
    },
    /// Show a volume's metadata.
    Inspect {
        /// Volume name.
        name: String,
    },
}

/// Executes the `volume` command.
///
/// # Errors
///
/// Returns an error if the volume store operation fails.
pub fn execute(engine: &Engine, args: &VolumeArgs) -> anyhow::Result<()> {
    let volumes = engine.volumes();
    match &args.action {
        VolumeAction::Create { name } => {
            let volume = volumes.create(name)?;
            println!("{}", volume.name);
        }
        VolumeAction::Ls => {
            let all = volumes.list()?;
            if all.is_empty() {
                println!("No volumes.");
                return Ok(());
            }
            println!("{:<20} {:<8} {:<48}", "NAME", "DRIVER", "MOUNTPOINT");
            for v in &all {
                println!("{:<20} {:<8} {:<48}", v.name, v.driver, v.mountpoint.display());
            }
        }
        VolumeAction::Rm { name } => {
            engine.remove_volume(name)?;
            println!("{name}");
        }
        VolumeAction::Inspect { name } => {
            let volume = volumes.get(name)?;
            println!("name:       {}", volume.name);
            println!("driver:     {}", volume.driver);
            println!("mountpoint: {}", volume.mountpoint.display());
            println!("created_at: {}", volume.created_at);
        }
    }
    Ok(())
}
