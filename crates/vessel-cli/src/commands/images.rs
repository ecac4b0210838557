//! `vessel images` — Manage the local image catalog.

use std::path::PathBuf;

use clap::{Args, Subcommand};
use vessel_image::manifest::{ImageConfig, ImageManifest};
use vessel_runtime::engine::Engine;

use crate::output::format_bytes;

/// Arguments for the `images` command.
#[derive(Args, Debug)]
pub struct ImagesArgs {
    /// Image operation; defaults to listing the catalog.
    #[command(subcommand)]
    pub action: Option<ImageAction>,
}

/// Image catalog operations.
#[derive(Subcommand, Debug)]
pub enum ImageAction {
    /// List catalog entries.
    Ls,
    /// Import a tar or tar.gz archive as a single-layer image.
    Import {
        /// Path to the archive.
        archive: PathBuf,
        /// Name to register the image under.
        #[arg(long)]
        name: String,
        /// Default command stored in the image config.
        #[arg(long)]
        cmd: Vec<String>,
    },
    /// Remove an image from the catalog (layers are kept).
    Rm {
        /// Image name.
        name: String,
    },
}

/// Executes the `images` command.
///
/// # Errors
///
/// Returns an error if catalog or layer store operations fail.
pub fn execute(engine: &Engine, args: &ImagesArgs) -> anyhow::Result<()> {
    match &args.action {
        None | Some(ImageAction::Ls) => list(engine),
        Some(ImageAction::Import { archive, name, cmd }) => import(engine, archive, name, cmd),
        Some(ImageAction::Rm { name }) => {
            engine.images().remove(name)?;
            println!("{name}");
            Ok(())
        }
    }
}

fn list(engine: &Engine) -> anyhow::Result<()> {
    let images = engine.images().list()?;
    if images.is_empty() {
        println!("No images in the catalog.");
        return Ok(());
    }
    println!("{:<24} {:<8} {:<10} {:<12}", "NAME", "LAYERS", "KIND", "SIZE");
    for image in &images {
        println!(
            "{:<24} {:<8} {:<10} {:<12}",
            image.name,
            image.layers,
            if image.layered { "layered" } else { "rootfs" },
            image.size_bytes.map_or_else(|| "-".to_string(), format_bytes)
        );
    }
    Ok(())
}

fn import(
    engine: &Engine,
    archive: &std::path::Path,
    name: &str,
    cmd: &[String],
) -> anyhow::Result<()> {
    let layer = engine.layers().import_archive(archive, "import")?;
    let manifest = ImageManifest {
        name: name.to_string(),
        tag: "latest".to_string(),
        layers: vec![layer.id.clone()],
        created_at: chrono::Utc::now().to_rfc3339(),
        config: ImageConfig {
            cmd: cmd.to_vec(),
            env: Vec::new(),
            working_dir: None,
        },
        size_bytes: layer.size_bytes,
    };
    engine.images().save_manifest(&manifest)?;
    println!("{name} <- layer {}", &layer.id.as_str()[..12]);
    Ok(())
}
