use std::path::Path;

use clap::{Parser, Subcommand};
use tracing::info;

use devchooser_core::config::{DeviceIndex, DEVICE_INDEX_ENV};
use devchooser_core::manifest::LayerManifest;
use devchooser_core::selector::{self, FixedDevices, Selection};

#[derive(Parser)]
#[command(name = "devchooser")]
#[command(about = "Device chooser - expose a single Vulkan physical device to applications")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the loader manifest that makes the layer discoverable
    Manifest {
        /// Path of the built layer library, as the loader should open it
        #[arg(short, long)]
        library: String,

        /// Generate an implicit layer manifest (loaded into every application)
        #[arg(long)]
        implicit: bool,

        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Show which device the layer would expose out of a list of devices
    Resolve {
        /// Number of physical devices the driver reports
        #[arg(short, long)]
        count: usize,

        /// Selection input to try (defaults to the current VULKAN_DEVICE_INDEX)
        #[arg(short, long, allow_hyphen_values = true)]
        index: Option<String>,
    },
}

fn main() -> anyhow::Result<()> {
    devchooser_common::init_logging();

    let cli = Cli::parse();

    match cli.command {
        Commands::Manifest {
            library,
            implicit,
            output,
        } => {
            let manifest = LayerManifest::for_library(&library, implicit);
            match output {
                Some(path) => {
                    manifest.write(Path::new(&path))?;
                    info!("wrote layer manifest to {}", path);
                }
                None => println!("{}", manifest.to_json()?),
            }
        }

        Commands::Resolve { count, index } => {
            let request = match index {
                Some(raw) => Some(DeviceIndex::parse(&raw)),
                None => DeviceIndex::from_env(),
            };

            let Some(request) = request else {
                println!(
                    "{} is not set: all {} device(s) are exposed unchanged",
                    DEVICE_INDEX_ENV, count
                );
                return Ok(());
            };

            let mut devices = FixedDevices((0..count).collect::<Vec<usize>>());
            let selection = match selector::choose(&mut devices, &request) {
                Ok(selection) => selection,
                Err(never) => match never {},
            };

            match selection {
                Selection::NoDevices => {
                    println!("no devices available: enumeration reports 0 devices");
                }
                Selection::Chosen {
                    index, available, ..
                } => {
                    println!(
                        "{}={} exposes device {} of {}",
                        DEVICE_INDEX_ENV, request, index, available
                    );
                }
            }
        }
    }

    Ok(())
}
