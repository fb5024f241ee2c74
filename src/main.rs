// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use meter_capture::CropStrategy;
use meter_capture::constants::{AspectRatio, app_info};
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "meter-capture")]
#[command(about = "Photograph utility meters and crop the display to the capture guide")]
#[command(version = app_info::version())]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available cameras
    List {
        /// Serve this image as the only camera
        #[arg(long)]
        source: Option<PathBuf>,
    },

    /// Take a meter photo and crop it to the guide
    Capture {
        /// Customer the photo belongs to
        #[arg(long)]
        customer: String,

        /// Camera index to use (from 'meter-capture list'; default: last used)
        #[arg(short, long)]
        camera: Option<usize>,

        /// Serve this image as the camera instead of a device
        #[arg(long)]
        source: Option<PathBuf>,

        /// Photo directory (default: app data dir)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// How the guide maps onto the photo (offset or centered)
        #[arg(long)]
        strategy: Option<CropStrategy>,

        /// Preview aspect ratio, e.g. 16:9 or 4:3 (default: from config)
        #[arg(long)]
        aspect: Option<AspectRatio>,
    },

    /// Crop an existing photo to the guide
    Crop {
        /// Photo to crop
        image: PathBuf,

        /// Output file (default: <IMAGE>_crop.jpg next to the photo)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// How the guide maps onto the photo (offset or centered)
        #[arg(long)]
        strategy: Option<CropStrategy>,
    },

    /// Save one preview frame with the guide overlay as PNG
    Snapshot {
        /// Camera index to use (from 'meter-capture list'; default: last used)
        #[arg(short, long)]
        camera: Option<usize>,

        /// Serve this image as the camera instead of a device
        #[arg(long)]
        source: Option<PathBuf>,

        /// Output PNG file
        #[arg(short, long)]
        output: PathBuf,

        /// Preview aspect ratio, e.g. 16:9 or 4:3 (default: from config)
        #[arg(long)]
        aspect: Option<AspectRatio>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=meter_capture=debug, RUST_LOG=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!(
        version = app_info::version(),
        runtime = app_info::runtime_environment(),
        "Starting meter-capture"
    );

    let cli = Cli::parse();

    match cli.command {
        Commands::List { source } => cli::list_cameras(source),
        Commands::Capture {
            customer,
            camera,
            source,
            output,
            strategy,
            aspect,
        } => cli::capture(customer, camera, source, output, strategy, aspect),
        Commands::Crop {
            image,
            output,
            strategy,
        } => cli::crop_image(image, output, strategy),
        Commands::Snapshot {
            camera,
            source,
            output,
            aspect,
        } => cli::snapshot(camera, source, output, aspect),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_accepts_aspect_and_strategy() {
        let cli = Cli::try_parse_from([
            "meter-capture",
            "capture",
            "--customer",
            "c-17",
            "--aspect",
            "4:3",
            "--strategy",
            "centered",
        ])
        .unwrap();
        match cli.command {
            Commands::Capture {
                customer,
                aspect,
                strategy,
                ..
            } => {
                assert_eq!(customer, "c-17");
                assert_eq!(aspect, Some(AspectRatio::STANDARD));
                assert_eq!(strategy, Some(CropStrategy::Centered));
            }
            _ => panic!("expected capture command"),
        }
    }

    #[test]
    fn test_bad_aspect_is_rejected() {
        let parsed = Cli::try_parse_from([
            "meter-capture",
            "snapshot",
            "--output",
            "guide.png",
            "--aspect",
            "16x9",
        ]);
        assert!(parsed.is_err());
    }
}
