// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands for meter capture
//!
//! This module provides command-line functionality for:
//! - Listing available cameras
//! - Capturing a meter photo pair for a customer
//! - Cropping an existing photo to the guide
//! - Saving a preview frame with the guide overlay

use meter_capture::backends::camera::{
    CameraBackend, CameraBackendType, CameraDevice, get_backend_for_type,
};
use meter_capture::constants::{AspectRatio, file_formats};
use meter_capture::permission::{PermissionGate, PortalPermission};
use meter_capture::pipelines::photo::encoding::write_durably;
use meter_capture::preview::overlay::{OverlayStyle, render_guide_overlay};
use meter_capture::preview::select_format;
use meter_capture::{
    CaptureController, CaptureStorage, Config, CropPipeline, CropStrategy, PreviewSession,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;

type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Backend for `source`, or the configured one
fn open_backend(
    config: &Config,
    source: Option<&Path>,
) -> Result<Box<dyn CameraBackend>, Box<dyn std::error::Error>> {
    if let Some(source) = source {
        let supported = source
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(file_formats::is_image_extension);
        if !supported {
            return Err(format!("Unsupported source image: {}", source.display()).into());
        }
        return Ok(get_backend_for_type(CameraBackendType::File, Some(source))?);
    }
    Ok(get_backend_for_type(
        config.backend,
        config.source_image.as_deref(),
    )?)
}

/// Camera at `index`, or the last used one when no index is given
fn pick_device(
    backend: &dyn CameraBackend,
    index: Option<usize>,
    config: &Config,
) -> Result<CameraDevice, Box<dyn std::error::Error>> {
    let cameras = backend.enumerate_cameras();
    if cameras.is_empty() {
        return Err("No cameras found".into());
    }

    match index {
        Some(index) => cameras.get(index).cloned().ok_or_else(|| {
            format!(
                "Camera index {} out of range (0-{})",
                index,
                cameras.len() - 1
            )
            .into()
        }),
        None => Ok(config
            .last_device_path
            .as_ref()
            .and_then(|path| cameras.iter().find(|c| &c.path == path))
            .unwrap_or(&cameras[0])
            .clone()),
    }
}

/// List all available cameras
pub fn list_cameras(source: Option<PathBuf>) -> CliResult {
    let config = Config::load()?;
    let backend = open_backend(&config, source.as_deref())?;
    let cameras = backend.enumerate_cameras();

    if cameras.is_empty() {
        println!("No cameras found.");
        return Ok(());
    }

    println!("Available cameras ({}):", backend.backend_type());
    println!();
    for (index, camera) in cameras.iter().enumerate() {
        println!("  [{}] {} ({})", index, camera.name, camera.path);
        if camera.rotation.degrees() != 0 {
            println!("      Sensor rotation: {}", camera.rotation);
        }

        let mut formats = backend.get_formats(camera);
        if let Some(best) = select_format(&formats, config.aspect_ratio) {
            println!("      Preview format: {}", best);
        }

        // Show top 3 resolutions
        formats.sort_by_key(|f| std::cmp::Reverse(f.area()));
        formats.dedup_by_key(|f| (f.width, f.height));
        let res_strs: Vec<String> = formats
            .iter()
            .take(3)
            .map(|f| format!("{}x{}", f.width, f.height))
            .collect();
        if !res_strs.is_empty() {
            println!("      Formats: {}", res_strs.join(", "));
        }
        println!();
    }

    Ok(())
}

/// Photograph a meter and print the photo pair as JSON
pub fn capture(
    customer_id: String,
    camera_index: Option<usize>,
    source: Option<PathBuf>,
    output: Option<PathBuf>,
    strategy: Option<CropStrategy>,
    aspect: Option<AspectRatio>,
) -> CliResult {
    let mut config = Config::load()?;
    if let Some(strategy) = strategy {
        config.crop_strategy = strategy;
    }
    if let Some(aspect) = aspect {
        config.aspect_ratio = aspect;
    }

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let gate = PermissionGate::new(PortalPermission::new());
        gate.ensure().await?;

        let backend = open_backend(&config, source.as_deref())?;
        let device = pick_device(backend.as_ref(), camera_index, &config)?;
        let session = Arc::new(PreviewSession::open(
            backend,
            Some(device.clone()),
            config.preview_config(),
        )?);
        eprintln!("Using camera: {} ({})", device.name, session.format());

        // Let exposure settle before the shutter
        if let Err(e) = session.settled_preview_frame().await {
            warn!(error = %e, "No settled preview frame, capturing anyway");
        }

        let dir = output.unwrap_or_else(|| config.capture_dir());
        let controller = CaptureController::new(
            Arc::clone(&session),
            CropPipeline::new(config.crop_config()),
            CaptureStorage::new(dir),
        );

        let result = controller.capture(customer_id).await;
        session.close();
        let result = result?;

        println!("{}", serde_json::to_string_pretty(&result)?);

        // Command-line overrides stay out of the stored config
        if source.is_none() && config.last_device_path.as_deref() != Some(device.path.as_str()) {
            let remembered = Config::load().and_then(|mut stored| {
                stored.last_device_path = Some(device.path);
                stored.save()
            });
            if let Err(e) = remembered {
                warn!(error = %e, "Failed to remember camera");
            }
        }
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}

/// Crop an existing photo to the guide
pub fn crop_image(
    image: PathBuf,
    output: Option<PathBuf>,
    strategy: Option<CropStrategy>,
) -> CliResult {
    let mut config = Config::load()?;
    if let Some(strategy) = strategy {
        config.crop_strategy = strategy;
    }

    let output = output.unwrap_or_else(|| {
        let stem = image
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "photo".to_string());
        image.with_file_name(format!("{}_crop.jpg", stem))
    });

    let cropped = CropPipeline::new(config.crop_config()).crop_file(&image, &output)?;
    println!(
        "Cropped {}x{} photo to {} ({} strategy)",
        cropped.source_width, cropped.source_height, cropped.rect, config.crop_strategy
    );
    println!("Saved: {}", cropped.path.display());
    Ok(())
}

/// Save one preview frame with the guide drawn on it
pub fn snapshot(
    camera_index: Option<usize>,
    source: Option<PathBuf>,
    output: PathBuf,
    aspect: Option<AspectRatio>,
) -> CliResult {
    let mut config = Config::load()?;
    if let Some(aspect) = aspect {
        config.aspect_ratio = aspect;
    }

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let gate = PermissionGate::new(PortalPermission::new());
        gate.ensure().await?;

        let backend = open_backend(&config, source.as_deref())?;
        let device = pick_device(backend.as_ref(), camera_index, &config)?;
        let session = PreviewSession::open(backend, Some(device), config.preview_config())?;

        let mut frame = session.settled_preview_frame().await?;
        session.close();

        render_guide_overlay(
            &mut frame.image,
            &config.guide,
            config.crop_strategy,
            &OverlayStyle::default(),
        )
        .ok_or("Preview frame is empty")?;

        let mut png = Vec::new();
        frame
            .image
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)?;
        write_durably(&output, &png)?;

        println!(
            "Snapshot saved: {} ({}x{})",
            output.display(),
            frame.image.width(),
            frame.image.height()
        );
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}
