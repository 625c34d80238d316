use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use palm_vision::core_modules::encode::optimize_for_upload;
use palm_vision::core_modules::playback::PlaybackCamera;
use palm_vision::{
    AnimatorConfig, AnimatorEvent, ExclusiveCamera, Frame, LineAnimator, PixmapSurface, ReadingResult, RefreshBus,
    Shutter, ValidationPolicy, Viewfinder, ViewfinderConfig,
};

/// Refreshes to wait for a good reading before giving up.
const MAX_REFRESHES: u32 = 120;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // --- 1. Argument Parsing & Setup ---
    let args: Vec<String> = env::args().collect();
    if args.len() < 4 {
        println!("Usage: capture_tester <palm_image> <reading.json> <output_dir>");
        return Ok(());
    }
    let image_path = Path::new(&args[1]);
    let reading_path = Path::new(&args[2]);
    let output_dir = Path::new(&args[3]);
    fs::create_dir_all(output_dir).with_context(|| format!("creating {}", output_dir.display()))?;

    let palm = image::open(image_path)
        .with_context(|| format!("opening {}", image_path.display()))?
        .to_rgba8();
    let (width, height) = palm.dimensions();
    log::info!("loaded {}x{} palm photo", width, height);

    // --- 2. Viewfinder Initialization ---
    // The photo stands in for the camera; a fixed-rate clock stands in for the display.
    let camera = ExclusiveCamera::new(PlaybackCamera::new(vec![Frame::from_rgba_image(&palm)]));
    let bus = RefreshBus::default();
    let clock = bus.spawn_clock(30);
    let overlay = PixmapSurface::new(width, height).context("zero-sized photo")?;
    let mut viewfinder = Viewfinder::new(camera, bus.clone(), ViewfinderConfig::default()).with_overlay(overlay.clone());

    if let Err(err) = viewfinder.start().await {
        clock.abort();
        bail!("{}: {err}", viewfinder.status_message());
    }

    if let Some(caption) = viewfinder.caption() {
        println!("Viewfinder: {caption}");
    }

    // --- 3. Wait For A Capturable Frame ---
    let mut quality = viewfinder.subscribe_quality();
    let mut refreshes = 0;
    while !viewfinder.shutter_enabled() {
        if refreshes >= MAX_REFRESHES {
            let reading = viewfinder.quality();
            clock.abort();
            bail!("photo never became capturable ({})", reading.indicator_text());
        }
        let _ = tokio::time::timeout(Duration::from_millis(100), quality.changed()).await;
        refreshes += 1;
    }
    println!("Viewfinder: {}", viewfinder.quality().indicator_text());
    overlay
        .to_rgba_image()
        .save(output_dir.join("overlay.png"))
        .context("writing overlay.png")?;

    // --- 4. Capture & Upload Preparation ---
    let photo = match viewfinder.capture()? {
        Shutter::Captured(photo) => photo,
        Shutter::Disabled(state) => bail!("shutter disabled ({state:?})"),
    };
    clock.abort();
    fs::write(output_dir.join("capture.jpg"), &photo.bytes[..]).context("writing capture.jpg")?;
    let upload = optimize_for_upload(&photo)?;
    println!(
        "Captured {}x{} ({} bytes); upload {}x{} ({} bytes)",
        photo.width,
        photo.height,
        photo.bytes.len(),
        upload.width,
        upload.height,
        upload.bytes.len()
    );

    // --- 5. Reading ---
    let body = fs::read_to_string(reading_path).with_context(|| format!("reading {}", reading_path.display()))?;
    let reading = ReadingResult::from_json(&body)?;
    println!("{} {} - {}", reading.character.emoji, reading.character.name, reading.summary);
    let validated = reading.validated_lines();
    for rejected in &validated.rejected {
        println!("  skipped: {rejected}");
    }

    // --- 6. Line Animation ---
    let animator = LineAnimator::new(AnimatorConfig {
        validation: ValidationPolicy::Lenient,
        ..Default::default()
    });
    let surface = PixmapSurface::new(upload.width, upload.height).context("zero-sized upload")?;
    let mut animation = animator.spawn_encoded(surface, &photo, &reading.lines)?;
    while let Some(event) = animation.next_event().await {
        match event {
            AnimatorEvent::LineStarted { .. } => {
                if let Some(caption) = animation.caption() {
                    println!("  {caption}");
                }
            }
            AnimatorEvent::Completed => println!("  done"),
        }
    }
    let surface = animation.finish().await?;
    surface
        .to_rgba_image()
        .save(output_dir.join("result.png"))
        .context("writing result.png")?;

    println!("Wrote overlay.png, capture.jpg and result.png to {}", output_dir.display());
    Ok(())
}
