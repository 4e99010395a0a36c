//! # Depth Upload Demo
//!
//! Runs the depth staging pipeline headless on the dummy device:
//! producer threads stand in for an inference model, throttled to the
//! quality tier's frame divisor, and the main thread plays the renderer,
//! uploading and binding the latest frame once per tick.
//!
//! ```bash
//! cargo run --example depth_upload -- --producers 2 --frames 120
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use clap::Parser;

use depth_texture::depth_map::subject_disc;
use depth_texture::{
    DepthProvider, DepthProviderConfig, DepthSource, DepthTextureSource, DummyDevice,
    FrameThrottle, QualityTier,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
enum CliSource {
    /// Depth estimated from camera frames.
    #[default]
    Inferred,
    /// Depth from a hardware sensor.
    Sensed,
}

impl From<CliSource> for DepthSource {
    fn from(cli: CliSource) -> Self {
        match cli {
            CliSource::Inferred => DepthSource::Inferred,
            CliSource::Sensed => DepthSource::Sensed,
        }
    }
}

/// Depth texture staging demo.
#[derive(Parser, Debug)]
#[command(name = "depth_upload", about = "Headless depth texture upload demo", version)]
struct Args {
    /// Where depth frames come from.
    #[arg(long, default_value = "inferred", value_enum)]
    source: CliSource,

    /// Number of producer threads.
    #[arg(long, default_value = "2")]
    producers: u32,

    /// Render frames to run before exiting.
    #[arg(long, default_value = "120")]
    frames: u64,

    /// Total system memory in GiB, used to pick the quality tier.
    #[arg(long, default_value = "8")]
    memory_gib: u64,

    /// Simulated render frame time in milliseconds.
    #[arg(long, default_value = "16")]
    frame_ms: u64,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let tier = QualityTier::for_memory(args.memory_gib * 1024 * 1024 * 1024);
    let resolution = tier.inference_resolution();
    log::info!(
        "Tier {:?}: {}px inference, {} blur samples, every {} frame(s)",
        tier,
        resolution,
        tier.blur_sample_count(),
        tier.frame_divisor()
    );

    let device = Arc::new(DummyDevice::new());
    let provider = Arc::new(DepthProvider::new(
        DepthProviderConfig::for_source(args.source.into()),
    ));
    provider.init(Arc::clone(&device));

    let throttle = FrameThrottle::new(tier.frame_divisor());
    let running = Arc::new(AtomicBool::new(true));

    let producers: Vec<_> = (0..args.producers)
        .map(|index| {
            let provider = Arc::clone(&provider);
            let throttle = throttle.clone();
            let running = Arc::clone(&running);
            // Alternate sizes so the renderer sees recreations.
            let size = if index % 2 == 0 {
                resolution
            } else {
                resolution / 2
            };
            std::thread::spawn(move || {
                let map = subject_disc(size);
                while running.load(Ordering::Relaxed) {
                    if let Some(_permit) = throttle.try_begin() {
                        provider.update_data(map.as_bytes(), map.width(), map.height());
                    }
                    std::thread::sleep(Duration::from_millis(5));
                }
            })
        })
        .collect();

    for frame in 0..args.frames {
        if provider.update_texture() {
            let binding = provider.texture();
            log::info!(
                "Frame {}: rebinding {}x{} depth texture (generation {}, ready: {})",
                frame,
                binding.width,
                binding.height,
                binding.generation,
                binding.ready
            );
        }
        std::thread::sleep(Duration::from_millis(args.frame_ms));
    }

    running.store(false, Ordering::Relaxed);
    for producer in producers {
        if producer.join().is_err() {
            log::error!("Producer thread panicked");
        }
    }

    let stats = provider.stats();
    log::info!(
        "Done: {} frames staged, {} uploads, {} recreations, {} dropped",
        stats.frames_staged,
        stats.uploads,
        stats.recreations,
        stats.dropped_frames
    );
    provider.destroy();
    log::info!("Live device resources after destroy: {:?}", device.live_resources());
}
