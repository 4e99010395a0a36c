//! Integration tests for depth providers.
//!
//! Tests that only need the public provider contract run against every
//! backend via `rstest` cases; Vulkan cases skip when no driver is present.
//! Tests that depend on device quirks (row alignment, memory tables,
//! injected failures) use the dummy device directly.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test --test provider_tests
//! ```

#[macro_use]
mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use ash::vk;
use rstest::rstest;

use common::{Backend, assert_texels, generate_pattern, initialized_provider};
use depth_texture::backend::dummy::FailurePoint;
use depth_texture::{
    DepthError, DepthProvider, DepthProviderConfig, DepthSource, DepthTextureSource, DummyDevice,
    TextureDevice, TextureLayout, select_host_visible,
};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

// ============================================================================
// Provider Contract
// ============================================================================

fn fail_safe_default<D: TextureDevice>(device: Arc<D>) {
    let provider = initialized_provider(device);
    let binding = provider.texture();
    assert!(binding.ready);
    assert_eq!((binding.width, binding.height), (1, 1));
    assert_eq!(binding.layout, TextureLayout::General);
    assert_eq!(provider.texel(0, 0), Some(255));
}

/// After init and before any frame, the texture reads as fully sharp.
#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::vulkan(Backend::Vulkan)]
fn test_fail_safe_default(#[case] backend: Backend) {
    init_logger();
    with_device!(backend, fail_safe_default);
}

fn idempotent_destroy<D: TextureDevice>(device: Arc<D>) {
    let provider = initialized_provider(device);
    provider.destroy();
    provider.destroy();

    let binding = provider.texture();
    assert!(!binding.ready);
    assert_eq!(binding.image, vk::Image::null());
    assert_eq!(binding.view, vk::ImageView::null());
    assert_eq!(binding.sampler, vk::Sampler::null());
    assert_eq!(binding.layout, TextureLayout::Uninitialized);
    assert!(!provider.update_texture());
}

#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::vulkan(Backend::Vulkan)]
fn test_idempotent_destroy(#[case] backend: Backend) {
    init_logger();
    with_device!(backend, idempotent_destroy);
}

fn no_dirty_no_op<D: TextureDevice>(device: Arc<D>) {
    let provider = initialized_provider(device);
    provider.update_data(&[10, 20, 30, 40], 2, 2);
    assert!(provider.update_texture());
    let uploads = provider.stats().uploads;
    assert_eq!(uploads, 1);

    assert!(!provider.update_texture());
    assert_eq!(provider.stats().uploads, uploads);
    assert_texels(&provider, 2, 2, &[10, 20, 30, 40]);
}

#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::vulkan(Backend::Vulkan)]
fn test_no_dirty_update_is_no_op(#[case] backend: Backend) {
    init_logger();
    with_device!(backend, no_dirty_no_op);
}

fn last_writer_wins<D: TextureDevice>(device: Arc<D>) {
    let provider = initialized_provider(device);
    let first = generate_pattern(4, 4, 0x11);
    let second = generate_pattern(4, 4, 0x5a);
    provider.update_data(&first, 4, 4);
    provider.update_data(&second, 4, 4);
    provider.update_texture();

    assert_texels(&provider, 4, 4, &second);
    assert_eq!(provider.stats().frames_staged, 2);
    assert_eq!(provider.stats().uploads, 1);
}

#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::vulkan(Backend::Vulkan)]
fn test_last_writer_wins(#[case] backend: Backend) {
    init_logger();
    with_device!(backend, last_writer_wins);
}

fn resize<D: TextureDevice>(device: Arc<D>) {
    let provider = initialized_provider(device);
    let initial = provider.texture().generation;

    let square = generate_pattern(4, 4, 1);
    provider.update_data(&square, 4, 4);
    assert!(provider.update_texture());
    assert_texels(&provider, 4, 4, &square);

    let wide = generate_pattern(8, 3, 2);
    provider.update_data(&wide, 8, 3);
    assert!(provider.update_texture());
    assert_texels(&provider, 8, 3, &wide);

    let binding = provider.texture();
    assert!(binding.ready);
    assert_eq!((binding.width, binding.height), (8, 3));
    assert_eq!(binding.generation, initial + 2);
    assert_eq!(provider.stats().recreations, 2);
}

/// 1x1 -> 4x4 -> 8x3, each resize reporting a recreated texture.
#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::vulkan(Backend::Vulkan)]
fn test_resize(#[case] backend: Backend) {
    init_logger();
    with_device!(backend, resize);
}

fn sources_share_behavior<D: TextureDevice>(device: Arc<D>) {
    for source in [DepthSource::Inferred, DepthSource::Sensed] {
        let provider = DepthProvider::new(DepthProviderConfig::for_source(source));
        provider.init(Arc::clone(&device));
        assert_eq!(provider.source(), source);
        assert_eq!(provider.texel(0, 0), Some(255));

        provider.update_data(&[1, 2, 3], 3, 1);
        assert!(provider.update_texture());
        assert_texels(&provider, 3, 1, &[1, 2, 3]);
    }
}

#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::vulkan(Backend::Vulkan)]
fn test_sources_share_behavior(#[case] backend: Backend) {
    init_logger();
    with_device!(backend, sources_share_behavior);
}

// ============================================================================
// Device-Specific Behavior
// ============================================================================

/// Rows land at multiples of the device row pitch, whatever it is.
#[rstest]
#[case::unpadded(1, 5)]
#[case::aligned_4(4, 5)]
#[case::aligned_64(64, 13)]
#[case::aligned_256(256, 3)]
fn test_row_pitch_independence(#[case] alignment: u64, #[case] width: u32) {
    init_logger();
    let device = Arc::new(DummyDevice::new().with_row_alignment(alignment));
    let provider = initialized_provider(Arc::clone(&device));

    let height = 4;
    let pattern = generate_pattern(width, height, 0x33);
    provider.update_data(&pattern, width, height);
    provider.update_texture();

    let image = provider.texture().image;
    for y in 0..height {
        for x in 0..width {
            assert_eq!(
                device.texel(image, x, y),
                Some(pattern[(y * width + x) as usize])
            );
        }
    }
}

/// Without host-coherent memory, the texture falls back to plain
/// host-visible memory and flushes after each write.
#[test]
fn test_non_coherent_fallback() {
    init_logger();
    let device = Arc::new(DummyDevice::new().with_memory_types(&[
        vk::MemoryPropertyFlags::DEVICE_LOCAL,
        vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_CACHED,
    ]));
    let provider = initialized_provider(Arc::clone(&device));

    let binding = provider.texture();
    assert!(binding.ready);
    assert_eq!(device.memory_type_of(binding.image), Some(1));
    assert_eq!(provider.texel(0, 0), Some(255));
    let flushes = device.flush_count();
    assert!(flushes >= 1);

    provider.update_data(&[42], 1, 1);
    provider.update_texture();
    assert_eq!(device.flush_count(), flushes + 1);
    assert_eq!(device.texel(binding.image, 0, 0), Some(42));
}

#[test]
fn test_coherent_memory_is_not_flushed() {
    init_logger();
    let device = Arc::new(DummyDevice::new());
    let provider = initialized_provider(Arc::clone(&device));
    provider.update_data(&[1, 2, 3, 4], 2, 2);
    provider.update_texture();
    assert_eq!(device.flush_count(), 0);
}

/// With no host-visible memory type at all, creation stays non-ready, the
/// copy is skipped and the requested size is kept.
#[test]
fn test_no_host_visible_memory() {
    init_logger();
    let device =
        Arc::new(DummyDevice::new().with_memory_types(&[vk::MemoryPropertyFlags::DEVICE_LOCAL]));

    assert!(matches!(
        select_host_visible(device.memory_properties(), u32::MAX),
        Err(DepthError::NoCompatibleMemoryType { .. })
    ));

    let provider = initialized_provider(Arc::clone(&device));
    assert!(!provider.texture().ready);
    assert_eq!(provider.texel(0, 0), None);
    // Nothing bound, so no barrier or view either.
    assert!(device.transitions().is_empty());
    assert_eq!(provider.texture().view, vk::ImageView::null());

    provider.update_data(&[7; 6], 3, 2);
    assert!(provider.update_texture());
    let binding = provider.texture();
    assert!(!binding.ready);
    assert_eq!((binding.width, binding.height), (3, 2));
    assert_eq!(provider.stats().uploads, 0);

    // Same size again: no retry.
    provider.update_data(&[8; 6], 3, 2);
    assert!(!provider.update_texture());
    assert_eq!(provider.stats().recreations, 1);
}

#[test]
fn test_destroy_after_failed_init() {
    init_logger();
    let device = Arc::new(DummyDevice::new().with_failure(FailurePoint::CreateImage));
    let provider = initialized_provider(Arc::clone(&device));
    assert!(!provider.texture().ready);

    provider.destroy();
    provider.destroy();
    assert_eq!(device.live_resources().total(), 0);
}

#[test]
fn test_destroy_before_init() {
    let provider = DepthProvider::<DummyDevice>::default();
    provider.destroy();
    assert!(!provider.is_initialized());
}

/// Every created texture gets exactly one host-write to shader-read barrier.
#[test]
fn test_transition_barrier_per_texture() {
    init_logger();
    let device = Arc::new(DummyDevice::new());
    let provider = initialized_provider(Arc::clone(&device));
    provider.update_data(&[0; 12], 4, 3);
    provider.update_texture();

    let transitions = device.transitions();
    assert_eq!(transitions.len(), 2);
    for record in &transitions {
        assert_eq!(record.old, TextureLayout::Preinitialized);
        assert_eq!(record.new, TextureLayout::General);
        assert_eq!(record.masks.src_access_mask, vk::AccessFlags::HOST_WRITE);
        assert_eq!(record.masks.dst_access_mask, vk::AccessFlags::SHADER_READ);
        assert_eq!(record.masks.src_stage, vk::PipelineStageFlags::HOST);
        assert_eq!(
            record.masks.dst_stage,
            vk::PipelineStageFlags::FRAGMENT_SHADER
        );
    }
    assert_eq!(transitions[1].image, provider.texture().image);
}

#[test]
fn test_failed_transition_is_not_ready() {
    init_logger();
    let device = Arc::new(DummyDevice::new());
    let provider = initialized_provider(Arc::clone(&device));

    device.set_failure(FailurePoint::Transition, true);
    provider.update_data(&[5; 4], 2, 2);
    assert!(provider.update_texture());
    let binding = provider.texture();
    assert_eq!(binding.layout, TextureLayout::Preinitialized);
    assert!(!binding.ready);

    // A later resize recovers once the device does.
    device.set_failure(FailurePoint::Transition, false);
    provider.update_data(&[6; 9], 3, 3);
    assert!(provider.update_texture());
    assert!(provider.texture().ready);
    assert_texels(&provider, 3, 3, &[6; 9]);
}

#[test]
fn test_recreation_releases_old_texture() {
    init_logger();
    let device = Arc::new(DummyDevice::new());
    let provider = initialized_provider(Arc::clone(&device));
    for size in 2..6 {
        let frame = vec![size as u8; (size * size) as usize];
        provider.update_data(&frame, size, size);
        provider.update_texture();
    }
    let live = device.live_resources();
    assert_eq!(live.images, 1);
    assert_eq!(live.memories, 1);
    assert_eq!(live.views, 1);
    assert_eq!(live.samplers, 1);

    drop(provider);
    assert_eq!(device.live_resources().total(), 0);
}

// ============================================================================
// Concurrency
// ============================================================================

/// Producers write uniform frames from several threads; the consumer must
/// never observe a texture mixing two frames.
#[test]
fn test_concurrent_producers_never_tear() {
    init_logger();
    let device = Arc::new(DummyDevice::new().with_row_alignment(32));
    let provider = Arc::new(initialized_provider(Arc::clone(&device)));
    let running = AtomicBool::new(true);

    const WIDTH: u32 = 16;
    const HEIGHT: u32 = 8;

    std::thread::scope(|scope| {
        for producer in 0..4u8 {
            let provider = Arc::clone(&provider);
            let running = &running;
            scope.spawn(move || {
                let mut value = producer;
                loop {
                    let frame = vec![value; (WIDTH * HEIGHT) as usize];
                    provider.update_data(&frame, WIDTH, HEIGHT);
                    value = value.wrapping_add(4);
                    if !running.load(Ordering::Relaxed) {
                        break;
                    }
                }
            });
        }

        for _ in 0..500 {
            provider.update_texture();
            let Some(first) = provider.texel(0, 0) else {
                continue;
            };
            let binding = provider.texture();
            if (binding.width, binding.height) != (WIDTH, HEIGHT) {
                continue;
            }
            for y in 0..HEIGHT {
                for x in 0..WIDTH {
                    assert_eq!(provider.texel(x, y), Some(first), "torn frame at ({x}, {y})");
                }
            }
        }
        running.store(false, Ordering::Relaxed);
    });

    provider.update_texture();
    let binding = provider.texture();
    assert_eq!((binding.width, binding.height), (WIDTH, HEIGHT));
    let last = provider.texel(0, 0).unwrap();
    let expected = vec![last; (WIDTH * HEIGHT) as usize];
    assert_texels(&provider, WIDTH, HEIGHT, &expected);
    assert!(provider.stats().frames_staged > 0);
}
