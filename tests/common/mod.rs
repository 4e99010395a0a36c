//! Common utilities for depth texture integration tests.
//!
//! Provides backend enumeration, a Vulkan harness that skips when no driver
//! is present, and helpers for generating and checking depth patterns.

#![allow(dead_code)]

use std::sync::Arc;

use depth_texture::{DepthProvider, DepthProviderConfig, DepthTextureSource, TextureDevice};

// ============================================================================
// Backend Enumeration
// ============================================================================

/// Available texture devices for testing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    /// Host-memory dummy device.
    Dummy,
    /// Vulkan device via ash.
    Vulkan,
}

impl Backend {
    /// Check if this backend is compiled in.
    pub fn is_available(&self) -> bool {
        match self {
            #[cfg(feature = "dummy")]
            Backend::Dummy => true,
            #[cfg(not(feature = "dummy"))]
            Backend::Dummy => false,
            #[cfg(feature = "vulkan-backend")]
            Backend::Vulkan => true,
            #[cfg(not(feature = "vulkan-backend"))]
            Backend::Vulkan => false,
        }
    }
}

/// Run a generic test body against the device for `$backend`, skipping
/// backends that are unavailable on this machine.
macro_rules! with_device {
    ($backend:expr, $body:ident) => {{
        let backend = $backend;
        match backend {
            common::Backend::Dummy => {
                let Some(device) = common::dummy_device(backend) else {
                    eprintln!("Backend {:?} not available, skipping", backend);
                    return;
                };
                $body(device);
            }
            common::Backend::Vulkan => {
                let Some(harness) = common::VulkanHarness::new(backend) else {
                    eprintln!("Backend {:?} not available, skipping", backend);
                    return;
                };
                $body(harness.context());
            }
        }
    }};
}

pub fn dummy_device(backend: Backend) -> Option<Arc<depth_texture::DummyDevice>> {
    backend
        .is_available()
        .then(|| Arc::new(depth_texture::DummyDevice::new()))
}

// ============================================================================
// Vulkan Harness
// ============================================================================

/// Instance and device created for a single test.
///
/// Must outlive every provider created on its context.
pub struct VulkanHarness {
    _entry: ash::Entry,
    instance: ash::Instance,
    device: ash::Device,
    context: Arc<depth_texture::VulkanContext>,
}

impl VulkanHarness {
    /// Create a harness, or `None` if no Vulkan driver with a graphics queue
    /// is available.
    pub fn new(backend: Backend) -> Option<Self> {
        use ash::vk;

        if !backend.is_available() {
            return None;
        }

        let entry = unsafe { ash::Entry::load() }.ok()?;
        let app_info = vk::ApplicationInfo::default().api_version(vk::API_VERSION_1_0);
        let instance_info = vk::InstanceCreateInfo::default().application_info(&app_info);
        let instance = unsafe { entry.create_instance(&instance_info, None) }.ok()?;

        let selected = unsafe { instance.enumerate_physical_devices() }
            .ok()
            .and_then(|devices| {
                devices.into_iter().find_map(|physical_device| {
                    let families = unsafe {
                        instance.get_physical_device_queue_family_properties(physical_device)
                    };
                    families
                        .iter()
                        .position(|family| family.queue_flags.contains(vk::QueueFlags::GRAPHICS))
                        .map(|index| (physical_device, index as u32))
                })
            });
        let Some((physical_device, queue_family_index)) = selected else {
            unsafe { instance.destroy_instance(None) };
            return None;
        };

        let priorities = [1.0];
        let queue_info = [vk::DeviceQueueCreateInfo::default()
            .queue_family_index(queue_family_index)
            .queue_priorities(&priorities)];
        let device_info = vk::DeviceCreateInfo::default().queue_create_infos(&queue_info);
        let device = match unsafe { instance.create_device(physical_device, &device_info, None) } {
            Ok(device) => device,
            Err(_) => {
                unsafe { instance.destroy_instance(None) };
                return None;
            }
        };
        let queue = unsafe { device.get_device_queue(queue_family_index, 0) };

        let context = Arc::new(depth_texture::VulkanContext::from_instance(
            &instance,
            physical_device,
            device.clone(),
            queue,
            queue_family_index,
        ));

        Some(Self {
            _entry: entry,
            instance,
            device,
            context,
        })
    }

    pub fn context(&self) -> Arc<depth_texture::VulkanContext> {
        Arc::clone(&self.context)
    }
}

impl Drop for VulkanHarness {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();
            self.device.destroy_device(None);
            self.instance.destroy_instance(None);
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Provider initialized on `device` with the default configuration.
pub fn initialized_provider<D: TextureDevice>(device: Arc<D>) -> DepthProvider<D> {
    let provider = DepthProvider::new(DepthProviderConfig::default());
    provider.init(device);
    provider
}

/// Deterministic pattern where every texel encodes its position.
pub fn generate_pattern(width: u32, height: u32, seed: u8) -> Vec<u8> {
    (0..height)
        .flat_map(|y| (0..width).map(move |x| (x, y)))
        .map(|(x, y)| (x as u8).wrapping_mul(7) ^ (y as u8).wrapping_mul(31) ^ seed)
        .collect()
}

/// Assert the provider's texture holds `expected` for every texel.
pub fn assert_texels<D: TextureDevice>(
    provider: &DepthProvider<D>,
    width: u32,
    height: u32,
    expected: &[u8],
) {
    for y in 0..height {
        for x in 0..width {
            let want = expected[(y * width + x) as usize];
            assert_eq!(
                provider.texel(x, y),
                Some(want),
                "texel ({}, {}) mismatch",
                x,
                y
            );
        }
    }
}
