//! GPU backend abstraction for depth textures.
//!
//! The upload pipeline only needs a narrow slice of a GPU API: create a
//! linear single-channel image, back it with host-visible memory, map it,
//! transition its layout once, and wrap it in a view and sampler. This
//! module expresses that slice as the [`TextureDevice`] trait.
//!
//! # Available Backends
//!
//! - `vulkan-backend`: [`vulkan::VulkanContext`], raw Vulkan through ash
//! - `dummy`: [`dummy::DummyDevice`], host-memory simulation for testing
//!
//! Both backends use `ash::vk` handle types, so a texture looks the same to
//! the renderer regardless of which device produced it.

#[cfg(feature = "dummy")]
pub mod dummy;

#[cfg(feature = "vulkan-backend")]
pub mod vulkan;

use std::ptr::NonNull;

use ash::vk;

use crate::error::DepthResult;
use crate::layout::TextureLayout;

/// GPU operations needed to create, fill and destroy a depth texture.
///
/// Every handle passed to a method must have been created by the same
/// device and not yet destroyed. Destroy methods ignore null handles.
pub trait TextureDevice: Send + Sync + 'static {
    /// Get the backend name.
    fn name(&self) -> &'static str;

    /// Memory type table of the physical device.
    fn memory_properties(&self) -> &vk::PhysicalDeviceMemoryProperties;

    /// Create a `width`x`height` `R8_UNORM` image with linear tiling, sampled
    /// usage and the preinitialized initial layout.
    fn create_image(&self, width: u32, height: u32) -> DepthResult<vk::Image>;

    /// Query size and allowed memory types for an image.
    fn image_memory_requirements(&self, image: vk::Image) -> vk::MemoryRequirements;

    /// Allocate device memory of the given type.
    fn allocate_memory(
        &self,
        size: vk::DeviceSize,
        memory_type_index: u32,
    ) -> DepthResult<vk::DeviceMemory>;

    /// Bind memory to an image at offset zero.
    fn bind_image_memory(&self, image: vk::Image, memory: vk::DeviceMemory) -> DepthResult<()>;

    /// Map `size` bytes of an allocation from offset zero.
    fn map_memory(&self, memory: vk::DeviceMemory, size: vk::DeviceSize)
        -> DepthResult<NonNull<u8>>;

    /// Make host writes to a non-coherent mapping visible to the device.
    fn flush_mapped_memory(&self, memory: vk::DeviceMemory) -> DepthResult<()>;

    /// Layout of mip 0, layer 0 of a linear image.
    fn subresource_layout(&self, image: vk::Image) -> vk::SubresourceLayout;

    /// Move an image between layouts, blocking until the device is done.
    fn transition_layout(
        &self,
        image: vk::Image,
        old: TextureLayout,
        new: TextureLayout,
    ) -> DepthResult<()>;

    /// Create a 2D view over an image.
    fn create_image_view(&self, image: vk::Image) -> DepthResult<vk::ImageView>;

    /// Create a linear, clamp-to-edge sampler.
    fn create_sampler(&self) -> DepthResult<vk::Sampler>;

    fn destroy_image_view(&self, view: vk::ImageView);

    fn destroy_sampler(&self, sampler: vk::Sampler);

    fn destroy_image(&self, image: vk::Image);

    /// Free memory, unmapping it first if `mapped` is set.
    fn free_memory(&self, memory: vk::DeviceMemory, mapped: bool);
}
