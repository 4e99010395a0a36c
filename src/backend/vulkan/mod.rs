//! Vulkan backend implementation using ash.
//!
//! [`VulkanContext`] borrows a device and queue owned by the host renderer.
//! It never creates or destroys the device itself, only the images,
//! allocations, views and samplers of the depth textures it produces.

pub mod barriers;
pub mod command;

use std::ptr::NonNull;

use ash::vk;
use parking_lot::Mutex;

use crate::error::{DepthError, DepthResult};
use crate::layout::TextureLayout;

use super::TextureDevice;
use command::OneShotCommands;

/// Pixel format of depth textures.
pub const DEPTH_TEXTURE_FORMAT: vk::Format = vk::Format::R8_UNORM;

/// Texture device backed by a renderer-owned Vulkan device.
pub struct VulkanContext {
    device: ash::Device,
    queue: vk::Queue,
    queue_family_index: u32,
    memory_properties: vk::PhysicalDeviceMemoryProperties,
    /// Serializes submissions, since queues require external synchronization.
    queue_lock: Mutex<()>,
}

impl VulkanContext {
    /// Wrap an existing device.
    ///
    /// `queue` must belong to `queue_family_index` and support graphics or
    /// transfer work. The caller keeps ownership of the device and must keep
    /// it alive until every texture created through this context is dropped.
    pub fn new(
        device: ash::Device,
        queue: vk::Queue,
        memory_properties: vk::PhysicalDeviceMemoryProperties,
        queue_family_index: u32,
    ) -> Self {
        log::info!(
            "Vulkan depth texture context on queue family {} ({} memory types)",
            queue_family_index,
            memory_properties.memory_type_count
        );
        Self {
            device,
            queue,
            queue_family_index,
            memory_properties,
            queue_lock: Mutex::new(()),
        }
    }

    /// Convenience constructor that queries memory properties from the
    /// physical device.
    pub fn from_instance(
        instance: &ash::Instance,
        physical_device: vk::PhysicalDevice,
        device: ash::Device,
        queue: vk::Queue,
        queue_family_index: u32,
    ) -> Self {
        let memory_properties =
            unsafe { instance.get_physical_device_memory_properties(physical_device) };
        Self::new(device, queue, memory_properties, queue_family_index)
    }

    pub fn device(&self) -> &ash::Device {
        &self.device
    }

    pub fn queue_family_index(&self) -> u32 {
        self.queue_family_index
    }
}

impl TextureDevice for VulkanContext {
    fn name(&self) -> &'static str {
        "Vulkan"
    }

    fn memory_properties(&self) -> &vk::PhysicalDeviceMemoryProperties {
        &self.memory_properties
    }

    fn create_image(&self, width: u32, height: u32) -> DepthResult<vk::Image> {
        let queue_family_indices = [self.queue_family_index];
        let image_info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(DEPTH_TEXTURE_FORMAT)
            .extent(vk::Extent3D {
                width,
                height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::LINEAR)
            .usage(vk::ImageUsageFlags::SAMPLED)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .queue_family_indices(&queue_family_indices)
            .initial_layout(vk::ImageLayout::PREINITIALIZED);

        unsafe { self.device.create_image(&image_info, None) }.map_err(|e| {
            DepthError::ResourceCreationFailed(format!("Failed to create image: {:?}", e))
        })
    }

    fn image_memory_requirements(&self, image: vk::Image) -> vk::MemoryRequirements {
        unsafe { self.device.get_image_memory_requirements(image) }
    }

    fn allocate_memory(
        &self,
        size: vk::DeviceSize,
        memory_type_index: u32,
    ) -> DepthResult<vk::DeviceMemory> {
        let alloc_info = vk::MemoryAllocateInfo::default()
            .allocation_size(size)
            .memory_type_index(memory_type_index);

        unsafe { self.device.allocate_memory(&alloc_info, None) }.map_err(|e| {
            DepthError::ResourceCreationFailed(format!("Failed to allocate image memory: {:?}", e))
        })
    }

    fn bind_image_memory(&self, image: vk::Image, memory: vk::DeviceMemory) -> DepthResult<()> {
        unsafe { self.device.bind_image_memory(image, memory, 0) }.map_err(|e| {
            DepthError::ResourceCreationFailed(format!("Failed to bind image memory: {:?}", e))
        })
    }

    fn map_memory(
        &self,
        memory: vk::DeviceMemory,
        size: vk::DeviceSize,
    ) -> DepthResult<NonNull<u8>> {
        let ptr = unsafe {
            self.device
                .map_memory(memory, 0, size, vk::MemoryMapFlags::empty())
        }
        .map_err(|e| DepthError::MapFailed(format!("{:?}", e)))?;

        NonNull::new(ptr.cast::<u8>())
            .ok_or_else(|| DepthError::MapFailed("driver returned a null mapping".to_string()))
    }

    fn flush_mapped_memory(&self, memory: vk::DeviceMemory) -> DepthResult<()> {
        let range = vk::MappedMemoryRange::default()
            .memory(memory)
            .offset(0)
            .size(vk::WHOLE_SIZE);

        unsafe { self.device.flush_mapped_memory_ranges(&[range]) }
            .map_err(|e| DepthError::MapFailed(format!("Failed to flush mapped memory: {:?}", e)))
    }

    fn subresource_layout(&self, image: vk::Image) -> vk::SubresourceLayout {
        let subresource = vk::ImageSubresource {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            mip_level: 0,
            array_layer: 0,
        };
        unsafe { self.device.get_image_subresource_layout(image, subresource) }
    }

    fn transition_layout(
        &self,
        image: vk::Image,
        old: TextureLayout,
        new: TextureLayout,
    ) -> DepthResult<()> {
        let _queue = self.queue_lock.lock();
        let commands = OneShotCommands::begin(&self.device, self.queue_family_index)?;
        barriers::record_layout_transition(&self.device, commands.buffer(), image, old, new);
        commands.submit_and_wait(self.queue)
    }

    fn create_image_view(&self, image: vk::Image) -> DepthResult<vk::ImageView> {
        let view_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(DEPTH_TEXTURE_FORMAT)
            .components(vk::ComponentMapping {
                r: vk::ComponentSwizzle::R,
                g: vk::ComponentSwizzle::G,
                b: vk::ComponentSwizzle::B,
                a: vk::ComponentSwizzle::A,
            })
            .subresource_range(barriers::color_subresource_range());

        unsafe { self.device.create_image_view(&view_info, None) }.map_err(|e| {
            DepthError::ResourceCreationFailed(format!("Failed to create image view: {:?}", e))
        })
    }

    fn create_sampler(&self) -> DepthResult<vk::Sampler> {
        let sampler_info = vk::SamplerCreateInfo::default()
            .mag_filter(vk::Filter::LINEAR)
            .min_filter(vk::Filter::LINEAR)
            .mipmap_mode(vk::SamplerMipmapMode::NEAREST)
            .address_mode_u(vk::SamplerAddressMode::CLAMP_TO_EDGE)
            .address_mode_v(vk::SamplerAddressMode::CLAMP_TO_EDGE)
            .address_mode_w(vk::SamplerAddressMode::CLAMP_TO_EDGE)
            .mip_lod_bias(0.0)
            .max_anisotropy(1.0)
            .compare_op(vk::CompareOp::NEVER)
            .min_lod(0.0)
            .max_lod(0.0)
            .border_color(vk::BorderColor::FLOAT_OPAQUE_WHITE)
            .unnormalized_coordinates(false);

        unsafe { self.device.create_sampler(&sampler_info, None) }.map_err(|e| {
            DepthError::ResourceCreationFailed(format!("Failed to create sampler: {:?}", e))
        })
    }

    fn destroy_image_view(&self, view: vk::ImageView) {
        if view != vk::ImageView::null() {
            unsafe { self.device.destroy_image_view(view, None) };
        }
    }

    fn destroy_sampler(&self, sampler: vk::Sampler) {
        if sampler != vk::Sampler::null() {
            unsafe { self.device.destroy_sampler(sampler, None) };
        }
    }

    fn destroy_image(&self, image: vk::Image) {
        if image != vk::Image::null() {
            unsafe { self.device.destroy_image(image, None) };
        }
    }

    fn free_memory(&self, memory: vk::DeviceMemory, mapped: bool) {
        if memory == vk::DeviceMemory::null() {
            return;
        }
        unsafe {
            if mapped {
                self.device.unmap_memory(memory);
            }
            self.device.free_memory(memory, None);
        }
    }
}
