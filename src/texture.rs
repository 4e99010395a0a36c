//! Host-mapped depth texture resources.
//!
//! A [`TextureResource`] owns one linear `R8_UNORM` image together with its
//! memory, persistent mapping, view and sampler. Creation is best effort:
//! every failing step is logged and leaves its handle null, and later steps
//! run only when the handles they need exist. A resource that didn't make it
//! all the way through is simply not [ready](TextureResource::is_ready).

use std::ptr::NonNull;
use std::sync::Arc;

use ash::vk;

use crate::backend::TextureDevice;
use crate::layout::TextureLayout;
use crate::memory::select_host_visible;

/// Snapshot of a depth texture for binding into descriptor sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureBinding {
    pub image: vk::Image,
    pub view: vk::ImageView,
    pub sampler: vk::Sampler,
    pub width: u32,
    pub height: u32,
    pub layout: TextureLayout,
    /// Image is in the general layout with host memory mapped.
    pub ready: bool,
    /// Incremented every time the underlying resource is recreated.
    pub generation: u64,
}

/// A depth texture and the GPU handles it exclusively owns.
pub struct TextureResource<D: TextureDevice> {
    device: Option<Arc<D>>,
    width: u32,
    height: u32,
    row_pitch: u64,
    row_offset: u64,
    image: vk::Image,
    memory: vk::DeviceMemory,
    view: vk::ImageView,
    sampler: vk::Sampler,
    mapped: Option<NonNull<u8>>,
    mapped_len: usize,
    coherent: bool,
    layout: TextureLayout,
}

// SAFETY: The mapped pointer refers to device memory owned exclusively by this
// resource; it is only dereferenced through `&mut self` or `&self` methods, and
// the resource is always accessed behind the provider's mutex.
unsafe impl<D: TextureDevice> Send for TextureResource<D> {}

impl<D: TextureDevice> TextureResource<D> {
    /// A resource with no handles.
    pub fn empty() -> Self {
        Self {
            device: None,
            width: 0,
            height: 0,
            row_pitch: 0,
            row_offset: 0,
            image: vk::Image::null(),
            memory: vk::DeviceMemory::null(),
            view: vk::ImageView::null(),
            sampler: vk::Sampler::null(),
            mapped: None,
            mapped_len: 0,
            coherent: false,
            layout: TextureLayout::Uninitialized,
        }
    }

    /// Create a `width`x`height` texture, mapped and transitioned to the
    /// general layout.
    ///
    /// Never fails outright. The returned resource keeps the requested
    /// dimensions even when creation fails partway.
    pub fn create(device: Arc<D>, width: u32, height: u32) -> Self {
        let mut texture = Self::empty();
        texture.width = width;
        texture.height = height;

        match device.create_image(width, height) {
            Ok(image) => {
                texture.image = image;
                texture.layout = TextureLayout::Preinitialized;
            }
            Err(e) => log::error!("Depth texture {}x{}: {}", width, height, e),
        }

        if texture.image != vk::Image::null() {
            let bound = texture.allocate_and_map(device.as_ref());

            let subresource = device.subresource_layout(texture.image);
            texture.row_pitch = subresource.row_pitch;
            texture.row_offset = subresource.offset;
            if texture.mapped.is_some() && texture.row_pitch < width as u64 {
                log::error!(
                    "Depth texture row pitch {} is smaller than width {}",
                    texture.row_pitch,
                    width
                );
            }

            // Barriers and views require an image with memory bound.
            if bound {
                match device.transition_layout(
                    texture.image,
                    TextureLayout::Preinitialized,
                    TextureLayout::General,
                ) {
                    Ok(()) => texture.layout = TextureLayout::General,
                    Err(e) => log::error!("Depth texture layout transition: {}", e),
                }

                match device.create_image_view(texture.image) {
                    Ok(view) => texture.view = view,
                    Err(e) => log::error!("Depth texture view: {}", e),
                }
            }
        }

        match device.create_sampler() {
            Ok(sampler) => texture.sampler = sampler,
            Err(e) => log::error!("Depth texture sampler: {}", e),
        }

        log::debug!(
            "Created {}x{} depth texture on {} (row pitch {}, ready: {})",
            width,
            height,
            device.name(),
            texture.row_pitch,
            texture.is_ready()
        );

        texture.device = Some(device);
        texture
    }

    /// Returns whether memory ended up bound to the image.
    fn allocate_and_map(&mut self, device: &D) -> bool {
        let requirements = device.image_memory_requirements(self.image);
        let selected =
            match select_host_visible(device.memory_properties(), requirements.memory_type_bits) {
                Ok(selected) => selected,
                Err(e) => {
                    log::error!("Depth texture memory: {}", e);
                    return false;
                }
            };

        match device.allocate_memory(requirements.size, selected.index) {
            Ok(memory) => {
                self.memory = memory;
                self.coherent = selected.coherent;
            }
            Err(e) => {
                log::error!("Depth texture memory: {}", e);
                return false;
            }
        }
        if !selected.coherent {
            log::debug!(
                "No host-coherent memory for depth texture, using type {}",
                selected.index
            );
        }

        if let Err(e) = device.bind_image_memory(self.image, self.memory) {
            log::error!("Depth texture memory: {}", e);
            return false;
        }

        match device.map_memory(self.memory, requirements.size) {
            Ok(ptr) => {
                self.mapped = Some(ptr);
                self.mapped_len = requirements.size as usize;
            }
            Err(e) => log::error!("Depth texture memory: {}", e),
        }
        true
    }

    /// Release every handle and reset every field to its empty value.
    ///
    /// Safe to call any number of times.
    pub fn release(&mut self) {
        if let Some(device) = self.device.take() {
            device.destroy_image_view(self.view);
            device.destroy_sampler(self.sampler);
            device.destroy_image(self.image);
            device.free_memory(self.memory, self.mapped.is_some());
        }

        // Reset in place; assigning a fresh value would re-enter Drop.
        self.width = 0;
        self.height = 0;
        self.row_pitch = 0;
        self.row_offset = 0;
        self.image = vk::Image::null();
        self.memory = vk::DeviceMemory::null();
        self.view = vk::ImageView::null();
        self.sampler = vk::Sampler::null();
        self.mapped = None;
        self.mapped_len = 0;
        self.coherent = false;
        self.layout = TextureLayout::Uninitialized;
    }

    /// Image is in the general layout and its memory is mapped.
    pub fn is_ready(&self) -> bool {
        self.layout == TextureLayout::General && self.mapped.is_some()
    }

    pub fn extent(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn row_pitch(&self) -> u64 {
        self.row_pitch
    }

    pub fn layout(&self) -> TextureLayout {
        self.layout
    }

    pub fn image(&self) -> vk::Image {
        self.image
    }

    pub fn memory(&self) -> vk::DeviceMemory {
        self.memory
    }

    pub fn is_mapped(&self) -> bool {
        self.mapped.is_some()
    }

    /// Handles are all null.
    pub fn is_empty(&self) -> bool {
        self.image == vk::Image::null()
            && self.memory == vk::DeviceMemory::null()
            && self.view == vk::ImageView::null()
            && self.sampler == vk::Sampler::null()
            && self.mapped.is_none()
    }

    /// Set every mapped byte, padding included, to `value`.
    pub fn fill(&mut self, value: u8) -> bool {
        let Some(mapped) = self.mapped else {
            return false;
        };
        // SAFETY: `mapped` covers `mapped_len` bytes of live, host-visible memory.
        unsafe { std::ptr::write_bytes(mapped.as_ptr(), value, self.mapped_len) };
        self.flush();
        true
    }

    /// Copy tightly packed rows into the mapped image, one row per
    /// `row_pitch`.
    ///
    /// `src` must hold at least `width * height` bytes. Returns false without
    /// touching memory if the texture is not mapped.
    pub fn upload(&mut self, src: &[u8]) -> bool {
        let Some(mapped) = self.mapped else {
            return false;
        };
        let width = self.width as usize;
        let height = self.height as usize;
        if width == 0 || height == 0 {
            return false;
        }
        if src.len() < width * height {
            log::warn!(
                "Depth upload of {} bytes into {}x{} texture",
                src.len(),
                width,
                height
            );
            return false;
        }

        let row_len = width.min(self.row_pitch as usize);
        for (y, row) in src.chunks_exact(width).take(height).enumerate() {
            let start = self.row_offset as usize + y * self.row_pitch as usize;
            if start + row_len > self.mapped_len {
                log::error!("Depth upload row {} exceeds mapped memory", y);
                break;
            }
            // SAFETY: the destination range was bounds-checked against the
            // mapping above and cannot overlap the caller's slice.
            unsafe {
                std::ptr::copy_nonoverlapping(row.as_ptr(), mapped.as_ptr().add(start), row_len);
            }
        }

        self.flush();
        true
    }

    /// Read back a texel through the mapping.
    pub fn texel(&self, x: u32, y: u32) -> Option<u8> {
        let mapped = self.mapped?;
        if x >= self.width || y >= self.height || x as u64 >= self.row_pitch {
            return None;
        }
        let offset = (self.row_offset + y as u64 * self.row_pitch + x as u64) as usize;
        if offset >= self.mapped_len {
            return None;
        }
        // SAFETY: offset is within the mapping.
        Some(unsafe { *mapped.as_ptr().add(offset) })
    }

    fn flush(&self) {
        if self.coherent {
            return;
        }
        if let Some(device) = &self.device {
            if let Err(e) = device.flush_mapped_memory(self.memory) {
                log::error!("Depth texture flush: {}", e);
            }
        }
    }

    pub fn binding(&self, generation: u64) -> TextureBinding {
        TextureBinding {
            image: self.image,
            view: self.view,
            sampler: self.sampler,
            width: self.width,
            height: self.height,
            layout: self.layout,
            ready: self.is_ready(),
            generation,
        }
    }
}

impl<D: TextureDevice> Default for TextureResource<D> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<D: TextureDevice> Drop for TextureResource<D> {
    fn drop(&mut self) {
        self.release();
    }
}
