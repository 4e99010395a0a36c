//! Dummy texture device for testing and development.
//!
//! This device doesn't talk to a GPU. Images and allocations live in host
//! memory, so tests can read back exactly what a shader would sample, inject
//! failures at any creation step, and describe arbitrary memory type tables
//! and row alignments.

use std::collections::{HashMap, HashSet};
use std::ptr::NonNull;

use ash::vk;
use ash::vk::Handle;
use parking_lot::Mutex;

use crate::error::{DepthError, DepthResult};
use crate::layout::{TextureLayout, TransitionMasks};
use crate::memory::memory_properties_from_flags;

use super::TextureDevice;

/// Device operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailurePoint {
    CreateImage,
    AllocateMemory,
    BindMemory,
    MapMemory,
    Transition,
    CreateImageView,
    CreateSampler,
}

/// A layout transition submitted to the dummy device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionRecord {
    pub image: vk::Image,
    pub old: TextureLayout,
    pub new: TextureLayout,
    pub masks: TransitionMasks,
}

/// Counts of resources that have been created and not yet destroyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LiveResources {
    pub images: usize,
    pub memories: usize,
    pub views: usize,
    pub samplers: usize,
}

impl LiveResources {
    pub fn total(&self) -> usize {
        self.images + self.memories + self.views + self.samplers
    }
}

struct DummyImage {
    width: u32,
    height: u32,
    row_pitch: u64,
    memory: Option<u64>,
    layout: TextureLayout,
}

struct DummyMemory {
    bytes: Box<[u8]>,
    memory_type_index: u32,
    mapped: bool,
}

#[derive(Default)]
struct DummyState {
    next_handle: u64,
    images: HashMap<u64, DummyImage>,
    memories: HashMap<u64, DummyMemory>,
    views: HashSet<u64>,
    samplers: HashSet<u64>,
    transitions: Vec<TransitionRecord>,
    flushes: usize,
    failures: HashSet<FailurePoint>,
}

impl DummyState {
    fn allocate_handle(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }

    fn check(&self, point: FailurePoint) -> DepthResult<()> {
        if self.failures.contains(&point) {
            log::trace!("DummyDevice: injected failure at {:?}", point);
            return Err(DepthError::ResourceCreationFailed(format!(
                "injected failure at {point:?}"
            )));
        }
        Ok(())
    }
}

/// Host-memory texture device.
pub struct DummyDevice {
    memory_properties: vk::PhysicalDeviceMemoryProperties,
    image_memory_type_bits: u32,
    row_alignment: u64,
    state: Mutex<DummyState>,
}

impl std::fmt::Debug for DummyDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DummyDevice")
            .field("image_memory_type_bits", &self.image_memory_type_bits)
            .field("row_alignment", &self.row_alignment)
            .finish_non_exhaustive()
    }
}

impl DummyDevice {
    /// Create a dummy device with a device-local type, a host-coherent type
    /// and a host-cached type, and 64-byte row alignment.
    pub fn new() -> Self {
        Self {
            memory_properties: memory_properties_from_flags(&[
                vk::MemoryPropertyFlags::DEVICE_LOCAL,
                vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
                vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_CACHED,
            ]),
            image_memory_type_bits: u32::MAX,
            row_alignment: 64,
            state: Mutex::new(DummyState::default()),
        }
    }

    /// Replace the memory type table.
    pub fn with_memory_types(mut self, flags: &[vk::MemoryPropertyFlags]) -> Self {
        self.memory_properties = memory_properties_from_flags(flags);
        self
    }

    /// Restrict which memory types images may be bound to.
    pub fn with_image_memory_type_bits(mut self, bits: u32) -> Self {
        self.image_memory_type_bits = bits;
        self
    }

    /// Set the row pitch alignment of linear images. Zero is treated as one.
    pub fn with_row_alignment(mut self, alignment: u64) -> Self {
        self.row_alignment = alignment.max(1);
        self
    }

    /// Make an operation fail from construction on.
    pub fn with_failure(self, point: FailurePoint) -> Self {
        self.set_failure(point, true);
        self
    }

    /// Enable or disable an injected failure.
    pub fn set_failure(&self, point: FailurePoint, enabled: bool) {
        let mut state = self.state.lock();
        if enabled {
            state.failures.insert(point);
        } else {
            state.failures.remove(&point);
        }
    }

    /// Read a texel of an image as the device would sample it.
    ///
    /// Returns `None` if the image is unknown, unbound, or the coordinate is
    /// out of range.
    pub fn texel(&self, image: vk::Image, x: u32, y: u32) -> Option<u8> {
        let state = self.state.lock();
        let image = state.images.get(&image.as_raw())?;
        if x >= image.width || y >= image.height {
            return None;
        }
        let memory = state.memories.get(&image.memory?)?;
        let offset = y as u64 * image.row_pitch + x as u64;
        memory.bytes.get(offset as usize).copied()
    }

    /// Current layout of an image.
    pub fn image_layout(&self, image: vk::Image) -> Option<TextureLayout> {
        let state = self.state.lock();
        state.images.get(&image.as_raw()).map(|image| image.layout)
    }

    /// Memory type index backing an image.
    pub fn memory_type_of(&self, image: vk::Image) -> Option<u32> {
        let state = self.state.lock();
        let memory = state.images.get(&image.as_raw())?.memory?;
        state
            .memories
            .get(&memory)
            .map(|memory| memory.memory_type_index)
    }

    /// All transitions submitted so far, oldest first.
    pub fn transitions(&self) -> Vec<TransitionRecord> {
        self.state.lock().transitions.clone()
    }

    /// Number of flushes of non-coherent mappings.
    pub fn flush_count(&self) -> usize {
        self.state.lock().flushes
    }

    /// Resources currently alive on the device.
    pub fn live_resources(&self) -> LiveResources {
        let state = self.state.lock();
        LiveResources {
            images: state.images.len(),
            memories: state.memories.len(),
            views: state.views.len(),
            samplers: state.samplers.len(),
        }
    }

    fn row_pitch_for(&self, width: u32) -> u64 {
        (width as u64).div_ceil(self.row_alignment) * self.row_alignment
    }
}

impl Default for DummyDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl TextureDevice for DummyDevice {
    fn name(&self) -> &'static str {
        "Dummy"
    }

    fn memory_properties(&self) -> &vk::PhysicalDeviceMemoryProperties {
        &self.memory_properties
    }

    fn create_image(&self, width: u32, height: u32) -> DepthResult<vk::Image> {
        let mut state = self.state.lock();
        state.check(FailurePoint::CreateImage)?;
        if width == 0 || height == 0 {
            return Err(DepthError::ResourceCreationFailed(format!(
                "zero-sized image {width}x{height}"
            )));
        }

        let handle = state.allocate_handle();
        state.images.insert(
            handle,
            DummyImage {
                width,
                height,
                row_pitch: self.row_pitch_for(width),
                memory: None,
                layout: TextureLayout::Preinitialized,
            },
        );
        log::trace!("DummyDevice: created image {handle} ({width}x{height})");
        Ok(vk::Image::from_raw(handle))
    }

    fn image_memory_requirements(&self, image: vk::Image) -> vk::MemoryRequirements {
        let state = self.state.lock();
        let size = state
            .images
            .get(&image.as_raw())
            .map(|image| image.row_pitch * image.height as u64)
            .unwrap_or(0);
        vk::MemoryRequirements {
            size,
            alignment: self.row_alignment,
            memory_type_bits: self.image_memory_type_bits,
        }
    }

    fn allocate_memory(
        &self,
        size: vk::DeviceSize,
        memory_type_index: u32,
    ) -> DepthResult<vk::DeviceMemory> {
        let mut state = self.state.lock();
        state.check(FailurePoint::AllocateMemory)?;
        if memory_type_index >= self.memory_properties.memory_type_count {
            return Err(DepthError::ResourceCreationFailed(format!(
                "memory type {memory_type_index} out of range"
            )));
        }

        let handle = state.allocate_handle();
        state.memories.insert(
            handle,
            DummyMemory {
                bytes: vec![0; size as usize].into_boxed_slice(),
                memory_type_index,
                mapped: false,
            },
        );
        Ok(vk::DeviceMemory::from_raw(handle))
    }

    fn bind_image_memory(&self, image: vk::Image, memory: vk::DeviceMemory) -> DepthResult<()> {
        let mut state = self.state.lock();
        state.check(FailurePoint::BindMemory)?;
        if !state.memories.contains_key(&memory.as_raw()) {
            return Err(DepthError::ResourceCreationFailed(
                "unknown memory".to_string(),
            ));
        }
        let image = state
            .images
            .get_mut(&image.as_raw())
            .ok_or_else(|| DepthError::ResourceCreationFailed("unknown image".to_string()))?;
        image.memory = Some(memory.as_raw());
        Ok(())
    }

    fn map_memory(
        &self,
        memory: vk::DeviceMemory,
        size: vk::DeviceSize,
    ) -> DepthResult<NonNull<u8>> {
        let mut state = self.state.lock();
        state.check(FailurePoint::MapMemory)?;
        let memory_types = self.memory_properties.memory_types;
        let memory = state
            .memories
            .get_mut(&memory.as_raw())
            .ok_or_else(|| DepthError::MapFailed("unknown memory".to_string()))?;

        let flags = memory_types[memory.memory_type_index as usize].property_flags;
        if !flags.contains(vk::MemoryPropertyFlags::HOST_VISIBLE) {
            return Err(DepthError::MapFailed(
                "memory is not host-visible".to_string(),
            ));
        }
        if size as usize > memory.bytes.len() {
            return Err(DepthError::MapFailed(format!(
                "mapping {size} bytes of a {} byte allocation",
                memory.bytes.len()
            )));
        }

        memory.mapped = true;
        NonNull::new(memory.bytes.as_mut_ptr())
            .ok_or_else(|| DepthError::MapFailed("empty allocation".to_string()))
    }

    fn flush_mapped_memory(&self, memory: vk::DeviceMemory) -> DepthResult<()> {
        let mut state = self.state.lock();
        let mapped = state
            .memories
            .get(&memory.as_raw())
            .is_some_and(|memory| memory.mapped);
        if !mapped {
            return Err(DepthError::MapFailed(
                "flushing unmapped memory".to_string(),
            ));
        }
        state.flushes += 1;
        Ok(())
    }

    fn subresource_layout(&self, image: vk::Image) -> vk::SubresourceLayout {
        let state = self.state.lock();
        state
            .images
            .get(&image.as_raw())
            .map(|image| vk::SubresourceLayout {
                offset: 0,
                size: image.row_pitch * image.height as u64,
                row_pitch: image.row_pitch,
                array_pitch: 0,
                depth_pitch: 0,
            })
            .unwrap_or_default()
    }

    fn transition_layout(
        &self,
        image: vk::Image,
        old: TextureLayout,
        new: TextureLayout,
    ) -> DepthResult<()> {
        let mut state = self.state.lock();
        state.check(FailurePoint::Transition)?;
        let entry = state
            .images
            .get_mut(&image.as_raw())
            .ok_or_else(|| DepthError::SubmissionFailed("unknown image".to_string()))?;
        if entry.layout != old {
            log::warn!(
                "DummyDevice: transition from {:?} but image is {:?}",
                old,
                entry.layout
            );
        }
        entry.layout = new;
        state.transitions.push(TransitionRecord {
            image,
            old,
            new,
            masks: TransitionMasks::for_transition(old, new),
        });
        Ok(())
    }

    fn create_image_view(&self, image: vk::Image) -> DepthResult<vk::ImageView> {
        let mut state = self.state.lock();
        state.check(FailurePoint::CreateImageView)?;
        if !state.images.contains_key(&image.as_raw()) {
            return Err(DepthError::ResourceCreationFailed(
                "view of unknown image".to_string(),
            ));
        }
        let handle = state.allocate_handle();
        state.views.insert(handle);
        Ok(vk::ImageView::from_raw(handle))
    }

    fn create_sampler(&self) -> DepthResult<vk::Sampler> {
        let mut state = self.state.lock();
        state.check(FailurePoint::CreateSampler)?;
        let handle = state.allocate_handle();
        state.samplers.insert(handle);
        Ok(vk::Sampler::from_raw(handle))
    }

    fn destroy_image_view(&self, view: vk::ImageView) {
        if view != vk::ImageView::null() {
            self.state.lock().views.remove(&view.as_raw());
        }
    }

    fn destroy_sampler(&self, sampler: vk::Sampler) {
        if sampler != vk::Sampler::null() {
            self.state.lock().samplers.remove(&sampler.as_raw());
        }
    }

    fn destroy_image(&self, image: vk::Image) {
        if image != vk::Image::null() {
            self.state.lock().images.remove(&image.as_raw());
        }
    }

    fn free_memory(&self, memory: vk::DeviceMemory, mapped: bool) {
        if memory == vk::DeviceMemory::null() {
            return;
        }
        let mut state = self.state.lock();
        if let Some(entry) = state.memories.get(&memory.as_raw()) {
            if entry.mapped != mapped {
                log::warn!("DummyDevice: freeing memory with mismatched mapping state");
            }
        }
        state.memories.remove(&memory.as_raw());
        // Images bound to freed memory can no longer be read back.
        for image in state.images.values_mut() {
            if image.memory == Some(memory.as_raw()) {
                image.memory = None;
            }
        }
    }
}
