//! Memory type selection for host-written textures.
//!
//! Depth textures are written by the CPU through a persistent mapping, so
//! their memory must be host-visible. Host-coherent memory is preferred
//! because it needs no explicit flush after each write; plain host-visible
//! memory is accepted as a fallback.

use ash::vk;

use crate::error::{DepthError, DepthResult};

/// Memory type chosen for a host-written allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostVisibleMemory {
    /// Index into the device's memory type table.
    pub index: u32,
    /// Whether host writes become visible without a flush.
    pub coherent: bool,
}

/// Preference tiers, best first.
fn host_visible_tiers() -> [(vk::MemoryPropertyFlags, bool); 2] {
    [
        (
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
            true,
        ),
        (vk::MemoryPropertyFlags::HOST_VISIBLE, false),
    ]
}

/// Find the lowest memory type index allowed by `type_bits` whose property
/// flags contain `required`.
///
/// At most [`vk::MAX_MEMORY_TYPES`] entries are considered, even if the
/// reported count is larger.
pub fn select_memory_type(
    properties: &vk::PhysicalDeviceMemoryProperties,
    type_bits: u32,
    required: vk::MemoryPropertyFlags,
) -> DepthResult<u32> {
    let count = (properties.memory_type_count as usize).min(vk::MAX_MEMORY_TYPES);

    properties.memory_types[..count]
        .iter()
        .enumerate()
        .find(|(index, memory_type)| {
            type_bits & (1u32 << *index) != 0 && memory_type.property_flags.contains(required)
        })
        .map(|(index, _)| index as u32)
        .ok_or(DepthError::NoCompatibleMemoryType {
            type_bits,
            required,
        })
}

/// Select host-visible memory, preferring host-coherent types.
///
/// Returns [`DepthError::NoCompatibleMemoryType`] (carrying the plain
/// host-visible requirement) only if neither tier matches.
pub fn select_host_visible(
    properties: &vk::PhysicalDeviceMemoryProperties,
    type_bits: u32,
) -> DepthResult<HostVisibleMemory> {
    let mut last_error = None;
    for (required, coherent) in host_visible_tiers() {
        match select_memory_type(properties, type_bits, required) {
            Ok(index) => return Ok(HostVisibleMemory { index, coherent }),
            Err(e) => {
                log::trace!("memory tier {:?} unavailable: {}", required, e);
                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or(DepthError::NoCompatibleMemoryType {
        type_bits,
        required: vk::MemoryPropertyFlags::HOST_VISIBLE,
    }))
}

/// Build a memory property table from a list of per-type flags.
///
/// All types are placed in heap 0. Entries beyond [`vk::MAX_MEMORY_TYPES`]
/// are dropped.
pub fn memory_properties_from_flags(
    flags: &[vk::MemoryPropertyFlags],
) -> vk::PhysicalDeviceMemoryProperties {
    let mut properties = vk::PhysicalDeviceMemoryProperties::default();
    let count = flags.len().min(vk::MAX_MEMORY_TYPES);
    for (slot, &property_flags) in properties.memory_types.iter_mut().zip(&flags[..count]) {
        *slot = vk::MemoryType {
            property_flags,
            heap_index: 0,
        };
    }
    properties.memory_type_count = count as u32;
    properties.memory_heap_count = 1;
    properties.memory_heaps[0] = vk::MemoryHeap {
        size: 256 * 1024 * 1024,
        flags: vk::MemoryHeapFlags::empty(),
    };
    properties
}
