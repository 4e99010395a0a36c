//! Image layout states and transition barrier masks.
//!
//! Depth textures only ever pass through three layouts: they start
//! uninitialized, are created preinitialized so the host can write linear
//! texels before the first transition, and then live in the general layout
//! where both host writes and shader sampling are allowed.

use ash::vk;

/// Layout states a depth texture can be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureLayout {
    /// No image exists yet, or its contents are undefined.
    #[default]
    Uninitialized,
    /// Freshly created linear image, writable by the host.
    Preinitialized,
    /// Host-writable and shader-readable.
    General,
}

impl TextureLayout {
    /// Convert to Vulkan image layout.
    pub fn to_vk(self) -> vk::ImageLayout {
        match self {
            Self::Uninitialized => vk::ImageLayout::UNDEFINED,
            Self::Preinitialized => vk::ImageLayout::PREINITIALIZED,
            Self::General => vk::ImageLayout::GENERAL,
        }
    }
}

/// Access and stage masks for a single image barrier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionMasks {
    pub src_access_mask: vk::AccessFlags,
    pub dst_access_mask: vk::AccessFlags,
    pub src_stage: vk::PipelineStageFlags,
    pub dst_stage: vk::PipelineStageFlags,
}

impl TransitionMasks {
    /// Choose barrier masks for a layout transition.
    ///
    /// Preinitialized to general makes host writes visible to fragment shader
    /// reads. Every other transition gets an empty top-to-bottom barrier that
    /// only orders the layout change.
    pub fn for_transition(old: TextureLayout, new: TextureLayout) -> Self {
        match (old, new) {
            (TextureLayout::Preinitialized, TextureLayout::General) => Self {
                src_access_mask: vk::AccessFlags::HOST_WRITE,
                dst_access_mask: vk::AccessFlags::SHADER_READ,
                src_stage: vk::PipelineStageFlags::HOST,
                dst_stage: vk::PipelineStageFlags::FRAGMENT_SHADER,
            },
            _ => Self {
                src_access_mask: vk::AccessFlags::empty(),
                dst_access_mask: vk::AccessFlags::empty(),
                src_stage: vk::PipelineStageFlags::TOP_OF_PIPE,
                dst_stage: vk::PipelineStageFlags::BOTTOM_OF_PIPE,
            },
        }
    }
}
