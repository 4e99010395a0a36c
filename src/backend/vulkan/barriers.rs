//! Image barrier recording for depth texture layout transitions.

use ash::vk;

use crate::layout::{TextureLayout, TransitionMasks};

/// Subresource range covering the single color mip and layer of a depth
/// texture.
pub fn color_subresource_range() -> vk::ImageSubresourceRange {
    vk::ImageSubresourceRange {
        aspect_mask: vk::ImageAspectFlags::COLOR,
        base_mip_level: 0,
        level_count: 1,
        base_array_layer: 0,
        layer_count: 1,
    }
}

/// Build the image memory barrier for a layout transition.
pub fn layout_barrier(
    image: vk::Image,
    old: TextureLayout,
    new: TextureLayout,
    masks: &TransitionMasks,
) -> vk::ImageMemoryBarrier<'static> {
    vk::ImageMemoryBarrier::default()
        .old_layout(old.to_vk())
        .new_layout(new.to_vk())
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .image(image)
        .subresource_range(color_subresource_range())
        .src_access_mask(masks.src_access_mask)
        .dst_access_mask(masks.dst_access_mask)
}

/// Record a single layout transition into `cmd`.
pub fn record_layout_transition(
    device: &ash::Device,
    cmd: vk::CommandBuffer,
    image: vk::Image,
    old: TextureLayout,
    new: TextureLayout,
) {
    let masks = TransitionMasks::for_transition(old, new);
    let barrier = layout_barrier(image, old, new, &masks);

    unsafe {
        device.cmd_pipeline_barrier(
            cmd,
            masks.src_stage,
            masks.dst_stage,
            vk::DependencyFlags::empty(),
            &[],
            &[],
            &[barrier],
        );
    }
}
