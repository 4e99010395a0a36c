//! One-shot command recording for the Vulkan backend.

use ash::vk;

use crate::error::{DepthError, DepthResult};

/// A transient command pool with a single primary command buffer.
///
/// The buffer is in the recording state after [`OneShotCommands::begin`].
/// Dropping frees the buffer and destroys the pool, whether or not the
/// commands were submitted.
pub struct OneShotCommands<'a> {
    device: &'a ash::Device,
    pool: vk::CommandPool,
    buffer: vk::CommandBuffer,
}

impl<'a> OneShotCommands<'a> {
    /// Create a pool on `queue_family_index` and begin recording.
    pub fn begin(device: &'a ash::Device, queue_family_index: u32) -> DepthResult<Self> {
        let pool_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(queue_family_index)
            .flags(vk::CommandPoolCreateFlags::TRANSIENT);

        let pool = unsafe { device.create_command_pool(&pool_info, None) }.map_err(|e| {
            DepthError::SubmissionFailed(format!("Failed to create command pool: {:?}", e))
        })?;

        // From here on, Drop owns the pool.
        let mut commands = Self {
            device,
            pool,
            buffer: vk::CommandBuffer::null(),
        };

        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);

        let buffers = unsafe { device.allocate_command_buffers(&alloc_info) }.map_err(|e| {
            DepthError::SubmissionFailed(format!("Failed to allocate command buffer: {:?}", e))
        })?;
        commands.buffer = buffers
            .first()
            .copied()
            .ok_or_else(|| DepthError::SubmissionFailed("No command buffer allocated".into()))?;

        let begin_info = vk::CommandBufferBeginInfo::default()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);

        unsafe { device.begin_command_buffer(commands.buffer, &begin_info) }.map_err(|e| {
            DepthError::SubmissionFailed(format!("Failed to begin command buffer: {:?}", e))
        })?;

        Ok(commands)
    }

    pub fn buffer(&self) -> vk::CommandBuffer {
        self.buffer
    }

    /// End recording, submit to `queue` and wait for the queue to go idle.
    pub fn submit_and_wait(self, queue: vk::Queue) -> DepthResult<()> {
        unsafe {
            self.device.end_command_buffer(self.buffer).map_err(|e| {
                DepthError::SubmissionFailed(format!("Failed to end command buffer: {:?}", e))
            })?;

            let buffers = [self.buffer];
            let submit_info = vk::SubmitInfo::default().command_buffers(&buffers);

            self.device
                .queue_submit(queue, &[submit_info], vk::Fence::null())
                .map_err(|e| {
                    DepthError::SubmissionFailed(format!("Failed to submit commands: {:?}", e))
                })?;

            self.device.queue_wait_idle(queue).map_err(|e| {
                DepthError::SubmissionFailed(format!("Failed to wait for queue: {:?}", e))
            })?;
        }
        Ok(())
    }
}

impl Drop for OneShotCommands<'_> {
    fn drop(&mut self) {
        unsafe {
            if self.buffer != vk::CommandBuffer::null() {
                self.device.free_command_buffers(self.pool, &[self.buffer]);
            }
            self.device.destroy_command_pool(self.pool, None);
        }
    }
}
