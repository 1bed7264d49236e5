//! One-shot command submission.

use ash::vk;

use crate::error::GraphicsError;

use super::vk_error;

/// Create the command pool used for blocking one-shot submissions.
pub fn create_command_pool(
    device: &ash::Device,
    queue_family_index: u32,
) -> Result<vk::CommandPool, GraphicsError> {
    let pool_info = vk::CommandPoolCreateInfo::default()
        .queue_family_index(queue_family_index)
        .flags(vk::CommandPoolCreateFlags::TRANSIENT);

    unsafe { device.create_command_pool(&pool_info, None) }.map_err(|e| {
        GraphicsError::InitializationFailed(format!("Failed to create command pool: {:?}", e))
    })
}

/// Record commands with `record`, submit them and wait until the queue is
/// idle. The command buffer is freed before returning, also on failure.
pub fn submit_and_wait(
    device: &ash::Device,
    pool: vk::CommandPool,
    queue: vk::Queue,
    record: impl FnOnce(vk::CommandBuffer),
) -> Result<(), GraphicsError> {
    let alloc_info = vk::CommandBufferAllocateInfo::default()
        .command_pool(pool)
        .level(vk::CommandBufferLevel::PRIMARY)
        .command_buffer_count(1);

    let buffers = unsafe { device.allocate_command_buffers(&alloc_info) }
        .map_err(|e| vk_error("allocate command buffer", e))?;
    let cmd = buffers[0];

    let result = (|| {
        let begin_info = vk::CommandBufferBeginInfo::default()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        unsafe { device.begin_command_buffer(cmd, &begin_info) }
            .map_err(|e| vk_error("begin command buffer", e))?;

        record(cmd);

        unsafe { device.end_command_buffer(cmd) }
            .map_err(|e| vk_error("end command buffer", e))?;

        let submit_info = vk::SubmitInfo::default().command_buffers(&buffers);
        unsafe { device.queue_submit(queue, &[submit_info], vk::Fence::null()) }
            .map_err(|e| vk_error("submit commands", e))?;
        unsafe { device.queue_wait_idle(queue) }.map_err(|e| vk_error("wait for queue", e))
    })();

    unsafe { device.free_command_buffers(pool, &buffers) };
    result
}
