//! GPU memory through gpu-allocator.

use std::sync::Arc;

use ash::vk;
use gpu_allocator::MemoryLocation;
use gpu_allocator::vulkan::{
    Allocation, AllocationCreateDesc, AllocationScheme, Allocator, AllocatorCreateDesc,
};
use parking_lot::Mutex;

use crate::error::GraphicsError;

use super::VulkanContext;

/// Create a memory allocator for the Vulkan device.
pub fn create_allocator(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    device: ash::Device,
) -> Result<Allocator, GraphicsError> {
    Allocator::new(&AllocatorCreateDesc {
        instance: instance.clone(),
        device,
        physical_device,
        debug_settings: Default::default(),
        buffer_device_address: false,
        allocation_sizes: gpu_allocator::AllocationSizes::default(),
    })
    .map_err(|e| {
        GraphicsError::InitializationFailed(format!("Failed to create memory allocator: {}", e))
    })
}

/// Map an allocator failure to a graphics error.
pub fn allocation_error(what: &str, error: gpu_allocator::AllocationError) -> GraphicsError {
    match error {
        gpu_allocator::AllocationError::OutOfMemory => GraphicsError::OutOfMemory,
        other => GraphicsError::ResourceCreationFailed(format!(
            "Failed to allocate {} memory: {}",
            what, other
        )),
    }
}

/// A buffer with bound memory, destroyed on drop.
pub struct VulkanBuffer {
    context: Arc<VulkanContext>,
    buffer: vk::Buffer,
    allocation: Mutex<Option<Allocation>>,
    size: u64,
}

impl VulkanBuffer {
    /// Create a buffer of `size` bytes in `location`.
    pub fn new(
        context: &Arc<VulkanContext>,
        name: &str,
        size: u64,
        usage: vk::BufferUsageFlags,
        location: MemoryLocation,
    ) -> Result<Self, GraphicsError> {
        let device = context.device();
        let buffer_info = vk::BufferCreateInfo::default()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe { device.create_buffer(&buffer_info, None) }.map_err(|e| {
            GraphicsError::ResourceCreationFailed(format!("Failed to create buffer: {:?}", e))
        })?;

        let requirements = unsafe { device.get_buffer_memory_requirements(buffer) };
        let allocation = context.allocate(&AllocationCreateDesc {
            name,
            requirements,
            location,
            linear: true,
            allocation_scheme: AllocationScheme::GpuAllocatorManaged,
        });
        let allocation = match allocation {
            Ok(allocation) => allocation,
            Err(e) => {
                unsafe { device.destroy_buffer(buffer, None) };
                return Err(allocation_error("buffer", e));
            }
        };

        if let Err(e) =
            unsafe { device.bind_buffer_memory(buffer, allocation.memory(), allocation.offset()) }
        {
            context.free_allocation(allocation);
            unsafe { device.destroy_buffer(buffer, None) };
            return Err(GraphicsError::ResourceCreationFailed(format!(
                "Failed to bind buffer memory: {:?}",
                e
            )));
        }

        Ok(Self {
            context: Arc::clone(context),
            buffer,
            allocation: Mutex::new(Some(allocation)),
            size,
        })
    }

    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Copy `data` into a host-visible buffer at `offset`.
    pub fn write_mapped(&self, offset: usize, data: &[u8]) -> Result<(), GraphicsError> {
        let mut allocation = self.allocation.lock();
        let slice = allocation
            .as_mut()
            .and_then(|allocation| allocation.mapped_slice_mut())
            .ok_or_else(|| GraphicsError::Internal("buffer is not host visible".to_string()))?;
        let end = offset + data.len();
        if end > slice.len() {
            return Err(GraphicsError::Internal(format!(
                "mapped write of {} bytes at {} exceeds {} bytes",
                data.len(),
                offset,
                slice.len()
            )));
        }
        slice[offset..end].copy_from_slice(data);
        Ok(())
    }

    /// Copy the contents of a host-visible buffer out.
    pub fn read_mapped(&self) -> Result<Vec<u8>, GraphicsError> {
        let allocation = self.allocation.lock();
        allocation
            .as_ref()
            .and_then(|allocation| allocation.mapped_slice())
            .map(|slice| slice[..self.size as usize].to_vec())
            .ok_or_else(|| GraphicsError::Internal("buffer is not host visible".to_string()))
    }
}

impl Drop for VulkanBuffer {
    fn drop(&mut self) {
        unsafe { self.context.device().destroy_buffer(self.buffer, None) };
        if let Some(allocation) = self.allocation.lock().take() {
            self.context.free_allocation(allocation);
        }
    }
}

impl std::fmt::Debug for VulkanBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VulkanBuffer")
            .field("buffer", &self.buffer)
            .field("size", &self.size)
            .finish()
    }
}
