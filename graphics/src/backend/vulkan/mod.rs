//! Native Vulkan backend implementation using ash.
//!
//! The backend is headless: it creates descriptor set layouts, pools,
//! uniform buffers, images and samplers, and performs blocking one-shot
//! uploads. Draw recording and presentation are left to the caller, who
//! reads descriptor sets back through [`VulkanShaderObject::descriptor_set`].

mod allocator;
mod command;
pub(crate) mod conversion;
mod debug;
mod device;
mod instance;
mod layout;
mod object;

use std::mem::ManuallyDrop;
use std::sync::Arc;

use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme, Allocator};
use parking_lot::Mutex;
use prism_core::profiling::profile_scope;

use crate::binding::BindingLayout;
use crate::error::GraphicsError;
use crate::instance::InstanceParameters;
use crate::resources::ShaderObjectLayout;
use crate::types::{SamplerDescriptor, TextureDescriptor};

use super::{GpuBackend, GpuObjectLayout, GpuSampler, GpuShaderObject, GpuTexture};

pub use allocator::VulkanBuffer;
pub use device::DeviceFeatures;
pub use layout::VulkanObjectLayout;
pub use object::VulkanShaderObject;

use self::conversion::{
    convert_address_mode, convert_compare_function, convert_filter_mode,
    convert_mipmap_filter_mode, convert_texture_format, convert_texture_usage,
};

/// Map a Vulkan result code to a graphics error.
pub(crate) fn vk_error(what: &str, result: vk::Result) -> GraphicsError {
    match result {
        vk::Result::ERROR_OUT_OF_HOST_MEMORY | vk::Result::ERROR_OUT_OF_DEVICE_MEMORY => {
            GraphicsError::OutOfMemory
        }
        vk::Result::ERROR_DEVICE_LOST => GraphicsError::DeviceLost,
        other => GraphicsError::ResourceCreationFailed(format!("Failed to {}: {:?}", what, other)),
    }
}

/// Vulkan objects shared by every resource of one backend.
///
/// Resources hold an `Arc` to the context, so the device outlives all of
/// them and is destroyed with the last one.
pub struct VulkanContext {
    /// Keeps the Vulkan loader alive.
    entry: ash::Entry,
    instance: ash::Instance,
    debug_utils: Option<ash::ext::debug_utils::Instance>,
    debug_messenger: Option<vk::DebugUtilsMessengerEXT>,
    physical_device: vk::PhysicalDevice,
    device: ash::Device,
    queue: vk::Queue,
    queue_family: u32,
    device_name: String,
    features: DeviceFeatures,
    /// Dropped by hand before the device is destroyed.
    allocator: ManuallyDrop<Mutex<Allocator>>,
    /// Pool for blocking one-shot submissions. The lock also serializes
    /// access to the queue.
    immediate_pool: Mutex<vk::CommandPool>,
}

impl VulkanContext {
    fn new(params: &InstanceParameters) -> Result<Self, GraphicsError> {
        let entry = unsafe { ash::Entry::load() }.map_err(|e| {
            GraphicsError::BackendUnavailable(format!("Failed to load Vulkan: {}", e))
        })?;

        let created = instance::create_instance(&entry, params)?;
        let selected = device::select_physical_device(&created.instance)?;
        let device = device::create_logical_device(&created.instance, &selected)?;
        let queue = unsafe { device.get_device_queue(selected.queue_family, 0) };

        let allocator =
            allocator::create_allocator(&created.instance, selected.physical_device, device.clone())?;
        let immediate_pool = command::create_command_pool(&device, selected.queue_family)?;

        log::info!(
            "Vulkan device {:?} initialized (validation: {})",
            selected.name,
            created.debug_messenger.is_some()
        );

        Ok(Self {
            entry,
            instance: created.instance,
            debug_utils: created.debug_utils,
            debug_messenger: created.debug_messenger,
            physical_device: selected.physical_device,
            device,
            queue,
            queue_family: selected.queue_family,
            device_name: selected.name,
            features: selected.features,
            allocator: ManuallyDrop::new(Mutex::new(allocator)),
            immediate_pool: Mutex::new(immediate_pool),
        })
    }

    pub fn entry(&self) -> &ash::Entry {
        &self.entry
    }

    pub fn instance(&self) -> &ash::Instance {
        &self.instance
    }

    pub fn device(&self) -> &ash::Device {
        &self.device
    }

    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    pub fn queue_family(&self) -> u32 {
        self.queue_family
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn features(&self) -> DeviceFeatures {
        self.features
    }

    /// Allocate device memory.
    pub fn allocate(
        &self,
        desc: &AllocationCreateDesc<'_>,
    ) -> Result<Allocation, gpu_allocator::AllocationError> {
        self.allocator.lock().allocate(desc)
    }

    /// Return memory to the allocator.
    pub fn free_allocation(&self, allocation: Allocation) {
        if let Err(e) = self.allocator.lock().free(allocation) {
            log::warn!("Failed to free GPU allocation: {}", e);
        }
    }

    /// Record commands, submit them and block until the device has executed
    /// them.
    pub fn submit_immediate(
        &self,
        record: impl FnOnce(vk::CommandBuffer),
    ) -> Result<(), GraphicsError> {
        profile_scope!("vulkan_submit_immediate");
        let pool = self.immediate_pool.lock();
        command::submit_and_wait(&self.device, *pool, self.queue, record)
    }
}

impl Drop for VulkanContext {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();

            self.device
                .destroy_command_pool(*self.immediate_pool.get_mut(), None);

            // The allocator frees its memory blocks through the device.
            ManuallyDrop::drop(&mut self.allocator);

            self.device.destroy_device(None);

            if let (Some(debug_utils), Some(messenger)) = (&self.debug_utils, self.debug_messenger)
            {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }

            self.instance.destroy_instance(None);
        }
    }
}

impl std::fmt::Debug for VulkanContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VulkanContext")
            .field("device_name", &self.device_name)
            .field("queue_family", &self.queue_family)
            .field("features", &self.features)
            .finish_non_exhaustive()
    }
}

/// Vulkan-based GPU backend using ash.
///
/// This backend provides native Vulkan access with:
/// - Validation layers routed into `log` when requested
/// - gpu-allocator for memory management
/// - Growable descriptor pools per shader object layout
#[derive(Debug)]
pub struct VulkanBackend {
    context: Arc<VulkanContext>,
}

impl VulkanBackend {
    /// Create a new Vulkan backend.
    ///
    /// This initializes the Vulkan instance, selects a physical device,
    /// creates a logical device, and sets up the memory allocator.
    pub fn with_params(params: &InstanceParameters) -> Result<Self, GraphicsError> {
        Ok(Self {
            context: Arc::new(VulkanContext::new(params)?),
        })
    }

    pub fn context(&self) -> &Arc<VulkanContext> {
        &self.context
    }
}

impl GpuBackend for VulkanBackend {
    fn name(&self) -> &'static str {
        "Vulkan Backend (ash)"
    }

    fn create_texture(&self, descriptor: &TextureDescriptor) -> Result<GpuTexture, GraphicsError> {
        profile_scope!("vulkan_create_texture");
        let device = self.context.device();
        let format = convert_texture_format(descriptor.format);
        let usage = convert_texture_usage(descriptor.usage);

        let (image_type, view_type) = if descriptor.size.depth > 1 {
            (vk::ImageType::TYPE_3D, vk::ImageViewType::TYPE_3D)
        } else {
            (vk::ImageType::TYPE_2D, vk::ImageViewType::TYPE_2D)
        };
        let extent = vk::Extent3D {
            width: descriptor.size.width,
            height: descriptor.size.height,
            depth: descriptor.size.depth.max(1),
        };

        let image_info = vk::ImageCreateInfo::default()
            .image_type(image_type)
            .format(format)
            .extent(extent)
            .mip_levels(descriptor.mip_level_count)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        let image = unsafe { device.create_image(&image_info, None) }.map_err(|e| {
            GraphicsError::ResourceCreationFailed(format!("Failed to create image: {:?}", e))
        })?;

        let requirements = unsafe { device.get_image_memory_requirements(image) };
        let allocation = match self.context.allocate(&AllocationCreateDesc {
            name: descriptor.label.as_deref().unwrap_or("texture"),
            requirements,
            location: gpu_allocator::MemoryLocation::GpuOnly,
            linear: false,
            allocation_scheme: AllocationScheme::GpuAllocatorManaged,
        }) {
            Ok(allocation) => allocation,
            Err(e) => {
                unsafe { device.destroy_image(image, None) };
                return Err(allocator::allocation_error("texture", e));
            }
        };

        if let Err(e) =
            unsafe { device.bind_image_memory(image, allocation.memory(), allocation.offset()) }
        {
            self.context.free_allocation(allocation);
            unsafe { device.destroy_image(image, None) };
            return Err(GraphicsError::ResourceCreationFailed(format!(
                "Failed to bind image memory: {:?}",
                e
            )));
        }

        let aspect_mask = if descriptor.format.is_depth() {
            vk::ImageAspectFlags::DEPTH
        } else {
            vk::ImageAspectFlags::COLOR
        };
        let subresource_range = vk::ImageSubresourceRange {
            aspect_mask,
            base_mip_level: 0,
            level_count: descriptor.mip_level_count,
            base_array_layer: 0,
            layer_count: 1,
        };
        let layout = if descriptor.is_storage() {
            vk::ImageLayout::GENERAL
        } else {
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL
        };

        // From here on the texture owns the image and its memory, so early
        // returns clean up through its Drop.
        let mut texture = GpuTexture::Vulkan {
            context: Arc::clone(&self.context),
            image,
            view: vk::ImageView::null(),
            allocation: Mutex::new(Some(allocation)),
            format,
            extent,
            layout,
        };

        let view_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(view_type)
            .format(format)
            .components(vk::ComponentMapping::default())
            .subresource_range(subresource_range);
        let new_view = unsafe { device.create_image_view(&view_info, None) }.map_err(|e| {
            GraphicsError::ResourceCreationFailed(format!("Failed to create image view: {:?}", e))
        })?;
        if let GpuTexture::Vulkan { view, .. } = &mut texture {
            *view = new_view;
        }

        // Move the image into the layout descriptors expect.
        self.context.submit_immediate(|cmd| {
            let barrier = vk::ImageMemoryBarrier::default()
                .src_access_mask(vk::AccessFlags::empty())
                .dst_access_mask(vk::AccessFlags::SHADER_READ)
                .old_layout(vk::ImageLayout::UNDEFINED)
                .new_layout(layout)
                .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .image(image)
                .subresource_range(subresource_range);
            unsafe {
                device.cmd_pipeline_barrier(
                    cmd,
                    vk::PipelineStageFlags::TOP_OF_PIPE,
                    vk::PipelineStageFlags::ALL_COMMANDS,
                    vk::DependencyFlags::empty(),
                    &[],
                    &[],
                    &[barrier],
                );
            }
        })?;

        log::trace!(
            "VulkanBackend: created texture {:?} ({}x{}x{}, {:?})",
            descriptor.label,
            extent.width,
            extent.height,
            extent.depth,
            layout
        );
        Ok(texture)
    }

    fn create_sampler(&self, descriptor: &SamplerDescriptor) -> Result<GpuSampler, GraphicsError> {
        let anisotropy =
            descriptor.anisotropy_clamp > 1 && self.context.features().sampler_anisotropy;

        let sampler_info = vk::SamplerCreateInfo::default()
            .mag_filter(convert_filter_mode(descriptor.mag_filter))
            .min_filter(convert_filter_mode(descriptor.min_filter))
            .mipmap_mode(convert_mipmap_filter_mode(descriptor.mipmap_filter))
            .address_mode_u(convert_address_mode(descriptor.address_mode_u))
            .address_mode_v(convert_address_mode(descriptor.address_mode_v))
            .address_mode_w(convert_address_mode(descriptor.address_mode_w))
            .mip_lod_bias(0.0)
            .anisotropy_enable(anisotropy)
            .max_anisotropy(descriptor.anisotropy_clamp.max(1) as f32)
            .compare_enable(descriptor.compare.is_some())
            .compare_op(
                descriptor
                    .compare
                    .map(convert_compare_function)
                    .unwrap_or(vk::CompareOp::ALWAYS),
            )
            .min_lod(descriptor.lod_min_clamp)
            .max_lod(descriptor.lod_max_clamp)
            .border_color(vk::BorderColor::FLOAT_TRANSPARENT_BLACK)
            .unnormalized_coordinates(false);

        let sampler = unsafe { self.context.device().create_sampler(&sampler_info, None) }
            .map_err(|e| {
                GraphicsError::ResourceCreationFailed(format!("Failed to create sampler: {:?}", e))
            })?;

        Ok(GpuSampler::Vulkan {
            context: Arc::clone(&self.context),
            sampler,
        })
    }

    fn create_object_layout(
        &self,
        bindings: &BindingLayout,
        frames_in_flight: u32,
    ) -> Result<GpuObjectLayout, GraphicsError> {
        VulkanObjectLayout::new(&self.context, bindings, frames_in_flight)
            .map(GpuObjectLayout::Vulkan)
    }

    fn create_shader_object(
        &self,
        layout: &Arc<ShaderObjectLayout>,
    ) -> Result<GpuShaderObject, GraphicsError> {
        VulkanShaderObject::new(&self.context, Arc::clone(layout)).map(GpuShaderObject::Vulkan)
    }
}
