//! Backends that turn a [`BindingLayout`] into native descriptor objects.
//!
//! [`GpuBackend`] is the seam between the API-neutral binding layer and a
//! graphics API. Resources and layouts come back as enums with one variant
//! per compiled-in backend, so the front-end types stay concrete.
//!
//! The dummy backend is always compiled; the `dummy` feature only controls
//! whether an instance may select it. Vulkan needs `vulkan-backend`.

#[cfg(feature = "vulkan-backend")]
pub mod vulkan;

pub mod dummy;

use std::sync::Arc;

#[cfg(feature = "vulkan-backend")]
use ash::vk;
#[cfg(feature = "vulkan-backend")]
use gpu_allocator::vulkan::Allocation;
#[cfg(feature = "vulkan-backend")]
use parking_lot::Mutex;

use crate::binding::{BindingLayout, ShaderObject};
use crate::error::GraphicsError;
use crate::instance::{BackendType, InstanceParameters};
use crate::resources::ShaderObjectLayout;
use crate::types::{SamplerDescriptor, TextureDescriptor};

/// Backend image behind a [`Texture`](crate::Texture).
#[allow(clippy::large_enum_variant)]
pub enum GpuTexture {
    /// Dummy backend texture, identified for inspection.
    Dummy { id: u64 },
    #[cfg(feature = "vulkan-backend")]
    Vulkan {
        context: Arc<vulkan::VulkanContext>,
        image: vk::Image,
        view: vk::ImageView,
        allocation: Mutex<Option<Allocation>>,
        format: vk::Format,
        extent: vk::Extent3D,
        /// Layout the image is kept in for shader access.
        layout: vk::ImageLayout,
    },
}

impl std::fmt::Debug for GpuTexture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dummy { id } => f.debug_struct("GpuTexture::Dummy").field("id", id).finish(),
            #[cfg(feature = "vulkan-backend")]
            Self::Vulkan {
                image,
                view,
                format,
                extent,
                layout,
                ..
            } => f
                .debug_struct("GpuTexture::Vulkan")
                .field("image", image)
                .field("view", view)
                .field("format", format)
                .field("extent", extent)
                .field("layout", layout)
                .finish_non_exhaustive(),
        }
    }
}

/// Backend sampler behind a [`Sampler`](crate::Sampler).
pub enum GpuSampler {
    /// Dummy backend sampler, identified for inspection.
    Dummy { id: u64 },
    #[cfg(feature = "vulkan-backend")]
    Vulkan {
        context: Arc<vulkan::VulkanContext>,
        sampler: vk::Sampler,
    },
}

impl std::fmt::Debug for GpuSampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dummy { id } => f.debug_struct("GpuSampler::Dummy").field("id", id).finish(),
            #[cfg(feature = "vulkan-backend")]
            Self::Vulkan { sampler, .. } => f
                .debug_struct("GpuSampler::Vulkan")
                .field("sampler", sampler)
                .finish_non_exhaustive(),
        }
    }
}

/// Backend half of a [`ShaderObjectLayout`]: the native set layout and pool.
#[derive(Debug)]
pub enum GpuObjectLayout {
    Dummy(dummy::DummyObjectLayout),
    #[cfg(feature = "vulkan-backend")]
    Vulkan(vulkan::VulkanObjectLayout),
}

/// Backend shader object of a parameter block.
#[derive(Debug)]
pub enum GpuShaderObject {
    Dummy(dummy::DummyShaderObject),
    #[cfg(feature = "vulkan-backend")]
    Vulkan(vulkan::VulkanShaderObject),
}

impl GpuShaderObject {
    /// The backend object behind the [`ShaderObject`] interface.
    pub fn as_shader_object(&self) -> &dyn ShaderObject {
        match self {
            Self::Dummy(object) => object,
            #[cfg(feature = "vulkan-backend")]
            Self::Vulkan(object) => object,
        }
    }

    pub fn as_dummy(&self) -> Option<&dummy::DummyShaderObject> {
        match self {
            Self::Dummy(object) => Some(object),
            #[cfg(feature = "vulkan-backend")]
            _ => None,
        }
    }

    #[cfg(feature = "vulkan-backend")]
    pub fn as_vulkan(&self) -> Option<&vulkan::VulkanShaderObject> {
        match self {
            Self::Vulkan(object) => Some(object),
            _ => None,
        }
    }
}

#[cfg(feature = "vulkan-backend")]
impl Drop for GpuTexture {
    fn drop(&mut self) {
        if let GpuTexture::Vulkan {
            context,
            image,
            view,
            allocation,
            ..
        } = self
        {
            unsafe {
                context.device().destroy_image_view(*view, None);
                context.device().destroy_image(*image, None);
            }
            if let Some(allocation) = allocation.lock().take() {
                context.free_allocation(allocation);
            }
        }
    }
}

#[cfg(feature = "vulkan-backend")]
impl Drop for GpuSampler {
    fn drop(&mut self) {
        if let GpuSampler::Vulkan { context, sampler } = self {
            unsafe { context.device().destroy_sampler(*sampler, None) };
        }
    }
}

/// A graphics API able to back parameter blocks.
pub trait GpuBackend: Send + Sync + 'static {
    /// Also used as the device name.
    fn name(&self) -> &'static str;

    /// `descriptor` has already passed [`TextureDescriptor::validate`].
    fn create_texture(&self, descriptor: &TextureDescriptor) -> Result<GpuTexture, GraphicsError>;

    fn create_sampler(&self, descriptor: &SamplerDescriptor) -> Result<GpuSampler, GraphicsError>;

    /// Create the native set layout and a pool able to hold one shader
    /// object's `frames_in_flight` descriptor sets.
    fn create_object_layout(
        &self,
        bindings: &BindingLayout,
        frames_in_flight: u32,
    ) -> Result<GpuObjectLayout, GraphicsError>;

    /// Create a shader object: allocate its uniform buffer and descriptor
    /// sets and bind the buffer into every set.
    fn create_shader_object(
        &self,
        layout: &Arc<ShaderObjectLayout>,
    ) -> Result<GpuShaderObject, GraphicsError>;
}

/// Create the backend requested by `params`.
///
/// [`BackendType::Auto`] tries Vulkan first and falls back to the dummy
/// backend.
pub fn create_backend(params: &InstanceParameters) -> Result<Arc<dyn GpuBackend>, GraphicsError> {
    match params.backend {
        BackendType::Vulkan => create_vulkan_backend(params),
        BackendType::Dummy => create_dummy_backend(),
        BackendType::Auto => {
            match create_vulkan_backend(params) {
                Ok(backend) => return Ok(backend),
                Err(e) => log::warn!("Vulkan unavailable, falling back to dummy backend: {}", e),
            }
            create_dummy_backend()
        }
    }
}

#[cfg(feature = "vulkan-backend")]
fn create_vulkan_backend(params: &InstanceParameters) -> Result<Arc<dyn GpuBackend>, GraphicsError> {
    Ok(Arc::new(vulkan::VulkanBackend::with_params(params)?))
}

#[cfg(not(feature = "vulkan-backend"))]
fn create_vulkan_backend(_: &InstanceParameters) -> Result<Arc<dyn GpuBackend>, GraphicsError> {
    Err(GraphicsError::BackendUnavailable(
        "compiled without the `vulkan-backend` feature".to_string(),
    ))
}

#[cfg(feature = "dummy")]
fn create_dummy_backend() -> Result<Arc<dyn GpuBackend>, GraphicsError> {
    Ok(Arc::new(dummy::DummyBackend::new()))
}

#[cfg(not(feature = "dummy"))]
fn create_dummy_backend() -> Result<Arc<dyn GpuBackend>, GraphicsError> {
    Err(GraphicsError::BackendUnavailable(
        "compiled without the `dummy` feature".to_string(),
    ))
}

/// Whether any backend that talks to a GPU is compiled in.
pub fn has_gpu_backend() -> bool {
    cfg!(feature = "vulkan-backend")
}
