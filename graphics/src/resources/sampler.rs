//! Samplers written to sampler slots or paired with textures.

use std::sync::{Arc, Weak};

use crate::backend::GpuSampler;
use crate::device::GraphicsDevice;
use crate::types::SamplerDescriptor;

/// Sampler state owned by a device.
///
/// Holds only a weak reference to the device: textures keep samplers alive
/// through [`Texture::set_sampler`], and a sampler must not keep the device
/// alive through such a chain.
///
/// [`Texture::set_sampler`]: super::Texture::set_sampler
pub struct Sampler {
    device: Weak<GraphicsDevice>,
    descriptor: SamplerDescriptor,
    gpu: GpuSampler,
}

impl Sampler {
    pub(crate) fn new(
        device: Weak<GraphicsDevice>,
        descriptor: SamplerDescriptor,
        gpu: GpuSampler,
    ) -> Self {
        Self {
            device,
            descriptor,
            gpu,
        }
    }

    /// `None` once the device has been dropped.
    pub fn device(&self) -> Option<Arc<GraphicsDevice>> {
        self.device.upgrade()
    }

    pub fn descriptor(&self) -> &SamplerDescriptor {
        &self.descriptor
    }

    pub fn gpu(&self) -> &GpuSampler {
        &self.gpu
    }

    pub fn label(&self) -> Option<&str> {
        self.descriptor.label.as_deref()
    }

    /// Whether shaders must sample this with a depth reference value.
    pub fn is_comparison(&self) -> bool {
        self.descriptor.is_comparison()
    }
}

impl std::fmt::Debug for Sampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sampler")
            .field("label", &self.descriptor.label)
            .field("filter", &self.descriptor.min_filter)
            .field("compare", &self.descriptor.compare)
            .finish_non_exhaustive()
    }
}

static_assertions::assert_impl_all!(Sampler: Send, Sync);
