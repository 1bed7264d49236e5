//! Textures that can be written into parameter blocks.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::backend::GpuTexture;
use crate::binding::DescriptorKind;
use crate::device::GraphicsDevice;
use crate::error::{BindingError, GraphicsError};
use crate::types::TextureDescriptor;

use super::Sampler;

/// An image plus the sampler it is paired with in combined bindings.
///
/// Created by [`GraphicsDevice::create_texture`]. Keeps its device alive.
///
/// ```ignore
/// let albedo = device.create_texture(&TextureDescriptor::new_2d(
///     1024, 1024,
///     TextureFormat::Rgba8UnormSrgb,
///     TextureUsage::TEXTURE_BINDING,
/// ))?;
/// albedo.set_sampler(device.create_sampler(&SamplerDescriptor::material(8))?);
/// material.cursor().field("albedo")?.write_texture(&albedo)?;
/// ```
pub struct Texture {
    device: Arc<GraphicsDevice>,
    descriptor: TextureDescriptor,
    gpu: GpuTexture,
    sampler: RwLock<Option<Arc<Sampler>>>,
}

impl Texture {
    pub(crate) fn new(
        device: Arc<GraphicsDevice>,
        descriptor: TextureDescriptor,
        gpu: GpuTexture,
    ) -> Self {
        Self {
            device,
            descriptor,
            gpu,
            sampler: RwLock::new(None),
        }
    }

    pub fn device(&self) -> &Arc<GraphicsDevice> {
        &self.device
    }

    pub fn descriptor(&self) -> &TextureDescriptor {
        &self.descriptor
    }

    pub fn gpu(&self) -> &GpuTexture {
        &self.gpu
    }

    pub fn label(&self) -> Option<&str> {
        self.descriptor.label.as_deref()
    }

    pub fn is_storage(&self) -> bool {
        self.descriptor.is_storage()
    }

    /// Pair this texture with `sampler` for combined image-sampler
    /// bindings. Only affects writes made after the call.
    pub fn set_sampler(&self, sampler: Arc<Sampler>) {
        *self.sampler.write() = Some(sampler);
    }

    pub fn sampler(&self) -> Option<Arc<Sampler>> {
        self.sampler.read().clone()
    }

    /// Check that this texture may fill a descriptor of `kind` at `binding`
    /// and return the sampler a combined descriptor needs.
    ///
    /// # Errors
    ///
    /// - `InvalidParameter` if `kind` is a storage image and the texture
    ///   was created without `STORAGE_BINDING`
    /// - [`BindingError::MissingSampler`] if `kind` is a combined
    ///   image-sampler and no sampler was set
    pub(crate) fn sampler_for_binding(
        &self,
        kind: DescriptorKind,
        binding: u32,
    ) -> Result<Option<Arc<Sampler>>, GraphicsError> {
        match kind {
            DescriptorKind::StorageImage if !self.is_storage() => {
                Err(GraphicsError::InvalidParameter(format!(
                    "texture {:?} lacks STORAGE_BINDING usage for storage binding {}",
                    self.label(),
                    binding
                )))
            }
            DescriptorKind::CombinedImageSampler => self
                .sampler()
                .map(Some)
                .ok_or_else(|| BindingError::MissingSampler { binding }.into()),
            _ => Ok(None),
        }
    }
}

impl std::fmt::Debug for Texture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Texture")
            .field("label", &self.descriptor.label)
            .field("size", &self.descriptor.size)
            .field("format", &self.descriptor.format)
            .field("storage", &self.is_storage())
            .field(
                "sampler",
                &self.sampler.read().as_ref().map(|s| s.descriptor().label.clone()),
            )
            .finish()
    }
}

static_assertions::assert_impl_all!(Texture: Send, Sync);
