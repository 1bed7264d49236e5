//! Graphics device.
//!
//! The [`GraphicsDevice`] is the main interface for creating GPU resources
//! and parameter blocks. It is created by [`GraphicsInstance::create_device`].

use std::sync::Arc;

use prism_core::profiling::profile_function;
use prism_core::reflection::TypeLayout;

use crate::binding::{BindingLayout, LayoutCache};
use crate::error::GraphicsError;
use crate::instance::GraphicsInstance;
use crate::resources::{ParameterBlock, Sampler, ShaderObjectLayout, Texture};
use crate::types::{SamplerDescriptor, TextureDescriptor};

/// A graphics device for creating GPU resources.
///
/// # Thread Safety
///
/// `GraphicsDevice` is `Send + Sync` and can be safely shared across threads.
///
/// # Example
///
/// ```ignore
/// let instance = GraphicsInstance::new()?;
/// let device = instance.create_device()?;
///
/// let layout = device.create_shader_object_layout(&material_type)?;
/// let material = device.create_shader_object(&layout)?;
/// material.cursor().field("roughness")?.write(&0.5f32)?;
/// ```
pub struct GraphicsDevice {
    instance: Arc<GraphicsInstance>,
    name: String,
    layout_cache: LayoutCache,
}

impl GraphicsDevice {
    /// Create a new graphics device (called by GraphicsInstance).
    pub(crate) fn new(instance: Arc<GraphicsInstance>, name: String) -> Self {
        Self {
            instance,
            name,
            layout_cache: LayoutCache::new(),
        }
    }

    /// Get the parent instance.
    pub fn instance(&self) -> &Arc<GraphicsInstance> {
        &self.instance
    }

    /// Get the device name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Descriptor sets each parameter block keeps.
    pub fn frames_in_flight(&self) -> u32 {
        self.instance.parameters().frames_in_flight
    }

    /// Create a GPU texture.
    ///
    /// # Errors
    ///
    /// Returns [`GraphicsError::InvalidParameter`] for descriptors that fail
    /// [`TextureDescriptor::validate`], or a backend error if allocation
    /// fails.
    pub fn create_texture(
        self: &Arc<Self>,
        descriptor: &TextureDescriptor,
    ) -> Result<Arc<Texture>, GraphicsError> {
        profile_function!();
        descriptor.validate()?;

        let gpu = self.instance.backend().create_texture(descriptor)?;
        log::trace!(
            "GraphicsDevice: created texture {:?}, size={}x{}",
            descriptor.label,
            descriptor.size.width,
            descriptor.size.height
        );
        Ok(Arc::new(Texture::new(
            Arc::clone(self),
            descriptor.clone(),
            gpu,
        )))
    }

    /// Create a texture sampler.
    pub fn create_sampler(
        self: &Arc<Self>,
        descriptor: &SamplerDescriptor,
    ) -> Result<Arc<Sampler>, GraphicsError> {
        let gpu = self.instance.backend().create_sampler(descriptor)?;
        log::trace!("GraphicsDevice: created sampler {:?}", descriptor.label);
        Ok(Arc::new(Sampler::new(
            Arc::downgrade(self),
            descriptor.clone(),
            gpu,
        )))
    }

    /// Get the shader object layout for a reflected parameter-block type,
    /// building it on first use.
    ///
    /// Layouts are cached by the identity of `type_layout`: passing the same
    /// `Arc` again returns the same layout while any handle to it is alive.
    /// Once every handle and block is dropped the native layout and its
    /// pools are destroyed, and a later call builds a fresh one.
    ///
    /// # Errors
    ///
    /// Returns [`BindingError::UnsupportedBindingKind`] or
    /// [`BindingError::UnboundedBindingRange`] for types that cannot be
    /// expressed as a descriptor set, or a backend error.
    ///
    /// [`BindingError::UnsupportedBindingKind`]: crate::BindingError::UnsupportedBindingKind
    /// [`BindingError::UnboundedBindingRange`]: crate::BindingError::UnboundedBindingRange
    pub fn create_shader_object_layout(
        self: &Arc<Self>,
        type_layout: &Arc<TypeLayout>,
    ) -> Result<Arc<ShaderObjectLayout>, GraphicsError> {
        self.layout_cache.get_or_create(type_layout, || {
            profile_function!();
            let content = ShaderObjectLayout::content_of(type_layout);
            let bindings = BindingLayout::from_type_layout(content)?;
            let frames = self.frames_in_flight();
            let gpu = self
                .instance
                .backend()
                .create_object_layout(&bindings, frames)?;
            Ok(Arc::new(ShaderObjectLayout::new(
                Arc::clone(type_layout),
                bindings,
                frames,
                gpu,
            )))
        })
    }

    /// Create a parameter block instance of `layout`.
    ///
    /// The block's ordinary-data buffer is already bound into every frame's
    /// descriptor set when this returns.
    pub fn create_shader_object(
        self: &Arc<Self>,
        layout: &Arc<ShaderObjectLayout>,
    ) -> Result<ParameterBlock, GraphicsError> {
        profile_function!();
        let gpu = self.instance.backend().create_shader_object(layout)?;
        Ok(ParameterBlock::new(Arc::clone(layout), gpu))
    }

    /// Number of cached shader object layouts that are still alive.
    pub fn cached_layout_count(&self) -> usize {
        self.layout_cache.len()
    }
}

impl std::fmt::Debug for GraphicsDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphicsDevice")
            .field("name", &self.name)
            .field("layout_cache", &self.layout_cache)
            .finish()
    }
}

// Ensure GraphicsDevice is Send + Sync
static_assertions::assert_impl_all!(GraphicsDevice: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BindingError;
    use crate::instance::{BackendType, InstanceParameters};
    use crate::types::{TextureFormat, TextureUsage};
    use prism_core::reflection::{BindingKind, ElementCount, ScalarType, StructLayoutBuilder};

    fn create_test_device() -> Arc<GraphicsDevice> {
        let instance = GraphicsInstance::with_parameters(
            InstanceParameters::new().with_backend(BackendType::Dummy),
        )
        .unwrap();
        instance.create_device().unwrap()
    }

    #[test]
    fn test_device_name() {
        let device = create_test_device();
        assert_eq!(device.name(), "Dummy Backend");
        assert_eq!(device.frames_in_flight(), 2);
    }

    #[test]
    fn test_create_texture_zero_size() {
        let device = create_test_device();
        let result = device.create_texture(&TextureDescriptor::new_2d(
            0,
            512,
            TextureFormat::Rgba8Unorm,
            TextureUsage::TEXTURE_BINDING,
        ));
        assert!(matches!(result, Err(GraphicsError::InvalidParameter(_))));
    }

    #[test]
    fn test_sampler_holds_weak_device() {
        let device = create_test_device();
        let sampler = device.create_sampler(&SamplerDescriptor::linear()).unwrap();
        assert!(Arc::ptr_eq(&sampler.device().unwrap(), &device));
    }

    #[test]
    fn test_layout_cache_identity() {
        let device = create_test_device();
        let material = Arc::new(
            StructLayoutBuilder::new("Material")
                .field("roughness", TypeLayout::scalar(ScalarType::Float32))
                .build()
                .unwrap(),
        );

        let a = device.create_shader_object_layout(&material).unwrap();
        let b = device.create_shader_object_layout(&material).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(device.cached_layout_count(), 1);

        // Structurally equal but distinct layouts are separate types.
        let copy = Arc::new((*material).clone());
        let c = device.create_shader_object_layout(&copy).unwrap();
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(device.cached_layout_count(), 2);
    }

    #[test]
    fn test_layout_released_with_last_handle() {
        let device = create_test_device();
        let material = Arc::new(
            StructLayoutBuilder::new("Material")
                .field("roughness", TypeLayout::scalar(ScalarType::Float32))
                .build()
                .unwrap(),
        );

        let layout = device.create_shader_object_layout(&material).unwrap();
        let block = device.create_shader_object(&layout).unwrap();
        let weak = Arc::downgrade(&layout);
        drop(layout);

        // The block keeps its layout alive and cached.
        let again = device.create_shader_object_layout(&material).unwrap();
        assert!(Arc::ptr_eq(&again, &weak.upgrade().unwrap()));
        drop(again);
        drop(block);
        assert!(weak.upgrade().is_none());
        assert_eq!(device.cached_layout_count(), 0);

        // Reloaded types don't accumulate layouts.
        for _ in 0..100 {
            let reloaded = Arc::new((*material).clone());
            device.create_shader_object_layout(&reloaded).unwrap();
        }
        assert_eq!(device.cached_layout_count(), 0);

        let rebuilt = device.create_shader_object_layout(&material).unwrap();
        assert_eq!(device.cached_layout_count(), 1);
        assert_eq!(rebuilt.bindings().ordinary_data_size(), 4);
    }

    #[test]
    fn test_oversized_layout_rejected() {
        let device = create_test_device();
        let huge = Arc::new(
            StructLayoutBuilder::new("Huge")
                .field(
                    "textures",
                    TypeLayout::resource_array(BindingKind::Texture, ElementCount::Bounded(1 << 31)),
                )
                .build()
                .unwrap(),
        );

        let result = device.create_shader_object_layout(&huge);
        assert!(matches!(
            result,
            Err(GraphicsError::Binding(BindingError::DescriptorCountOverflow {
                binding: 0,
                sets: 2
            }))
        ));
        assert_eq!(device.cached_layout_count(), 0);
    }

    #[test]
    fn test_unbounded_layout_rejected() {
        let device = create_test_device();
        let bindless = Arc::new(
            StructLayoutBuilder::new("Bindless")
                .field(
                    "textures",
                    TypeLayout::resource_array(BindingKind::Texture, ElementCount::Unbounded),
                )
                .build()
                .unwrap(),
        );

        let result = device.create_shader_object_layout(&bindless);
        assert!(matches!(
            result,
            Err(GraphicsError::Binding(BindingError::UnboundedBindingRange { binding: 0 }))
        ));
        assert_eq!(device.cached_layout_count(), 0);
    }
}
