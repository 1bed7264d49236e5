//! # Prism Graphics
//!
//! Shader parameter binding on top of Vulkan.
//!
//! ## Overview
//!
//! A compiled shader's parameter block is described by a reflected
//! [`TypeLayout`](prism_core::reflection::TypeLayout). This crate turns it
//! into GPU state:
//!
//! - [`ShaderObjectLayout`] - descriptor set layout and pool, one per type
//! - [`ParameterBlock`] - uniform buffer plus one descriptor set per frame in
//!   flight, one per material instance
//! - [`ShaderCursor`] - addresses any leaf parameter by field names and array
//!   indices and writes values, textures and samplers there
//!
//! Backends: Vulkan (`vulkan-backend`, default) and a recording dummy backend
//! (`dummy`) for tests without a GPU.
//!
//! ## Example
//!
//! ```ignore
//! use prism_graphics::{GraphicsInstance, SamplerDescriptor};
//!
//! let instance = GraphicsInstance::new()?;
//! let device = instance.create_device()?;
//!
//! let layout = device.create_shader_object_layout(&material_type)?;
//! let material = device.create_shader_object(&layout)?;
//!
//! let cursor = material.cursor();
//! cursor.field("roughness")?.write(&0.5f32)?;
//! cursor.path("textures[3]")?.write_texture(&albedo)?;
//! ```

pub mod backend;
pub mod binding;
pub mod device;
pub mod error;
pub mod instance;
pub mod resources;
pub mod types;

// Re-export main types for convenience
pub use binding::{
    BindingLayout, BindingLayoutEntry, DescriptorKind, LayoutCache, ShaderCursor, ShaderObject,
    ShaderOffset, ShaderStageFlags,
};
pub use device::GraphicsDevice;
pub use error::{BindingError, GraphicsError};
pub use instance::{BackendType, GraphicsInstance, InstanceParameters};
pub use resources::{ParameterBlock, Sampler, ShaderObjectLayout, Texture};
pub use types::{
    AddressMode, CompareFunction, Extent3d, FilterMode, SamplerDescriptor, TextureDescriptor,
    TextureFormat, TextureUsage,
};

/// Graphics library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_dummy_backend_name() {
        use backend::GpuBackend;
        let backend = backend::dummy::DummyBackend::new();
        assert_eq!(backend.name(), "Dummy Backend");
    }
}
