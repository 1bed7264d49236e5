//! GPU resources.
//!
//! This module contains the GPU resource types that are created by [`GraphicsDevice`]:
//! - [`Texture`] - GPU texture/image
//! - [`Sampler`] - Texture sampler
//! - [`ShaderObjectLayout`] - Native descriptor layout of one parameter-block type
//! - [`ParameterBlock`] - Writable instance of a shader object layout
//!
//! Resources are reference-counted with [`Arc`] and can be shared across threads.
//!
//! [`GraphicsDevice`]: crate::GraphicsDevice
//! [`Arc`]: std::sync::Arc

mod sampler;
mod shader_object;
mod texture;

pub use sampler::Sampler;
pub use shader_object::{ParameterBlock, ShaderObjectLayout};
pub use texture::Texture;
