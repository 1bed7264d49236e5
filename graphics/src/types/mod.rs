//! Descriptor types for the resources that parameter blocks bind.

mod sampler;
mod texture;

pub use sampler::{AddressMode, CompareFunction, FilterMode, SamplerDescriptor};
pub use texture::{Extent3d, TextureDescriptor, TextureFormat, TextureUsage};
