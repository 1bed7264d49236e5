//! Shader parameter binding.
//!
//! This module connects reflected parameter layouts to GPU state:
//!
//! - [`ShaderOffset`] - byte and binding location of a parameter
//! - [`ShaderCursor`] - navigates fields and array elements, then writes
//! - [`ShaderObject`] - the backend object a cursor writes into
//! - [`BindingLayout`] - the descriptor set plan for a reflected type
//! - [`LayoutCache`] - one native layout per distinct parameter-block type
//!
//! Ordinary data (scalars, vectors, matrices and structs of them) goes to a
//! uniform buffer; resources (textures, samplers) go to descriptor sets.

mod cache;
mod cursor;
mod layout;
pub(crate) mod object;
mod offset;

pub use cache::LayoutCache;
pub use cursor::ShaderCursor;
pub use layout::{BindingLayout, BindingLayoutEntry, DescriptorKind, ShaderStageFlags};
pub use object::ShaderObject;
pub use offset::ShaderOffset;
