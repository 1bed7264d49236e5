use prism_core::reflection::TypeLayout;

use crate::error::GraphicsError;
use crate::resources::{Sampler, Texture};

use super::{ShaderCursor, ShaderOffset};

pub(crate) mod sealed {
    pub trait Sealed {}
}

/// A GPU-visible instance of a parameter block.
///
/// Each backend provides one implementation. The object owns the uniform
/// buffer for the block's ordinary data (if it has any) and one descriptor set
/// per frame in flight; every write is applied to all of them.
///
/// # Synchronization
///
/// The ordinary-data buffer is shared by every frame's descriptor set and
/// writes are not fenced. Callers must not write to an object while a
/// submitted command buffer that reads it may still be executing.
pub trait ShaderObject: sealed::Sealed + Send + Sync {
    /// Reflected layout of the parameter block.
    fn type_layout(&self) -> &TypeLayout;

    /// Overwrite `data.len()` bytes of ordinary data at `offset.byte_offset`.
    fn write(&self, offset: ShaderOffset, data: &[u8]) -> Result<(), GraphicsError>;

    /// Bind a texture at `offset.binding_index`, element
    /// `offset.binding_array_element`, in every frame's descriptor set.
    fn write_texture(&self, offset: ShaderOffset, texture: &Texture) -> Result<(), GraphicsError>;

    /// Bind a sampler at `offset.binding_index`, element
    /// `offset.binding_array_element`, in every frame's descriptor set.
    fn write_sampler(&self, offset: ShaderOffset, sampler: &Sampler) -> Result<(), GraphicsError>;
}

impl dyn ShaderObject + '_ {
    /// Cursor at the root of the parameter block.
    pub fn cursor(&self) -> ShaderCursor<'_> {
        ShaderCursor::new(self)
    }
}
