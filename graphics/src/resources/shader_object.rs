//! Shader object layouts and parameter blocks.

use std::sync::Arc;

use prism_core::reflection::{TypeKind, TypeLayout};

use crate::backend::{GpuObjectLayout, GpuShaderObject};
use crate::binding::{BindingLayout, ShaderCursor, ShaderObject};

/// Native layout shared by every instance of one parameter-block type.
///
/// Created once per distinct [`TypeLayout`] by
/// [`GraphicsDevice::create_shader_object_layout`], which caches it. Owns the
/// backend descriptor set layout and the pool that instances allocate their
/// per-frame sets from.
///
/// [`GraphicsDevice::create_shader_object_layout`]: crate::GraphicsDevice::create_shader_object_layout
pub struct ShaderObjectLayout {
    type_layout: Arc<TypeLayout>,
    bindings: BindingLayout,
    frames_in_flight: u32,
    gpu: GpuObjectLayout,
}

impl ShaderObjectLayout {
    pub(crate) fn new(
        type_layout: Arc<TypeLayout>,
        bindings: BindingLayout,
        frames_in_flight: u32,
        gpu: GpuObjectLayout,
    ) -> Self {
        Self {
            type_layout,
            bindings,
            frames_in_flight,
            gpu,
        }
    }

    /// The layout whose fields a cursor navigates.
    ///
    /// `ParameterBlock<T>` and `ConstantBuffer<T>` wrappers are looked
    /// through to `T`; any other layout is its own content.
    pub fn content_of(type_layout: &TypeLayout) -> &TypeLayout {
        match type_layout.kind() {
            TypeKind::ParameterBlock | TypeKind::ConstantBuffer => {
                type_layout.element_type().unwrap_or(type_layout)
            }
            _ => type_layout,
        }
    }

    /// The reflected layout this object layout was built from.
    pub fn type_layout(&self) -> &Arc<TypeLayout> {
        &self.type_layout
    }

    /// The reflected layout of the block's content.
    pub fn content_layout(&self) -> &TypeLayout {
        Self::content_of(&self.type_layout)
    }

    pub fn bindings(&self) -> &BindingLayout {
        &self.bindings
    }

    /// Number of descriptor sets each instance owns.
    pub fn frames_in_flight(&self) -> u32 {
        self.frames_in_flight
    }

    pub fn gpu(&self) -> &GpuObjectLayout {
        &self.gpu
    }
}

impl std::fmt::Debug for ShaderObjectLayout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShaderObjectLayout")
            .field("name", &self.type_layout.name())
            .field("bindings", &self.bindings.binding_count())
            .field("ordinary_data_size", &self.bindings.ordinary_data_size())
            .field("frames_in_flight", &self.frames_in_flight)
            .finish()
    }
}

/// One writable instance of a [`ShaderObjectLayout`], typically a material
/// instance.
///
/// Holds its own uniform buffer and one descriptor set per frame in flight.
/// Values are written through [`cursor`](Self::cursor):
///
/// ```ignore
/// let block = device.create_shader_object(&layout)?;
/// block.cursor().field("roughness")?.write(&0.5f32)?;
/// ```
pub struct ParameterBlock {
    layout: Arc<ShaderObjectLayout>,
    gpu: GpuShaderObject,
}

impl ParameterBlock {
    pub(crate) fn new(layout: Arc<ShaderObjectLayout>, gpu: GpuShaderObject) -> Self {
        Self { layout, gpu }
    }

    /// Cursor at the root of the block's content.
    pub fn cursor(&self) -> ShaderCursor<'_> {
        self.shader_object().cursor()
    }

    pub fn shader_object(&self) -> &dyn ShaderObject {
        self.gpu.as_shader_object()
    }

    pub fn layout(&self) -> &Arc<ShaderObjectLayout> {
        &self.layout
    }

    pub fn frames_in_flight(&self) -> u32 {
        self.layout.frames_in_flight
    }

    /// Backend object, for inspecting descriptor sets and recorded state.
    pub fn gpu(&self) -> &GpuShaderObject {
        &self.gpu
    }
}

impl std::fmt::Debug for ParameterBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParameterBlock")
            .field("layout", &self.layout)
            .finish_non_exhaustive()
    }
}

static_assertions::assert_impl_all!(ShaderObjectLayout: Send, Sync);
static_assertions::assert_impl_all!(ParameterBlock: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use prism_core::reflection::{ScalarType, StructLayoutBuilder};

    #[test]
    fn test_content_looks_through_parameter_block() {
        let material = StructLayoutBuilder::new("Material")
            .field("roughness", TypeLayout::scalar(ScalarType::Float32))
            .build()
            .unwrap();
        let block = TypeLayout::parameter_block(material.clone());

        let content = ShaderObjectLayout::content_of(&block);
        assert_eq!(content.kind(), TypeKind::Struct);
        assert_eq!(content.find_field_index("roughness"), Some(0));

        assert_eq!(ShaderObjectLayout::content_of(&material).field_count(), 1);
    }
}
