//! Import of Slang reflection data.
//!
//! Converts the compiler-owned `shader_slang` reflection tree into an owned
//! [`TypeLayout`] so it can outlive the compile session. Byte sizes, offsets
//! and strides are read in the uniform parameter category; binding data comes
//! from the binding-range queries.

use shader_slang as slang;

use super::{
    BindingKind, BindingRange, ElementCount, ReflectionError, ScalarType, Shape, TypeLayout,
};

/// Convert a reflected Slang type layout.
pub fn import_type_layout(
    layout: &slang::reflection::TypeLayout,
) -> Result<TypeLayout, ReflectionError> {
    let category = slang::ParameterCategory::Uniform;
    let name = layout.name().map(str::to_owned);

    let mut converted = match layout.kind() {
        slang::TypeKind::Struct => {
            let mut fields = Vec::with_capacity(layout.field_count() as usize);
            for index in 0..layout.field_count() {
                let field = layout.field_by_index(index).ok_or_else(|| {
                    ReflectionError::MissingLayout(format!("field {index} of {name:?}"))
                })?;
                let field_type = field.type_layout().ok_or_else(|| {
                    ReflectionError::MissingLayout(format!("type of field {index} of {name:?}"))
                })?;
                fields.push((
                    field.name().unwrap_or_default().to_owned(),
                    import_type_layout(field_type)?,
                    field.offset(category),
                ));
            }
            let mut converted = TypeLayout::from_fields(
                name.clone(),
                fields,
                layout.size(category),
                layout.alignment(category).max(1) as usize,
            );
            // Field range offsets and the flattened list come from the compiler.
            converted.binding_ranges = import_binding_ranges(layout);
            if let Shape::Struct(fields) = &mut converted.shape {
                for (index, field) in fields.iter_mut().enumerate() {
                    field.binding_range_offset =
                        layout.field_binding_range_offset(index as i64).max(0) as u32;
                }
            }
            converted
        }
        slang::TypeKind::Array => {
            let element = layout.element_type_layout().ok_or_else(|| {
                ReflectionError::MissingLayout(format!("element of array {name:?}"))
            })?;
            let count = match layout.element_count() {
                0 => ElementCount::Unbounded,
                count => ElementCount::Bounded(count as u32),
            };
            let mut converted = TypeLayout::array_with_stride(
                import_type_layout(element)?,
                count,
                layout.element_stride(category),
            );
            converted.size = layout.size(category);
            converted
        }
        slang::TypeKind::Scalar => TypeLayout::scalar(import_scalar(layout)?),
        slang::TypeKind::Vector => {
            let mut converted =
                TypeLayout::vector(import_scalar(layout)?, layout.element_count() as u32);
            converted.size = layout.size(category);
            converted
        }
        slang::TypeKind::Matrix => {
            let rows = layout.row_count();
            let columns = layout.column_count();
            let mut converted = TypeLayout::matrix(import_scalar(layout)?, rows, columns);
            converted.size = layout.size(category);
            converted
        }
        slang::TypeKind::ConstantBuffer | slang::TypeKind::ParameterBlock => {
            let element = layout.element_type_layout().ok_or_else(|| {
                ReflectionError::MissingLayout(format!("element of container {name:?}"))
            })?;
            let element = import_type_layout(element)?;
            if layout.kind() == slang::TypeKind::ConstantBuffer {
                TypeLayout::constant_buffer(element)
            } else {
                TypeLayout::parameter_block(element)
            }
        }
        slang::TypeKind::Resource
        | slang::TypeKind::SamplerState
        | slang::TypeKind::TextureBuffer
        | slang::TypeKind::ShaderStorageBuffer => {
            let kind = if layout.binding_range_count() > 0 {
                import_binding_kind(layout.binding_range_type(0))
            } else {
                BindingKind::Unknown
            };
            TypeLayout::resource(kind)
        }
        other => return Err(ReflectionError::UnsupportedTypeKind(format!("{other:?}"))),
    };

    log::trace!(
        "Imported {:?} layout {:?} ({} bytes, {} binding ranges)",
        converted.kind(),
        converted.name(),
        converted.size(),
        converted.binding_ranges().len()
    );

    if converted.name.is_none() {
        converted.name = name;
    }
    Ok(converted)
}

fn import_binding_ranges(layout: &slang::reflection::TypeLayout) -> Vec<BindingRange> {
    (0..layout.binding_range_count())
        .map(|index| {
            let count = layout.binding_range_binding_count(index);
            BindingRange::new(
                import_binding_kind(layout.binding_range_type(index)),
                if count < 0 {
                    ElementCount::Unbounded
                } else {
                    ElementCount::Bounded(count as u32)
                },
            )
        })
        .collect()
}

fn import_scalar(layout: &slang::reflection::TypeLayout) -> Result<ScalarType, ReflectionError> {
    match layout.scalar_type() {
        slang::ScalarType::Bool => Ok(ScalarType::Bool),
        slang::ScalarType::Int32 => Ok(ScalarType::Int32),
        slang::ScalarType::Uint32 => Ok(ScalarType::UInt32),
        slang::ScalarType::Int64 => Ok(ScalarType::Int64),
        slang::ScalarType::Uint64 => Ok(ScalarType::UInt64),
        slang::ScalarType::Float16 => Ok(ScalarType::Float16),
        slang::ScalarType::Float32 => Ok(ScalarType::Float32),
        slang::ScalarType::Float64 => Ok(ScalarType::Float64),
        other => Err(ReflectionError::UnsupportedTypeKind(format!("scalar {other:?}"))),
    }
}

fn import_binding_kind(kind: slang::BindingType) -> BindingKind {
    match kind {
        slang::BindingType::Sampler => BindingKind::Sampler,
        slang::BindingType::Texture => BindingKind::Texture,
        slang::BindingType::ConstantBuffer => BindingKind::ConstantBuffer,
        slang::BindingType::ParameterBlock => BindingKind::ParameterBlock,
        slang::BindingType::TypedBuffer => BindingKind::TypedBuffer,
        slang::BindingType::RawBuffer => BindingKind::RawBuffer,
        slang::BindingType::CombinedTextureSampler => BindingKind::CombinedTextureSampler,
        slang::BindingType::InputRenderTarget => BindingKind::InputRenderTarget,
        slang::BindingType::InlineUniformData => BindingKind::InlineUniformData,
        slang::BindingType::RayTracingAccelerationStructure => {
            BindingKind::RayTracingAccelerationStructure
        }
        slang::BindingType::VaryingInput => BindingKind::VaryingInput,
        slang::BindingType::VaryingOutput => BindingKind::VaryingOutput,
        slang::BindingType::ExistentialValue => BindingKind::ExistentialValue,
        slang::BindingType::PushConstant => BindingKind::PushConstant,
        slang::BindingType::MutableTeture => BindingKind::MutableTexture,
        slang::BindingType::MutableTypedBuffer => BindingKind::MutableTypedBuffer,
        slang::BindingType::MutableRawBuffer => BindingKind::MutableRawBuffer,
        _ => BindingKind::Unknown,
    }
}
