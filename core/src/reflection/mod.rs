//! Reflected type layouts of shader parameters.
//!
//! A [`TypeLayout`] describes how a shader type is laid out in memory: the
//! byte size of its ordinary (uniform) data, the fields or elements it is made
//! of, and the flattened list of [`BindingRange`]s for the opaque resources it
//! contains. Layouts are immutable once built and are normally shared as
//! `Arc<TypeLayout>`.
//!
//! Layouts are produced by the shading-language front end (see the `slang`
//! feature) or assembled by hand with the constructors on [`TypeLayout`] and
//! [`StructLayoutBuilder`]:
//!
//! ```
//! use prism_core::reflection::{BindingKind, ScalarType, StructLayoutBuilder, TypeLayout};
//!
//! let material = StructLayoutBuilder::new("Material")
//!     .field("albedo", TypeLayout::vector(ScalarType::Float32, 3))
//!     .field("roughness", TypeLayout::scalar(ScalarType::Float32))
//!     .field("albedo_map", TypeLayout::resource(BindingKind::Texture))
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(material.size(), 16);
//! assert_eq!(material.binding_ranges().len(), 1);
//! ```

mod builder;
#[cfg(feature = "slang")]
pub mod slang;

pub use builder::StructLayoutBuilder;

use std::fmt;

/// Errors raised while building or importing a type layout.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReflectionError {
    /// Two fields of the same struct share a name.
    #[error("duplicate field `{field}` in struct `{layout}`")]
    DuplicateField { layout: String, field: String },
    /// The front end reported a type kind this layer cannot represent.
    #[error("unsupported reflected type kind: {0}")]
    UnsupportedTypeKind(String),
    /// The front end returned no layout where one was required.
    #[error("missing reflected layout: {0}")]
    MissingLayout(String),
}

/// The structural kind of a [`TypeLayout`] node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Struct,
    Array,
    Scalar,
    Vector,
    Matrix,
    /// An opaque resource binding (texture, sampler, buffer view, ...).
    Resource,
    ConstantBuffer,
    ParameterBlock,
}

/// Scalar element types of ordinary data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    Bool,
    Int32,
    UInt32,
    Float16,
    Float32,
    Int64,
    UInt64,
    Float64,
}

impl ScalarType {
    /// Size of the scalar in bytes as laid out in a uniform buffer.
    pub fn size(self) -> usize {
        match self {
            Self::Float16 => 2,
            Self::Bool | Self::Int32 | Self::UInt32 | Self::Float32 => 4,
            Self::Int64 | Self::UInt64 | Self::Float64 => 8,
        }
    }
}

/// Kind of an opaque binding as reported by the front end.
///
/// This mirrors the front end's full vocabulary; only a subset maps onto
/// native descriptor kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingKind {
    Unknown,
    Sampler,
    Texture,
    ConstantBuffer,
    ParameterBlock,
    TypedBuffer,
    RawBuffer,
    CombinedTextureSampler,
    InputRenderTarget,
    InlineUniformData,
    RayTracingAccelerationStructure,
    VaryingInput,
    VaryingOutput,
    ExistentialValue,
    PushConstant,
    MutableTexture,
    MutableTypedBuffer,
    MutableRawBuffer,
}

/// Number of elements in an array, or of descriptors in a binding range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementCount {
    Bounded(u32),
    /// Runtime-sized (`T[]`).
    Unbounded,
}

impl ElementCount {
    /// Returns the count if bounded.
    pub fn bounded(self) -> Option<u32> {
        match self {
            Self::Bounded(count) => Some(count),
            Self::Unbounded => None,
        }
    }

    /// Whether `index` addresses an element of this count.
    ///
    /// Every index is considered in range for unbounded counts.
    pub fn contains(self, index: u32) -> bool {
        match self {
            Self::Bounded(count) => index < count,
            Self::Unbounded => true,
        }
    }

    /// Product of two counts; unbounded if either side is.
    pub fn multiply(self, other: ElementCount) -> ElementCount {
        match (self, other) {
            (Self::Bounded(a), Self::Bounded(b)) => Self::Bounded(a.saturating_mul(b)),
            _ => Self::Unbounded,
        }
    }
}

impl fmt::Display for ElementCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bounded(count) => write!(f, "{count}"),
            Self::Unbounded => write!(f, "unbounded"),
        }
    }
}

/// A contiguous run of descriptors of one kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BindingRange {
    pub kind: BindingKind,
    pub count: ElementCount,
}

impl BindingRange {
    pub fn new(kind: BindingKind, count: ElementCount) -> Self {
        Self { kind, count }
    }
}

/// A named field of a struct layout.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldLayout {
    name: String,
    type_layout: TypeLayout,
    byte_offset: usize,
    binding_range_offset: u32,
}

impl FieldLayout {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_layout(&self) -> &TypeLayout {
        &self.type_layout
    }

    /// Byte offset of the field's ordinary data within its parent.
    pub fn byte_offset(&self) -> usize {
        self.byte_offset
    }

    /// Index of the field's first binding range within the parent's
    /// flattened range list.
    pub fn binding_range_offset(&self) -> u32 {
        self.binding_range_offset
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Shape {
    Scalar(ScalarType),
    Vector {
        scalar: ScalarType,
        count: u32,
    },
    Matrix {
        scalar: ScalarType,
        rows: u32,
        columns: u32,
    },
    Struct(Vec<FieldLayout>),
    Array {
        element: Box<TypeLayout>,
        stride: usize,
        count: ElementCount,
    },
    Resource(BindingKind),
    Container(Box<TypeLayout>),
}

/// Layout of a shader type.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeLayout {
    kind: TypeKind,
    name: Option<String>,
    size: usize,
    alignment: usize,
    shape: Shape,
    binding_ranges: Vec<BindingRange>,
}

fn round_up(value: usize, alignment: usize) -> usize {
    if alignment <= 1 {
        value
    } else {
        value.div_ceil(alignment) * alignment
    }
}

/// Minimum alignment of arrays and structs in a constant buffer.
const UNIFORM_BLOCK_ALIGNMENT: usize = 16;

impl TypeLayout {
    /// A single scalar.
    pub fn scalar(scalar: ScalarType) -> Self {
        Self {
            kind: TypeKind::Scalar,
            name: None,
            size: scalar.size(),
            alignment: scalar.size(),
            shape: Shape::Scalar(scalar),
            binding_ranges: Vec::new(),
        }
    }

    /// A vector of `count` scalars (`count` in 1..=4).
    pub fn vector(scalar: ScalarType, count: u32) -> Self {
        let alignment = match count {
            0 | 1 => scalar.size(),
            2 => scalar.size() * 2,
            _ => scalar.size() * 4,
        };
        Self {
            kind: TypeKind::Vector,
            name: None,
            size: scalar.size() * count as usize,
            alignment,
            shape: Shape::Vector { scalar, count },
            binding_ranges: Vec::new(),
        }
    }

    /// A column-major matrix; every column is padded to 16 bytes.
    pub fn matrix(scalar: ScalarType, rows: u32, columns: u32) -> Self {
        let column_stride = round_up(scalar.size() * rows as usize, UNIFORM_BLOCK_ALIGNMENT);
        Self {
            kind: TypeKind::Matrix,
            name: None,
            size: column_stride * columns as usize,
            alignment: UNIFORM_BLOCK_ALIGNMENT,
            shape: Shape::Matrix {
                scalar,
                rows,
                columns,
            },
            binding_ranges: Vec::new(),
        }
    }

    /// A single opaque resource binding.
    pub fn resource(kind: BindingKind) -> Self {
        Self {
            kind: TypeKind::Resource,
            name: None,
            size: 0,
            alignment: 1,
            shape: Shape::Resource(kind),
            binding_ranges: vec![BindingRange::new(kind, ElementCount::Bounded(1))],
        }
    }

    /// An array of `count` resource bindings of one kind.
    pub fn resource_array(kind: BindingKind, count: ElementCount) -> Self {
        Self::array(Self::resource(kind), count)
    }

    /// An array whose stride follows constant-buffer rules: the element size
    /// rounded up to 16 bytes.
    pub fn array(element: TypeLayout, count: ElementCount) -> Self {
        let stride = if element.size == 0 {
            0
        } else {
            round_up(
                element.size,
                element.alignment.max(UNIFORM_BLOCK_ALIGNMENT),
            )
        };
        Self::array_with_stride(element, count, stride)
    }

    /// An array with an explicit element stride.
    pub fn array_with_stride(element: TypeLayout, count: ElementCount, stride: usize) -> Self {
        let size = match count {
            ElementCount::Bounded(count) => stride * count as usize,
            ElementCount::Unbounded => 0,
        };
        let binding_ranges = element
            .binding_ranges
            .iter()
            .map(|range| BindingRange::new(range.kind, range.count.multiply(count)))
            .collect();
        Self {
            kind: TypeKind::Array,
            name: None,
            size,
            alignment: if size > 0 {
                element.alignment.max(UNIFORM_BLOCK_ALIGNMENT)
            } else {
                1
            },
            shape: Shape::Array {
                element: Box::new(element),
                stride,
                count,
            },
            binding_ranges,
        }
    }

    /// A `ConstantBuffer<T>` binding.
    pub fn constant_buffer(element: TypeLayout) -> Self {
        Self::container(TypeKind::ConstantBuffer, BindingKind::ConstantBuffer, element)
    }

    /// A `ParameterBlock<T>` binding.
    pub fn parameter_block(element: TypeLayout) -> Self {
        Self::container(TypeKind::ParameterBlock, BindingKind::ParameterBlock, element)
    }

    fn container(kind: TypeKind, binding: BindingKind, element: TypeLayout) -> Self {
        Self {
            kind,
            name: element.name.clone(),
            size: 0,
            alignment: 1,
            shape: Shape::Container(Box::new(element)),
            binding_ranges: vec![BindingRange::new(binding, ElementCount::Bounded(1))],
        }
    }

    /// Assemble a struct from already placed fields.
    ///
    /// Binding-range offsets are assigned here by concatenating the field
    /// ranges in declaration order.
    pub(crate) fn from_fields(
        name: Option<String>,
        fields: Vec<(String, TypeLayout, usize)>,
        size: usize,
        alignment: usize,
    ) -> Self {
        let mut binding_ranges = Vec::new();
        let fields = fields
            .into_iter()
            .map(|(name, type_layout, byte_offset)| {
                let binding_range_offset = binding_ranges.len() as u32;
                binding_ranges.extend_from_slice(&type_layout.binding_ranges);
                FieldLayout {
                    name,
                    type_layout,
                    byte_offset,
                    binding_range_offset,
                }
            })
            .collect();
        Self {
            kind: TypeKind::Struct,
            name,
            size,
            alignment,
            shape: Shape::Struct(fields),
            binding_ranges,
        }
    }

    /// Set the debug name of the layout.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Declared size in bytes of the type's ordinary data.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn alignment(&self) -> usize {
        self.alignment
    }

    /// Whether the type carries ordinary (uniform) data.
    pub fn has_ordinary_data(&self) -> bool {
        self.size > 0
    }

    /// Flattened binding ranges of this type, in declaration order.
    pub fn binding_ranges(&self) -> &[BindingRange] {
        &self.binding_ranges
    }

    /// Fields of a struct layout; empty for every other kind.
    pub fn fields(&self) -> &[FieldLayout] {
        match &self.shape {
            Shape::Struct(fields) => fields,
            _ => &[],
        }
    }

    pub fn field_count(&self) -> usize {
        self.fields().len()
    }

    /// Resolve a field name to its index.
    pub fn find_field_index(&self, name: &str) -> Option<usize> {
        self.fields().iter().position(|field| field.name == name)
    }

    /// Element layout of arrays, constant buffers and parameter blocks.
    pub fn element_type(&self) -> Option<&TypeLayout> {
        match &self.shape {
            Shape::Array { element, .. } | Shape::Container(element) => Some(element),
            _ => None,
        }
    }

    /// Byte stride between array elements.
    pub fn element_stride(&self) -> Option<usize> {
        match &self.shape {
            Shape::Array { stride, .. } => Some(*stride),
            _ => None,
        }
    }

    /// Number of elements for arrays, element count of vectors.
    pub fn element_count(&self) -> Option<ElementCount> {
        match &self.shape {
            Shape::Array { count, .. } => Some(*count),
            Shape::Vector { count, .. } => Some(ElementCount::Bounded(*count)),
            _ => None,
        }
    }

    /// Binding kind of a resource layout.
    pub fn binding_kind(&self) -> Option<BindingKind> {
        match &self.shape {
            Shape::Resource(kind) => Some(*kind),
            _ => None,
        }
    }

    pub fn scalar_type(&self) -> Option<ScalarType> {
        match &self.shape {
            Shape::Scalar(scalar)
            | Shape::Vector { scalar, .. }
            | Shape::Matrix { scalar, .. } => Some(*scalar),
            _ => None,
        }
    }

    /// `(rows, columns)` of a matrix layout.
    pub fn matrix_dimensions(&self) -> Option<(u32, u32)> {
        match &self.shape {
            Shape::Matrix { rows, columns, .. } => Some((*rows, *columns)),
            _ => None,
        }
    }
}
