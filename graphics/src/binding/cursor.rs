use prism_core::reflection::{ElementCount, TypeKind, TypeLayout};

use crate::error::{BindingError, GraphicsError};
use crate::resources::{Sampler, Texture};

use super::{ShaderObject, ShaderOffset};

/// A position inside a shader object's parameter block.
///
/// Cursors are cheap to copy and never own anything: navigation returns a
/// new cursor, and writes forward to the object the cursor was rooted at.
///
/// ```ignore
/// let cursor = block.cursor();
/// cursor.field("roughness")?.write(&0.5f32)?;
/// cursor.field("textures")?.element(3)?.write_texture(&albedo)?;
/// ```
#[derive(Clone, Copy)]
pub struct ShaderCursor<'a> {
    object: &'a dyn ShaderObject,
    offset: ShaderOffset,
    type_layout: &'a TypeLayout,
}

impl<'a> ShaderCursor<'a> {
    /// Cursor at the root of `object`.
    pub fn new(object: &'a dyn ShaderObject) -> Self {
        Self {
            object,
            offset: ShaderOffset::default(),
            type_layout: object.type_layout(),
        }
    }

    pub fn offset(&self) -> ShaderOffset {
        self.offset
    }

    pub fn type_layout(&self) -> &'a TypeLayout {
        self.type_layout
    }

    pub fn kind(&self) -> TypeKind {
        self.type_layout.kind()
    }

    pub fn field_count(&self) -> usize {
        self.type_layout.field_count()
    }

    pub fn element_count(&self) -> Option<ElementCount> {
        self.type_layout.element_count()
    }

    /// Resolve a field name once so repeated writes can use
    /// [`field_by_index`](Self::field_by_index).
    pub fn field_index(&self, name: &str) -> Result<usize, BindingError> {
        self.expect_kind("field_index", TypeKind::Struct)?;
        self.type_layout
            .find_field_index(name)
            .ok_or_else(|| BindingError::FieldNotFound(name.to_string()))
    }

    /// Move to the struct field called `name`.
    pub fn field(&self, name: &str) -> Result<Self, BindingError> {
        let index = self.field_index(name)?;
        self.field_by_index(index)
    }

    /// Move to the struct field at `index`.
    pub fn field_by_index(&self, index: usize) -> Result<Self, BindingError> {
        self.expect_kind("field_by_index", TypeKind::Struct)?;
        let fields = self.type_layout.fields();
        let field = fields.get(index).ok_or(BindingError::FieldIndexOutOfRange {
            index,
            count: fields.len(),
        })?;

        Ok(Self {
            object: self.object,
            offset: self.offset.field(field),
            type_layout: field.type_layout(),
        })
    }

    /// Move to array element `index`.
    ///
    /// Unbounded arrays accept any index and are expected at the outermost
    /// level only.
    pub fn element(&self, index: u32) -> Result<Self, BindingError> {
        self.expect_kind("element", TypeKind::Array)?;
        let (Some(element), Some(stride), Some(count)) = (
            self.type_layout.element_type(),
            self.type_layout.element_stride(),
            self.type_layout.element_count(),
        ) else {
            return Err(BindingError::InvalidLayoutKind {
                operation: "element",
                kind: self.kind(),
            });
        };

        if !count.contains(index) {
            return Err(BindingError::ElementOutOfRange {
                index,
                count: count.bounded().unwrap_or_default(),
            });
        }

        Ok(Self {
            object: self.object,
            offset: self
                .offset
                .element(index, stride, count.bounded().unwrap_or_default())?,
            type_layout: element,
        })
    }

    /// Follow a dotted path such as `lights[2].color` or `textures[3]`.
    pub fn path(&self, path: &str) -> Result<Self, BindingError> {
        let mut cursor = *self;
        for segment in path.split('.') {
            let (name, mut rest) = match segment.find('[') {
                Some(bracket) => segment.split_at(bracket),
                None => (segment, ""),
            };
            if !name.is_empty() {
                cursor = cursor.field(name)?;
            }
            while let Some(tail) = rest.strip_prefix('[') {
                let (index, remainder) = tail
                    .split_once(']')
                    .ok_or_else(|| BindingError::FieldNotFound(segment.to_string()))?;
                let index = index
                    .trim()
                    .parse::<u32>()
                    .map_err(|_| BindingError::FieldNotFound(segment.to_string()))?;
                cursor = cursor.element(index)?;
                rest = remainder;
            }
            if !rest.is_empty() {
                return Err(BindingError::FieldNotFound(segment.to_string()));
            }
        }
        Ok(cursor)
    }

    /// Write raw bytes to the ordinary data at this position.
    ///
    /// The payload must be exactly the declared size of the parameter.
    pub fn write_bytes(&self, data: &[u8]) -> Result<(), GraphicsError> {
        if !self.type_layout.has_ordinary_data() {
            return Err(BindingError::NotOrdinaryData(self.kind()).into());
        }
        if data.len() != self.type_layout.size() {
            return Err(BindingError::SizeMismatch {
                expected: self.type_layout.size(),
                actual: data.len(),
            }
            .into());
        }
        self.object.write(self.offset, data)
    }

    /// Write a plain-old-data value.
    pub fn write<T: bytemuck::Pod>(&self, value: &T) -> Result<(), GraphicsError> {
        self.write_bytes(bytemuck::bytes_of(value))
    }

    /// Bind a texture at this position.
    pub fn write_texture(&self, texture: &Texture) -> Result<(), GraphicsError> {
        self.expect_kind("write_texture", TypeKind::Resource)?;
        self.object.write_texture(self.offset, texture)
    }

    /// Bind a sampler at this position.
    pub fn write_sampler(&self, sampler: &Sampler) -> Result<(), GraphicsError> {
        self.expect_kind("write_sampler", TypeKind::Resource)?;
        self.object.write_sampler(self.offset, sampler)
    }

    fn expect_kind(&self, operation: &'static str, kind: TypeKind) -> Result<(), BindingError> {
        if self.kind() == kind {
            Ok(())
        } else {
            Err(BindingError::InvalidLayoutKind {
                operation,
                kind: self.kind(),
            })
        }
    }
}

impl std::fmt::Debug for ShaderCursor<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShaderCursor")
            .field("offset", &self.offset)
            .field("kind", &self.type_layout.kind())
            .field("name", &self.type_layout.name())
            .finish_non_exhaustive()
    }
}
