use super::{ReflectionError, TypeLayout, UNIFORM_BLOCK_ALIGNMENT, round_up};

/// Builder for struct layouts.
///
/// Fields added with [`field`](Self::field) are packed using constant-buffer
/// rules: each field starts at the next multiple of its alignment, and the
/// struct size is rounded up to 16 bytes. [`field_at`](Self::field_at) places
/// a field at an explicit byte offset instead, for layouts reported by a
/// compiler.
#[derive(Debug, Clone)]
pub struct StructLayoutBuilder {
    name: String,
    fields: Vec<(String, TypeLayout, usize)>,
    end: usize,
    alignment: usize,
}

impl StructLayoutBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            end: 0,
            alignment: 1,
        }
    }

    /// Append a field at the next suitably aligned offset.
    pub fn field(self, name: impl Into<String>, layout: TypeLayout) -> Self {
        let offset = if layout.size() == 0 {
            self.end
        } else {
            round_up(self.end, layout.alignment())
        };
        self.field_at(name, offset, layout)
    }

    /// Append a field at an explicit byte offset.
    pub fn field_at(mut self, name: impl Into<String>, offset: usize, layout: TypeLayout) -> Self {
        if layout.size() > 0 {
            self.alignment = self.alignment.max(layout.alignment());
        }
        self.end = self.end.max(offset + layout.size());
        self.fields.push((name.into(), layout, offset));
        self
    }

    /// Finish the struct.
    pub fn build(self) -> Result<TypeLayout, ReflectionError> {
        for (index, (name, _, _)) in self.fields.iter().enumerate() {
            if self.fields[..index].iter().any(|(other, _, _)| other == name) {
                return Err(ReflectionError::DuplicateField {
                    layout: self.name,
                    field: name.clone(),
                });
            }
        }

        let (size, alignment) = if self.end == 0 {
            (0, 1)
        } else {
            let alignment = self.alignment.max(UNIFORM_BLOCK_ALIGNMENT);
            (round_up(self.end, alignment), alignment)
        };

        Ok(TypeLayout::from_fields(
            Some(self.name),
            self.fields,
            size,
            alignment,
        ))
    }
}
