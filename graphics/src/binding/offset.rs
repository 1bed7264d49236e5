use prism_core::reflection::FieldLayout;

use crate::error::BindingError;

/// Location of a parameter within a shader object.
///
/// `byte_offset` addresses ordinary data in the uniform buffer. The binding
/// pair addresses a descriptor: `binding_index` is the slot and
/// `binding_array_element` the flattened element within that slot's array.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ShaderOffset {
    pub byte_offset: usize,
    pub binding_index: u32,
    pub binding_array_element: u32,
}

impl ShaderOffset {
    pub fn new(byte_offset: usize, binding_index: u32, binding_array_element: u32) -> Self {
        Self {
            byte_offset,
            binding_index,
            binding_array_element,
        }
    }

    /// Offset of a struct field relative to this one.
    pub fn field(self, field: &FieldLayout) -> Self {
        Self {
            byte_offset: self.byte_offset + field.byte_offset(),
            binding_index: self.binding_index + field.binding_range_offset(),
            binding_array_element: self.binding_array_element,
        }
    }

    /// Offset of element `index` of an array with the given stride and count.
    ///
    /// Nested resource arrays flatten row-major: the outer element scales by
    /// the inner count.
    ///
    /// # Errors
    ///
    /// [`BindingError::OffsetOverflow`] if either coordinate no longer fits.
    pub fn element(self, index: u32, stride: usize, count: u32) -> Result<Self, BindingError> {
        let overflow = BindingError::OffsetOverflow { index };
        let byte_offset = (index as usize)
            .checked_mul(stride)
            .and_then(|step| self.byte_offset.checked_add(step))
            .ok_or(overflow.clone())?;
        let binding_array_element = self
            .binding_array_element
            .checked_mul(count)
            .and_then(|outer| outer.checked_add(index))
            .ok_or(overflow)?;
        Ok(Self {
            byte_offset,
            binding_index: self.binding_index,
            binding_array_element,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_zero() {
        assert_eq!(ShaderOffset::default(), ShaderOffset::new(0, 0, 0));
    }

    #[test]
    fn test_element_accumulates() {
        let offset = ShaderOffset::default().element(3, 16, 4).unwrap();
        assert_eq!(offset, ShaderOffset::new(48, 0, 3));
    }

    #[test]
    fn test_nested_elements_flatten() {
        let offset = ShaderOffset::default()
            .element(2, 0, 4)
            .and_then(|outer| outer.element(1, 0, 3))
            .unwrap();
        assert_eq!(offset.binding_array_element, 2 * 3 + 1);
    }

    #[test]
    fn test_deep_nesting_overflow_is_an_error() {
        let outer = ShaderOffset::new(0, 0, 70_000);
        assert_eq!(
            outer.element(5, 0, 70_000),
            Err(BindingError::OffsetOverflow { index: 5 })
        );
        let far = ShaderOffset::new(usize::MAX - 8, 0, 0);
        assert_eq!(far.element(1, 16, 4), Err(BindingError::OffsetOverflow { index: 1 }));
        assert!(far.element(0, 16, 4).is_ok());
    }
}
