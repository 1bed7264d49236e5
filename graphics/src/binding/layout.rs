//! Descriptor binding plans derived from reflected type layouts.
//!
//! A [`BindingLayout`] is the API-independent description of one descriptor
//! set: one entry per binding range of the reflected type, in declaration
//! order, followed by a single uniform-buffer entry for the type's ordinary
//! data when it has any. Backends turn the plan into native objects.

use prism_core::reflection::{BindingKind, TypeLayout};

use crate::error::BindingError;

/// Native descriptor kind of a binding slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorKind {
    /// Standalone sampler.
    Sampler,
    /// Sampled image without a sampler.
    SampledImage,
    /// Image and sampler in one descriptor.
    CombinedImageSampler,
    /// Uniform buffer.
    UniformBuffer,
    /// Read-write storage image.
    StorageImage,
    /// Ray tracing acceleration structure.
    AccelerationStructure,
    /// Uniform data stored inline in the descriptor set.
    InlineUniformBlock,
}

impl DescriptorKind {
    /// Map a reflected binding kind to its native descriptor kind.
    ///
    /// Returns `None` for kinds without a descriptor equivalent.
    pub fn from_binding_kind(kind: BindingKind) -> Option<Self> {
        match kind {
            BindingKind::Sampler => Some(Self::Sampler),
            BindingKind::Texture => Some(Self::SampledImage),
            BindingKind::CombinedTextureSampler => Some(Self::CombinedImageSampler),
            BindingKind::ConstantBuffer | BindingKind::ParameterBlock => Some(Self::UniformBuffer),
            BindingKind::MutableTexture => Some(Self::StorageImage),
            BindingKind::RayTracingAccelerationStructure => Some(Self::AccelerationStructure),
            BindingKind::InlineUniformData => Some(Self::InlineUniformBlock),
            _ => None,
        }
    }

    /// Whether a texture can be written to a descriptor of this kind.
    pub fn accepts_texture(self) -> bool {
        matches!(
            self,
            Self::SampledImage | Self::CombinedImageSampler | Self::StorageImage
        )
    }

    /// Whether a sampler can be written to a descriptor of this kind.
    pub fn accepts_sampler(self) -> bool {
        matches!(self, Self::Sampler)
    }
}

bitflags::bitflags! {
    /// Shader stages that can access a binding.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ShaderStageFlags: u32 {
        /// Vertex shader stage.
        const VERTEX = 1 << 0;
        /// Fragment shader stage.
        const FRAGMENT = 1 << 1;
        /// Compute shader stage.
        const COMPUTE = 1 << 2;
        /// Every stage.
        const ALL = Self::VERTEX.bits() | Self::FRAGMENT.bits() | Self::COMPUTE.bits();
    }
}

/// Describes a single binding slot in a layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingLayoutEntry {
    /// Binding slot within the set.
    pub binding: u32,

    /// Kind of descriptor expected at this binding.
    pub kind: DescriptorKind,

    /// Number of array elements.
    pub count: u32,

    /// Shader stages that can access this binding.
    pub visibility: ShaderStageFlags,

    /// Optional label for debugging.
    pub label: Option<String>,
}

impl BindingLayoutEntry {
    /// Create a new single-descriptor entry visible to all stages.
    pub fn new(binding: u32, kind: DescriptorKind) -> Self {
        Self {
            binding,
            kind,
            count: 1,
            visibility: ShaderStageFlags::ALL,
            label: None,
        }
    }

    /// Set the array element count.
    pub fn with_count(mut self, count: u32) -> Self {
        self.count = count;
        self
    }

    /// Set the shader stage visibility.
    pub fn with_visibility(mut self, visibility: ShaderStageFlags) -> Self {
        self.visibility = visibility;
        self
    }

    /// Set a debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Describes the bindings of one descriptor set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BindingLayout {
    entries: Vec<BindingLayoutEntry>,
    ordinary_data_size: usize,
    label: Option<String>,
}

impl BindingLayout {
    /// Create a new empty binding layout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Plan the descriptor set for a reflected type.
    ///
    /// Binding range `i` becomes slot `i`. If the type carries ordinary data,
    /// one more uniform-buffer slot is appended after every resource slot.
    pub fn from_type_layout(type_layout: &TypeLayout) -> Result<Self, BindingError> {
        let mut layout = Self::new();

        for (index, range) in type_layout.binding_ranges().iter().enumerate() {
            let binding = index as u32;
            let kind = DescriptorKind::from_binding_kind(range.kind).ok_or(
                BindingError::UnsupportedBindingKind {
                    binding,
                    kind: range.kind,
                },
            )?;
            let count = range
                .count
                .bounded()
                .ok_or(BindingError::UnboundedBindingRange { binding })?;
            layout = layout.with_entry(BindingLayoutEntry::new(binding, kind).with_count(count));
        }

        if type_layout.has_ordinary_data() {
            let binding = layout.entries.len() as u32;
            layout = layout.with_entry(
                BindingLayoutEntry::new(binding, DescriptorKind::UniformBuffer)
                    .with_label("ordinary data"),
            );
            layout.ordinary_data_size = type_layout.size();
        }

        if let Some(name) = type_layout.name() {
            layout = layout.with_label(name);
        }

        log::debug!(
            "Planned binding layout {:?}: {} resource bindings, {} bytes of ordinary data",
            layout.label,
            layout.resource_binding_count(),
            layout.ordinary_data_size
        );

        Ok(layout)
    }

    /// Add a binding entry to the layout.
    pub fn with_entry(mut self, entry: BindingLayoutEntry) -> Self {
        self.entries.push(entry);
        self
    }

    /// Set a debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn entries(&self) -> &[BindingLayoutEntry] {
        &self.entries
    }

    pub fn entry(&self, binding: u32) -> Option<&BindingLayoutEntry> {
        self.entries.get(binding as usize)
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Total number of slots, including the ordinary-data slot.
    pub fn binding_count(&self) -> u32 {
        self.entries.len() as u32
    }

    /// Number of slots holding resources (everything but ordinary data).
    pub fn resource_binding_count(&self) -> u32 {
        self.binding_count() - self.ordinary_data_binding().map_or(0, |_| 1)
    }

    /// Byte size of the ordinary-data buffer, zero if there is none.
    pub fn ordinary_data_size(&self) -> usize {
        self.ordinary_data_size
    }

    /// Slot reserved for the ordinary-data uniform buffer.
    pub fn ordinary_data_binding(&self) -> Option<u32> {
        (self.ordinary_data_size > 0).then(|| self.binding_count() - 1)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Descriptor counts needed to allocate this set `sets` times,
    /// aggregated per kind in order of first appearance. Zero-sized
    /// bindings contribute nothing.
    pub fn pool_sizes(&self, sets: u32) -> Result<Vec<(DescriptorKind, u32)>, BindingError> {
        let mut sizes: Vec<(DescriptorKind, u32)> = Vec::new();
        for entry in self.entries.iter().filter(|entry| entry.count > 0) {
            let overflow = BindingError::DescriptorCountOverflow {
                binding: entry.binding,
                sets,
            };
            let needed = entry.count.checked_mul(sets).ok_or(overflow.clone())?;
            match sizes.iter_mut().find(|(kind, _)| *kind == entry.kind) {
                Some((_, count)) => *count = count.checked_add(needed).ok_or(overflow)?,
                None => sizes.push((entry.kind, needed)),
            }
        }
        Ok(sizes)
    }

    /// Check that `size` bytes at `offset` fit in the ordinary-data buffer.
    pub fn check_write(&self, offset: usize, size: usize) -> Result<(), BindingError> {
        match offset.checked_add(size) {
            Some(end) if end <= self.ordinary_data_size => Ok(()),
            _ => Err(BindingError::WriteOutOfBounds {
                offset,
                size,
                capacity: self.ordinary_data_size,
            }),
        }
    }

    /// Resolve the resource slot a write targets.
    ///
    /// The binding must be a resource slot whose kind is accepted by
    /// `accepts`, and `element` must be within its descriptor count.
    pub fn resolve_resource(
        &self,
        binding: u32,
        element: u32,
        resource: &'static str,
        accepts: fn(DescriptorKind) -> bool,
    ) -> Result<&BindingLayoutEntry, BindingError> {
        let count = self.resource_binding_count();
        let entry = self
            .entry(binding)
            .filter(|_| binding < count)
            .ok_or(BindingError::BindingIndexOutOfRange { binding, count })?;

        if !accepts(entry.kind) {
            return Err(BindingError::ResourceKindMismatch {
                binding,
                expected: entry.kind,
                resource,
            });
        }
        if element >= entry.count {
            return Err(BindingError::BindingElementOutOfRange {
                binding,
                element,
                count: entry.count,
            });
        }
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prism_core::reflection::{ElementCount, ScalarType, StructLayoutBuilder};

    fn textured_material() -> TypeLayout {
        StructLayoutBuilder::new("Material")
            .field("albedo", TypeLayout::vector(ScalarType::Float32, 3))
            .field("roughness", TypeLayout::scalar(ScalarType::Float32))
            .field("base", TypeLayout::resource(BindingKind::Texture))
            .field("linear", TypeLayout::resource(BindingKind::Sampler))
            .field(
                "layers",
                TypeLayout::resource_array(BindingKind::Texture, ElementCount::Bounded(4)),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn test_binding_layout_builder() {
        let layout = BindingLayout::new()
            .with_entry(BindingLayoutEntry::new(0, DescriptorKind::UniformBuffer))
            .with_entry(BindingLayoutEntry::new(1, DescriptorKind::SampledImage))
            .with_entry(BindingLayoutEntry::new(2, DescriptorKind::Sampler))
            .with_label("material_bindings");

        assert_eq!(layout.entries().len(), 3);
        assert_eq!(layout.label(), Some("material_bindings"));
    }

    #[test]
    fn test_binding_entry_visibility() {
        let entry = BindingLayoutEntry::new(0, DescriptorKind::UniformBuffer)
            .with_visibility(ShaderStageFlags::VERTEX);

        assert_eq!(entry.visibility, ShaderStageFlags::VERTEX);
        assert!(!entry.visibility.contains(ShaderStageFlags::FRAGMENT));
        assert_eq!(
            BindingLayoutEntry::new(0, DescriptorKind::Sampler).visibility,
            ShaderStageFlags::ALL
        );
    }

    #[test]
    fn test_from_type_layout_orders_ranges_then_ordinary_data() {
        let layout = BindingLayout::from_type_layout(&textured_material()).unwrap();

        let kinds: Vec<(u32, DescriptorKind, u32)> = layout
            .entries()
            .iter()
            .map(|entry| (entry.binding, entry.kind, entry.count))
            .collect();
        assert_eq!(
            kinds,
            vec![
                (0, DescriptorKind::SampledImage, 1),
                (1, DescriptorKind::Sampler, 1),
                (2, DescriptorKind::SampledImage, 4),
                (3, DescriptorKind::UniformBuffer, 1),
            ]
        );
        assert_eq!(layout.binding_count(), 4);
        assert_eq!(layout.resource_binding_count(), 3);
        assert_eq!(layout.ordinary_data_binding(), Some(3));
        assert_eq!(layout.ordinary_data_size(), 16);
        assert_eq!(layout.label(), Some("Material"));
    }

    #[test]
    fn test_resource_only_layout_has_no_uniform_slot() {
        let type_layout = StructLayoutBuilder::new("Maps")
            .field("base", TypeLayout::resource(BindingKind::Texture))
            .build()
            .unwrap();
        let layout = BindingLayout::from_type_layout(&type_layout).unwrap();
        assert_eq!(layout.binding_count(), 1);
        assert_eq!(layout.ordinary_data_binding(), None);
    }

    #[test]
    fn test_empty_layout() {
        let type_layout = StructLayoutBuilder::new("Empty").build().unwrap();
        let layout = BindingLayout::from_type_layout(&type_layout).unwrap();
        assert!(layout.is_empty());
        assert_eq!(layout.binding_count(), 0);
        assert!(layout.pool_sizes(2).unwrap().is_empty());
    }

    #[test]
    fn test_kind_table() {
        let cases = [
            (BindingKind::Sampler, Some(DescriptorKind::Sampler)),
            (BindingKind::Texture, Some(DescriptorKind::SampledImage)),
            (
                BindingKind::CombinedTextureSampler,
                Some(DescriptorKind::CombinedImageSampler),
            ),
            (BindingKind::ConstantBuffer, Some(DescriptorKind::UniformBuffer)),
            (BindingKind::ParameterBlock, Some(DescriptorKind::UniformBuffer)),
            (BindingKind::MutableTexture, Some(DescriptorKind::StorageImage)),
            (
                BindingKind::RayTracingAccelerationStructure,
                Some(DescriptorKind::AccelerationStructure),
            ),
            (
                BindingKind::InlineUniformData,
                Some(DescriptorKind::InlineUniformBlock),
            ),
            (BindingKind::RawBuffer, None),
            (BindingKind::PushConstant, None),
            (BindingKind::Unknown, None),
        ];
        for (kind, expected) in cases {
            assert_eq!(DescriptorKind::from_binding_kind(kind), expected, "{kind:?}");
        }
    }

    #[test]
    fn test_unmapped_kind_is_rejected() {
        let type_layout = StructLayoutBuilder::new("Buffers")
            .field("data", TypeLayout::resource(BindingKind::MutableRawBuffer))
            .build()
            .unwrap();
        assert_eq!(
            BindingLayout::from_type_layout(&type_layout),
            Err(BindingError::UnsupportedBindingKind {
                binding: 0,
                kind: BindingKind::MutableRawBuffer,
            })
        );
    }

    #[test]
    fn test_unbounded_range_is_rejected() {
        let type_layout = StructLayoutBuilder::new("Bindless")
            .field("base", TypeLayout::resource(BindingKind::Sampler))
            .field(
                "textures",
                TypeLayout::resource_array(BindingKind::Texture, ElementCount::Unbounded),
            )
            .build()
            .unwrap();
        assert_eq!(
            BindingLayout::from_type_layout(&type_layout),
            Err(BindingError::UnboundedBindingRange { binding: 1 })
        );
    }

    #[test]
    fn test_pool_sizes_aggregate_per_kind() {
        let layout = BindingLayout::from_type_layout(&textured_material()).unwrap();
        assert_eq!(
            layout.pool_sizes(3).unwrap(),
            vec![
                (DescriptorKind::SampledImage, 15),
                (DescriptorKind::Sampler, 3),
                (DescriptorKind::UniformBuffer, 3),
            ]
        );
    }

    #[test]
    fn test_pool_sizes_overflow_is_an_error() {
        let type_layout = StructLayoutBuilder::new("Huge")
            .field(
                "textures",
                TypeLayout::resource_array(BindingKind::Texture, ElementCount::Bounded(1 << 31)),
            )
            .build()
            .unwrap();
        let layout = BindingLayout::from_type_layout(&type_layout).unwrap();
        assert_eq!(layout.pool_sizes(1).unwrap(), vec![(DescriptorKind::SampledImage, 1 << 31)]);
        assert_eq!(
            layout.pool_sizes(2),
            Err(BindingError::DescriptorCountOverflow { binding: 0, sets: 2 })
        );

        let split = BindingLayout::new()
            .with_entry(BindingLayoutEntry::new(0, DescriptorKind::Sampler).with_count(u32::MAX))
            .with_entry(BindingLayoutEntry::new(1, DescriptorKind::Sampler).with_count(1));
        assert_eq!(
            split.pool_sizes(1),
            Err(BindingError::DescriptorCountOverflow { binding: 1, sets: 1 })
        );
    }

    #[test]
    fn test_zero_sized_binding_has_no_pool_size() {
        let type_layout = StructLayoutBuilder::new("Sparse")
            .field(
                "none",
                TypeLayout::resource_array(BindingKind::Texture, ElementCount::Bounded(0)),
            )
            .field("linear", TypeLayout::resource(BindingKind::Sampler))
            .build()
            .unwrap();
        let layout = BindingLayout::from_type_layout(&type_layout).unwrap();
        assert_eq!(layout.binding_count(), 2);
        assert_eq!(layout.pool_sizes(2).unwrap(), vec![(DescriptorKind::Sampler, 2)]);
    }

    #[test]
    fn test_check_write_bounds() {
        let layout = BindingLayout::from_type_layout(&textured_material()).unwrap();
        assert!(layout.check_write(12, 4).is_ok());
        assert_eq!(
            layout.check_write(12, 8),
            Err(BindingError::WriteOutOfBounds {
                offset: 12,
                size: 8,
                capacity: 16,
            })
        );
    }

    #[test]
    fn test_resolve_resource() {
        let layout = BindingLayout::from_type_layout(&textured_material()).unwrap();

        let entry = layout
            .resolve_resource(2, 3, "texture", DescriptorKind::accepts_texture)
            .unwrap();
        assert_eq!(entry.count, 4);

        assert_eq!(
            layout.resolve_resource(2, 4, "texture", DescriptorKind::accepts_texture),
            Err(BindingError::BindingElementOutOfRange {
                binding: 2,
                element: 4,
                count: 4,
            })
        );
        assert_eq!(
            layout.resolve_resource(1, 0, "texture", DescriptorKind::accepts_texture),
            Err(BindingError::ResourceKindMismatch {
                binding: 1,
                expected: DescriptorKind::Sampler,
                resource: "texture",
            })
        );
        // The ordinary-data slot is not a resource slot.
        assert_eq!(
            layout.resolve_resource(3, 0, "sampler", DescriptorKind::accepts_sampler),
            Err(BindingError::BindingIndexOutOfRange {
                binding: 3,
                count: 3,
            })
        );
    }
}
