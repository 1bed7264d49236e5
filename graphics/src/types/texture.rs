//! Textures as seen by the binding layer: enough to create an image that can
//! be written to a sampled, combined or storage binding.

use bitflags::bitflags;

use crate::error::GraphicsError;

/// Size of a texture in texels. `depth` is 1 for 2D textures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Extent3d {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
}

impl Extent3d {
    pub fn new_2d(width: u32, height: u32) -> Self {
        Self::new_3d(width, height, 1)
    }

    pub fn new_3d(width: u32, height: u32, depth: u32) -> Self {
        Self {
            width,
            height,
            depth,
        }
    }

    fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0 || self.depth == 0
    }
}

impl Default for Extent3d {
    fn default() -> Self {
        Self::new_2d(1, 1)
    }
}

/// Texel formats a parameter block can reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum TextureFormat {
    R8Unorm,
    R16Float,
    R32Float,
    R32Uint,
    #[default]
    Rgba8Unorm,
    Rgba8UnormSrgb,
    Bgra8Unorm,
    Rgba16Float,
    Rgba32Float,
    /// Shadow maps.
    Depth32Float,
}

impl TextureFormat {
    pub fn is_depth(&self) -> bool {
        matches!(self, Self::Depth32Float)
    }
}

bitflags! {
    /// How a texture may be used once created.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TextureUsage: u32 {
        const COPY_SRC = 1 << 0;
        const COPY_DST = 1 << 1;
        /// Readable through sampled-image and combined image-sampler
        /// bindings.
        const TEXTURE_BINDING = 1 << 2;
        /// Readable and writable through storage-image bindings.
        const STORAGE_BINDING = 1 << 3;
    }
}

impl Default for TextureUsage {
    fn default() -> Self {
        Self::TEXTURE_BINDING
    }
}

/// Parameters of [`GraphicsDevice::create_texture`].
///
/// [`GraphicsDevice::create_texture`]: crate::GraphicsDevice::create_texture
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TextureDescriptor {
    pub label: Option<String>,
    pub size: Extent3d,
    pub mip_level_count: u32,
    pub format: TextureFormat,
    pub usage: TextureUsage,
}

impl TextureDescriptor {
    pub fn new_2d(width: u32, height: u32, format: TextureFormat, usage: TextureUsage) -> Self {
        Self {
            label: None,
            size: Extent3d::new_2d(width, height),
            mip_level_count: 1,
            format,
            usage,
        }
    }

    /// A volume texture, e.g. a color-grading LUT.
    pub fn new_3d(
        width: u32,
        height: u32,
        depth: u32,
        format: TextureFormat,
        usage: TextureUsage,
    ) -> Self {
        Self {
            size: Extent3d::new_3d(width, height, depth),
            ..Self::new_2d(width, height, format, usage)
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_mip_levels(mut self, count: u32) -> Self {
        self.mip_level_count = count;
        self
    }

    /// Whether the texture can back a storage-image binding.
    pub fn is_storage(&self) -> bool {
        self.usage.contains(TextureUsage::STORAGE_BINDING)
    }

    /// Reject descriptors no backend can create.
    pub fn validate(&self) -> Result<(), GraphicsError> {
        if self.size.is_empty() {
            return Err(GraphicsError::InvalidParameter(format!(
                "texture {:?} has a zero dimension ({}x{}x{})",
                self.label, self.size.width, self.size.height, self.size.depth
            )));
        }
        if self.mip_level_count == 0 {
            return Err(GraphicsError::InvalidParameter(format!(
                "texture {:?} needs at least one mip level",
                self.label
            )));
        }
        if self.is_storage() && self.format.is_depth() {
            return Err(GraphicsError::InvalidParameter(format!(
                "depth texture {:?} cannot be a storage image",
                self.label
            )));
        }
        Ok(())
    }
}

impl Default for TextureDescriptor {
    fn default() -> Self {
        Self::new_2d(1, 1, TextureFormat::default(), TextureUsage::default())
    }
}
