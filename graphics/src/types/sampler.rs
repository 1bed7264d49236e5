//! Sampler state bound to sampler and combined image-sampler slots.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FilterMode {
    #[default]
    Nearest,
    Linear,
}

/// What happens to coordinates outside `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AddressMode {
    #[default]
    ClampToEdge,
    Repeat,
    MirrorRepeat,
    ClampToBorder,
}

/// Depth comparison for shadow-map samplers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareFunction {
    Never,
    Less,
    Equal,
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    Always,
}

/// Parameters of [`GraphicsDevice::create_sampler`].
///
/// Starts from point sampling with clamped addressing; the presets cover
/// the common material and shadow cases.
///
/// [`GraphicsDevice::create_sampler`]: crate::GraphicsDevice::create_sampler
#[derive(Debug, Clone, PartialEq)]
pub struct SamplerDescriptor {
    pub label: Option<String>,
    pub address_mode_u: AddressMode,
    pub address_mode_v: AddressMode,
    pub address_mode_w: AddressMode,
    pub mag_filter: FilterMode,
    pub min_filter: FilterMode,
    pub mipmap_filter: FilterMode,
    pub lod_min_clamp: f32,
    pub lod_max_clamp: f32,
    pub compare: Option<CompareFunction>,
    /// 1 disables anisotropic filtering. Ignored on devices without
    /// anisotropy support.
    pub anisotropy_clamp: u16,
}

impl SamplerDescriptor {
    /// Largest mip level count a texture can have, used as the default
    /// upper LOD clamp.
    const MAX_LOD: f32 = 32.0;

    pub fn new() -> Self {
        Self::default()
    }

    /// Point sampling, no mip blending.
    pub fn nearest() -> Self {
        Self::default()
    }

    /// Trilinear filtering.
    pub fn linear() -> Self {
        Self::default().with_filter(FilterMode::Linear)
    }

    /// Repeating trilinear sampler with anisotropy, for material textures.
    pub fn material(anisotropy: u16) -> Self {
        Self::linear()
            .with_address_mode(AddressMode::Repeat)
            .with_anisotropy(anisotropy)
    }

    /// Linear comparison sampler for shadow maps (`LessEqual`).
    pub fn shadow() -> Self {
        Self::linear()
            .with_compare(CompareFunction::LessEqual)
            .with_label("shadow")
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Use `filter` for magnification, minification and mip selection.
    pub fn with_filter(mut self, filter: FilterMode) -> Self {
        self.mag_filter = filter;
        self.min_filter = filter;
        self.mipmap_filter = filter;
        self
    }

    /// Use `mode` on all three axes.
    pub fn with_address_mode(mut self, mode: AddressMode) -> Self {
        self.address_mode_u = mode;
        self.address_mode_v = mode;
        self.address_mode_w = mode;
        self
    }

    pub fn with_compare(mut self, compare: CompareFunction) -> Self {
        self.compare = Some(compare);
        self
    }

    pub fn with_anisotropy(mut self, level: u16) -> Self {
        self.anisotropy_clamp = level.max(1);
        self
    }

    pub fn is_comparison(&self) -> bool {
        self.compare.is_some()
    }
}

impl Default for SamplerDescriptor {
    fn default() -> Self {
        Self {
            label: None,
            address_mode_u: AddressMode::default(),
            address_mode_v: AddressMode::default(),
            address_mode_w: AddressMode::default(),
            mag_filter: FilterMode::default(),
            min_filter: FilterMode::default(),
            mipmap_filter: FilterMode::default(),
            lod_min_clamp: 0.0,
            lod_max_clamp: Self::MAX_LOD,
            compare: None,
            anisotropy_clamp: 1,
        }
    }
}
