//! Common utilities for binding integration tests.
//!
//! Shared layouts and a per-backend test context so every test can run
//! against the dummy backend and, when available, real Vulkan.

use std::sync::Arc;

use prism_core::reflection::{BindingKind, ElementCount, ScalarType, StructLayoutBuilder, TypeLayout};
use prism_graphics::backend::GpuObjectLayout;
use prism_graphics::{
    BackendType, GraphicsDevice, GraphicsInstance, InstanceParameters, ParameterBlock, Sampler,
    SamplerDescriptor, ShaderObjectLayout, Texture, TextureDescriptor, TextureFormat,
    TextureUsage,
};

/// Frames in flight used by every test context.
pub const FRAMES: u32 = 3;

// ============================================================================
// Backend Enumeration
// ============================================================================

/// Available GPU backends for testing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    /// Dummy backend (records operations, no GPU).
    Dummy,
    /// Vulkan backend (native via ash).
    Vulkan,
}

impl Backend {
    /// Check if this backend is compiled in.
    pub fn is_available(&self) -> bool {
        match self {
            #[cfg(feature = "dummy")]
            Backend::Dummy => true,
            #[cfg(not(feature = "dummy"))]
            Backend::Dummy => false,
            #[cfg(feature = "vulkan-backend")]
            Backend::Vulkan => true,
            #[cfg(not(feature = "vulkan-backend"))]
            Backend::Vulkan => false,
        }
    }

    pub fn to_instance_parameters(self) -> InstanceParameters {
        let backend = match self {
            Backend::Dummy => BackendType::Dummy,
            Backend::Vulkan => BackendType::Vulkan,
        };
        InstanceParameters::new()
            .with_backend(backend)
            .with_frames_in_flight(FRAMES)
            .with_application_name("prism-graphics tests")
    }
}

// ============================================================================
// Test Context
// ============================================================================

/// Test context owning an instance and a device for one backend.
pub struct TestContext {
    pub backend: Backend,
    #[allow(dead_code)]
    instance: Arc<GraphicsInstance>,
    pub device: Arc<GraphicsDevice>,
}

impl TestContext {
    /// Create a new test context for the given backend.
    ///
    /// Returns `None` if the backend is not compiled in or fails to
    /// initialize (no Vulkan driver on the machine).
    pub fn new(backend: Backend) -> Option<Self> {
        let _ = env_logger::builder().is_test(true).try_init();
        if !backend.is_available() {
            return None;
        }

        let instance = match GraphicsInstance::with_parameters(backend.to_instance_parameters()) {
            Ok(instance) => instance,
            Err(e) => {
                eprintln!("Backend {:?} failed to initialize: {}", backend, e);
                return None;
            }
        };
        let device = instance.create_device().ok()?;

        Some(Self {
            backend,
            instance,
            device,
        })
    }

    pub fn layout(&self, type_layout: &Arc<TypeLayout>) -> Arc<ShaderObjectLayout> {
        self.device
            .create_shader_object_layout(type_layout)
            .expect("Failed to create shader object layout")
    }

    pub fn block(&self, layout: &Arc<ShaderObjectLayout>) -> ParameterBlock {
        self.device
            .create_shader_object(layout)
            .expect("Failed to create shader object")
    }

    pub fn texture(&self, label: &str, usage: TextureUsage) -> Arc<Texture> {
        self.device
            .create_texture(
                &TextureDescriptor::new_2d(4, 4, TextureFormat::Rgba8Unorm, usage)
                    .with_label(label),
            )
            .expect("Failed to create texture")
    }

    pub fn sampler(&self) -> Arc<Sampler> {
        self.device
            .create_sampler(&SamplerDescriptor::linear().with_label("test_sampler"))
            .expect("Failed to create sampler")
    }

    /// Current contents of a block's ordinary-data buffer.
    pub fn read_ordinary_data(&self, block: &ParameterBlock) -> Option<Vec<u8>> {
        if let Some(dummy) = block.gpu().as_dummy() {
            return dummy.ordinary_data();
        }
        #[cfg(feature = "vulkan-backend")]
        if let Some(vulkan) = block.gpu().as_vulkan() {
            return vulkan
                .read_ordinary_data()
                .expect("Failed to read back ordinary data");
        }
        None
    }

    /// Number of descriptor pools a layout has created.
    pub fn pool_count(&self, layout: &ShaderObjectLayout) -> usize {
        match layout.gpu() {
            GpuObjectLayout::Dummy(native) => native.pool_count(),
            #[cfg(feature = "vulkan-backend")]
            GpuObjectLayout::Vulkan(native) => native.pool_count(),
        }
    }
}

// ============================================================================
// Layouts
// ============================================================================

/// `{ float3 albedo; float roughness; }`
pub fn surface_layout() -> Arc<TypeLayout> {
    Arc::new(
        StructLayoutBuilder::new("Surface")
            .field("albedo", TypeLayout::vector(ScalarType::Float32, 3))
            .field("roughness", TypeLayout::scalar(ScalarType::Float32))
            .build()
            .expect("Failed to build Surface"),
    )
}

/// Material with ordinary data, a sampler and a texture array at binding 2.
pub fn material_layout() -> Arc<TypeLayout> {
    Arc::new(
        StructLayoutBuilder::new("Material")
            .field("tint", TypeLayout::vector(ScalarType::Float32, 4))
            .field("roughness", TypeLayout::scalar(ScalarType::Float32))
            .field("base", TypeLayout::resource(BindingKind::Texture))
            .field("linear", TypeLayout::resource(BindingKind::Sampler))
            .field(
                "textures",
                TypeLayout::resource_array(BindingKind::Texture, ElementCount::Bounded(4)),
            )
            .build()
            .expect("Failed to build Material"),
    )
}

/// `{ Light lights[3]; }` where each light holds data and a shadow map pair.
pub fn lights_layout() -> Arc<TypeLayout> {
    let light = StructLayoutBuilder::new("Light")
        .field("color", TypeLayout::vector(ScalarType::Float32, 3))
        .field("intensity", TypeLayout::scalar(ScalarType::Float32))
        .field(
            "shadows",
            TypeLayout::resource_array(BindingKind::Texture, ElementCount::Bounded(2)),
        )
        .build()
        .expect("Failed to build Light");
    Arc::new(
        StructLayoutBuilder::new("Lights")
            .field(
                "lights",
                TypeLayout::array(light, ElementCount::Bounded(3)),
            )
            .build()
            .expect("Failed to build Lights"),
    )
}

/// A struct with neither ordinary data nor resources.
pub fn empty_layout() -> Arc<TypeLayout> {
    Arc::new(
        StructLayoutBuilder::new("Empty")
            .build()
            .expect("Failed to build Empty"),
    )
}
