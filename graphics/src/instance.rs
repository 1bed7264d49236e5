//! Backend selection and device creation.
//!
//! A [`GraphicsInstance`] picks one backend for its lifetime and hands out
//! [`GraphicsDevice`]s that share it. The frames-in-flight count chosen here
//! decides how many descriptor sets every parameter block carries.

use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::backend::{self, GpuBackend};
use crate::device::GraphicsDevice;
use crate::error::GraphicsError;

/// Which GPU backend an instance should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BackendType {
    /// Vulkan if it initializes, otherwise the dummy backend.
    #[default]
    Auto,
    Vulkan,
    /// CPU-only backend that records GPU operations.
    Dummy,
}

/// Configuration for creating a [`GraphicsInstance`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceParameters {
    pub backend: BackendType,
    /// Enable API validation layers when available.
    pub validation: bool,
    /// Descriptor sets each shader object keeps, one per frame in flight.
    pub frames_in_flight: u32,
    pub application_name: String,
}

impl InstanceParameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject parameters no backend can honor.
    pub fn validate(&self) -> Result<(), GraphicsError> {
        if self.frames_in_flight == 0 {
            return Err(GraphicsError::InvalidParameter(
                "frames in flight must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn with_backend(mut self, backend: BackendType) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_validation(mut self, validation: bool) -> Self {
        self.validation = validation;
        self
    }

    pub fn with_frames_in_flight(mut self, frames: u32) -> Self {
        self.frames_in_flight = frames;
        self
    }

    pub fn with_application_name(mut self, name: impl Into<String>) -> Self {
        self.application_name = name.into();
        self
    }
}

impl Default for InstanceParameters {
    fn default() -> Self {
        Self {
            backend: BackendType::Auto,
            validation: cfg!(debug_assertions),
            frames_in_flight: 2,
            application_name: "Prism".to_string(),
        }
    }
}

/// Owner of the backend. Devices keep their instance alive.
///
/// ```ignore
/// let instance = GraphicsInstance::with_parameters(
///     InstanceParameters::new().with_frames_in_flight(3),
/// )?;
/// let device = instance.create_device()?;
/// ```
pub struct GraphicsInstance {
    self_ref: Weak<GraphicsInstance>,
    devices: RwLock<Vec<Arc<GraphicsDevice>>>,
    backend: Arc<dyn GpuBackend>,
    parameters: InstanceParameters,
}

impl GraphicsInstance {
    /// Instance on the automatically chosen backend.
    pub fn new() -> Result<Arc<Self>, GraphicsError> {
        Self::with_parameters(InstanceParameters::default())
    }

    /// # Errors
    ///
    /// `InvalidParameter` for zero frames in flight, or the backend's
    /// initialization error when an explicitly requested backend fails.
    pub fn with_parameters(parameters: InstanceParameters) -> Result<Arc<Self>, GraphicsError> {
        parameters.validate()?;

        let backend = backend::create_backend(&parameters)?;
        log::info!(
            "GraphicsInstance on {} ({:?} requested, {} frames in flight)",
            backend.name(),
            parameters.backend,
            parameters.frames_in_flight
        );

        Ok(Arc::new_cyclic(|self_ref| Self {
            self_ref: self_ref.clone(),
            devices: RwLock::new(Vec::new()),
            backend,
            parameters,
        }))
    }

    pub(crate) fn backend(&self) -> &Arc<dyn GpuBackend> {
        &self.backend
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn parameters(&self) -> &InstanceParameters {
        &self.parameters
    }

    /// # Errors
    ///
    /// `ResourceCreationFailed` if called while the instance is being dropped.
    pub fn create_device(&self) -> Result<Arc<GraphicsDevice>, GraphicsError> {
        let instance = self.self_ref.upgrade().ok_or_else(|| {
            GraphicsError::ResourceCreationFailed("instance has been dropped".to_string())
        })?;

        let device = Arc::new(GraphicsDevice::new(
            instance,
            self.backend.name().to_string(),
        ));
        log::debug!("Created device on {}", device.name());

        self.devices.write().push(Arc::clone(&device));
        Ok(device)
    }

    pub fn devices(&self) -> Vec<Arc<GraphicsDevice>> {
        self.devices.read().clone()
    }

    pub fn device_count(&self) -> usize {
        self.devices.read().len()
    }
}

impl std::fmt::Debug for GraphicsInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphicsInstance")
            .field("backend", &self.backend.name())
            .field("frames_in_flight", &self.parameters.frames_in_flight)
            .field("devices", &self.device_count())
            .finish()
    }
}

static_assertions::assert_impl_all!(GraphicsInstance: Send, Sync);
