//! Graphics error types.

use prism_core::reflection::{BindingKind, TypeKind};

use crate::binding::DescriptorKind;

/// Errors that can occur in the graphics system.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphicsError {
    /// Failed to initialize the graphics system.
    #[error("initialization failed: {0}")]
    InitializationFailed(String),
    /// Failed to create a resource.
    #[error("resource creation failed: {0}")]
    ResourceCreationFailed(String),
    /// A requested feature is not supported.
    #[error("feature not supported: {0}")]
    FeatureNotSupported(String),
    /// Out of GPU memory.
    #[error("out of GPU memory")]
    OutOfMemory,
    /// The GPU device was lost.
    #[error("GPU device lost")]
    DeviceLost,
    /// An invalid parameter was provided.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    /// The requested backend was not compiled in or could not be loaded.
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),
    /// An internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
    /// A parameter binding contract was violated.
    #[error(transparent)]
    Binding(#[from] BindingError),
}

/// Violations of the parameter binding contract.
///
/// These are programming errors in the caller (a wrong field name, a write of
/// the wrong size, a texture written to a sampler slot) rather than transient
/// faults, and are never retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BindingError {
    #[error("no field named `{0}`")]
    FieldNotFound(String),

    #[error("field index {index} out of range ({count} fields)")]
    FieldIndexOutOfRange { index: usize, count: usize },

    #[error("`{operation}` is not valid on a {kind:?} layout")]
    InvalidLayoutKind {
        operation: &'static str,
        kind: TypeKind,
    },

    #[error("element {index} out of range (array of {count})")]
    ElementOutOfRange { index: u32, count: u32 },

    #[error("payload is {actual} bytes but the parameter is {expected} bytes")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("a {0:?} layout holds no ordinary data")]
    NotOrdinaryData(TypeKind),

    #[error("write of {size} bytes at offset {offset} exceeds the {capacity}-byte buffer")]
    WriteOutOfBounds {
        offset: usize,
        size: usize,
        capacity: usize,
    },

    #[error("binding range {binding} has kind {kind:?} with no descriptor equivalent")]
    UnsupportedBindingKind { binding: u32, kind: BindingKind },

    #[error("binding range {binding} is unbounded")]
    UnboundedBindingRange { binding: u32 },

    #[error("descriptor count of binding {binding} overflows for {sets} sets")]
    DescriptorCountOverflow { binding: u32, sets: u32 },

    #[error("element {index} overflows the flattened parameter offset")]
    OffsetOverflow { index: u32 },

    #[error("binding {binding} out of range ({count} resource bindings)")]
    BindingIndexOutOfRange { binding: u32, count: u32 },

    #[error("element {element} out of range for binding {binding} ({count} descriptors)")]
    BindingElementOutOfRange {
        binding: u32,
        element: u32,
        count: u32,
    },

    #[error("binding {binding} is a {expected:?} and cannot hold a {resource}")]
    ResourceKindMismatch {
        binding: u32,
        expected: DescriptorKind,
        resource: &'static str,
    },

    #[error("binding {binding} needs a sampler but the texture has none attached")]
    MissingSampler { binding: u32 },

    #[error("frame {frame} out of range ({frames} frames in flight)")]
    FrameIndexOutOfRange { frame: u32, frames: u32 },
}
