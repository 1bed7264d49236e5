//! Tracy instrumentation for layout creation and parameter uploads.
//!
//! Spans are only emitted with the `profiling` feature; otherwise the macros
//! expand to nothing and `tracy-client` is not linked.
//!
//! ```ignore
//! use prism_core::profiling::{profile_function, profile_scope};
//!
//! fn create_shader_object_layout() {
//!     profile_function!();
//!     {
//!         profile_scope!("plan_bindings");
//!     }
//! }
//! ```

#[cfg(feature = "profiling")]
pub use tracy_client::{self, span};

/// Span named `$name` that lasts until the end of the enclosing block.
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! profile_scope {
    ($name:expr) => {
        let _profile_span = $crate::profiling::span!($name);
    };
}

#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! profile_scope {
    ($name:expr) => {};
}

/// Span named after the enclosing function.
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! profile_function {
    () => {
        let _profile_span = $crate::profiling::span!();
    };
}

#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! profile_function {
    () => {};
}

pub use profile_function;
pub use profile_scope;
