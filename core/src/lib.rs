//! # Prism Core
//!
//! Backend-independent building blocks shared by the Prism crates:
//!
//! - [`reflection`] - the reflected type layout of a shader parameter block,
//!   as produced by the shading-language front end (or built by hand)
//! - [`profiling`] - optional Tracy instrumentation macros

pub mod profiling;
pub mod reflection;

/// Core library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
