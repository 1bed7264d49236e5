//! Per-device cache of shader object layouts.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use prism_core::reflection::TypeLayout;

use crate::error::GraphicsError;
use crate::resources::ShaderObjectLayout;

/// Maps reflected type layouts to the shader object layout built for them,
/// so each distinct parameter-block type gets exactly one native layout at a
/// time.
///
/// Entries are keyed by the identity of the `Arc<TypeLayout>` and hold the
/// layout weakly: a layout and its pools are released once the last
/// [`ShaderObjectLayout`] handle and the last block using it are gone. A live
/// layout holds its `Arc<TypeLayout>`, so a key can't be reused by another
/// type while its entry still upgrades.
#[derive(Default)]
pub struct LayoutCache {
    layouts: RwLock<HashMap<usize, Weak<ShaderObjectLayout>>>,
}

impl LayoutCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(type_layout: &Arc<TypeLayout>) -> usize {
        Arc::as_ptr(type_layout) as usize
    }

    pub fn get(&self, type_layout: &Arc<TypeLayout>) -> Option<Arc<ShaderObjectLayout>> {
        self.layouts
            .read()
            .get(&Self::key(type_layout))
            .and_then(Weak::upgrade)
    }

    /// Return the live layout for `type_layout`, building it when there is
    /// none. Entries whose layout has been released are pruned here.
    pub fn get_or_create(
        &self,
        type_layout: &Arc<TypeLayout>,
        create: impl FnOnce() -> Result<Arc<ShaderObjectLayout>, GraphicsError>,
    ) -> Result<Arc<ShaderObjectLayout>, GraphicsError> {
        if let Some(layout) = self.get(type_layout) {
            return Ok(layout);
        }

        // Re-check under the write lock in case another thread built it.
        let mut layouts = self.layouts.write();
        let key = Self::key(type_layout);
        if let Some(layout) = layouts.get(&key).and_then(Weak::upgrade) {
            return Ok(layout);
        }

        let layout = create()?;
        layouts.retain(|_, cached| cached.strong_count() > 0);
        layouts.insert(key, Arc::downgrade(&layout));
        log::debug!(
            "Cached shader object layout {:?} ({} live)",
            type_layout.name(),
            layouts.len()
        );
        Ok(layout)
    }

    /// Number of layouts that are still alive.
    pub fn len(&self) -> usize {
        self.layouts
            .read()
            .values()
            .filter(|cached| cached.strong_count() > 0)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget every entry. Layouts still referenced elsewhere stay alive but
    /// are no longer returned for their type.
    pub fn clear(&self) {
        self.layouts.write().clear();
    }
}

impl std::fmt::Debug for LayoutCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayoutCache")
            .field("len", &self.len())
            .finish()
    }
}

static_assertions::assert_impl_all!(LayoutCache: Send, Sync);
