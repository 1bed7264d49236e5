//! Native descriptor set layouts and their growable pools.

use std::sync::Arc;

use ash::vk;
use parking_lot::Mutex;

use crate::binding::{BindingLayout, DescriptorKind};
use crate::error::GraphicsError;

use super::conversion::{convert_descriptor_kind, convert_shader_stages};
use super::{VulkanContext, vk_error};

/// Descriptor set layout of one parameter-block type.
///
/// Each pool holds exactly the sets of one shader object. When every pool is
/// exhausted a new one of the same size is appended, so any number of
/// instances can be created from one layout.
pub struct VulkanObjectLayout {
    context: Arc<VulkanContext>,
    set_layout: vk::DescriptorSetLayout,
    pool_sizes: Vec<vk::DescriptorPoolSize>,
    sets_per_pool: u32,
    pools: Mutex<Vec<vk::DescriptorPool>>,
}

impl VulkanObjectLayout {
    pub(crate) fn new(
        context: &Arc<VulkanContext>,
        bindings: &BindingLayout,
        frames_in_flight: u32,
    ) -> Result<Self, GraphicsError> {
        let mut layout_bindings = Vec::with_capacity(bindings.entries().len());
        for entry in bindings.entries() {
            if matches!(
                entry.kind,
                DescriptorKind::AccelerationStructure | DescriptorKind::InlineUniformBlock
            ) {
                return Err(GraphicsError::FeatureNotSupported(format!(
                    "binding {} needs {:?} descriptors",
                    entry.binding, entry.kind
                )));
            }
            layout_bindings.push(
                vk::DescriptorSetLayoutBinding::default()
                    .binding(entry.binding)
                    .descriptor_type(convert_descriptor_kind(entry.kind))
                    .descriptor_count(entry.count)
                    .stage_flags(convert_shader_stages(entry.visibility)),
            );
        }

        let layout_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&layout_bindings);
        let set_layout = unsafe {
            context
                .device()
                .create_descriptor_set_layout(&layout_info, None)
        }
        .map_err(|e| vk_error("create descriptor set layout", e))?;

        let mut pool_sizes: Vec<vk::DescriptorPoolSize> = bindings
            .pool_sizes(frames_in_flight)?
            .into_iter()
            .map(|(kind, count)| vk::DescriptorPoolSize {
                ty: convert_descriptor_kind(kind),
                descriptor_count: count,
            })
            .collect();
        // Pools need at least one size entry even when the sets are empty.
        if pool_sizes.is_empty() {
            pool_sizes.push(vk::DescriptorPoolSize {
                ty: vk::DescriptorType::UNIFORM_BUFFER,
                descriptor_count: 1,
            });
        }

        let layout = Self {
            context: Arc::clone(context),
            set_layout,
            pool_sizes,
            sets_per_pool: frames_in_flight,
            pools: Mutex::new(Vec::new()),
        };
        // Created eagerly so an unusable pool configuration fails here.
        let pool = layout.create_pool()?;
        layout.pools.lock().push(pool);

        log::debug!(
            "Created descriptor set layout {:?}: {} bindings, pools of {} sets",
            bindings.label(),
            layout_bindings.len(),
            frames_in_flight
        );
        Ok(layout)
    }

    fn create_pool(&self) -> Result<vk::DescriptorPool, GraphicsError> {
        let pool_info = vk::DescriptorPoolCreateInfo::default()
            .flags(vk::DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET)
            .max_sets(self.sets_per_pool)
            .pool_sizes(&self.pool_sizes);

        unsafe { self.context.device().create_descriptor_pool(&pool_info, None) }
            .map_err(|e| vk_error("create descriptor pool", e))
    }

    /// Allocate one set per frame in flight from the first pool with room,
    /// growing the pool list when all are exhausted.
    pub(crate) fn allocate_sets(
        &self,
    ) -> Result<(vk::DescriptorPool, Vec<vk::DescriptorSet>), GraphicsError> {
        let device = self.context.device();
        let set_layouts = vec![self.set_layout; self.sets_per_pool as usize];
        let mut pools = self.pools.lock();

        for &pool in pools.iter() {
            let alloc_info = vk::DescriptorSetAllocateInfo::default()
                .descriptor_pool(pool)
                .set_layouts(&set_layouts);
            match unsafe { device.allocate_descriptor_sets(&alloc_info) } {
                Ok(sets) => return Ok((pool, sets)),
                Err(vk::Result::ERROR_OUT_OF_POOL_MEMORY | vk::Result::ERROR_FRAGMENTED_POOL) => {
                    continue;
                }
                Err(e) => return Err(vk_error("allocate descriptor sets", e)),
            }
        }

        let pool = self.create_pool()?;
        pools.push(pool);
        log::debug!("Descriptor pools exhausted, grew to {}", pools.len());

        let alloc_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(pool)
            .set_layouts(&set_layouts);
        let sets = unsafe { device.allocate_descriptor_sets(&alloc_info) }
            .map_err(|e| vk_error("allocate descriptor sets", e))?;
        Ok((pool, sets))
    }

    /// Return sets to the pool they were allocated from.
    pub(crate) fn free_sets(&self, pool: vk::DescriptorPool, sets: &[vk::DescriptorSet]) {
        let _pools = self.pools.lock();
        if let Err(e) = unsafe { self.context.device().free_descriptor_sets(pool, sets) } {
            log::warn!("Failed to free descriptor sets: {:?}", e);
        }
    }

    pub fn set_layout(&self) -> vk::DescriptorSetLayout {
        self.set_layout
    }

    /// Number of pools created so far.
    pub fn pool_count(&self) -> usize {
        self.pools.lock().len()
    }
}

impl Drop for VulkanObjectLayout {
    fn drop(&mut self) {
        let device = self.context.device();
        unsafe {
            for pool in self.pools.get_mut().drain(..) {
                device.destroy_descriptor_pool(pool, None);
            }
            device.destroy_descriptor_set_layout(self.set_layout, None);
        }
    }
}

impl std::fmt::Debug for VulkanObjectLayout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VulkanObjectLayout")
            .field("set_layout", &self.set_layout)
            .field("sets_per_pool", &self.sets_per_pool)
            .field("pools", &self.pool_count())
            .finish()
    }
}
