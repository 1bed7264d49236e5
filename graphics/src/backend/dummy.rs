//! Dummy GPU backend for testing and development.
//!
//! This backend doesn't perform actual GPU operations but provides
//! a valid implementation for testing the binding layer without
//! requiring GPU hardware. Ordinary data lives in host memory, descriptor
//! sets are plain tables, and every buffer upload and batched descriptor
//! update is appended to an inspectable history.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use prism_core::reflection::TypeLayout;

use crate::binding::object::sealed::Sealed;
use crate::binding::{BindingLayout, DescriptorKind, ShaderObject, ShaderOffset};
use crate::error::{BindingError, GraphicsError};
use crate::resources::{Sampler, ShaderObjectLayout, Texture};
use crate::types::{SamplerDescriptor, TextureDescriptor};

use super::{GpuBackend, GpuObjectLayout, GpuSampler, GpuShaderObject, GpuTexture};

/// Dummy GPU backend.
#[derive(Debug, Default)]
pub struct DummyBackend {
    next_id: AtomicU64,
}

impl DummyBackend {
    /// Create a new dummy backend.
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }
}

impl GpuBackend for DummyBackend {
    fn name(&self) -> &'static str {
        "Dummy Backend"
    }

    fn create_texture(&self, descriptor: &TextureDescriptor) -> Result<GpuTexture, GraphicsError> {
        log::trace!(
            "DummyBackend: creating texture {:?} ({}x{}x{})",
            descriptor.label,
            descriptor.size.width,
            descriptor.size.height,
            descriptor.size.depth
        );
        Ok(GpuTexture::Dummy { id: self.next_id() })
    }

    fn create_sampler(&self, descriptor: &SamplerDescriptor) -> Result<GpuSampler, GraphicsError> {
        log::trace!("DummyBackend: creating sampler {:?}", descriptor.label);
        Ok(GpuSampler::Dummy { id: self.next_id() })
    }

    fn create_object_layout(
        &self,
        bindings: &BindingLayout,
        frames_in_flight: u32,
    ) -> Result<GpuObjectLayout, GraphicsError> {
        // Reject layouts no native pool could hold.
        let pool_sizes = bindings.pool_sizes(frames_in_flight)?;
        log::trace!(
            "DummyBackend: creating object layout {:?} ({} bindings, pool sizes {:?})",
            bindings.label(),
            bindings.binding_count(),
            pool_sizes
        );
        Ok(GpuObjectLayout::Dummy(DummyObjectLayout::new(
            frames_in_flight,
        )))
    }

    fn create_shader_object(
        &self,
        layout: &Arc<ShaderObjectLayout>,
    ) -> Result<GpuShaderObject, GraphicsError> {
        DummyShaderObject::new(Arc::clone(layout)).map(GpuShaderObject::Dummy)
    }
}

// ============================================================================
// Layout and descriptor pools
// ============================================================================

#[derive(Debug, Clone, Copy)]
struct DummyPool {
    capacity: u32,
    allocated: u32,
}

/// Set layout with a growable list of pools, each sized for one object's
/// sets.
#[derive(Debug)]
pub struct DummyObjectLayout {
    sets_per_pool: u32,
    pools: Mutex<Vec<DummyPool>>,
}

impl DummyObjectLayout {
    fn new(sets_per_pool: u32) -> Self {
        Self {
            sets_per_pool,
            pools: Mutex::new(vec![DummyPool {
                capacity: sets_per_pool,
                allocated: 0,
            }]),
        }
    }

    /// Reserve `count` sets from the first pool with room, appending a new
    /// pool when every existing one is exhausted. Returns the pool index.
    fn allocate(&self, count: u32) -> usize {
        let mut pools = self.pools.lock();
        if let Some(index) = pools
            .iter()
            .position(|pool| pool.capacity - pool.allocated >= count)
        {
            pools[index].allocated += count;
            return index;
        }

        log::debug!(
            "DummyBackend: descriptor pools exhausted, growing to {}",
            pools.len() + 1
        );
        pools.push(DummyPool {
            capacity: self.sets_per_pool.max(count),
            allocated: count,
        });
        pools.len() - 1
    }

    fn release(&self, pool: usize, count: u32) {
        if let Some(pool) = self.pools.lock().get_mut(pool) {
            pool.allocated = pool.allocated.saturating_sub(count);
        }
    }

    /// Number of pools created so far.
    pub fn pool_count(&self) -> usize {
        self.pools.lock().len()
    }

    /// Number of sets currently allocated across all pools.
    pub fn allocated_sets(&self) -> u32 {
        self.pools.lock().iter().map(|pool| pool.allocated).sum()
    }
}

// ============================================================================
// Shader object
// ============================================================================

/// Contents of one descriptor slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundResource {
    /// The object's ordinary-data buffer, `size` bytes.
    UniformBuffer { size: usize },
    Texture(u64),
    Sampler(u64),
    CombinedImageSampler { texture: u64, sampler: u64 },
}

/// One descriptor write inside a batched update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorWrite {
    pub frame: u32,
    pub binding: u32,
    pub array_element: u32,
    pub resource: BoundResource,
}

/// A recorded GPU operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DummyCommand {
    /// Staged copy into the ordinary-data buffer.
    WriteBuffer { offset: usize, size: usize },
    /// One batched descriptor update call.
    UpdateDescriptorSets { writes: Vec<DescriptorWrite> },
}

/// Descriptor table of one frame: `[binding][array element]`.
type DescriptorTable = Vec<Vec<Option<BoundResource>>>;

/// CPU-side parameter block.
pub struct DummyShaderObject {
    layout: Arc<ShaderObjectLayout>,
    pool: usize,
    buffer: Option<Mutex<Vec<u8>>>,
    sets: Mutex<Vec<DescriptorTable>>,
    history: Mutex<Vec<DummyCommand>>,
}

impl DummyShaderObject {
    fn new(layout: Arc<ShaderObjectLayout>) -> Result<Self, GraphicsError> {
        let GpuObjectLayout::Dummy(native) = layout.gpu() else {
            return Err(GraphicsError::InvalidParameter(
                "layout was not created by the dummy backend".to_string(),
            ));
        };

        let frames = layout.frames_in_flight();
        let bindings = layout.bindings();
        let pool = native.allocate(frames);

        let table: DescriptorTable = bindings
            .entries()
            .iter()
            .map(|entry| vec![None; entry.count as usize])
            .collect();

        let object = Self {
            buffer: (bindings.ordinary_data_size() > 0)
                .then(|| Mutex::new(vec![0; bindings.ordinary_data_size()])),
            sets: Mutex::new(vec![table; frames as usize]),
            history: Mutex::new(Vec::new()),
            pool,
            layout,
        };

        if let Some(binding) = object.layout.bindings().ordinary_data_binding() {
            let resource = BoundResource::UniformBuffer {
                size: object.layout.bindings().ordinary_data_size(),
            };
            object.update_descriptor_sets(binding, 0, resource);
        }

        log::debug!(
            "DummyBackend: created shader object {:?} ({} sets from pool {})",
            object.layout.type_layout().name(),
            frames,
            pool
        );
        Ok(object)
    }

    /// Write `resource` at (`binding`, `element`) of every frame's set as one
    /// batched update.
    fn update_descriptor_sets(&self, binding: u32, element: u32, resource: BoundResource) {
        let mut sets = self.sets.lock();
        let writes: Vec<DescriptorWrite> = (0..sets.len() as u32)
            .map(|frame| DescriptorWrite {
                frame,
                binding,
                array_element: element,
                resource,
            })
            .collect();

        for write in &writes {
            sets[write.frame as usize][binding as usize][element as usize] = Some(resource);
        }
        self.history
            .lock()
            .push(DummyCommand::UpdateDescriptorSets { writes });
    }

    /// Snapshot of the ordinary-data buffer, `None` when the block has no
    /// ordinary data.
    pub fn ordinary_data(&self) -> Option<Vec<u8>> {
        self.buffer.as_ref().map(|buffer| buffer.lock().clone())
    }

    /// Contents of one descriptor slot of one frame's set.
    pub fn descriptor(
        &self,
        frame: u32,
        binding: u32,
        element: u32,
    ) -> Result<Option<BoundResource>, BindingError> {
        let sets = self.sets.lock();
        let set = sets
            .get(frame as usize)
            .ok_or(BindingError::FrameIndexOutOfRange {
                frame,
                frames: sets.len() as u32,
            })?;
        let slot = set
            .get(binding as usize)
            .ok_or(BindingError::BindingIndexOutOfRange {
                binding,
                count: set.len() as u32,
            })?;
        slot.get(element as usize)
            .copied()
            .ok_or(BindingError::BindingElementOutOfRange {
                binding,
                element,
                count: slot.len() as u32,
            })
    }

    /// Every recorded operation since construction, oldest first.
    pub fn history(&self) -> Vec<DummyCommand> {
        self.history.lock().clone()
    }

    pub fn clear_history(&self) {
        self.history.lock().clear();
    }

    /// Index of the pool this object's sets were allocated from.
    pub fn pool_index(&self) -> usize {
        self.pool
    }
}

impl Sealed for DummyShaderObject {}

impl ShaderObject for DummyShaderObject {
    fn type_layout(&self) -> &TypeLayout {
        self.layout.content_layout()
    }

    fn write(&self, offset: ShaderOffset, data: &[u8]) -> Result<(), GraphicsError> {
        let Some(buffer) = &self.buffer else {
            log::trace!(
                "DummyBackend: ignoring {}-byte write to a block without ordinary data",
                data.len()
            );
            return Ok(());
        };

        self.layout
            .bindings()
            .check_write(offset.byte_offset, data.len())?;

        let start = offset.byte_offset;
        buffer.lock()[start..start + data.len()].copy_from_slice(data);
        self.history.lock().push(DummyCommand::WriteBuffer {
            offset: start,
            size: data.len(),
        });
        Ok(())
    }

    fn write_texture(&self, offset: ShaderOffset, texture: &Texture) -> Result<(), GraphicsError> {
        let entry = self.layout.bindings().resolve_resource(
            offset.binding_index,
            offset.binding_array_element,
            "texture",
            DescriptorKind::accepts_texture,
        )?;
        let paired = texture.sampler_for_binding(entry.kind, offset.binding_index)?;
        let texture_id = dummy_texture_id(texture)?;
        let resource = match paired {
            Some(sampler) => BoundResource::CombinedImageSampler {
                texture: texture_id,
                sampler: dummy_sampler_id(&sampler)?,
            },
            None => BoundResource::Texture(texture_id),
        };

        self.update_descriptor_sets(offset.binding_index, offset.binding_array_element, resource);
        Ok(())
    }

    fn write_sampler(&self, offset: ShaderOffset, sampler: &Sampler) -> Result<(), GraphicsError> {
        self.layout.bindings().resolve_resource(
            offset.binding_index,
            offset.binding_array_element,
            "sampler",
            DescriptorKind::accepts_sampler,
        )?;
        let resource = BoundResource::Sampler(dummy_sampler_id(sampler)?);
        self.update_descriptor_sets(offset.binding_index, offset.binding_array_element, resource);
        Ok(())
    }
}

fn dummy_texture_id(texture: &Texture) -> Result<u64, GraphicsError> {
    match texture.gpu() {
        GpuTexture::Dummy { id } => Ok(*id),
        #[cfg(feature = "vulkan-backend")]
        _ => Err(GraphicsError::InvalidParameter(
            "texture was not created by the dummy backend".to_string(),
        )),
    }
}

fn dummy_sampler_id(sampler: &Sampler) -> Result<u64, GraphicsError> {
    match sampler.gpu() {
        GpuSampler::Dummy { id } => Ok(*id),
        #[cfg(feature = "vulkan-backend")]
        _ => Err(GraphicsError::InvalidParameter(
            "sampler was not created by the dummy backend".to_string(),
        )),
    }
}

impl Drop for DummyShaderObject {
    fn drop(&mut self) {
        if let GpuObjectLayout::Dummy(native) = self.layout.gpu() {
            native.release(self.pool, self.layout.frames_in_flight());
        }
    }
}

impl std::fmt::Debug for DummyShaderObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DummyShaderObject")
            .field("pool", &self.pool)
            .field("frames", &self.layout.frames_in_flight())
            .field("has_buffer", &self.buffer.is_some())
            .finish()
    }
}
