//! Vulkan shader objects: a uniform buffer plus one descriptor set per frame.

use std::sync::Arc;

use ash::vk;
use gpu_allocator::MemoryLocation;
use prism_core::profiling::profile_scope;
use prism_core::reflection::TypeLayout;

use crate::backend::{GpuObjectLayout, GpuSampler, GpuTexture};
use crate::binding::object::sealed::Sealed;
use crate::binding::{DescriptorKind, ShaderObject, ShaderOffset};
use crate::error::{BindingError, GraphicsError};
use crate::resources::{Sampler, ShaderObjectLayout, Texture};

use super::conversion::{convert_descriptor_kind, descriptor_image_layout};
use super::{VulkanBuffer, VulkanContext, VulkanObjectLayout};

/// Parameter block backed by Vulkan objects.
///
/// The ordinary-data buffer is device local and shared by every frame's
/// set. Writes to it are staged through a transient host-visible buffer and
/// block until the copy has executed.
pub struct VulkanShaderObject {
    layout: Arc<ShaderObjectLayout>,
    context: Arc<VulkanContext>,
    buffer: Option<VulkanBuffer>,
    pool: vk::DescriptorPool,
    sets: Vec<vk::DescriptorSet>,
}

impl VulkanShaderObject {
    pub(crate) fn new(
        context: &Arc<VulkanContext>,
        layout: Arc<ShaderObjectLayout>,
    ) -> Result<Self, GraphicsError> {
        profile_scope!("vulkan_create_shader_object");
        let native = native_layout(&layout)?;
        let bindings = layout.bindings();

        let buffer = match bindings.ordinary_data_size() {
            0 => None,
            size => {
                // vkCmdFillBuffer writes whole words.
                let padded = (size as u64).next_multiple_of(4);
                let buffer = VulkanBuffer::new(
                    context,
                    layout.type_layout().name().unwrap_or("ordinary data"),
                    padded,
                    vk::BufferUsageFlags::UNIFORM_BUFFER
                        | vk::BufferUsageFlags::TRANSFER_DST
                        | vk::BufferUsageFlags::TRANSFER_SRC,
                    MemoryLocation::GpuOnly,
                )?;
                // Device-local memory starts undefined.
                context.submit_immediate(|cmd| unsafe {
                    context
                        .device()
                        .cmd_fill_buffer(cmd, buffer.handle(), 0, padded, 0);
                })?;
                Some(buffer)
            }
        };

        let (pool, sets) = native.allocate_sets()?;
        let object = Self {
            context: Arc::clone(context),
            buffer,
            pool,
            sets,
            layout: Arc::clone(&layout),
        };

        if let (Some(binding), Some(buffer)) = (bindings.ordinary_data_binding(), &object.buffer) {
            let buffer_info = vk::DescriptorBufferInfo {
                buffer: buffer.handle(),
                offset: 0,
                range: vk::WHOLE_SIZE,
            };
            let writes: Vec<vk::WriteDescriptorSet> = object
                .sets
                .iter()
                .map(|&set| {
                    vk::WriteDescriptorSet::default()
                        .dst_set(set)
                        .dst_binding(binding)
                        .dst_array_element(0)
                        .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                        .buffer_info(std::slice::from_ref(&buffer_info))
                })
                .collect();
            unsafe { context.device().update_descriptor_sets(&writes, &[]) };
        }

        log::debug!(
            "Created shader object {:?}: {} sets, {} bytes of ordinary data",
            layout.type_layout().name(),
            object.sets.len(),
            bindings.ordinary_data_size()
        );
        Ok(object)
    }

    /// Descriptor set to bind when recording frame `frame`.
    pub fn descriptor_set(&self, frame: u32) -> Result<vk::DescriptorSet, BindingError> {
        self.sets
            .get(frame as usize)
            .copied()
            .ok_or(BindingError::FrameIndexOutOfRange {
                frame,
                frames: self.sets.len() as u32,
            })
    }

    pub fn descriptor_sets(&self) -> &[vk::DescriptorSet] {
        &self.sets
    }

    /// Native layout the sets were allocated with, for pipeline layouts.
    pub fn set_layout(&self) -> Result<vk::DescriptorSetLayout, GraphicsError> {
        native_layout(&self.layout).map(VulkanObjectLayout::set_layout)
    }

    /// Copy the ordinary-data buffer back to the host. Blocks.
    ///
    /// Returns `None` when the block has no ordinary data.
    pub fn read_ordinary_data(&self) -> Result<Option<Vec<u8>>, GraphicsError> {
        let Some(buffer) = &self.buffer else {
            return Ok(None);
        };

        let readback = VulkanBuffer::new(
            &self.context,
            "ordinary data readback",
            buffer.size(),
            vk::BufferUsageFlags::TRANSFER_DST,
            MemoryLocation::GpuToCpu,
        )?;
        self.context.submit_immediate(|cmd| {
            let region = vk::BufferCopy {
                src_offset: 0,
                dst_offset: 0,
                size: buffer.size(),
            };
            let host_visible = vk::BufferMemoryBarrier::default()
                .src_access_mask(vk::AccessFlags::TRANSFER_WRITE)
                .dst_access_mask(vk::AccessFlags::HOST_READ)
                .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .buffer(readback.handle())
                .offset(0)
                .size(vk::WHOLE_SIZE);
            let device = self.context.device();
            unsafe {
                device.cmd_copy_buffer(cmd, buffer.handle(), readback.handle(), &[region]);
                device.cmd_pipeline_barrier(
                    cmd,
                    vk::PipelineStageFlags::TRANSFER,
                    vk::PipelineStageFlags::HOST,
                    vk::DependencyFlags::empty(),
                    &[],
                    &[host_visible],
                    &[],
                );
            }
        })?;
        let mut data = readback.read_mapped()?;
        data.truncate(self.layout.bindings().ordinary_data_size());
        Ok(Some(data))
    }

    /// Write one descriptor into every frame's set as a single batched
    /// update.
    fn update_all_sets(
        &self,
        offset: ShaderOffset,
        kind: DescriptorKind,
        image_info: vk::DescriptorImageInfo,
    ) {
        let writes: Vec<vk::WriteDescriptorSet> = self
            .sets
            .iter()
            .map(|&set| {
                vk::WriteDescriptorSet::default()
                    .dst_set(set)
                    .dst_binding(offset.binding_index)
                    .dst_array_element(offset.binding_array_element)
                    .descriptor_type(convert_descriptor_kind(kind))
                    .image_info(std::slice::from_ref(&image_info))
            })
            .collect();
        unsafe { self.context.device().update_descriptor_sets(&writes, &[]) };
    }
}

fn native_layout(layout: &ShaderObjectLayout) -> Result<&VulkanObjectLayout, GraphicsError> {
    match layout.gpu() {
        GpuObjectLayout::Vulkan(native) => Ok(native),
        _ => Err(GraphicsError::InvalidParameter(
            "layout was not created by the Vulkan backend".to_string(),
        )),
    }
}

fn texture_view(texture: &Texture) -> Result<(vk::ImageView, vk::ImageLayout), GraphicsError> {
    match texture.gpu() {
        GpuTexture::Vulkan { view, layout, .. } => Ok((*view, *layout)),
        _ => Err(GraphicsError::InvalidParameter(
            "texture was not created by the Vulkan backend".to_string(),
        )),
    }
}

fn sampler_handle(sampler: &Sampler) -> Result<vk::Sampler, GraphicsError> {
    match sampler.gpu() {
        GpuSampler::Vulkan { sampler, .. } => Ok(*sampler),
        _ => Err(GraphicsError::InvalidParameter(
            "sampler was not created by the Vulkan backend".to_string(),
        )),
    }
}

impl Sealed for VulkanShaderObject {}

impl ShaderObject for VulkanShaderObject {
    fn type_layout(&self) -> &TypeLayout {
        self.layout.content_layout()
    }

    fn write(&self, offset: ShaderOffset, data: &[u8]) -> Result<(), GraphicsError> {
        let Some(buffer) = &self.buffer else {
            log::trace!(
                "Ignoring {}-byte write to a block without ordinary data",
                data.len()
            );
            return Ok(());
        };
        self.layout
            .bindings()
            .check_write(offset.byte_offset, data.len())?;
        if data.is_empty() {
            return Ok(());
        }

        profile_scope!("vulkan_shader_object_write");
        let staging = VulkanBuffer::new(
            &self.context,
            "ordinary data staging",
            data.len() as u64,
            vk::BufferUsageFlags::TRANSFER_SRC,
            MemoryLocation::CpuToGpu,
        )?;
        staging.write_mapped(0, data)?;

        let device = self.context.device();
        self.context.submit_immediate(|cmd| {
            let region = vk::BufferCopy {
                src_offset: 0,
                dst_offset: offset.byte_offset as u64,
                size: data.len() as u64,
            };
            let barrier = vk::BufferMemoryBarrier::default()
                .src_access_mask(vk::AccessFlags::TRANSFER_WRITE)
                .dst_access_mask(vk::AccessFlags::UNIFORM_READ)
                .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .buffer(buffer.handle())
                .offset(region.dst_offset)
                .size(region.size);
            unsafe {
                device.cmd_copy_buffer(cmd, staging.handle(), buffer.handle(), &[region]);
                device.cmd_pipeline_barrier(
                    cmd,
                    vk::PipelineStageFlags::TRANSFER,
                    vk::PipelineStageFlags::ALL_COMMANDS,
                    vk::DependencyFlags::empty(),
                    &[],
                    &[barrier],
                    &[],
                );
            }
        })?;

        log::trace!(
            "Wrote {} bytes at offset {}",
            data.len(),
            offset.byte_offset
        );
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
        let (view, texture_layout) = texture_view(texture)?;
        let sampler = match paired {
            Some(attached) => sampler_handle(&attached)?,
            None => vk::Sampler::null(),
        };

        // Storage-capable textures live in GENERAL, which every image
        // descriptor accepts.
        let image_layout = if texture_layout == vk::ImageLayout::GENERAL {
            vk::ImageLayout::GENERAL
        } else {
            descriptor_image_layout(entry.kind)
        };

        self.update_all_sets(
            offset,
            entry.kind,
            vk::DescriptorImageInfo {
                sampler,
                image_view: view,
                image_layout,
            },
        );
        Ok(())
    }

    fn write_sampler(&self, offset: ShaderOffset, sampler: &Sampler) -> Result<(), GraphicsError> {
        let entry = self.layout.bindings().resolve_resource(
            offset.binding_index,
            offset.binding_array_element,
            "sampler",
            DescriptorKind::accepts_sampler,
        )?;

        self.update_all_sets(
            offset,
            entry.kind,
            vk::DescriptorImageInfo {
                sampler: sampler_handle(sampler)?,
                image_view: vk::ImageView::null(),
                image_layout: vk::ImageLayout::UNDEFINED,
            },
        );
        Ok(())
    }
}

impl Drop for VulkanShaderObject {
    fn drop(&mut self) {
        if let Ok(native) = native_layout(&self.layout) {
            native.free_sets(self.pool, &self.sets);
        }
    }
}

impl std::fmt::Debug for VulkanShaderObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VulkanShaderObject")
            .field("sets", &self.sets)
            .field("buffer", &self.buffer)
            .finish_non_exhaustive()
    }
}
