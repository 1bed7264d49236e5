//! Mappings from binding-layer and resource types to their Vulkan equivalents.

use ash::vk;

use crate::binding::{DescriptorKind, ShaderStageFlags};
use crate::types::{AddressMode, CompareFunction, FilterMode, TextureFormat, TextureUsage};

pub fn convert_descriptor_kind(kind: DescriptorKind) -> vk::DescriptorType {
    match kind {
        DescriptorKind::Sampler => vk::DescriptorType::SAMPLER,
        DescriptorKind::SampledImage => vk::DescriptorType::SAMPLED_IMAGE,
        DescriptorKind::CombinedImageSampler => vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
        DescriptorKind::UniformBuffer => vk::DescriptorType::UNIFORM_BUFFER,
        DescriptorKind::StorageImage => vk::DescriptorType::STORAGE_IMAGE,
        DescriptorKind::AccelerationStructure => vk::DescriptorType::ACCELERATION_STRUCTURE_KHR,
        DescriptorKind::InlineUniformBlock => vk::DescriptorType::INLINE_UNIFORM_BLOCK,
    }
}

/// Layout an image must be in when read through a descriptor of `kind`.
pub fn descriptor_image_layout(kind: DescriptorKind) -> vk::ImageLayout {
    match kind {
        DescriptorKind::StorageImage => vk::ImageLayout::GENERAL,
        _ => vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
    }
}

pub fn convert_shader_stages(stages: ShaderStageFlags) -> vk::ShaderStageFlags {
    if stages.contains(ShaderStageFlags::ALL) {
        return vk::ShaderStageFlags::ALL;
    }

    let mut result = vk::ShaderStageFlags::empty();
    if stages.contains(ShaderStageFlags::VERTEX) {
        result |= vk::ShaderStageFlags::VERTEX;
    }
    if stages.contains(ShaderStageFlags::FRAGMENT) {
        result |= vk::ShaderStageFlags::FRAGMENT;
    }
    if stages.contains(ShaderStageFlags::COMPUTE) {
        result |= vk::ShaderStageFlags::COMPUTE;
    }
    result
}

pub fn convert_texture_format(format: TextureFormat) -> vk::Format {
    match format {
        TextureFormat::R8Unorm => vk::Format::R8_UNORM,
        TextureFormat::R16Float => vk::Format::R16_SFLOAT,
        TextureFormat::R32Float => vk::Format::R32_SFLOAT,
        TextureFormat::R32Uint => vk::Format::R32_UINT,
        TextureFormat::Rgba8Unorm => vk::Format::R8G8B8A8_UNORM,
        TextureFormat::Rgba8UnormSrgb => vk::Format::R8G8B8A8_SRGB,
        TextureFormat::Bgra8Unorm => vk::Format::B8G8R8A8_UNORM,
        TextureFormat::Rgba16Float => vk::Format::R16G16B16A16_SFLOAT,
        TextureFormat::Rgba32Float => vk::Format::R32G32B32A32_SFLOAT,
        TextureFormat::Depth32Float => vk::Format::D32_SFLOAT,
    }
}

/// Images always get `TRANSFER_DST` so they can be cleared after creation.
pub fn convert_texture_usage(usage: TextureUsage) -> vk::ImageUsageFlags {
    let mut result = vk::ImageUsageFlags::TRANSFER_DST;

    if usage.contains(TextureUsage::COPY_SRC) {
        result |= vk::ImageUsageFlags::TRANSFER_SRC;
    }
    if usage.contains(TextureUsage::TEXTURE_BINDING) {
        result |= vk::ImageUsageFlags::SAMPLED;
    }
    if usage.contains(TextureUsage::STORAGE_BINDING) {
        result |= vk::ImageUsageFlags::STORAGE;
    }
    result
}

pub fn convert_filter_mode(mode: FilterMode) -> vk::Filter {
    match mode {
        FilterMode::Nearest => vk::Filter::NEAREST,
        FilterMode::Linear => vk::Filter::LINEAR,
    }
}

pub fn convert_mipmap_filter_mode(mode: FilterMode) -> vk::SamplerMipmapMode {
    match mode {
        FilterMode::Nearest => vk::SamplerMipmapMode::NEAREST,
        FilterMode::Linear => vk::SamplerMipmapMode::LINEAR,
    }
}

pub fn convert_address_mode(mode: AddressMode) -> vk::SamplerAddressMode {
    match mode {
        AddressMode::ClampToEdge => vk::SamplerAddressMode::CLAMP_TO_EDGE,
        AddressMode::Repeat => vk::SamplerAddressMode::REPEAT,
        AddressMode::MirrorRepeat => vk::SamplerAddressMode::MIRRORED_REPEAT,
        AddressMode::ClampToBorder => vk::SamplerAddressMode::CLAMP_TO_BORDER,
    }
}

pub fn convert_compare_function(func: CompareFunction) -> vk::CompareOp {
    match func {
        CompareFunction::Never => vk::CompareOp::NEVER,
        CompareFunction::Less => vk::CompareOp::LESS,
        CompareFunction::Equal => vk::CompareOp::EQUAL,
        CompareFunction::LessEqual => vk::CompareOp::LESS_OR_EQUAL,
        CompareFunction::Greater => vk::CompareOp::GREATER,
        CompareFunction::NotEqual => vk::CompareOp::NOT_EQUAL,
        CompareFunction::GreaterEqual => vk::CompareOp::GREATER_OR_EQUAL,
        CompareFunction::Always => vk::CompareOp::ALWAYS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_kinds() {
        assert_eq!(
            convert_descriptor_kind(DescriptorKind::CombinedImageSampler),
            vk::DescriptorType::COMBINED_IMAGE_SAMPLER
        );
        assert_eq!(
            convert_descriptor_kind(DescriptorKind::UniformBuffer),
            vk::DescriptorType::UNIFORM_BUFFER
        );
    }

    #[test]
    fn test_image_layouts() {
        assert_eq!(
            descriptor_image_layout(DescriptorKind::StorageImage),
            vk::ImageLayout::GENERAL
        );
        assert_eq!(
            descriptor_image_layout(DescriptorKind::SampledImage),
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL
        );
    }

    #[test]
    fn test_stage_flags() {
        assert_eq!(
            convert_shader_stages(ShaderStageFlags::ALL),
            vk::ShaderStageFlags::ALL
        );
        assert_eq!(
            convert_shader_stages(ShaderStageFlags::VERTEX | ShaderStageFlags::FRAGMENT),
            vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT
        );
    }
}
