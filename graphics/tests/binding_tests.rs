//! Parameter binding integration tests.
//!
//! Every test runs against the dummy backend and against Vulkan when a
//! driver is present. Tests that inspect recorded operations only run their
//! inspection half on the dummy backend.
//!
//! ```bash
//! cargo test --test binding_tests
//! ```

mod common;

use std::sync::Arc;

use rstest::rstest;

use common::{
    Backend, FRAMES, TestContext, empty_layout, lights_layout, material_layout, surface_layout,
};
use prism_core::reflection::{
    BindingKind, ElementCount, ScalarType, StructLayoutBuilder, TypeKind, TypeLayout,
};
use prism_graphics::backend::GpuTexture;
use prism_graphics::backend::dummy::{BoundResource, DescriptorWrite, DummyCommand};
use prism_graphics::{
    BindingError, GraphicsError, ShaderObject, ShaderOffset, Texture, TextureUsage,
};

/// Host mirror of the ordinary data of `Light` in [`lights_layout`].
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
struct GpuLight {
    color: [f32; 3],
    intensity: f32,
}

fn dummy_id(texture: &Texture) -> Option<u64> {
    match texture.gpu() {
        GpuTexture::Dummy { id } => Some(*id),
        #[allow(unreachable_patterns)]
        _ => None,
    }
}

// ============================================================================
// Navigation
// ============================================================================

#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::vulkan(Backend::Vulkan)]
fn test_path_matches_chained_navigation(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };
    let layout = ctx.layout(&lights_layout());
    let block = ctx.block(&layout);
    let root = block.cursor();

    let chained = root
        .field("lights")
        .unwrap()
        .element(2)
        .unwrap()
        .field("shadows")
        .unwrap()
        .element(1)
        .unwrap();
    let parsed = root.path("lights[2].shadows[1]").unwrap();
    assert_eq!(chained.offset(), parsed.offset());

    let by_index = root
        .field_by_index(root.field_index("lights").unwrap())
        .unwrap();
    assert_eq!(by_index.offset(), root.field("lights").unwrap().offset());
}

#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::vulkan(Backend::Vulkan)]
fn test_nested_arrays_flatten_row_major(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };
    let layout = ctx.layout(&lights_layout());
    let block = ctx.block(&layout);
    let root = block.cursor();

    // Three lights, two shadow maps each: element i*2 + j of binding 0.
    for i in 0..3u32 {
        for j in 0..2u32 {
            let offset = root
                .path(&format!("lights[{i}].shadows[{j}]"))
                .unwrap()
                .offset();
            assert_eq!(offset.binding_index, 0);
            assert_eq!(offset.binding_array_element, i * 2 + j);
        }
        let intensity = root
            .path(&format!("lights[{i}].intensity"))
            .unwrap()
            .offset();
        assert_eq!(intensity.byte_offset, i as usize * 16 + 12);
    }

    let textures = ctx.layout(&material_layout());
    let block = ctx.block(&textures);
    let third = block.cursor().path("textures[3]").unwrap();
    assert_eq!(third.offset(), ShaderOffset::new(0, 2, 3));
}

#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::vulkan(Backend::Vulkan)]
fn test_parameter_block_root_is_looked_through(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };
    let wrapped = Arc::new(TypeLayout::parameter_block((*surface_layout()).clone()));
    let layout = ctx.layout(&wrapped);
    assert_eq!(layout.content_layout().kind(), TypeKind::Struct);

    let block = ctx.block(&layout);
    block.cursor().field("roughness").unwrap().write(&0.25f32).unwrap();
    let data = ctx.read_ordinary_data(&block).unwrap();
    assert_eq!(&data[12..16], &0.25f32.to_ne_bytes());
}

#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::vulkan(Backend::Vulkan)]
fn test_navigation_errors(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };
    let layout = ctx.layout(&material_layout());
    let block = ctx.block(&layout);
    let root = block.cursor();

    assert!(matches!(
        root.field("metallic"),
        Err(BindingError::FieldNotFound(name)) if name == "metallic"
    ));
    assert!(matches!(
        root.field_by_index(99),
        Err(BindingError::FieldIndexOutOfRange { index: 99, count: 5 })
    ));
    assert!(matches!(
        root.path("textures[4]"),
        Err(BindingError::ElementOutOfRange { index: 4, count: 4 })
    ));
    assert!(matches!(
        root.field("roughness").unwrap().field("x"),
        Err(BindingError::InvalidLayoutKind { kind: TypeKind::Scalar, .. })
    ));
    assert!(matches!(
        root.element(0),
        Err(BindingError::InvalidLayoutKind { kind: TypeKind::Struct, .. })
    ));
    assert!(root.path("textures[x]").is_err());
}

// ============================================================================
// Ordinary Data
// ============================================================================

#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::vulkan(Backend::Vulkan)]
fn test_buffer_starts_zeroed(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };
    let layout = ctx.layout(&material_layout());
    let block = ctx.block(&layout);

    let data = ctx.read_ordinary_data(&block).unwrap();
    assert_eq!(data.len(), layout.bindings().ordinary_data_size());
    assert!(data.iter().all(|&byte| byte == 0));
}

#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::vulkan(Backend::Vulkan)]
fn test_roughness_write_leaves_albedo_untouched(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };
    let layout = ctx.layout(&surface_layout());
    let block = ctx.block(&layout);
    let root = block.cursor();

    root.field("albedo").unwrap().write(&[0.1f32, 0.2, 0.3]).unwrap();
    if let Some(dummy) = block.gpu().as_dummy() {
        dummy.clear_history();
    }

    root.field("roughness").unwrap().write(&0.5f32).unwrap();

    if let Some(dummy) = block.gpu().as_dummy() {
        assert_eq!(
            dummy.history(),
            vec![DummyCommand::WriteBuffer {
                offset: 12,
                size: 4
            }]
        );
    }

    let data = ctx.read_ordinary_data(&block).unwrap();
    let albedo: Vec<f32> = bytemuck::pod_collect_to_vec(&data[0..12]);
    assert_eq!(albedo, vec![0.1f32, 0.2, 0.3]);
    assert_eq!(&data[12..16], &0.5f32.to_ne_bytes());
}

#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::vulkan(Backend::Vulkan)]
fn test_array_element_writes_land_at_stride(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };
    let layout = ctx.layout(&lights_layout());
    let block = ctx.block(&layout);
    let root = block.cursor();

    for i in 0..3u32 {
        root.path(&format!("lights[{i}].intensity"))
            .unwrap()
            .write(&(i as f32 + 1.0))
            .unwrap();
    }

    let data = ctx.read_ordinary_data(&block).unwrap();
    let words: Vec<f32> = bytemuck::pod_collect_to_vec(&data);
    assert_eq!(words.len(), 12);
    for i in 0..3 {
        assert_eq!(words[i * 4 + 3], i as f32 + 1.0);
        // Color stays zero.
        assert_eq!(&words[i * 4..i * 4 + 3], &[0.0, 0.0, 0.0]);
    }
}

#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::vulkan(Backend::Vulkan)]
fn test_struct_write_replaces_one_element(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };
    let layout = ctx.layout(&lights_layout());
    let block = ctx.block(&layout);
    let lights = block.cursor().field("lights").unwrap();

    let before: Vec<GpuLight> = (0..3)
        .map(|i| GpuLight {
            color: [i as f32, 0.5, 0.25],
            intensity: 10.0 + i as f32,
        })
        .collect();
    for (i, light) in before.iter().enumerate() {
        lights.element(i as u32).unwrap().write(light).unwrap();
    }
    if let Some(dummy) = block.gpu().as_dummy() {
        dummy.clear_history();
    }

    let replacement = GpuLight {
        color: [1.0, 0.9, 0.8],
        intensity: 42.0,
    };
    lights.element(1).unwrap().write(&replacement).unwrap();

    if let Some(dummy) = block.gpu().as_dummy() {
        assert_eq!(
            dummy.history(),
            vec![DummyCommand::WriteBuffer {
                offset: 16,
                size: 16
            }]
        );
    }

    let data = ctx.read_ordinary_data(&block).unwrap();
    let after: Vec<GpuLight> = bytemuck::pod_collect_to_vec(&data);
    assert_eq!(after, vec![before[0], replacement, before[2]]);

    // A struct leaf only takes a payload of its own size.
    assert!(matches!(
        lights.element(2).unwrap().write(&[0.0f32; 3]),
        Err(GraphicsError::Binding(BindingError::SizeMismatch {
            expected: 16,
            actual: 12
        }))
    ));
}

#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::vulkan(Backend::Vulkan)]
fn test_ordinary_data_write_errors(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };
    let layout = ctx.layout(&material_layout());
    let block = ctx.block(&layout);
    let root = block.cursor();

    assert!(matches!(
        root.field("tint").unwrap().write(&1.0f32),
        Err(GraphicsError::Binding(BindingError::SizeMismatch {
            expected: 16,
            actual: 4
        }))
    ));
    assert!(matches!(
        root.field("base").unwrap().write(&1.0f32),
        Err(GraphicsError::Binding(BindingError::NotOrdinaryData(
            TypeKind::Resource
        )))
    ));

    let size = layout.bindings().ordinary_data_size();
    assert!(matches!(
        block
            .shader_object()
            .write(ShaderOffset::new(size - 2, 0, 0), &[0u8; 4]),
        Err(GraphicsError::Binding(BindingError::WriteOutOfBounds { .. }))
    ));
}

// ============================================================================
// Descriptor Sets
// ============================================================================

#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::vulkan(Backend::Vulkan)]
fn test_one_set_per_frame_with_buffer_bound(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };
    let layout = ctx.layout(&material_layout());
    assert_eq!(layout.frames_in_flight(), FRAMES);
    assert_eq!(layout.bindings().ordinary_data_binding(), Some(3));

    let block = ctx.block(&layout);
    assert_eq!(block.frames_in_flight(), FRAMES);

    if let Some(dummy) = block.gpu().as_dummy() {
        let uniform = BoundResource::UniformBuffer {
            size: layout.bindings().ordinary_data_size(),
        };
        for frame in 0..FRAMES {
            assert_eq!(dummy.descriptor(frame, 3, 0).unwrap(), Some(uniform));
            assert_eq!(dummy.descriptor(frame, 2, 0).unwrap(), None);
        }
        assert!(matches!(
            dummy.descriptor(FRAMES, 0, 0),
            Err(BindingError::FrameIndexOutOfRange { .. })
        ));

        let history = dummy.history();
        assert_eq!(history.len(), 1);
        let DummyCommand::UpdateDescriptorSets { writes } = &history[0] else {
            panic!("expected a descriptor update, got {:?}", history[0]);
        };
        assert_eq!(writes.len(), FRAMES as usize);
    }

    #[cfg(feature = "vulkan-backend")]
    if let Some(vulkan) = block.gpu().as_vulkan() {
        assert_eq!(vulkan.descriptor_sets().len(), FRAMES as usize);
        assert!(vulkan.descriptor_set(FRAMES - 1).is_ok());
        assert!(matches!(
            vulkan.descriptor_set(FRAMES),
            Err(BindingError::FrameIndexOutOfRange { .. })
        ));
    }
}

#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::vulkan(Backend::Vulkan)]
fn test_texture_array_element_updates_every_frame(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };
    let layout = ctx.layout(&material_layout());
    let block = ctx.block(&layout);
    let texture = ctx.texture("albedo", TextureUsage::TEXTURE_BINDING);

    if let Some(dummy) = block.gpu().as_dummy() {
        dummy.clear_history();
    }

    block
        .cursor()
        .field("textures")
        .unwrap()
        .element(3)
        .unwrap()
        .write_texture(&texture)
        .unwrap();

    if let Some(dummy) = block.gpu().as_dummy() {
        let id = dummy_id(&texture).unwrap();
        let expected: Vec<DescriptorWrite> = (0..FRAMES)
            .map(|frame| DescriptorWrite {
                frame,
                binding: 2,
                array_element: 3,
                resource: BoundResource::Texture(id),
            })
            .collect();
        assert_eq!(
            dummy.history(),
            vec![DummyCommand::UpdateDescriptorSets { writes: expected }]
        );
        for frame in 0..FRAMES {
            assert_eq!(
                dummy.descriptor(frame, 2, 3).unwrap(),
                Some(BoundResource::Texture(id))
            );
            assert_eq!(dummy.descriptor(frame, 2, 2).unwrap(), None);
        }
    }
}

#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::vulkan(Backend::Vulkan)]
fn test_sampler_binding(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };
    let layout = ctx.layout(&material_layout());
    let block = ctx.block(&layout);
    let sampler = ctx.sampler();
    let texture = ctx.texture("base", TextureUsage::TEXTURE_BINDING);
    let root = block.cursor();

    root.field("linear").unwrap().write_sampler(&sampler).unwrap();
    root.field("base").unwrap().write_texture(&texture).unwrap();

    assert!(matches!(
        root.field("linear").unwrap().write_texture(&texture),
        Err(GraphicsError::Binding(BindingError::ResourceKindMismatch {
            binding: 1,
            ..
        }))
    ));
    assert!(matches!(
        root.field("base").unwrap().write_sampler(&sampler),
        Err(GraphicsError::Binding(BindingError::ResourceKindMismatch {
            binding: 0,
            ..
        }))
    ));
    assert!(matches!(
        root.field("tint").unwrap().write_texture(&texture),
        Err(GraphicsError::Binding(BindingError::InvalidLayoutKind {
            kind: TypeKind::Vector,
            ..
        }))
    ));
}

#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::vulkan(Backend::Vulkan)]
fn test_combined_binding_uses_attached_sampler(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };
    let combined = Arc::new(
        StructLayoutBuilder::new("Sprite")
            .field(
                "image",
                TypeLayout::resource(BindingKind::CombinedTextureSampler),
            )
            .build()
            .unwrap(),
    );
    let layout = ctx.layout(&combined);
    let block = ctx.block(&layout);
    let texture = ctx.texture("sprite", TextureUsage::TEXTURE_BINDING);
    let image = block.cursor().field("image").unwrap();

    assert!(matches!(
        image.write_texture(&texture),
        Err(GraphicsError::Binding(BindingError::MissingSampler { binding: 0 }))
    ));

    let sampler = ctx.sampler();
    texture.set_sampler(Arc::clone(&sampler));
    image.write_texture(&texture).unwrap();

    if let Some(dummy) = block.gpu().as_dummy() {
        let bound = dummy.descriptor(0, 0, 0).unwrap();
        assert!(matches!(
            bound,
            Some(BoundResource::CombinedImageSampler { texture: t, .. })
                if Some(t) == dummy_id(&texture)
        ));
    }
}

#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::vulkan(Backend::Vulkan)]
fn test_storage_binding_requires_storage_usage(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };
    let storage = Arc::new(
        StructLayoutBuilder::new("Compute")
            .field("output", TypeLayout::resource(BindingKind::MutableTexture))
            .build()
            .unwrap(),
    );
    let layout = ctx.layout(&storage);
    let block = ctx.block(&layout);
    let sampled_only = ctx.texture("sampled", TextureUsage::TEXTURE_BINDING);

    assert!(matches!(
        block.cursor().field("output").unwrap().write_texture(&sampled_only),
        Err(GraphicsError::InvalidParameter(_))
    ));
}

// ============================================================================
// Layouts and Pools
// ============================================================================

#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::vulkan(Backend::Vulkan)]
fn test_empty_layout(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };
    let layout = ctx.layout(&empty_layout());
    assert!(layout.bindings().is_empty());
    assert_eq!(layout.bindings().ordinary_data_binding(), None);

    let block = ctx.block(&layout);
    assert_eq!(block.cursor().field_count(), 0);
    assert!(ctx.read_ordinary_data(&block).is_none());
    // Writes to a block without ordinary data are ignored.
    block
        .shader_object()
        .write(ShaderOffset::default(), &[])
        .unwrap();
}

#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::vulkan(Backend::Vulkan)]
fn test_layout_cached_per_type(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };
    let material = material_layout();
    let a = ctx.layout(&material);
    let b = ctx.layout(&material);
    assert!(Arc::ptr_eq(&a, &b));

    let surface = ctx.layout(&surface_layout());
    assert!(!Arc::ptr_eq(&a, &surface));
    assert_eq!(ctx.device.cached_layout_count(), 2);
}

#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::vulkan(Backend::Vulkan)]
fn test_pools_grow_and_reuse_freed_sets(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };
    let layout = ctx.layout(&material_layout());
    assert_eq!(ctx.pool_count(&layout), 1);

    let blocks: Vec<_> = (0..3).map(|_| ctx.block(&layout)).collect();
    assert_eq!(ctx.pool_count(&layout), 3);

    // Every block keeps working after growth.
    for (i, block) in blocks.iter().enumerate() {
        block
            .cursor()
            .field("roughness")
            .unwrap()
            .write(&(i as f32))
            .unwrap();
    }

    let mut blocks = blocks;
    blocks.remove(1);
    let replacement = ctx.block(&layout);
    assert_eq!(ctx.pool_count(&layout), 3);
    if let Some(dummy) = replacement.gpu().as_dummy() {
        assert_eq!(dummy.pool_index(), 1);
    }
}

#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::vulkan(Backend::Vulkan)]
fn test_unsupported_layouts_rejected(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };
    let raw_buffer = Arc::new(
        StructLayoutBuilder::new("Particles")
            .field("count", TypeLayout::scalar(ScalarType::UInt32))
            .field("particles", TypeLayout::resource(BindingKind::MutableRawBuffer))
            .build()
            .unwrap(),
    );

    let result = ctx.device.create_shader_object_layout(&raw_buffer);
    assert!(matches!(
        result,
        Err(GraphicsError::Binding(BindingError::UnsupportedBindingKind {
            binding: 0,
            kind: BindingKind::MutableRawBuffer
        }))
    ));
    assert_eq!(ctx.device.cached_layout_count(), 0);
}

#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::vulkan(Backend::Vulkan)]
fn test_half_precision_root_is_zeroed(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };
    let layout = ctx.layout(&Arc::new(TypeLayout::scalar(ScalarType::Float16)));
    assert_eq!(layout.bindings().ordinary_data_size(), 2);
    let block = ctx.block(&layout);

    assert_eq!(ctx.read_ordinary_data(&block).unwrap(), vec![0, 0]);

    let one = 0x3C00u16;
    block.cursor().write(&one).unwrap();
    assert_eq!(ctx.read_ordinary_data(&block).unwrap(), one.to_ne_bytes().to_vec());
}

#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::vulkan(Backend::Vulkan)]
fn test_zero_sized_resource_array(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };
    let sparse = Arc::new(
        StructLayoutBuilder::new("Sparse")
            .field(
                "unused",
                TypeLayout::resource_array(BindingKind::Texture, ElementCount::Bounded(0)),
            )
            .field("linear", TypeLayout::resource(BindingKind::Sampler))
            .build()
            .unwrap(),
    );
    let layout = ctx.layout(&sparse);
    assert_eq!(layout.bindings().binding_count(), 2);
    let block = ctx.block(&layout);

    assert_eq!(
        block.cursor().path("unused[0]").unwrap_err(),
        BindingError::ElementOutOfRange { index: 0, count: 0 }
    );
    let sampler = ctx.sampler();
    block.cursor().field("linear").unwrap().write_sampler(&sampler).unwrap();
}

#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::vulkan(Backend::Vulkan)]
fn test_reloaded_types_release_their_layouts(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };
    let mut released = Vec::new();
    for _ in 0..100 {
        let material = material_layout();
        let layout = ctx.layout(&material);
        let block = ctx.block(&layout);
        block.cursor().field("roughness").unwrap().write(&0.5f32).unwrap();
        released.push(Arc::downgrade(&layout));
    }

    assert!(released.iter().all(|layout| layout.upgrade().is_none()));
    assert_eq!(ctx.device.cached_layout_count(), 0);

    let kept = material_layout();
    let layout = ctx.layout(&kept);
    assert!(Arc::ptr_eq(&layout, &ctx.layout(&kept)));
    assert_eq!(ctx.device.cached_layout_count(), 1);
}
