//! Vulkan physical and logical device selection.

use ash::vk;

use crate::error::GraphicsError;

/// Optional features the selected device turned out to support.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeviceFeatures {
    pub sampler_anisotropy: bool,
}

/// Physical device chosen for the binding layer.
pub struct SelectedDevice {
    pub physical_device: vk::PhysicalDevice,
    pub queue_family: u32,
    pub name: String,
    pub features: DeviceFeatures,
}

/// Pick the best physical device with a graphics queue.
///
/// Prefers discrete GPUs, then integrated ones, then anything else.
pub fn select_physical_device(instance: &ash::Instance) -> Result<SelectedDevice, GraphicsError> {
    let devices = unsafe { instance.enumerate_physical_devices() }.map_err(|e| {
        GraphicsError::InitializationFailed(format!(
            "Failed to enumerate physical devices: {:?}",
            e
        ))
    })?;

    let mut best: Option<(u32, SelectedDevice)> = None;

    for physical_device in devices {
        let properties = unsafe { instance.get_physical_device_properties(physical_device) };
        let name = properties
            .device_name_as_c_str()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "Unknown GPU".to_string());

        let Some(queue_family) = find_graphics_queue_family(instance, physical_device) else {
            log::debug!("Skipping GPU {:?}: no graphics queue", name);
            continue;
        };

        let score = match properties.device_type {
            vk::PhysicalDeviceType::DISCRETE_GPU => 1000,
            vk::PhysicalDeviceType::INTEGRATED_GPU => 100,
            _ => 1,
        };
        log::info!(
            "Found GPU: {:?} (type: {:?}, score: {})",
            name,
            properties.device_type,
            score
        );

        if best.as_ref().is_none_or(|(best_score, _)| score > *best_score) {
            let features = query_features(instance, physical_device);
            best = Some((
                score,
                SelectedDevice {
                    physical_device,
                    queue_family,
                    name,
                    features,
                },
            ));
        }
    }

    best.map(|(_, device)| device)
        .ok_or_else(|| GraphicsError::InitializationFailed("No suitable GPU found".to_string()))
}

fn find_graphics_queue_family(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
) -> Option<u32> {
    let families =
        unsafe { instance.get_physical_device_queue_family_properties(physical_device) };
    families
        .iter()
        .position(|family| family.queue_flags.contains(vk::QueueFlags::GRAPHICS))
        .map(|index| index as u32)
}

fn query_features(instance: &ash::Instance, physical_device: vk::PhysicalDevice) -> DeviceFeatures {
    let features = unsafe { instance.get_physical_device_features(physical_device) };
    DeviceFeatures {
        sampler_anisotropy: features.sampler_anisotropy == vk::TRUE,
    }
}

/// Create the logical device with the optional features that are supported.
pub fn create_logical_device(
    instance: &ash::Instance,
    selected: &SelectedDevice,
) -> Result<ash::Device, GraphicsError> {
    let queue_priorities = [1.0f32];
    let queue_create_infos = [vk::DeviceQueueCreateInfo::default()
        .queue_family_index(selected.queue_family)
        .queue_priorities(&queue_priorities)];

    #[allow(unused_mut)]
    let mut extensions = Vec::new();
    #[cfg(target_os = "macos")]
    extensions.push(ash::khr::portability_subset::NAME.as_ptr());

    let features = vk::PhysicalDeviceFeatures::default()
        .sampler_anisotropy(selected.features.sampler_anisotropy);

    let create_info = vk::DeviceCreateInfo::default()
        .queue_create_infos(&queue_create_infos)
        .enabled_extension_names(&extensions)
        .enabled_features(&features);

    unsafe { instance.create_device(selected.physical_device, &create_info, None) }.map_err(|e| {
        GraphicsError::InitializationFailed(format!("Failed to create logical device: {:?}", e))
    })
}
