//! Vulkan instance creation.
//!
//! The binding layer never presents, so the instance is headless: no surface
//! extensions are requested.

use std::ffi::{CStr, CString};

use ash::vk;

use crate::error::GraphicsError;
use crate::instance::InstanceParameters;

use super::debug;

/// MoltenVK stops at Vulkan 1.2.
#[cfg(target_os = "macos")]
const REQUIRED_API_VERSION: u32 = vk::make_api_version(0, 1, 2, 0);

#[cfg(not(target_os = "macos"))]
const REQUIRED_API_VERSION: u32 = vk::make_api_version(0, 1, 3, 0);

const VALIDATION_LAYER_NAME: &CStr = c"VK_LAYER_KHRONOS_validation";

const ENGINE_NAME: &CStr = c"Prism";

/// Instance plus the optional validation messenger.
pub struct CreatedInstance {
    pub instance: ash::Instance,
    pub debug_utils: Option<ash::ext::debug_utils::Instance>,
    pub debug_messenger: Option<vk::DebugUtilsMessengerEXT>,
}

/// Create a Vulkan instance, enabling validation when requested and
/// available.
pub fn create_instance(
    entry: &ash::Entry,
    params: &InstanceParameters,
) -> Result<CreatedInstance, GraphicsError> {
    let validation = params.validation && has_validation_layer(entry);
    if params.validation && !validation {
        log::warn!("Validation layers requested but not available");
    }

    let app_name = CString::new(params.application_name.as_str()).map_err(|e| {
        GraphicsError::InvalidParameter(format!("Invalid application name: {}", e))
    })?;

    let app_info = vk::ApplicationInfo::default()
        .application_name(&app_name)
        .application_version(vk::make_api_version(0, 0, 1, 0))
        .engine_name(ENGINE_NAME)
        .engine_version(vk::make_api_version(0, 0, 1, 0))
        .api_version(REQUIRED_API_VERSION);

    #[allow(unused_mut)]
    let mut extensions = Vec::new();
    if validation {
        extensions.push(ash::ext::debug_utils::NAME.as_ptr());
    }

    #[allow(unused_mut)]
    let mut flags = vk::InstanceCreateFlags::empty();

    #[cfg(target_os = "macos")]
    {
        extensions.push(ash::khr::portability_enumeration::NAME.as_ptr());
        flags |= vk::InstanceCreateFlags::ENUMERATE_PORTABILITY_KHR;
    }

    let layers = if validation {
        vec![VALIDATION_LAYER_NAME.as_ptr()]
    } else {
        Vec::new()
    };

    let create_info = vk::InstanceCreateInfo::default()
        .flags(flags)
        .application_info(&app_info)
        .enabled_extension_names(&extensions)
        .enabled_layer_names(&layers);

    let instance = unsafe { entry.create_instance(&create_info, None) }.map_err(|e| {
        GraphicsError::InitializationFailed(format!("Failed to create Vulkan instance: {:?}", e))
    })?;

    if !validation {
        return Ok(CreatedInstance {
            instance,
            debug_utils: None,
            debug_messenger: None,
        });
    }

    let debug_utils = ash::ext::debug_utils::Instance::new(entry, &instance);
    match debug::create_debug_messenger(&debug_utils) {
        Ok(messenger) => Ok(CreatedInstance {
            instance,
            debug_utils: Some(debug_utils),
            debug_messenger: Some(messenger),
        }),
        Err(e) => {
            unsafe { instance.destroy_instance(None) };
            Err(e)
        }
    }
}

fn has_validation_layer(entry: &ash::Entry) -> bool {
    let Ok(layers) = (unsafe { entry.enumerate_instance_layer_properties() }) else {
        return false;
    };

    layers.iter().any(|layer| {
        layer
            .layer_name_as_c_str()
            .is_ok_and(|name| name == VALIDATION_LAYER_NAME)
    })
}
