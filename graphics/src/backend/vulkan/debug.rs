//! Validation layer messages routed into `log`.

use std::borrow::Cow;
use std::ffi::CStr;

use ash::vk;

use crate::error::GraphicsError;

/// Create a debug messenger forwarding warnings and errors to `log`.
pub fn create_debug_messenger(
    debug_utils: &ash::ext::debug_utils::Instance,
) -> Result<vk::DebugUtilsMessengerEXT, GraphicsError> {
    let create_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
        .message_severity(
            vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::INFO,
        )
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .pfn_user_callback(Some(debug_callback));

    unsafe { debug_utils.create_debug_utils_messenger(&create_info, None) }.map_err(|e| {
        GraphicsError::InitializationFailed(format!("Failed to create debug messenger: {:?}", e))
    })
}

unsafe extern "system" fn debug_callback(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    // SAFETY: the driver passes either null or a valid callback data pointer
    // whose strings are null-terminated for the duration of the call.
    let (id, message) = match unsafe { callback_data.as_ref() } {
        Some(data) => (
            unsafe { c_str_or(data.p_message_id_name, "") },
            unsafe { c_str_or(data.p_message, "(no message)") },
        ),
        None => (Cow::Borrowed(""), Cow::Borrowed("(no message)")),
    };

    let level = match severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => log::Level::Error,
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => log::Level::Warn,
        vk::DebugUtilsMessageSeverityFlagsEXT::INFO => log::Level::Debug,
        _ => log::Level::Trace,
    };
    log::log!(level, "[Vulkan {:?}] {} {}", message_type, id, message);

    vk::FALSE
}

unsafe fn c_str_or(ptr: *const std::ffi::c_char, fallback: &'static str) -> Cow<'static, str> {
    if ptr.is_null() {
        Cow::Borrowed(fallback)
    } else {
        Cow::Owned(unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned())
    }
}
