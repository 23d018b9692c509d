// SPDX-License-Identifier: CEPL-1.0
use ash::{vk, Entry, Instance};
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};
use std::ffi::{c_char, CStr, CString};

use crate::error::{RenderError, RenderResult, VkResultExt};

pub const API_VERSION: u32 = vk::API_VERSION_1_1;

pub(crate) struct InstanceBundle {
    pub instance: Instance,
    /// Enabled validation layer (debug builds), mirrored onto the device.
    pub layers: Vec<CString>,
    pub debug_utils: bool,
}

/// First wanted layer the loader actually has, as an index into `available`.
pub fn pick_layer(wanted: &[String], available: &[&CStr]) -> Option<usize> {
    wanted.iter().find_map(|w| {
        available
            .iter()
            .position(|a| a.to_bytes() == w.as_bytes())
    })
}

#[cfg(debug_assertions)]
unsafe fn debug_layers(entry: &Entry, wanted: &[String]) -> RenderResult<Vec<CString>> {
    let props = entry
        .enumerate_instance_layer_properties()
        .init("enumerate_instance_layer_properties")?;
    let names: Vec<&CStr> = props
        .iter()
        .map(|p| CStr::from_ptr(p.layer_name.as_ptr()))
        .collect();

    match pick_layer(wanted, &names) {
        Some(i) => {
            tracing::info!("validation layer: {}", names[i].to_string_lossy());
            Ok(vec![names[i].to_owned()])
        }
        None => {
            tracing::warn!("none of the validation layers {wanted:?} is installed; continuing without");
            Ok(Vec::new())
        }
    }
}

#[cfg(not(debug_assertions))]
unsafe fn debug_layers(_entry: &Entry, _wanted: &[String]) -> RenderResult<Vec<CString>> {
    Ok(Vec::new())
}

// Enumeration failure is logged and treated as "not available".
#[cfg(any(debug_assertions, test))]
fn debug_utils_listed(exts: Result<Vec<vk::ExtensionProperties>, vk::Result>) -> bool {
    match exts {
        Ok(exts) => exts.iter().any(|e| {
            e.extension_name_as_c_str()
                .map(|n| n == ash::ext::debug_utils::NAME)
                .unwrap_or(false)
        }),
        Err(e) => {
            tracing::warn!("enumerate_instance_extension_properties failed: {e}; no debug messenger");
            false
        }
    }
}

#[cfg(debug_assertions)]
unsafe fn has_debug_utils(entry: &Entry) -> bool {
    debug_utils_listed(entry.enumerate_instance_extension_properties(None))
}

#[cfg(not(debug_assertions))]
unsafe fn has_debug_utils(_entry: &Entry) -> bool {
    false
}

// Instance carries: API 1.1, generic + platform surface extensions, and in
// debug builds one validation layer plus VK_EXT_debug_utils when present.
pub(crate) unsafe fn create_instance(
    entry: &Entry,
    display_raw: RawDisplayHandle,
    wanted_layers: &[String],
) -> RenderResult<InstanceBundle> {
    let app = c"Nirvana";

    let app_info = vk::ApplicationInfo {
        s_type: vk::StructureType::APPLICATION_INFO,
        p_application_name: app.as_ptr(),
        application_version: 0,
        p_engine_name: app.as_ptr(),
        engine_version: 0,
        api_version: API_VERSION,
        ..Default::default()
    };

    let surface_exts = ash_window::enumerate_required_extensions(display_raw).map_err(|e| {
        RenderError::Configuration(format!("no surface backend for {display_raw:?} ({e})"))
    })?;

    let debug_utils = has_debug_utils(entry);
    let mut ext_vec: Vec<*const c_char> = surface_exts.to_vec();
    if debug_utils {
        ext_vec.push(ash::ext::debug_utils::NAME.as_ptr());
    }

    let layers = debug_layers(entry, wanted_layers)?;
    let layer_ptrs: Vec<*const c_char> = layers.iter().map(|l| l.as_ptr()).collect();

    let create_info = vk::InstanceCreateInfo {
        s_type: vk::StructureType::INSTANCE_CREATE_INFO,
        p_application_info: &app_info,
        enabled_extension_count: ext_vec.len() as u32,
        pp_enabled_extension_names: ext_vec.as_ptr(),
        enabled_layer_count: layer_ptrs.len() as u32,
        pp_enabled_layer_names: layer_ptrs.as_ptr(),
        ..Default::default()
    };

    let instance = entry
        .create_instance(&create_info, None)
        .init("create_instance")?;

    Ok(InstanceBundle {
        instance,
        layers,
        debug_utils,
    })
}

pub(crate) unsafe fn create_surface(
    entry: &Entry,
    instance: &Instance,
    display_raw: RawDisplayHandle,
    window_raw: RawWindowHandle,
) -> RenderResult<vk::SurfaceKHR> {
    match ash_window::create_surface(entry, instance, display_raw, window_raw, None) {
        Ok(surface) => Ok(surface),
        Err(vk::Result::ERROR_EXTENSION_NOT_PRESENT) => Err(RenderError::Configuration(format!(
            "no surface backend for {window_raw:?}"
        ))),
        Err(result) => Err(RenderError::Initialization {
            what: "create_surface",
            result,
        }),
    }
}

/// Forwards validation output into `tracing`. Debug builds only.
pub(crate) struct DebugMessenger {
    loader: ash::ext::debug_utils::Instance,
    handle: vk::DebugUtilsMessengerEXT,
}

#[cfg(debug_assertions)]
unsafe extern "system" fn debug_callback(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    _types: vk::DebugUtilsMessageTypeFlagsEXT,
    data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user: *mut std::ffi::c_void,
) -> vk::Bool32 {
    if data.is_null() || (*data).p_message.is_null() {
        return vk::FALSE;
    }
    let msg = CStr::from_ptr((*data).p_message).to_string_lossy();

    if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        tracing::error!("[vulkan] {msg}");
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        tracing::warn!("[vulkan] {msg}");
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
        tracing::info!("[vulkan] {msg}");
    } else {
        tracing::trace!("[vulkan] {msg}");
    }
    vk::FALSE
}

impl DebugMessenger {
    #[cfg(debug_assertions)]
    pub(crate) unsafe fn create(entry: &Entry, instance: &Instance) -> RenderResult<Option<Self>> {
        let loader = ash::ext::debug_utils::Instance::new(entry, instance);
        let ci = vk::DebugUtilsMessengerCreateInfoEXT {
            s_type: vk::StructureType::DEBUG_UTILS_MESSENGER_CREATE_INFO_EXT,
            message_severity: vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
                | vk::DebugUtilsMessageSeverityFlagsEXT::INFO
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            message_type: vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            pfn_user_callback: Some(debug_callback),
            ..Default::default()
        };
        let handle = loader
            .create_debug_utils_messenger(&ci, None)
            .init("create_debug_utils_messenger")?;
        Ok(Some(Self { loader, handle }))
    }

    #[cfg(not(debug_assertions))]
    pub(crate) unsafe fn create(_entry: &Entry, _instance: &Instance) -> RenderResult<Option<Self>> {
        Ok(None)
    }

    pub(crate) unsafe fn destroy(&self) {
        self.loader.destroy_debug_utils_messenger(self.handle, None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_wanted_layer_that_exists_wins() {
        let wanted = vec![
            "VK_LAYER_LUNARG_standard_validation".to_string(),
            "VK_LAYER_KHRONOS_validation".to_string(),
        ];
        let available = [c"VK_LAYER_MESA_overlay", c"VK_LAYER_KHRONOS_validation"];
        assert_eq!(pick_layer(&wanted, &available), Some(1));
    }

    #[test]
    fn preference_order_follows_wanted_list() {
        let wanted = vec![
            "VK_LAYER_LUNARG_standard_validation".to_string(),
            "VK_LAYER_KHRONOS_validation".to_string(),
        ];
        let available = [
            c"VK_LAYER_KHRONOS_validation",
            c"VK_LAYER_LUNARG_standard_validation",
        ];
        assert_eq!(pick_layer(&wanted, &available), Some(1));
    }

    #[test]
    fn no_layer_when_none_installed() {
        let wanted = vec!["VK_LAYER_KHRONOS_validation".to_string()];
        assert_eq!(pick_layer(&wanted, &[c"VK_LAYER_MESA_overlay"]), None);
        assert_eq!(pick_layer(&wanted, &[]), None);
    }

    fn ext(name: &CStr) -> vk::ExtensionProperties {
        let mut prop = vk::ExtensionProperties::default();
        for (dst, src) in prop.extension_name.iter_mut().zip(name.to_bytes_with_nul()) {
            *dst = *src as c_char;
        }
        prop
    }

    #[test]
    fn debug_utils_detection() {
        assert!(debug_utils_listed(Ok(vec![
            ext(c"VK_KHR_surface"),
            ext(ash::ext::debug_utils::NAME),
        ])));
        assert!(!debug_utils_listed(Ok(vec![ext(c"VK_KHR_surface")])));
    }

    #[test]
    fn failed_enumeration_means_no_debug_utils() {
        assert!(!debug_utils_listed(Err(vk::Result::ERROR_OUT_OF_HOST_MEMORY)));
    }
}
