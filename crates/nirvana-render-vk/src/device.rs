// SPDX-License-Identifier: CEPL-1.0
use ash::khr::{surface, swapchain};
use ash::{vk, Instance};
use std::ffi::{c_char, CStr, CString};
use tracing::{debug, info};

use crate::error::{RenderError, RenderResult, VkResultExt};

/// Queue families found so far while scanning one physical device.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    pub graphics: Option<u32>,
    pub present: Option<u32>,
}

impl QueueFamilyIndices {
    pub fn is_complete(&self) -> bool {
        self.graphics.is_some() && self.present.is_some()
    }

    pub fn resolve(self) -> Option<QueueFamilies> {
        Some(QueueFamilies {
            graphics: self.graphics?,
            present: self.present?,
        })
    }
}

/// Both families of the selected device.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QueueFamilies {
    pub graphics: u32,
    pub present: u32,
}

impl QueueFamilies {
    /// One entry per distinct family, graphics first.
    pub fn unique(&self) -> Vec<u32> {
        if self.graphics == self.present {
            vec![self.graphics]
        } else {
            vec![self.graphics, self.present]
        }
    }
}

/// What the surface offers on the chosen device.
#[derive(Clone, Debug)]
pub struct SurfaceSupport {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SurfaceSupport {
    pub fn is_adequate(&self) -> bool {
        !self.formats.is_empty() && !self.present_modes.is_empty()
    }
}

pub(crate) struct SelectedDevice {
    pub phys: vk::PhysicalDevice,
    pub families: QueueFamilies,
    pub support: SurfaceSupport,
}

// Walks families in index order. Each match overwrites the previous one, so the
// last graphics / last present family seen before both are set wins. Scanning
// stops as soon as both are known.
pub fn find_queue_families<E>(
    families: &[vk::QueueFamilyProperties],
    mut supports_present: impl FnMut(u32) -> Result<bool, E>,
) -> Result<QueueFamilyIndices, E> {
    let mut found = QueueFamilyIndices::default();

    for (i, family) in families.iter().enumerate() {
        let i = i as u32;
        if family.queue_count > 0 && family.queue_flags.contains(vk::QueueFlags::GRAPHICS) {
            found.graphics = Some(i);
        }
        if supports_present(i)? {
            found.present = Some(i);
        }
        if found.is_complete() {
            break;
        }
    }
    Ok(found)
}

pub fn has_extension(props: &[vk::ExtensionProperties], name: &CStr) -> bool {
    props.iter().any(|e| {
        e.extension_name_as_c_str()
            .map(|n| n == name)
            .unwrap_or(false)
    })
}

unsafe fn query_surface_support(
    surf_i: &surface::Instance,
    phys: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
) -> RenderResult<SurfaceSupport> {
    // capabilities: image counts, transforms, current extent (or UINT_MAX for free-size)
    let capabilities = surf_i
        .get_physical_device_surface_capabilities(phys, surface)
        .init("get_physical_device_surface_capabilities")?;
    let formats = surf_i
        .get_physical_device_surface_formats(phys, surface)
        .init("get_physical_device_surface_formats")?;
    let present_modes = surf_i
        .get_physical_device_surface_present_modes(phys, surface)
        .init("get_physical_device_surface_present_modes")?;

    Ok(SurfaceSupport {
        capabilities,
        formats,
        present_modes,
    })
}

/// Everything device selection looks at for one physical device.
#[derive(Clone, Debug)]
pub struct DeviceCandidate {
    pub phys: vk::PhysicalDevice,
    pub name: String,
    pub families: QueueFamilyIndices,
    pub extensions: Vec<vk::ExtensionProperties>,
    pub support: SurfaceSupport,
}

impl DeviceCandidate {
    /// Resolved families if this device passes every check.
    pub fn qualifies(&self) -> Option<QueueFamilies> {
        let Some(families) = self.families.resolve() else {
            debug!("skipping {}: queue families {:?}", self.name, self.families);
            return None;
        };
        if !has_extension(&self.extensions, swapchain::NAME) {
            debug!(
                "skipping {}: no {}",
                self.name,
                swapchain::NAME.to_string_lossy()
            );
            return None;
        }
        if !self.support.is_adequate() {
            debug!(
                "skipping {}: surface offers no formats or present modes",
                self.name
            );
            return None;
        }
        Some(families)
    }
}

/// First candidate in driver order that qualifies.
pub fn pick_device(candidates: &[DeviceCandidate]) -> RenderResult<(usize, QueueFamilies)> {
    candidates
        .iter()
        .enumerate()
        .find_map(|(i, c)| c.qualifies().map(|families| (i, families)))
        .ok_or(RenderError::NoCompatibleDevice)
}

unsafe fn gather_candidate(
    instance: &Instance,
    surf_i: &surface::Instance,
    surface: vk::SurfaceKHR,
    phys: vk::PhysicalDevice,
) -> RenderResult<DeviceCandidate> {
    let props = instance.get_physical_device_properties(phys);
    let name = props
        .device_name_as_c_str()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let qprops = instance.get_physical_device_queue_family_properties(phys);
    let families = find_queue_families(&qprops, |i| {
        surf_i.get_physical_device_surface_support(phys, i, surface)
    })
    .init("get_physical_device_surface_support")?;

    let extensions = instance
        .enumerate_device_extension_properties(phys)
        .init("enumerate_device_extension_properties")?;
    let support = query_surface_support(surf_i, phys, surface)?;

    Ok(DeviceCandidate {
        phys,
        name,
        families,
        extensions,
        support,
    })
}

// First device in driver order that has graphics + present families, the
// swapchain extension, and at least one surface format and present mode.
pub(crate) unsafe fn select_device(
    instance: &Instance,
    surf_i: &surface::Instance,
    surface: vk::SurfaceKHR,
) -> RenderResult<SelectedDevice> {
    let devices = instance
        .enumerate_physical_devices()
        .init("enumerate_physical_devices")?;

    let mut candidates = Vec::with_capacity(devices.len());
    for phys in devices {
        candidates.push(gather_candidate(instance, surf_i, surface, phys)?);
    }

    let (i, families) = pick_device(&candidates)?;
    let chosen = candidates.swap_remove(i);
    info!(
        "device: {} (graphics family {}, present family {})",
        chosen.name, families.graphics, families.present
    );
    Ok(SelectedDevice {
        phys: chosen.phys,
        families,
        support: chosen.support,
    })
}

pub(crate) struct DeviceBundle {
    pub device: ash::Device,
    pub graphics_queue: vk::Queue,
    pub present_queue: vk::Queue,
}

pub(crate) unsafe fn create_device(
    instance: &Instance,
    phys: vk::PhysicalDevice,
    families: QueueFamilies,
    layers: &[CString],
) -> RenderResult<DeviceBundle> {
    let priorities = [1.0_f32];
    let qinfos: Vec<vk::DeviceQueueCreateInfo> = families
        .unique()
        .into_iter()
        .map(|family| vk::DeviceQueueCreateInfo {
            s_type: vk::StructureType::DEVICE_QUEUE_CREATE_INFO,
            queue_family_index: family,
            queue_count: 1,
            p_queue_priorities: priorities.as_ptr(),
            ..Default::default()
        })
        .collect();

    let device_exts = [swapchain::NAME.as_ptr()];
    // device layers are deprecated but still honoured by older loaders
    let layer_ptrs: Vec<*const c_char> = layers.iter().map(|l| l.as_ptr()).collect();

    let dinfo = vk::DeviceCreateInfo {
        s_type: vk::StructureType::DEVICE_CREATE_INFO,
        queue_create_info_count: qinfos.len() as u32,
        p_queue_create_infos: qinfos.as_ptr(),
        enabled_extension_count: device_exts.len() as u32,
        pp_enabled_extension_names: device_exts.as_ptr(),
        enabled_layer_count: layer_ptrs.len() as u32,
        pp_enabled_layer_names: layer_ptrs.as_ptr(),
        ..Default::default()
    };

    let device = instance
        .create_device(phys, &dinfo, None)
        .init("create_device")?;

    let graphics_queue = device.get_device_queue(families.graphics, 0);
    let present_queue = device.get_device_queue(families.present, 0);

    Ok(DeviceBundle {
        device,
        graphics_queue,
        present_queue,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    fn family(flags: vk::QueueFlags) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_flags: flags,
            queue_count: 1,
            ..Default::default()
        }
    }

    fn present_on(list: &'static [u32]) -> impl FnMut(u32) -> Result<bool, Infallible> {
        move |i| Ok(list.contains(&i))
    }

    #[test]
    fn single_family_does_everything() {
        let fams = [family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE)];
        let found = find_queue_families(&fams, present_on(&[0])).unwrap();
        assert_eq!(
            found.resolve(),
            Some(QueueFamilies {
                graphics: 0,
                present: 0
            })
        );
    }

    #[test]
    fn later_graphics_family_overwrites_earlier_one() {
        // family 0 graphics only, family 1 graphics + present: the last match wins
        let fams = [
            family(vk::QueueFlags::GRAPHICS),
            family(vk::QueueFlags::GRAPHICS),
        ];
        let found = find_queue_families(&fams, present_on(&[1])).unwrap();
        assert_eq!(found.graphics, Some(1));
        assert_eq!(found.present, Some(1));
    }

    #[test]
    fn split_graphics_and_present_families() {
        let fams = [
            family(vk::QueueFlags::GRAPHICS),
            family(vk::QueueFlags::TRANSFER),
        ];
        let found = find_queue_families(&fams, present_on(&[1])).unwrap();
        assert_eq!(found.graphics, Some(0));
        assert_eq!(found.present, Some(1));
    }

    #[test]
    fn scan_stops_once_both_are_set() {
        let fams = [
            family(vk::QueueFlags::GRAPHICS),
            family(vk::QueueFlags::GRAPHICS),
            family(vk::QueueFlags::GRAPHICS),
        ];
        let mut asked = Vec::new();
        let found = find_queue_families(&fams, |i| {
            asked.push(i);
            Ok::<_, Infallible>(true)
        })
        .unwrap();
        assert_eq!(asked, vec![0]);
        assert_eq!(found.graphics, Some(0));
        assert_eq!(found.present, Some(0));
    }

    #[test]
    fn missing_present_leaves_indices_incomplete() {
        let fams = [family(vk::QueueFlags::GRAPHICS), family(vk::QueueFlags::COMPUTE)];
        let found = find_queue_families(&fams, present_on(&[])).unwrap();
        assert!(!found.is_complete());
        assert_eq!(found.resolve(), None);
    }

    #[test]
    fn present_query_errors_propagate() {
        let fams = [family(vk::QueueFlags::GRAPHICS)];
        let err = find_queue_families(&fams, |_| Err(vk::Result::ERROR_SURFACE_LOST_KHR));
        assert_eq!(err.unwrap_err(), vk::Result::ERROR_SURFACE_LOST_KHR);
    }

    #[test]
    fn unique_families_coalesce() {
        let same = QueueFamilies {
            graphics: 2,
            present: 2,
        };
        assert_eq!(same.unique(), vec![2]);

        let split = QueueFamilies {
            graphics: 0,
            present: 1,
        };
        assert_eq!(split.unique(), vec![0, 1]);
    }

    #[test]
    fn surface_support_needs_formats_and_modes() {
        let mut support = SurfaceSupport {
            capabilities: vk::SurfaceCapabilitiesKHR::default(),
            formats: vec![vk::SurfaceFormatKHR::default()],
            present_modes: vec![],
        };
        assert!(!support.is_adequate());
        support.present_modes.push(vk::PresentModeKHR::FIFO);
        assert!(support.is_adequate());
        support.formats.clear();
        assert!(!support.is_adequate());
    }

    fn ext(name: &CStr) -> vk::ExtensionProperties {
        let mut prop = vk::ExtensionProperties::default();
        for (dst, src) in prop.extension_name.iter_mut().zip(name.to_bytes_with_nul()) {
            *dst = *src as c_char;
        }
        prop
    }

    #[test]
    fn swapchain_extension_lookup() {
        assert!(has_extension(&[ext(swapchain::NAME)], swapchain::NAME));
        assert!(!has_extension(&[ext(c"VK_KHR_maintenance1")], swapchain::NAME));
        assert!(!has_extension(&[], swapchain::NAME));
    }

    fn candidate(name: &str) -> DeviceCandidate {
        DeviceCandidate {
            phys: vk::PhysicalDevice::null(),
            name: name.to_owned(),
            families: QueueFamilyIndices {
                graphics: Some(0),
                present: Some(0),
            },
            extensions: vec![ext(swapchain::NAME)],
            support: SurfaceSupport {
                capabilities: vk::SurfaceCapabilitiesKHR::default(),
                formats: vec![vk::SurfaceFormatKHR::default()],
                present_modes: vec![vk::PresentModeKHR::FIFO],
            },
        }
    }

    #[test]
    fn device_without_swapchain_is_skipped() {
        let mut first = candidate("igpu");
        first.extensions.clear();
        let (i, _) = pick_device(&[first, candidate("dgpu")]).unwrap();
        assert_eq!(i, 1);
    }

    #[test]
    fn device_without_formats_or_modes_is_skipped() {
        let mut no_formats = candidate("a");
        no_formats.support.formats.clear();
        let (i, _) = pick_device(&[no_formats, candidate("b")]).unwrap();
        assert_eq!(i, 1);

        let mut no_modes = candidate("a");
        no_modes.support.present_modes.clear();
        let (i, _) = pick_device(&[no_modes, candidate("b")]).unwrap();
        assert_eq!(i, 1);
    }

    #[test]
    fn device_without_present_family_is_skipped() {
        let mut first = candidate("headless");
        first.families.present = None;
        let mut second = candidate("display");
        second.families = QueueFamilyIndices {
            graphics: Some(0),
            present: Some(2),
        };
        let (i, families) = pick_device(&[first, second]).unwrap();
        assert_eq!(i, 1);
        assert_eq!(
            families,
            QueueFamilies {
                graphics: 0,
                present: 2
            }
        );
    }

    #[test]
    fn first_qualifying_device_wins() {
        let (i, _) = pick_device(&[candidate("first"), candidate("second")]).unwrap();
        assert_eq!(i, 0);
    }

    #[test]
    fn nothing_qualifies() {
        let mut a = candidate("a");
        a.extensions.clear();
        let mut b = candidate("b");
        b.families.graphics = None;
        assert!(matches!(
            pick_device(&[a, b]),
            Err(RenderError::NoCompatibleDevice)
        ));
        assert!(matches!(pick_device(&[]), Err(RenderError::NoCompatibleDevice)));
    }
}
