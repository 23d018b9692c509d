// SPDX-License-Identifier: CEPL-1.0
use ash::khr::swapchain;
use ash::vk;
use nirvana_render::RenderSize;
use tracing::info;

use crate::device::{QueueFamilies, SurfaceSupport};
use crate::error::{RenderError, RenderResult, VkResultExt};

pub const PREFERRED_FORMAT: vk::SurfaceFormatKHR = vk::SurfaceFormatKHR {
    format: vk::Format::B8G8R8A8_UNORM,
    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
};

pub(crate) struct SwapchainBundle {
    pub swapchain: vk::SwapchainKHR,
    pub format: vk::SurfaceFormatKHR,
    pub extent: vk::Extent2D,
    pub images: Vec<vk::Image>,
    pub image_views: Vec<vk::ImageView>,
}

/// A lone UNDEFINED entry means "anything goes", so take the preferred pair.
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> vk::SurfaceFormatKHR {
    if let [only] = formats {
        if only.format == vk::Format::UNDEFINED {
            return PREFERRED_FORMAT;
        }
    }
    formats
        .iter()
        .copied()
        .find(|f| f.format == PREFERRED_FORMAT.format && f.color_space == PREFERRED_FORMAT.color_space)
        .or_else(|| formats.first().copied())
        .unwrap_or(PREFERRED_FORMAT)
}

/// MAILBOX, then IMMEDIATE, then FIFO (always available).
pub fn choose_present_mode(modes: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    [vk::PresentModeKHR::MAILBOX, vk::PresentModeKHR::IMMEDIATE]
        .into_iter()
        .find(|m| modes.contains(m))
        .unwrap_or(vk::PresentModeKHR::FIFO)
}

pub fn extent_from_caps(caps: &vk::SurfaceCapabilitiesKHR, want: RenderSize) -> vk::Extent2D {
    if caps.current_extent.width != u32::MAX {
        caps.current_extent
    } else {
        vk::Extent2D {
            width: want
                .width
                .clamp(caps.min_image_extent.width, caps.max_image_extent.width),
            height: want
                .height
                .clamp(caps.min_image_extent.height, caps.max_image_extent.height),
        }
    }
}

/// One more than the minimum, capped by the maximum (0 == "no max").
pub fn image_count(caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
    if caps.max_image_count == 0 {
        caps.min_image_count + 1
    } else {
        (caps.min_image_count + 1).min(caps.max_image_count)
    }
}

/// CONCURRENT across both families when they differ, EXCLUSIVE otherwise.
pub fn sharing(families: QueueFamilies) -> (vk::SharingMode, Vec<u32>) {
    if families.graphics != families.present {
        (
            vk::SharingMode::CONCURRENT,
            vec![families.graphics, families.present],
        )
    } else {
        (vk::SharingMode::EXCLUSIVE, vec![families.graphics])
    }
}

/// The surface must allow every usage bit the scene asks for.
pub fn check_usage(
    caps: &vk::SurfaceCapabilitiesKHR,
    usage: vk::ImageUsageFlags,
) -> RenderResult<()> {
    if caps.supported_usage_flags.contains(usage) {
        Ok(())
    } else {
        Err(RenderError::Configuration(format!(
            "surface supports image usage {:?}, need {:?}",
            caps.supported_usage_flags, usage
        )))
    }
}

fn pre_transform(caps: &vk::SurfaceCapabilitiesKHR) -> vk::SurfaceTransformFlagsKHR {
    if caps
        .supported_transforms
        .contains(vk::SurfaceTransformFlagsKHR::IDENTITY)
    {
        vk::SurfaceTransformFlagsKHR::IDENTITY
    } else {
        caps.current_transform
    }
}

pub(crate) unsafe fn create_swapchain_bundle(
    device: &ash::Device,
    swap_d: &swapchain::Device,
    surface: vk::SurfaceKHR,
    support: &SurfaceSupport,
    families: QueueFamilies,
    want: RenderSize,
    usage: vk::ImageUsageFlags,
) -> RenderResult<SwapchainBundle> {
    let caps = &support.capabilities;
    check_usage(caps, usage)?;
    let surf_format = choose_surface_format(&support.formats);
    let present_mode = choose_present_mode(&support.present_modes);
    let extent = extent_from_caps(caps, want);
    let min_count = image_count(caps);
    let (sharing_mode, family_indices) = sharing(families);

    info!(
        "swapchain: {:?} / {:?}, {:?}, {}x{}, images(min={} -> picked={}), {:?}",
        surf_format.format,
        surf_format.color_space,
        present_mode,
        extent.width,
        extent.height,
        caps.min_image_count,
        min_count,
        sharing_mode,
    );

    let swap_info = vk::SwapchainCreateInfoKHR {
        s_type: vk::StructureType::SWAPCHAIN_CREATE_INFO_KHR,
        surface,
        min_image_count: min_count,
        image_format: surf_format.format,
        image_color_space: surf_format.color_space,
        image_extent: extent,
        image_array_layers: 1,
        image_usage: usage,
        image_sharing_mode: sharing_mode,
        queue_family_index_count: family_indices.len() as u32,
        p_queue_family_indices: family_indices.as_ptr(),
        pre_transform: pre_transform(caps),
        composite_alpha: vk::CompositeAlphaFlagsKHR::OPAQUE,
        present_mode,
        clipped: vk::TRUE,
        old_swapchain: vk::SwapchainKHR::null(),
        ..Default::default()
    };

    let new_swapchain = swap_d
        .create_swapchain(&swap_info, None)
        .init("create_swapchain")?;
    let images = swap_d
        .get_swapchain_images(new_swapchain)
        .init("get_swapchain_images")?;

    // View format MUST match swapchain image format for direct rendering.
    let mut views = Vec::with_capacity(images.len());
    for &img in &images {
        let iv_info = vk::ImageViewCreateInfo {
            s_type: vk::StructureType::IMAGE_VIEW_CREATE_INFO,
            image: img,
            view_type: vk::ImageViewType::TYPE_2D,
            format: surf_format.format,
            components: vk::ComponentMapping {
                r: vk::ComponentSwizzle::IDENTITY,
                g: vk::ComponentSwizzle::IDENTITY,
                b: vk::ComponentSwizzle::IDENTITY,
                a: vk::ComponentSwizzle::IDENTITY,
            },
            subresource_range: color_range(),
            ..Default::default()
        };
        views.push(
            device
                .create_image_view(&iv_info, None)
                .init("create_image_view")?,
        );
    }

    Ok(SwapchainBundle {
        swapchain: new_swapchain,
        format: surf_format,
        extent,
        images,
        image_views: views,
    })
}

/// Mip 0, layer 0, one of each, colour aspect.
pub fn color_range() -> vk::ImageSubresourceRange {
    vk::ImageSubresourceRange {
        aspect_mask: vk::ImageAspectFlags::COLOR,
        base_mip_level: 0,
        level_count: 1,
        base_array_layer: 0,
        layer_count: 1,
    }
}
