// SPDX-License-Identifier: CEPL-1.0
use ash::vk;

use crate::error::{RenderError, RenderResult, VkResultExt};
use crate::pipeline::{flipped_viewport, full_rect};
use crate::swapchain::color_range;

pub(crate) struct CommandResources {
    pub pool: vk::CommandPool,
    pub cmd: vk::CommandBuffer,
}

// Default pool flags: the pool is reset wholesale every frame, buffers are
// never reset one by one.
pub(crate) unsafe fn create_command_resources(
    device: &ash::Device,
    queue_family: u32,
) -> RenderResult<CommandResources> {
    let pool_info = vk::CommandPoolCreateInfo {
        s_type: vk::StructureType::COMMAND_POOL_CREATE_INFO,
        queue_family_index: queue_family,
        ..Default::default()
    };
    let pool = device
        .create_command_pool(&pool_info, None)
        .init("create_command_pool")?;

    let alloc_info = vk::CommandBufferAllocateInfo {
        s_type: vk::StructureType::COMMAND_BUFFER_ALLOCATE_INFO,
        command_pool: pool,
        level: vk::CommandBufferLevel::PRIMARY,
        command_buffer_count: 1,
        ..Default::default()
    };
    let bufs = match device.allocate_command_buffers(&alloc_info) {
        Ok(bufs) => bufs,
        Err(result) => {
            device.destroy_command_pool(pool, None);
            return Err(RenderError::Initialization {
                what: "allocate_command_buffers",
                result,
            });
        }
    };

    Ok(CommandResources { pool, cmd: bufs[0] })
}

/// `image_acquired`: acquire -> submit. `commands_submitted`: submit -> present.
pub(crate) struct FrameSync {
    pub image_acquired: vk::Semaphore,
    pub commands_submitted: vk::Semaphore,
}

pub(crate) unsafe fn create_frame_sync(device: &ash::Device) -> RenderResult<FrameSync> {
    let sem_ci = vk::SemaphoreCreateInfo {
        s_type: vk::StructureType::SEMAPHORE_CREATE_INFO,
        ..Default::default()
    };
    let image_acquired = device
        .create_semaphore(&sem_ci, None)
        .init("create_semaphore(image_acquired)")?;
    let commands_submitted = match device.create_semaphore(&sem_ci, None) {
        Ok(sem) => sem,
        Err(result) => {
            device.destroy_semaphore(image_acquired, None);
            return Err(RenderError::Initialization {
                what: "create_semaphore(commands_submitted)",
                result,
            });
        }
    };
    Ok(FrameSync {
        image_acquired,
        commands_submitted,
    })
}

unsafe fn begin_one_time(device: &ash::Device, cmd: vk::CommandBuffer) -> RenderResult<()> {
    let begin = vk::CommandBufferBeginInfo {
        s_type: vk::StructureType::COMMAND_BUFFER_BEGIN_INFO,
        flags: vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT,
        ..Default::default()
    };
    device
        .begin_command_buffer(cmd, &begin)
        .frame("begin_command_buffer")
}

/// Barrier pair around a transfer clear of a swapchain image.
pub fn clear_barriers(image: vk::Image) -> [vk::ImageMemoryBarrier<'static>; 2] {
    // UNDEFINED -> GENERAL. Source stage is the one the acquire semaphore is
    // waited on, so the transition happens after the image is ours.
    let to_general = vk::ImageMemoryBarrier {
        s_type: vk::StructureType::IMAGE_MEMORY_BARRIER,
        src_access_mask: vk::AccessFlags::empty(),
        dst_access_mask: vk::AccessFlags::TRANSFER_WRITE,
        old_layout: vk::ImageLayout::UNDEFINED,
        new_layout: vk::ImageLayout::GENERAL,
        src_queue_family_index: vk::QUEUE_FAMILY_IGNORED,
        dst_queue_family_index: vk::QUEUE_FAMILY_IGNORED,
        image,
        subresource_range: color_range(),
        ..Default::default()
    };
    let to_present = vk::ImageMemoryBarrier {
        s_type: vk::StructureType::IMAGE_MEMORY_BARRIER,
        src_access_mask: vk::AccessFlags::TRANSFER_WRITE,
        dst_access_mask: vk::AccessFlags::empty(),
        old_layout: vk::ImageLayout::GENERAL,
        new_layout: vk::ImageLayout::PRESENT_SRC_KHR,
        src_queue_family_index: vk::QUEUE_FAMILY_IGNORED,
        dst_queue_family_index: vk::QUEUE_FAMILY_IGNORED,
        image,
        subresource_range: color_range(),
        ..Default::default()
    };
    [to_general, to_present]
}

pub(crate) unsafe fn record_clear(
    device: &ash::Device,
    cmd: vk::CommandBuffer,
    image: vk::Image,
    rgba: [f32; 4],
) -> RenderResult<()> {
    begin_one_time(device, cmd)?;

    let [to_general, to_present] = clear_barriers(image);
    device.cmd_pipeline_barrier(
        cmd,
        vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
        vk::PipelineStageFlags::TRANSFER,
        vk::DependencyFlags::empty(),
        &[],
        &[],
        std::slice::from_ref(&to_general),
    );

    let color = vk::ClearColorValue { float32: rgba };
    let range = color_range();
    device.cmd_clear_color_image(
        cmd,
        image,
        vk::ImageLayout::GENERAL,
        &color,
        std::slice::from_ref(&range),
    );

    device.cmd_pipeline_barrier(
        cmd,
        vk::PipelineStageFlags::TRANSFER,
        vk::PipelineStageFlags::BOTTOM_OF_PIPE,
        vk::DependencyFlags::empty(),
        &[],
        &[],
        std::slice::from_ref(&to_present),
    );

    device.end_command_buffer(cmd).frame("end_command_buffer")
}

pub(crate) struct TriangleDraw {
    pub render_pass: vk::RenderPass,
    pub framebuffer: vk::Framebuffer,
    pub pipeline: vk::Pipeline,
    pub extent: vk::Extent2D,
}

pub(crate) unsafe fn record_triangle(
    device: &ash::Device,
    cmd: vk::CommandBuffer,
    draw: &TriangleDraw,
    rgba: [f32; 4],
) -> RenderResult<()> {
    begin_one_time(device, cmd)?;

    let clear = vk::ClearValue {
        color: vk::ClearColorValue { float32: rgba },
    };
    let rp_begin = vk::RenderPassBeginInfo {
        s_type: vk::StructureType::RENDER_PASS_BEGIN_INFO,
        render_pass: draw.render_pass,
        framebuffer: draw.framebuffer,
        render_area: full_rect(draw.extent),
        clear_value_count: 1,
        p_clear_values: &clear,
        ..Default::default()
    };
    device.cmd_begin_render_pass(cmd, &rp_begin, vk::SubpassContents::INLINE);

    let viewport = flipped_viewport(draw.extent);
    let scissor = full_rect(draw.extent);
    device.cmd_set_viewport(cmd, 0, std::slice::from_ref(&viewport));
    device.cmd_set_scissor(cmd, 0, std::slice::from_ref(&scissor));

    device.cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, draw.pipeline);
    device.cmd_draw(cmd, 3, 1, 0, 0);

    device.cmd_end_render_pass(cmd);
    device.end_command_buffer(cmd).frame("end_command_buffer")
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;

    #[test]
    fn clear_barriers_bracket_general_layout() {
        let image = vk::Image::from_raw(0x1234);
        let [pre, post] = clear_barriers(image);

        assert_eq!(pre.old_layout, vk::ImageLayout::UNDEFINED);
        assert_eq!(pre.new_layout, vk::ImageLayout::GENERAL);
        assert_eq!(pre.dst_access_mask, vk::AccessFlags::TRANSFER_WRITE);

        assert_eq!(post.old_layout, pre.new_layout);
        assert_eq!(post.new_layout, vk::ImageLayout::PRESENT_SRC_KHR);
        assert_eq!(post.src_access_mask, vk::AccessFlags::TRANSFER_WRITE);

        for b in [pre, post] {
            assert_eq!(b.image, image);
            assert_eq!(b.src_queue_family_index, vk::QUEUE_FAMILY_IGNORED);
            assert_eq!(b.dst_queue_family_index, vk::QUEUE_FAMILY_IGNORED);
            assert_eq!(b.subresource_range.aspect_mask, vk::ImageAspectFlags::COLOR);
        }
    }
}
