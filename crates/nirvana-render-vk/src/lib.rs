// SPDX-License-Identifier: CEPL-1.0
//! Vulkan backend: one window surface, one swapchain, one frame in flight.

use anyhow::{Context, Result};
use ash::khr::{surface, swapchain as khr_swapchain};
use ash::{vk, Entry, Instance};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle, RawDisplayHandle, RawWindowHandle};
use tracing::{debug, info};

use nirvana_render::{RenderSettings, Renderer, Scene};

mod commands;
pub mod device;
mod error;
pub mod frame;
mod instance;
mod pass;
pub mod pipeline;
pub mod shader;
pub mod swapchain;

use commands::{CommandResources, FrameSync, TriangleDraw};
use device::DeviceBundle;
use error::VkResultExt;
use instance::{DebugMessenger, InstanceBundle};
use swapchain::SwapchainBundle;

pub use error::{RenderError, RenderResult};
pub use frame::{FramePhase, FrameTracker};
pub use shader::load_spirv;

/// Everything the renderer creates, in creation order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObjectKind {
    Instance,
    DebugMessenger,
    Surface,
    Device,
    Swapchain,
    ImageViews,
    RenderPass,
    ShaderModules,
    PipelineLayout,
    Pipeline,
    Framebuffers,
    CommandPool,
    Semaphores,
}

pub const CREATION_ORDER: [ObjectKind; 13] = [
    ObjectKind::Instance,
    ObjectKind::DebugMessenger,
    ObjectKind::Surface,
    ObjectKind::Device,
    ObjectKind::Swapchain,
    ObjectKind::ImageViews,
    ObjectKind::RenderPass,
    ObjectKind::ShaderModules,
    ObjectKind::PipelineLayout,
    ObjectKind::Pipeline,
    ObjectKind::Framebuffers,
    ObjectKind::CommandPool,
    ObjectKind::Semaphores,
];

pub fn teardown_order() -> impl Iterator<Item = ObjectKind> {
    CREATION_ORDER.into_iter().rev()
}

/// Objects that only exist for the triangle scene.
struct TriangleObjects {
    render_pass: vk::RenderPass,
    vert: vk::ShaderModule,
    frag: vk::ShaderModule,
    layout: vk::PipelineLayout,
    pipeline: vk::Pipeline,
    framebuffers: Vec<vk::Framebuffer>,
}

enum SceneObjects {
    Clear,
    Triangle(TriangleObjects),
}

pub struct VkRenderer {
    _entry: Entry,
    instance: Instance,
    debug: Option<DebugMessenger>,
    surface_loader: surface::Instance,
    surface: vk::SurfaceKHR,

    device: ash::Device,
    graphics_queue: vk::Queue,
    present_queue: vk::Queue,

    swapchain_loader: khr_swapchain::Device,
    sc: SwapchainBundle,

    scene: SceneObjects,
    commands: CommandResources,
    sync: FrameSync,

    clear_color: [f32; 4],
    frame: FrameTracker,
}

impl VkRenderer {
    fn triangle(&self) -> Option<&TriangleObjects> {
        match &self.scene {
            SceneObjects::Triangle(t) => Some(t),
            SceneObjects::Clear => None,
        }
    }

    // Returns false when `kind` was never created for the active scene.
    unsafe fn destroy(&self, kind: ObjectKind) -> bool {
        let d = &self.device;
        match kind {
            ObjectKind::Semaphores => {
                d.destroy_semaphore(self.sync.commands_submitted, None);
                d.destroy_semaphore(self.sync.image_acquired, None);
            }
            // frees the command buffer with it
            ObjectKind::CommandPool => d.destroy_command_pool(self.commands.pool, None),
            ObjectKind::Framebuffers => {
                let Some(t) = self.triangle() else { return false };
                for &fb in &t.framebuffers {
                    d.destroy_framebuffer(fb, None);
                }
            }
            ObjectKind::Pipeline => {
                let Some(t) = self.triangle() else { return false };
                d.destroy_pipeline(t.pipeline, None);
            }
            ObjectKind::PipelineLayout => {
                let Some(t) = self.triangle() else { return false };
                d.destroy_pipeline_layout(t.layout, None);
            }
            ObjectKind::ShaderModules => {
                let Some(t) = self.triangle() else { return false };
                d.destroy_shader_module(t.frag, None);
                d.destroy_shader_module(t.vert, None);
            }
            ObjectKind::RenderPass => {
                let Some(t) = self.triangle() else { return false };
                d.destroy_render_pass(t.render_pass, None);
            }
            ObjectKind::ImageViews => {
                for &iv in &self.sc.image_views {
                    d.destroy_image_view(iv, None);
                }
            }
            ObjectKind::Swapchain => self.swapchain_loader.destroy_swapchain(self.sc.swapchain, None),
            ObjectKind::Device => d.destroy_device(None),
            ObjectKind::Surface => self.surface_loader.destroy_surface(self.surface, None),
            ObjectKind::DebugMessenger => match &self.debug {
                Some(m) => m.destroy(),
                None => return false,
            },
            ObjectKind::Instance => self.instance.destroy_instance(None),
        }
        true
    }

    // STRICT PER-FRAME ORDER:
    // 1) acquire_next_image (signals image_acquired)
    // 2) reset pool + record
    // 3) queue_submit on the graphics queue (waits image_acquired, signals commands_submitted)
    // 4) queue_present on the present queue (waits commands_submitted)
    // 5) device_wait_idle before the next acquire
    unsafe fn draw_frame(&mut self) -> RenderResult<()> {
        // 1) Acquire
        let (image_index, suboptimal) = self
            .swapchain_loader
            .acquire_next_image(
                self.sc.swapchain,
                u64::MAX,
                self.sync.image_acquired,
                vk::Fence::null(),
            )
            .frame("acquire_next_image")?;
        if suboptimal {
            return Err(RenderError::Frame {
                stage: "acquire_next_image",
                result: vk::Result::SUBOPTIMAL_KHR,
            });
        }
        self.frame.advance(FramePhase::ImageAcquired)?;

        // 2) Record
        let img = image_index as usize;
        let cmd = self.commands.cmd;
        self.device
            .reset_command_pool(self.commands.pool, vk::CommandPoolResetFlags::empty())
            .frame("reset_command_pool")?;
        match &self.scene {
            SceneObjects::Clear => {
                commands::record_clear(&self.device, cmd, self.sc.images[img], self.clear_color)?
            }
            SceneObjects::Triangle(t) => {
                let draw = TriangleDraw {
                    render_pass: t.render_pass,
                    framebuffer: t.framebuffers[img],
                    pipeline: t.pipeline,
                    extent: self.sc.extent,
                };
                commands::record_triangle(&self.device, cmd, &draw, self.clear_color)?
            }
        }
        self.frame.advance(FramePhase::Recorded)?;

        // 3) Submit
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let submit = vk::SubmitInfo {
            s_type: vk::StructureType::SUBMIT_INFO,
            wait_semaphore_count: 1,
            p_wait_semaphores: &self.sync.image_acquired,
            p_wait_dst_stage_mask: wait_stages.as_ptr(),
            command_buffer_count: 1,
            p_command_buffers: &cmd,
            signal_semaphore_count: 1,
            p_signal_semaphores: &self.sync.commands_submitted,
            ..Default::default()
        };
        self.device
            .queue_submit(
                self.graphics_queue,
                std::slice::from_ref(&submit),
                vk::Fence::null(),
            )
            .frame("queue_submit")?;
        self.frame.advance(FramePhase::Submitted)?;

        // 4) Present
        let present = vk::PresentInfoKHR {
            s_type: vk::StructureType::PRESENT_INFO_KHR,
            wait_semaphore_count: 1,
            p_wait_semaphores: &self.sync.commands_submitted,
            swapchain_count: 1,
            p_swapchains: &self.sc.swapchain,
            p_image_indices: &image_index,
            ..Default::default()
        };
        let suboptimal = self
            .swapchain_loader
            .queue_present(self.present_queue, &present)
            .frame("queue_present")?;
        if suboptimal {
            return Err(RenderError::Frame {
                stage: "queue_present",
                result: vk::Result::SUBOPTIMAL_KHR,
            });
        }
        self.frame.advance(FramePhase::Presented)?;

        // 5) Drain
        self.device
            .device_wait_idle()
            .frame("device_wait_idle")?;
        self.frame.advance(FramePhase::DeviceIdle)?;
        self.frame.advance(FramePhase::Idle)
    }
}

// STRICT TEARDOWN ORDER: reverse of CREATION_ORDER, after the device is idle.
// Framebuffers go before the render pass and views, views before the
// swapchain, the swapchain before the device, the surface after the device,
// the instance last.
impl Drop for VkRenderer {
    fn drop(&mut self) {
        unsafe {
            self.device.device_wait_idle().ok();
            for kind in teardown_order() {
                if self.destroy(kind) {
                    debug!("vk: destroyed {kind:?}");
                }
            }
        }
    }
}

// Render pass -> shader modules -> layout -> pipeline -> framebuffers.
unsafe fn build_triangle(
    device: &ash::Device,
    sc: &SwapchainBundle,
    vertex: &[u32],
    fragment: &[u32],
) -> RenderResult<TriangleObjects> {
    let render_pass = pass::create_render_pass(device, sc.format.format)?;
    let vert = shader::create_shader_module(device, vertex)?;
    let frag = shader::create_shader_module(device, fragment)?;
    let layout = pipeline::create_pipeline_layout(device)?;
    let pipeline = pipeline::create_pipeline(device, render_pass, layout, vert, frag)?;
    let framebuffers =
        pass::create_framebuffers(device, render_pass, &sc.image_views, sc.extent)?;
    debug_assert!(
        per_image_counts_match(sc.images.len(), sc.image_views.len(), framebuffers.len()),
        "images {} / views {} / framebuffers {}",
        sc.images.len(),
        sc.image_views.len(),
        framebuffers.len()
    );

    Ok(TriangleObjects {
        render_pass,
        vert,
        frag,
        layout,
        pipeline,
        framebuffers,
    })
}

/// One view and one framebuffer per swapchain image.
pub fn per_image_counts_match(images: usize, views: usize, framebuffers: usize) -> bool {
    images == views && views == framebuffers
}

pub fn swapchain_usage(scene: &Scene) -> vk::ImageUsageFlags {
    match scene {
        // cleared with a transfer command, never rendered to
        Scene::Clear => vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_DST,
        Scene::Triangle { .. } => vk::ImageUsageFlags::COLOR_ATTACHMENT,
    }
}

// STRICT ORDER: see CREATION_ORDER.
unsafe fn build_renderer(
    display_raw: RawDisplayHandle,
    window_raw: RawWindowHandle,
    settings: RenderSettings,
) -> RenderResult<VkRenderer> {
    let entry = Entry::linked();

    let InstanceBundle {
        instance,
        layers,
        debug_utils,
    } = instance::create_instance(&entry, display_raw, &settings.debug_layers)?;
    let debug = if debug_utils {
        DebugMessenger::create(&entry, &instance)?
    } else {
        None
    };

    let surface_loader = surface::Instance::new(&entry, &instance);
    let surface = instance::create_surface(&entry, &instance, display_raw, window_raw)?;

    let selected = device::select_device(&instance, &surface_loader, surface)?;
    let DeviceBundle {
        device,
        graphics_queue,
        present_queue,
    } = device::create_device(&instance, selected.phys, selected.families, &layers)?;

    let swapchain_loader = khr_swapchain::Device::new(&instance, &device);
    let sc = swapchain::create_swapchain_bundle(
        &device,
        &swapchain_loader,
        surface,
        &selected.support,
        selected.families,
        settings.size,
        swapchain_usage(&settings.scene),
    )?;

    let clear_color = settings.scene.default_clear_color();
    let scene = match &settings.scene {
        Scene::Clear => SceneObjects::Clear,
        Scene::Triangle { vertex, fragment } => {
            SceneObjects::Triangle(build_triangle(&device, &sc, vertex, fragment)?)
        }
    };

    let commands = commands::create_command_resources(&device, selected.families.graphics)?;
    let sync = commands::create_frame_sync(&device)?;

    Ok(VkRenderer {
        _entry: entry,
        instance,
        debug,
        surface_loader,
        surface,
        device,
        graphics_queue,
        present_queue,
        swapchain_loader,
        sc,
        scene,
        commands,
        sync,
        clear_color,
        frame: FrameTracker::default(),
    })
}

impl Renderer for VkRenderer {
    fn new(
        window: &dyn HasWindowHandle,
        display: &dyn HasDisplayHandle,
        settings: RenderSettings,
    ) -> Result<Self> {
        let window_raw = window.window_handle().context("window_handle")?.as_raw();
        let display_raw = display.display_handle().context("display_handle")?.as_raw();

        let r = unsafe { build_renderer(display_raw, window_raw, settings) }
            .context("vk: renderer init")?;
        info!(
            "vk: ready ({}x{}, {:?}, {} images)",
            r.sc.extent.width,
            r.sc.extent.height,
            r.sc.format.format,
            r.sc.images.len()
        );
        Ok(r)
    }

    fn render(&mut self) -> Result<()> {
        unsafe { self.draw_frame() }.context("vk: frame")
    }

    fn set_clear_color(&mut self, rgba: [f32; 4]) {
        self.clear_color = rgba;
    }

    fn frames_rendered(&self) -> u64 {
        self.frame.completed()
    }
}
