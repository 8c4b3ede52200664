use ash::{khr, vk, Device, Entry, Instance};
use neoframe_core::{FaultFlag, FrameSynchronizer};
use neoframe_platform_winit::WinitWindowHandles;

use crate::backend::VkFrameBackend;

/// Swapchain and everything sized by it.
#[derive(Default)]
pub struct SwapchainState {
    pub swapchain: vk::SwapchainKHR,
    pub images: Vec<vk::Image>,
    pub views: Vec<vk::ImageView>,
    pub framebuffers: Vec<vk::Framebuffer>,
    pub format: vk::Format,
    pub extent: vk::Extent2D,
}

/// GPU block in the shared store. Every Vulkan object of the run lives here.
///
/// Loaders are `None` and handles are null until their setup phase ran, and again
/// after cleanup. Tasks check `fault` before touching anything.
#[derive(Default)]
pub struct GpuContext {
    pub fault: FaultFlag,

    pub(crate) window: Option<WinitWindowHandles>,
    pub(crate) validation: bool,
    pub(crate) vsync: bool,
    pub clear_color: [f32; 4],

    pub(crate) entry: Option<Entry>,
    pub(crate) instance: Option<Instance>,
    pub(crate) surface_loader: Option<khr::surface::Instance>,
    pub(crate) surface: vk::SurfaceKHR,

    pub(crate) physical_device: vk::PhysicalDevice,
    pub(crate) queue_family_index: u32,
    pub(crate) device: Option<Device>,
    pub(crate) queue: vk::Queue,

    pub(crate) swapchain_loader: Option<khr::swapchain::Device>,
    pub(crate) swapchain: SwapchainState,
    pub(crate) render_pass: vk::RenderPass,

    pub(crate) command_pool: vk::CommandPool,
    pub(crate) command_buffer: vk::CommandBuffer,

    pub(crate) frame: Option<FrameSynchronizer<VkFrameBackend>>,
    pub(crate) resize_pending: bool,
    pub(crate) resizes: u64,
}

impl GpuContext {
    /// True once every setup phase has run and the frame slot exists.
    #[inline]
    pub fn is_ready(&self) -> bool {
        !self.fault.is_raised() && self.frame.is_some()
    }

    #[inline]
    pub fn device(&self) -> Option<&Device> {
        self.device.as_ref()
    }

    #[inline]
    pub fn render_pass(&self) -> vk::RenderPass {
        self.render_pass
    }

    #[inline]
    pub fn swapchain(&self) -> &SwapchainState {
        &self.swapchain
    }

    #[inline]
    pub fn frame_sync(&self) -> Option<&FrameSynchronizer<VkFrameBackend>> {
        self.frame.as_ref()
    }

    #[inline]
    pub fn frames_presented(&self) -> u64 {
        self.frame.as_ref().map_or(0, |f| f.slot().frames_presented)
    }

    #[inline]
    pub fn frames_skipped(&self) -> u64 {
        self.frame.as_ref().map_or(0, |f| f.slot().frames_skipped)
    }

    #[inline]
    pub fn resizes(&self) -> u64 {
        self.resizes
    }

    /// Command buffer open for drawing inside the render pass, if any.
    ///
    /// Effect modules call this from the render phase.
    pub fn recording(&self) -> Option<(&Device, vk::CommandBuffer)> {
        let frame = self.frame.as_ref()?;
        let backend = frame.backend();
        backend
            .is_pass_open()
            .then(|| (backend.device(), backend.command_buffer()))
    }
}
