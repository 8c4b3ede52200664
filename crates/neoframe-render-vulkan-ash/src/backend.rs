use ash::{khr, vk, Device};
use neoframe_core::{AcquireOutcome, EngineError, EngineResult, FrameBackend, GpuStatus};

use crate::error::{VkCall, VkResult};
use crate::release::release;

/// The one frame slot: image-available and render-finished semaphores, the
/// in-flight fence and the reusable command buffer.
pub struct VkFrameBackend {
    device: Device,
    swapchain_loader: khr::swapchain::Device,
    queue: vk::Queue,
    swapchain: vk::SwapchainKHR,

    command_buffer: vk::CommandBuffer,
    image_available: vk::Semaphore,
    render_finished: vk::Semaphore,
    in_flight: vk::Fence,

    pass_open: bool,
}

impl VkFrameBackend {
    /// Creates the slot's sync objects. The fence starts signaled.
    pub fn new(
        device: Device,
        swapchain_loader: khr::swapchain::Device,
        queue: vk::Queue,
        swapchain: vk::SwapchainKHR,
        command_buffer: vk::CommandBuffer,
    ) -> VkResult<Self> {
        let mut slot = Self {
            device,
            swapchain_loader,
            queue,
            swapchain,
            command_buffer,
            image_available: vk::Semaphore::null(),
            render_finished: vk::Semaphore::null(),
            in_flight: vk::Fence::null(),
            pass_open: false,
        };

        if let Err(e) = slot.create_sync_objects() {
            slot.release();
            return Err(e);
        }
        Ok(slot)
    }

    fn create_sync_objects(&mut self) -> VkResult<()> {
        let sci = vk::SemaphoreCreateInfo::default();
        unsafe {
            self.image_available = self
                .device
                .create_semaphore(&sci, None)
                .vk("vkCreateSemaphore")?;
            self.render_finished = self
                .device
                .create_semaphore(&sci, None)
                .vk("vkCreateSemaphore")?;
            self.in_flight = self
                .device
                .create_fence(
                    &vk::FenceCreateInfo::default().flags(vk::FenceCreateFlags::SIGNALED),
                    None,
                )
                .vk("vkCreateFence")?;
        }
        Ok(())
    }

    #[inline]
    pub fn command_buffer(&self) -> vk::CommandBuffer {
        self.command_buffer
    }

    #[inline]
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Points the slot at a recreated swapchain.
    #[inline]
    pub fn set_swapchain(&mut self, swapchain: vk::SwapchainKHR) {
        self.swapchain = swapchain;
    }

    #[inline]
    pub fn is_pass_open(&self) -> bool {
        self.pass_open
    }

    /// Begins the render pass with a clear of the whole framebuffer.
    pub fn begin_clear_pass(
        &mut self,
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        extent: vk::Extent2D,
        rgba: [f32; 4],
    ) {
        if self.pass_open {
            return;
        }

        let clear = vk::ClearValue {
            color: vk::ClearColorValue { float32: rgba },
        };
        let area = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        };
        let begin = vk::RenderPassBeginInfo::default()
            .render_pass(render_pass)
            .framebuffer(framebuffer)
            .render_area(area)
            .clear_values(std::slice::from_ref(&clear));

        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };

        unsafe {
            self.device
                .cmd_begin_render_pass(self.command_buffer, &begin, vk::SubpassContents::INLINE);
            self.device
                .cmd_set_viewport(self.command_buffer, 0, std::slice::from_ref(&viewport));
            self.device
                .cmd_set_scissor(self.command_buffer, 0, std::slice::from_ref(&area));
        }
        self.pass_open = true;
    }

    /// Destroys the sync objects. The command buffer belongs to its pool.
    pub fn release(&mut self) -> usize {
        let device = &self.device;
        let mut n = 0;
        n += release(&mut self.in_flight, |f| unsafe { device.destroy_fence(f, None) }) as usize;
        n += release(&mut self.render_finished, |s| unsafe {
            device.destroy_semaphore(s, None)
        }) as usize;
        n += release(&mut self.image_available, |s| unsafe {
            device.destroy_semaphore(s, None)
        }) as usize;
        self.command_buffer = vk::CommandBuffer::null();
        n
    }
}

fn fatal(op: &'static str) -> impl FnOnce(vk::Result) -> EngineError {
    move |r| EngineError::fatal_gpu(op, r)
}

impl FrameBackend for VkFrameBackend {
    fn wait_for_fence(&mut self) -> EngineResult<()> {
        unsafe {
            self.device
                .wait_for_fences(&[self.in_flight], true, u64::MAX)
                .map_err(fatal("vkWaitForFences"))
        }
    }

    fn reset_fence(&mut self) -> EngineResult<()> {
        unsafe {
            self.device
                .reset_fences(&[self.in_flight])
                .map_err(fatal("vkResetFences"))
        }
    }

    fn acquire_next_image(&mut self) -> EngineResult<AcquireOutcome> {
        let acquired = unsafe {
            self.swapchain_loader.acquire_next_image(
                self.swapchain,
                u64::MAX,
                self.image_available,
                vk::Fence::null(),
            )
        };

        match acquired {
            Ok((index, suboptimal)) => Ok(AcquireOutcome::Image { index, suboptimal }),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(AcquireOutcome::OutOfDate),
            Err(e) => Err(fatal("vkAcquireNextImageKHR")(e)),
        }
    }

    fn begin_commands(&mut self, _image_index: u32) -> EngineResult<()> {
        unsafe {
            self.device
                .reset_command_buffer(self.command_buffer, vk::CommandBufferResetFlags::empty())
                .map_err(fatal("vkResetCommandBuffer"))?;
            self.device
                .begin_command_buffer(
                    self.command_buffer,
                    &vk::CommandBufferBeginInfo::default()
                        .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT),
                )
                .map_err(fatal("vkBeginCommandBuffer"))
        }
    }

    fn end_commands(&mut self) -> EngineResult<()> {
        unsafe {
            if self.pass_open {
                self.device.cmd_end_render_pass(self.command_buffer);
                self.pass_open = false;
            }
            self.device
                .end_command_buffer(self.command_buffer)
                .map_err(fatal("vkEndCommandBuffer"))
        }
    }

    fn submit(&mut self) -> EngineResult<()> {
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let wait_sems = [self.image_available];
        let signal_sems = [self.render_finished];
        let cmd_bufs = [self.command_buffer];

        let submit_infos = [vk::SubmitInfo::default()
            .wait_semaphores(&wait_sems)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&cmd_bufs)
            .signal_semaphores(&signal_sems)];

        unsafe {
            self.device
                .queue_submit(self.queue, &submit_infos, self.in_flight)
                .map_err(fatal("vkQueueSubmit"))
        }
    }

    fn present(&mut self, image_index: u32) -> EngineResult<GpuStatus> {
        let wait_sems = [self.render_finished];
        let swapchains = [self.swapchain];
        let indices = [image_index];

        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_sems)
            .swapchains(&swapchains)
            .image_indices(&indices);

        match unsafe { self.swapchain_loader.queue_present(self.queue, &present_info) } {
            Ok(false) => Ok(GpuStatus::Ok),
            Ok(true) | Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(GpuStatus::OutOfDate),
            Err(e) => Err(fatal("vkQueuePresentKHR")(e)),
        }
    }

    fn wait_idle(&mut self) -> EngineResult<()> {
        unsafe { self.device.device_wait_idle().map_err(fatal("vkDeviceWaitIdle")) }
    }
}
