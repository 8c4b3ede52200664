use ash::{khr, vk, Device, Entry, Instance};
use neoframe_core::FrameSynchronizer;
use neoframe_platform_winit::WinitWindowHandles;
use std::ffi::CStr;

use crate::backend::VkFrameBackend;
use crate::context::GpuContext;
use crate::error::{VkCall, VkRenderError, VkResult};
use crate::release::{release, release_all};

const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

impl GpuContext {
    pub(crate) fn create_instance(&mut self, window: WinitWindowHandles) -> VkResult<()> {
        let entry = unsafe { Entry::load() }.map_err(|e| VkRenderError::Loader(e.to_string()))?;

        let app_info = vk::ApplicationInfo::default()
            .application_name(c"neoframe")
            .application_version(vk::make_api_version(0, 0, 1, 0))
            .engine_name(c"neoframe")
            .engine_version(vk::make_api_version(0, 0, 1, 0))
            .api_version(vk::API_VERSION_1_2);

        let mut extension_names = ash_window::enumerate_required_extensions(window.display)
            .map_err(|e| VkRenderError::AshWindow(e.to_string()))?
            .to_vec();

        let enable_validation = self.validation && has_instance_layer(&entry, VALIDATION_LAYER);
        if enable_validation {
            extension_names.push(ash::ext::debug_utils::NAME.as_ptr());
        } else if self.validation {
            log::warn!("vulkan: validation layer not found; running without validation");
        }

        let layer_ptrs = [VALIDATION_LAYER.as_ptr()];
        let mut create_info = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_extension_names(&extension_names);
        if enable_validation {
            create_info = create_info.enabled_layer_names(&layer_ptrs);
        }

        let instance = unsafe { entry.create_instance(&create_info, None) }.vk("vkCreateInstance")?;
        self.surface_loader = Some(khr::surface::Instance::new(&entry, &instance));
        self.instance = Some(instance);
        self.entry = Some(entry);
        self.window = Some(window);

        log::info!("vulkan: instance created (validation={enable_validation})");
        Ok(())
    }

    pub(crate) fn create_surface(&mut self) -> VkResult<()> {
        let entry = self.entry.as_ref().ok_or(VkRenderError::Missing("entry"))?;
        let instance = self.instance.as_ref().ok_or(VkRenderError::Missing("instance"))?;
        let window = self.window.ok_or(VkRenderError::Missing("window"))?;

        self.surface = unsafe {
            ash_window::create_surface(entry, instance, window.display, window.window, None)
        }
        .vk("vkCreateSurfaceKHR")?;
        Ok(())
    }

    pub(crate) fn create_device(&mut self) -> VkResult<()> {
        let instance = self.instance.as_ref().ok_or(VkRenderError::Missing("instance"))?;
        let surface_loader = self
            .surface_loader
            .as_ref()
            .ok_or(VkRenderError::Missing("surface loader"))?;

        let (pd, qfi) = pick_physical_device(instance, surface_loader, self.surface)?;

        let priorities = [1.0f32];
        let qci = [vk::DeviceQueueCreateInfo::default()
            .queue_family_index(qfi)
            .queue_priorities(&priorities)];
        let device_exts = [khr::swapchain::NAME.as_ptr()];
        let dci = vk::DeviceCreateInfo::default()
            .queue_create_infos(&qci)
            .enabled_extension_names(&device_exts);

        let device = unsafe { instance.create_device(pd, &dci, None) }.vk("vkCreateDevice")?;
        self.queue = unsafe { device.get_device_queue(qfi, 0) };
        self.swapchain_loader = Some(khr::swapchain::Device::new(instance, &device));
        self.physical_device = pd;
        self.queue_family_index = qfi;
        self.device = Some(device);

        if log::log_enabled!(log::Level::Info) {
            let props = unsafe { instance.get_physical_device_properties(pd) };
            let name = props.device_name_as_c_str().unwrap_or(c"<unnamed>");
            log::info!("vulkan: device '{}' queue family {qfi}", name.to_string_lossy());
        }
        Ok(())
    }

    pub(crate) fn create_swapchain(&mut self, width: u32, height: u32) -> VkResult<()> {
        let surface_loader = self
            .surface_loader
            .as_ref()
            .ok_or(VkRenderError::Missing("surface loader"))?;
        let swapchain_loader = self
            .swapchain_loader
            .as_ref()
            .ok_or(VkRenderError::Missing("swapchain loader"))?;
        let device = self.device.as_ref().ok_or(VkRenderError::Missing("device"))?;

        let pd = self.physical_device;
        let caps = unsafe { surface_loader.get_physical_device_surface_capabilities(pd, self.surface) }
            .vk("vkGetPhysicalDeviceSurfaceCapabilitiesKHR")?;
        let formats = unsafe { surface_loader.get_physical_device_surface_formats(pd, self.surface) }
            .vk("vkGetPhysicalDeviceSurfaceFormatsKHR")?;
        let present_modes =
            unsafe { surface_loader.get_physical_device_surface_present_modes(pd, self.surface) }
                .vk("vkGetPhysicalDeviceSurfacePresentModesKHR")?;

        let surface_format = formats
            .iter()
            .find(|f| f.format == vk::Format::B8G8R8A8_UNORM)
            .or_else(|| formats.first())
            .copied()
            .ok_or(VkRenderError::Missing("surface format"))?;

        let present_mode = if self.vsync {
            vk::PresentModeKHR::FIFO
        } else {
            present_modes
                .into_iter()
                .find(|&m| m == vk::PresentModeKHR::MAILBOX)
                .unwrap_or(vk::PresentModeKHR::FIFO)
        };

        let extent = if caps.current_extent.width != u32::MAX {
            caps.current_extent
        } else {
            vk::Extent2D {
                width: width
                    .clamp(caps.min_image_extent.width, caps.max_image_extent.width)
                    .max(1),
                height: height
                    .clamp(caps.min_image_extent.height, caps.max_image_extent.height)
                    .max(1),
            }
        };

        let mut image_count = caps.min_image_count + 1;
        if caps.max_image_count != 0 {
            image_count = image_count.min(caps.max_image_count);
        }

        let queue_family_indices = [self.queue_family_index];
        let sci = vk::SwapchainCreateInfoKHR::default()
            .surface(self.surface)
            .min_image_count(image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .queue_family_indices(&queue_family_indices)
            .pre_transform(caps.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true);

        let swapchain = unsafe { swapchain_loader.create_swapchain(&sci, None) }.vk("vkCreateSwapchainKHR")?;
        let images =
            unsafe { swapchain_loader.get_swapchain_images(swapchain) }.vk("vkGetSwapchainImagesKHR")?;
        let views = create_image_views(device, &images, surface_format.format)?;

        log::debug!(
            "vulkan: swapchain {}x{} {:?}, {} images, {:?}",
            extent.width,
            extent.height,
            surface_format.format,
            images.len(),
            present_mode
        );

        self.swapchain.swapchain = swapchain;
        self.swapchain.images = images;
        self.swapchain.views = views;
        self.swapchain.format = surface_format.format;
        self.swapchain.extent = extent;
        Ok(())
    }

    pub(crate) fn create_render_pass(&mut self) -> VkResult<()> {
        let device = self.device.as_ref().ok_or(VkRenderError::Missing("device"))?;
        self.render_pass = create_render_pass(device, self.swapchain.format)?;
        Ok(())
    }

    pub(crate) fn create_framebuffers(&mut self) -> VkResult<()> {
        let device = self.device.as_ref().ok_or(VkRenderError::Missing("device"))?;
        self.swapchain.framebuffers = create_framebuffers(
            device,
            self.render_pass,
            &self.swapchain.views,
            self.swapchain.extent,
        )?;
        Ok(())
    }

    pub(crate) fn create_command_pool(&mut self) -> VkResult<()> {
        let device = self.device.as_ref().ok_or(VkRenderError::Missing("device"))?;
        self.command_pool = unsafe {
            device.create_command_pool(
                &vk::CommandPoolCreateInfo::default()
                    .queue_family_index(self.queue_family_index)
                    .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER),
                None,
            )
        }
        .vk("vkCreateCommandPool")?;
        Ok(())
    }

    pub(crate) fn allocate_command_buffer(&mut self) -> VkResult<()> {
        let device = self.device.as_ref().ok_or(VkRenderError::Missing("device"))?;
        let buffers = unsafe {
            device.allocate_command_buffers(
                &vk::CommandBufferAllocateInfo::default()
                    .command_pool(self.command_pool)
                    .level(vk::CommandBufferLevel::PRIMARY)
                    .command_buffer_count(1),
            )
        }
        .vk("vkAllocateCommandBuffers")?;
        self.command_buffer = buffers
            .first()
            .copied()
            .ok_or(VkRenderError::Missing("command buffer"))?;
        Ok(())
    }

    pub(crate) fn create_frame_slot(&mut self) -> VkResult<()> {
        let device = self.device.clone().ok_or(VkRenderError::Missing("device"))?;
        let loader = self
            .swapchain_loader
            .clone()
            .ok_or(VkRenderError::Missing("swapchain loader"))?;

        let backend = VkFrameBackend::new(
            device,
            loader,
            self.queue,
            self.swapchain.swapchain,
            self.command_buffer,
        )?;
        self.frame = Some(FrameSynchronizer::new(backend));
        log::info!("vulkan: frame slot ready");
        Ok(())
    }

    /// Rebuilds the swapchain, its views and framebuffers for a new surface size.
    ///
    /// Waits for the device first; the render pass is rebuilt only if the format changed.
    pub(crate) fn recreate_swapchain(&mut self, width: u32, height: u32) -> VkResult<()> {
        let device = self.device.clone().ok_or(VkRenderError::Missing("device"))?;
        unsafe { device.device_wait_idle() }.vk("vkDeviceWaitIdle")?;

        let old_format = self.swapchain.format;
        self.release_swapchain(&device);

        self.create_swapchain(width, height)?;
        if self.swapchain.format != old_format {
            log::debug!("vulkan: surface format changed, rebuilding render pass");
            release(&mut self.render_pass, |rp| unsafe {
                device.destroy_render_pass(rp, None)
            });
            self.create_render_pass()?;
        }
        self.create_framebuffers()?;

        if let Some(frame) = self.frame.as_mut() {
            frame.backend_mut().set_swapchain(self.swapchain.swapchain);
        }
        self.resizes += 1;
        Ok(())
    }

    /// Framebuffers, views and the swapchain itself. Returns how many objects died.
    pub(crate) fn release_swapchain(&mut self, device: &Device) -> usize {
        let mut n = release_all(&mut self.swapchain.framebuffers, |fb| unsafe {
            device.destroy_framebuffer(fb, None)
        });
        n += release_all(&mut self.swapchain.views, |iv| unsafe {
            device.destroy_image_view(iv, None)
        });
        self.swapchain.images.clear();

        if let Some(loader) = self.swapchain_loader.as_ref() {
            n += release(&mut self.swapchain.swapchain, |s| unsafe {
                loader.destroy_swapchain(s, None)
            }) as usize;
        }
        n
    }
}

fn has_instance_layer(entry: &Entry, name: &CStr) -> bool {
    let Ok(props) = (unsafe { entry.enumerate_instance_layer_properties() }) else {
        return false;
    };
    props
        .iter()
        .any(|p| p.layer_name_as_c_str().is_ok_and(|layer| layer == name))
}

fn pick_physical_device(
    instance: &Instance,
    surface_loader: &khr::surface::Instance,
    surface: vk::SurfaceKHR,
) -> VkResult<(vk::PhysicalDevice, u32)> {
    let pds = unsafe { instance.enumerate_physical_devices() }.vk("vkEnumeratePhysicalDevices")?;
    for pd in pds {
        let qf = unsafe { instance.get_physical_device_queue_family_properties(pd) };
        for (i, props) in qf.iter().enumerate() {
            if !props.queue_flags.contains(vk::QueueFlags::GRAPHICS) {
                continue;
            }
            let present = unsafe {
                surface_loader.get_physical_device_surface_support(pd, i as u32, surface)
            }
            .vk("vkGetPhysicalDeviceSurfaceSupportKHR")?;
            if present {
                return Ok((pd, i as u32));
            }
        }
    }
    Err(VkRenderError::NoSuitableDevice)
}

fn create_image_views(
    device: &Device,
    images: &[vk::Image],
    format: vk::Format,
) -> VkResult<Vec<vk::ImageView>> {
    let mut views = Vec::with_capacity(images.len());
    for &img in images {
        let info = vk::ImageViewCreateInfo::default()
            .image(img)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .subresource_range(
                vk::ImageSubresourceRange::default()
                    .aspect_mask(vk::ImageAspectFlags::COLOR)
                    .base_mip_level(0)
                    .level_count(1)
                    .base_array_layer(0)
                    .layer_count(1),
            );
        match unsafe { device.create_image_view(&info, None) } {
            Ok(iv) => views.push(iv),
            Err(e) => {
                release_all(&mut views, |iv| unsafe { device.destroy_image_view(iv, None) });
                return Err(VkRenderError::Vk {
                    op: "vkCreateImageView",
                    result: e,
                });
            }
        }
    }
    Ok(views)
}

/// Single color attachment, cleared on load and handed to presentation.
fn create_render_pass(device: &Device, format: vk::Format) -> VkResult<vk::RenderPass> {
    let color_attach = vk::AttachmentDescription::default()
        .format(format)
        .samples(vk::SampleCountFlags::TYPE_1)
        .load_op(vk::AttachmentLoadOp::CLEAR)
        .store_op(vk::AttachmentStoreOp::STORE)
        .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
        .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
        .initial_layout(vk::ImageLayout::UNDEFINED)
        .final_layout(vk::ImageLayout::PRESENT_SRC_KHR);

    let color_ref = vk::AttachmentReference::default()
        .attachment(0)
        .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);

    let subpass = vk::SubpassDescription::default()
        .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
        .color_attachments(std::slice::from_ref(&color_ref));

    // Layout transition waits for the acquire semaphore stage.
    let dep = vk::SubpassDependency::default()
        .src_subpass(vk::SUBPASS_EXTERNAL)
        .dst_subpass(0)
        .src_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
        .dst_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
        .dst_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_WRITE);

    let rp = vk::RenderPassCreateInfo::default()
        .attachments(std::slice::from_ref(&color_attach))
        .subpasses(std::slice::from_ref(&subpass))
        .dependencies(std::slice::from_ref(&dep));

    unsafe { device.create_render_pass(&rp, None) }.vk("vkCreateRenderPass")
}

fn create_framebuffers(
    device: &Device,
    render_pass: vk::RenderPass,
    views: &[vk::ImageView],
    extent: vk::Extent2D,
) -> VkResult<Vec<vk::Framebuffer>> {
    let mut fbs = Vec::with_capacity(views.len());
    for &view in views {
        let attachments = [view];
        let fb_info = vk::FramebufferCreateInfo::default()
            .render_pass(render_pass)
            .attachments(&attachments)
            .width(extent.width)
            .height(extent.height)
            .layers(1);
        match unsafe { device.create_framebuffer(&fb_info, None) } {
            Ok(fb) => fbs.push(fb),
            Err(e) => {
                release_all(&mut fbs, |fb| unsafe { device.destroy_framebuffer(fb, None) });
                return Err(VkRenderError::Vk {
                    op: "vkCreateFramebuffer",
                    result: e,
                });
            }
        }
    }
    Ok(fbs)
}
