use ash::vk::Handle;

use crate::context::GpuContext;

/// Destroys `handle` unless it is already null, then nulls it.
///
/// Returns whether `destroy` ran. Calling it again on the same slot is a no-op,
/// which is what makes repeated or partial teardown safe.
pub(crate) fn release<H, F>(handle: &mut H, destroy: F) -> bool
where
    H: Handle + Copy,
    F: FnOnce(H),
{
    if handle.as_raw() == 0 {
        return false;
    }
    destroy(*handle);
    *handle = H::from_raw(0);
    true
}

/// `release` for every element, then empties the list.
pub(crate) fn release_all<H, F>(handles: &mut Vec<H>, mut destroy: F) -> usize
where
    H: Handle + Copy,
    F: FnMut(H),
{
    let mut released = 0;
    for h in handles.iter_mut() {
        if release(h, &mut destroy) {
            released += 1;
        }
    }
    handles.clear();
    released
}

impl GpuContext {
    /// Releases every GPU object in reverse creation order.
    ///
    /// Waits for device idle first. Safe to call any number of times and on a
    /// partially built context; returns how many objects this call destroyed.
    pub fn destroy_all(&mut self) -> usize {
        let mut n = 0usize;

        if let Some(device) = self.device.clone() {
            if let Err(e) = unsafe { device.device_wait_idle() } {
                log::warn!("vulkan: device_wait_idle before teardown failed: {e}");
            }

            if let Some(mut frame) = self.frame.take() {
                n += frame.backend_mut().release();
            }

            // Frees the command buffer with it.
            n += release(&mut self.command_pool, |p| unsafe { device.destroy_command_pool(p, None) })
                as usize;
            self.command_buffer = ash::vk::CommandBuffer::null();

            n += self.release_swapchain(&device);
            n += release(&mut self.render_pass, |rp| unsafe { device.destroy_render_pass(rp, None) })
                as usize;
        }

        self.swapchain_loader = None;
        if let Some(device) = self.device.take() {
            unsafe { device.destroy_device(None) };
            n += 1;
        }

        if let Some(loader) = self.surface_loader.as_ref() {
            n += release(&mut self.surface, |s| unsafe { loader.destroy_surface(s, None) }) as usize;
        }
        self.surface_loader = None;

        if let Some(instance) = self.instance.take() {
            unsafe { instance.destroy_instance(None) };
            n += 1;
        }
        self.entry = None;

        if n > 0 {
            log::info!("vulkan: released {n} objects");
        }
        n
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk;

    #[test]
    fn release_runs_once_per_handle() {
        let mut fence = vk::Fence::from_raw(7);
        let mut calls = Vec::new();

        assert!(release(&mut fence, |f| calls.push(f.as_raw())));
        assert!(!release(&mut fence, |f| calls.push(f.as_raw())));
        assert_eq!(calls, [7]);
        assert_eq!(fence, vk::Fence::null());
    }

    #[test]
    fn release_all_skips_null_entries() {
        let mut views = vec![
            vk::ImageView::from_raw(1),
            vk::ImageView::null(),
            vk::ImageView::from_raw(3),
        ];
        let mut destroyed = 0;

        assert_eq!(release_all(&mut views, |_| destroyed += 1), 2);
        assert_eq!(destroyed, 2);
        assert!(views.is_empty());
        assert_eq!(release_all(&mut views, |_| destroyed += 1), 0);
    }

    #[test]
    fn destroying_an_unbuilt_context_is_a_no_op() {
        let mut gpu = GpuContext::default();
        assert_eq!(gpu.destroy_all(), 0);
        assert_eq!(gpu.destroy_all(), 0);
        assert!(gpu.device().is_none());
    }
}
