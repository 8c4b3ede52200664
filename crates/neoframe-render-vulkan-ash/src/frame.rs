use neoframe_core::{EngineResult, SyncState};

use crate::context::GpuContext;

/// Window size as seen by the platform at the start of a tick.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SurfaceSize {
    pub width: u32,
    pub height: u32,
    pub resized: bool,
}

impl GpuContext {
    /// Resize step, fence wait and image acquire.
    ///
    /// Returns `false` when this tick renders nothing (minimized window or an
    /// out-of-date acquire); later frame tasks then find no image and skip.
    pub(crate) fn begin_render(&mut self, surface: SurfaceSize) -> EngineResult<bool> {
        if surface.resized {
            self.resize_pending = true;
        }

        let Some(frame) = self.frame.as_mut() else {
            return Ok(false);
        };
        if frame.state() != SyncState::Idle {
            log::warn!(
                "vulkan: previous frame interrupted while {}, completing it",
                frame.state().as_str()
            );
            frame.finish_pending()?;
        }
        let out_of_date = frame.is_out_of_date();

        if surface.width == 0 || surface.height == 0 {
            return Ok(false);
        }

        if self.resize_pending || out_of_date {
            self.recreate_swapchain(surface.width, surface.height)?;
            self.resize_pending = false;
            if let Some(frame) = self.frame.as_mut() {
                frame.clear_out_of_date();
            }
        }

        let Some(frame) = self.frame.as_mut() else {
            return Ok(false);
        };
        frame.begin_frame()?;
        Ok(frame.acquire_image()?.is_some())
    }

    pub(crate) fn record(&mut self) -> EngineResult<()> {
        match self.frame.as_mut() {
            Some(frame) if frame.has_image() && frame.state() == SyncState::Acquiring => {
                frame.record()?;
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Opens the render pass, clearing to `clear_color`.
    pub(crate) fn clear_pass(&mut self) {
        let Some(frame) = self.frame.as_mut() else {
            return;
        };
        if frame.state() != SyncState::Recording {
            return;
        }
        let Some(fb) = frame
            .slot()
            .image_index
            .and_then(|i| self.swapchain.framebuffers.get(i as usize).copied())
        else {
            return;
        };

        frame
            .backend_mut()
            .begin_clear_pass(self.render_pass, fb, self.swapchain.extent, self.clear_color);
    }

    pub(crate) fn submit(&mut self) -> EngineResult<()> {
        match self.frame.as_mut() {
            Some(frame) if frame.state() == SyncState::Recording => frame.submit(),
            _ => Ok(()),
        }
    }

    pub(crate) fn present(&mut self) -> EngineResult<()> {
        match self.frame.as_mut() {
            Some(frame) if frame.state() == SyncState::Submitted => frame.present(),
            _ => Ok(()),
        }
    }
}
