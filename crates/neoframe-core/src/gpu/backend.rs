use crate::error::EngineResult;

/// Result of asking the presentation engine for the next image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// Image acquired; the image-available semaphore will be signaled.
    /// `suboptimal` still allows rendering but the surface should be recreated.
    Image { index: u32, suboptimal: bool },
    /// Surface changed; nothing was acquired and no semaphore will be signaled.
    OutOfDate,
}

/// Outcome of a present call that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpuStatus {
    Ok,
    OutOfDate,
}

/// GPU primitives behind one frame slot: a fence, an image-available and a
/// render-finished semaphore, and one reusable command buffer.
///
/// Every `Err` returned here is treated as fatal by the synchronizer; an
/// out-of-date surface must be reported through the `Ok` outcomes instead.
pub trait FrameBackend {
    /// Blocks until the slot's fence is signaled. No timeout.
    fn wait_for_fence(&mut self) -> EngineResult<()>;

    fn reset_fence(&mut self) -> EngineResult<()>;

    /// Signals image-available when the image is ready.
    fn acquire_next_image(&mut self) -> EngineResult<AcquireOutcome>;

    /// Resets and begins the command buffer for `image_index`.
    fn begin_commands(&mut self, image_index: u32) -> EngineResult<()>;

    fn end_commands(&mut self) -> EngineResult<()>;

    /// Waits on image-available, signals render-finished and the fence.
    fn submit(&mut self) -> EngineResult<()>;

    /// Waits on render-finished.
    fn present(&mut self, image_index: u32) -> EngineResult<GpuStatus>;

    /// Blocks until the device has no pending work.
    fn wait_idle(&mut self) -> EngineResult<()>;
}
