use crate::error::{EngineError, EngineResult};
use crate::gpu::{AcquireOutcome, FrameBackend, GpuStatus};

/// Synchronizer states, in the order one frame walks through them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    WaitingOnFence,
    Acquiring,
    Recording,
    Submitted,
    Presenting,
}

impl SyncState {
    pub fn as_str(self) -> &'static str {
        match self {
            SyncState::Idle => "idle",
            SyncState::WaitingOnFence => "waiting on fence",
            SyncState::Acquiring => "acquiring",
            SyncState::Recording => "recording",
            SyncState::Submitted => "submitted",
            SyncState::Presenting => "presenting",
        }
    }
}

/// CPU-side state of the frame in flight. The GPU primitives live in the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameSlot {
    /// Swapchain image acquired for the current frame.
    pub image_index: Option<u32>,
    /// Surface needs to be recreated before the next acquire.
    pub out_of_date: bool,
    /// The fence is signaled or will be signaled by submitted work, so waiting
    /// on it cannot deadlock. Cleared by reset, set again by submit.
    pub fence_armed: bool,
    pub frames_presented: u64,
    pub frames_skipped: u64,
}

impl Default for FrameSlot {
    #[inline]
    fn default() -> Self {
        // Fences are created signaled.
        Self {
            image_index: None,
            out_of_date: false,
            fence_armed: true,
            frames_presented: 0,
            frames_skipped: 0,
        }
    }
}

/// Single-slot frame state machine:
/// `Idle -> WaitingOnFence -> Acquiring -> Recording -> Submitted -> Presenting -> Idle`.
///
/// One fence bounds the CPU to one frame ahead of the GPU. Only one recording can
/// be open at a time because the command buffer is reused every frame.
pub struct FrameSynchronizer<B: FrameBackend> {
    backend: B,
    state: SyncState,
    slot: FrameSlot,
}

impl<B: FrameBackend> FrameSynchronizer<B> {
    #[inline]
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            state: SyncState::Idle,
            slot: FrameSlot::default(),
        }
    }

    #[inline]
    pub fn state(&self) -> SyncState {
        self.state
    }

    #[inline]
    pub fn slot(&self) -> &FrameSlot {
        &self.slot
    }

    #[inline]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    #[inline]
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    #[inline]
    pub fn is_out_of_date(&self) -> bool {
        self.slot.out_of_date
    }

    /// Called by the resize step once the surface has been recreated.
    #[inline]
    pub fn clear_out_of_date(&mut self) {
        self.slot.out_of_date = false;
    }

    /// True between a successful acquire and present.
    #[inline]
    pub fn has_image(&self) -> bool {
        self.slot.image_index.is_some()
    }

    /// Waits for the previous use of the fence, then resets it.
    ///
    /// This is the only blocking call of the frame loop.
    pub fn begin_frame(&mut self) -> EngineResult<()> {
        self.expect(SyncState::Idle, "begin_frame")?;

        self.state = SyncState::WaitingOnFence;
        if self.slot.fence_armed {
            self.backend.wait_for_fence()?;
        } else {
            log::trace!("frame sync: fence has no pending signal, not waiting");
        }

        self.backend.reset_fence()?;
        self.slot.fence_armed = false;
        self.slot.image_index = None;
        self.state = SyncState::Acquiring;
        Ok(())
    }

    /// Acquires the next image.
    ///
    /// An out-of-date surface sets the resize flag, skips the frame and returns
    /// `Ok(None)`; later render tasks see no image and do nothing.
    pub fn acquire_image(&mut self) -> EngineResult<Option<u32>> {
        self.expect(SyncState::Acquiring, "acquire_image")?;
        if self.slot.image_index.is_some() {
            return Err(EngineError::InvalidState {
                op: "acquire_image",
                state: "image already acquired",
            });
        }

        match self.backend.acquire_next_image()? {
            AcquireOutcome::Image { index, suboptimal } => {
                if suboptimal {
                    log::debug!("frame sync: swapchain suboptimal, resize scheduled");
                    self.slot.out_of_date = true;
                }
                self.slot.image_index = Some(index);
                Ok(Some(index))
            }
            AcquireOutcome::OutOfDate => {
                log::warn!("frame sync: surface out of date on acquire, frame skipped");
                self.slot.out_of_date = true;
                self.skip_frame();
                Ok(None)
            }
        }
    }

    /// Resets and begins the command buffer. Returns the image being recorded.
    pub fn record(&mut self) -> EngineResult<u32> {
        self.expect(SyncState::Acquiring, "record")?;
        let Some(index) = self.slot.image_index else {
            return Err(EngineError::InvalidState {
                op: "record",
                state: "acquiring without an image",
            });
        };

        self.backend.begin_commands(index)?;
        self.state = SyncState::Recording;
        Ok(index)
    }

    /// Ends recording and submits; the fence is armed from here on.
    pub fn submit(&mut self) -> EngineResult<()> {
        self.expect(SyncState::Recording, "submit")?;

        self.backend.end_commands()?;
        self.backend.submit()?;
        self.slot.fence_armed = true;
        self.state = SyncState::Submitted;
        Ok(())
    }

    /// Presents the submitted image. An out-of-date surface only sets the flag.
    pub fn present(&mut self) -> EngineResult<()> {
        self.expect(SyncState::Submitted, "present")?;
        let Some(index) = self.slot.image_index else {
            return Err(EngineError::InvalidState {
                op: "present",
                state: "submitted without an image",
            });
        };

        self.state = SyncState::Presenting;
        if self.backend.present(index)? == GpuStatus::OutOfDate {
            log::warn!("frame sync: surface out of date on present, resize scheduled");
            self.slot.out_of_date = true;
        }

        self.slot.image_index = None;
        self.slot.frames_presented += 1;
        self.state = SyncState::Idle;
        Ok(())
    }

    /// Drives a frame interrupted mid-way (e.g. by a failed task) back to `Idle`.
    ///
    /// An acquired image is always submitted and presented, even empty, so the
    /// semaphores stay balanced.
    pub fn finish_pending(&mut self) -> EngineResult<()> {
        loop {
            match self.state {
                SyncState::Idle => return Ok(()),
                SyncState::WaitingOnFence | SyncState::Presenting => {
                    self.slot.image_index = None;
                    self.state = SyncState::Idle;
                }
                SyncState::Acquiring => {
                    if self.has_image() {
                        self.record()?;
                    } else {
                        self.skip_frame();
                    }
                }
                SyncState::Recording => self.submit()?,
                SyncState::Submitted => self.present()?,
            }
        }
    }

    /// Blocks until the GPU is idle. Required before releasing any GPU object.
    #[inline]
    pub fn wait_idle(&mut self) -> EngineResult<()> {
        self.backend.wait_idle()
    }

    fn skip_frame(&mut self) {
        self.slot.image_index = None;
        self.slot.frames_skipped += 1;
        self.state = SyncState::Idle;
    }

    #[inline]
    fn expect(&self, expected: SyncState, op: &'static str) -> EngineResult<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(EngineError::InvalidState {
                op,
                state: self.state.as_str(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::VecDeque;

    /// Simulated GPU: submitted work completes when the CPU waits on the fence.
    #[derive(Default)]
    struct MockBackend {
        events: Vec<String>,
        fence_signaled: bool,
        gpu_busy: bool,
        acquire_script: VecDeque<AcquireOutcome>,
        present_script: VecDeque<GpuStatus>,
        fail_submit: bool,
    }

    impl MockBackend {
        fn new() -> Self {
            Self {
                fence_signaled: true,
                ..Self::default()
            }
        }

        fn take_events(&mut self) -> Vec<String> {
            std::mem::take(&mut self.events)
        }
    }

    impl FrameBackend for MockBackend {
        fn wait_for_fence(&mut self) -> EngineResult<()> {
            assert!(
                self.fence_signaled || self.gpu_busy,
                "wait on a fence nothing will signal"
            );
            if self.gpu_busy {
                self.gpu_busy = false;
                self.fence_signaled = true;
            }
            self.events.push("wait".into());
            Ok(())
        }

        fn reset_fence(&mut self) -> EngineResult<()> {
            assert!(!self.gpu_busy, "fence reset while GPU work is pending");
            self.fence_signaled = false;
            self.events.push("reset".into());
            Ok(())
        }

        fn acquire_next_image(&mut self) -> EngineResult<AcquireOutcome> {
            let out = self
                .acquire_script
                .pop_front()
                .unwrap_or(AcquireOutcome::Image { index: 0, suboptimal: false });
            self.events.push("acquire".into());
            Ok(out)
        }

        fn begin_commands(&mut self, image_index: u32) -> EngineResult<()> {
            self.events.push(format!("begin#{image_index}"));
            Ok(())
        }

        fn end_commands(&mut self) -> EngineResult<()> {
            self.events.push("end".into());
            Ok(())
        }

        fn submit(&mut self) -> EngineResult<()> {
            if self.fail_submit {
                return Err(EngineError::fatal_gpu("vkQueueSubmit", "ERROR_DEVICE_LOST"));
            }
            self.gpu_busy = true;
            self.events.push("submit".into());
            Ok(())
        }

        fn present(&mut self, image_index: u32) -> EngineResult<GpuStatus> {
            self.events.push(format!("present#{image_index}"));
            Ok(self.present_script.pop_front().unwrap_or(GpuStatus::Ok))
        }

        fn wait_idle(&mut self) -> EngineResult<()> {
            self.gpu_busy = false;
            self.fence_signaled = true;
            self.events.push("idle".into());
            Ok(())
        }
    }

    fn run_frame(sync: &mut FrameSynchronizer<MockBackend>) -> EngineResult<()> {
        sync.begin_frame()?;
        if sync.acquire_image()?.is_some() {
            sync.record()?;
            sync.submit()?;
            sync.present()?;
        }
        Ok(())
    }

    #[test]
    fn one_frame_walks_every_state_in_order() {
        let mut sync = FrameSynchronizer::new(MockBackend::new());
        assert_eq!(sync.state(), SyncState::Idle);

        sync.begin_frame().unwrap();
        assert_eq!(sync.state(), SyncState::Acquiring);
        assert_eq!(sync.acquire_image().unwrap(), Some(0));
        assert_eq!(sync.record().unwrap(), 0);
        assert_eq!(sync.state(), SyncState::Recording);
        sync.submit().unwrap();
        assert_eq!(sync.state(), SyncState::Submitted);
        sync.present().unwrap();
        assert_eq!(sync.state(), SyncState::Idle);

        assert_eq!(
            sync.backend_mut().take_events(),
            ["wait", "reset", "acquire", "begin#0", "end", "submit", "present#0"]
        );
        assert_eq!(sync.slot().frames_presented, 1);
    }

    #[test]
    fn begin_frame_returns_only_after_prior_fence_signaled() {
        let mut sync = FrameSynchronizer::new(MockBackend::new());
        run_frame(&mut sync).unwrap();
        assert!(sync.backend().gpu_busy);
        sync.backend_mut().take_events();

        sync.begin_frame().unwrap();
        assert!(!sync.backend().gpu_busy);
        assert_eq!(sync.backend_mut().take_events(), ["wait", "reset"]);
    }

    #[test]
    fn out_of_date_acquire_sets_flag_and_skips() {
        let mut backend = MockBackend::new();
        backend.acquire_script.push_back(AcquireOutcome::OutOfDate);
        let mut sync = FrameSynchronizer::new(backend);

        sync.begin_frame().unwrap();
        assert_eq!(sync.acquire_image().unwrap(), None);
        assert!(sync.is_out_of_date());
        assert_eq!(sync.state(), SyncState::Idle);
        assert_eq!(sync.slot().frames_skipped, 1);

        // Nothing was submitted, so the next frame must not wait on the reset fence.
        sync.backend_mut().take_events();
        sync.clear_out_of_date();
        run_frame(&mut sync).unwrap();
        assert_eq!(sync.backend_mut().take_events()[0], "reset");
        assert!(!sync.is_out_of_date());
    }

    #[test]
    fn render_tasks_after_skipped_acquire_see_invalid_state() {
        let mut backend = MockBackend::new();
        backend.acquire_script.push_back(AcquireOutcome::OutOfDate);
        let mut sync = FrameSynchronizer::new(backend);

        sync.begin_frame().unwrap();
        sync.acquire_image().unwrap();
        assert!(!sync.has_image());
        assert!(matches!(sync.record(), Err(EngineError::InvalidState { op: "record", .. })));
    }

    #[test]
    fn suboptimal_acquire_renders_and_flags() {
        let mut backend = MockBackend::new();
        backend
            .acquire_script
            .push_back(AcquireOutcome::Image { index: 2, suboptimal: true });
        let mut sync = FrameSynchronizer::new(backend);

        run_frame(&mut sync).unwrap();
        assert!(sync.is_out_of_date());
        assert_eq!(sync.slot().frames_presented, 1);
    }

    #[test]
    fn out_of_date_present_sets_flag_without_error() {
        let mut backend = MockBackend::new();
        backend.present_script.push_back(GpuStatus::OutOfDate);
        let mut sync = FrameSynchronizer::new(backend);

        run_frame(&mut sync).unwrap();
        assert!(sync.is_out_of_date());
        assert_eq!(sync.state(), SyncState::Idle);
    }

    #[test]
    fn second_record_is_invalid() {
        let mut sync = FrameSynchronizer::new(MockBackend::new());
        sync.begin_frame().unwrap();
        sync.acquire_image().unwrap();
        sync.record().unwrap();

        let err = sync.record().unwrap_err();
        assert!(matches!(
            err,
            EngineError::InvalidState { op: "record", state: "recording" }
        ));
        assert!(err.is_fatal());
        assert_eq!(sync.state(), SyncState::Recording);
    }

    #[test]
    fn begin_frame_mid_frame_is_invalid() {
        let mut sync = FrameSynchronizer::new(MockBackend::new());
        sync.begin_frame().unwrap();
        assert!(matches!(
            sync.begin_frame(),
            Err(EngineError::InvalidState { op: "begin_frame", state: "acquiring" })
        ));
        assert!(sync.present().is_err());
    }

    #[test]
    fn finish_pending_balances_an_interrupted_frame() {
        let mut sync = FrameSynchronizer::new(MockBackend::new());
        sync.begin_frame().unwrap();
        sync.acquire_image().unwrap();
        sync.backend_mut().take_events();

        sync.finish_pending().unwrap();
        assert_eq!(sync.state(), SyncState::Idle);
        assert_eq!(
            sync.backend_mut().take_events(),
            ["begin#0", "end", "submit", "present#0"]
        );

        run_frame(&mut sync).unwrap();
        assert_eq!(sync.slot().frames_presented, 2);
    }

    #[test]
    fn backend_failure_is_fatal() {
        let mut backend = MockBackend::new();
        backend.fail_submit = true;
        let mut sync = FrameSynchronizer::new(backend);

        let err = run_frame(&mut sync).unwrap_err();
        assert!(matches!(err, EngineError::FatalGpu { op: "vkQueueSubmit", .. }));
        assert!(err.is_fatal());
    }
}
