use crate::frame::Frame;
use crate::module::Resources;
use crate::platform::PlatformState;

/// Context passed to every task invocation.
///
/// This prevents tasks from taking `&mut Engine` (god object problem).
pub struct ModuleCtx<'a> {
    resources: &'a mut Resources,
    frame: Frame,
    module: &'a str,
}

impl<'a> ModuleCtx<'a> {
    #[inline]
    pub fn new(resources: &'a mut Resources, frame: Frame, module: &'a str) -> Self {
        Self {
            resources,
            frame,
            module,
        }
    }

    #[inline]
    pub fn frame(&self) -> Frame {
        self.frame
    }

    /// Seconds since the previous tick.
    #[inline]
    pub fn dt(&self) -> f32 {
        self.frame.dt
    }

    /// Name of the module that registered the running task.
    #[inline]
    pub fn module(&self) -> &str {
        self.module
    }

    #[inline]
    pub fn resources(&self) -> &Resources {
        self.resources
    }

    #[inline]
    pub fn resources_mut(&mut self) -> &mut Resources {
        self.resources
    }

    /// Sets the shared should-quit flag. Takes effect at the next tick boundary.
    #[inline]
    pub fn request_exit(&mut self) {
        self.resources.get_or_create::<PlatformState>().request_quit();
    }

    #[inline]
    pub fn is_exit_requested(&self) -> bool {
        self.resources
            .try_get::<PlatformState>()
            .is_some_and(|p| p.should_quit)
    }
}
