use crate::error::{EngineError, EngineResult};
use crate::module::{ModuleCtx, ModuleHandle, ModuleRegistry, Resources};
use crate::phase::{PhaseId, StandardPhases};
use crate::sched::{Executor, TaskFn, TaskId, TaskSwitch};

/// Registration surface handed to [`crate::Module::build`].
///
/// Everything a module contributes goes through here: setup tasks, frame
/// tasks and its cleanup callbacks. Tasks are tagged with the module name
/// for error attribution.
pub struct ModuleBuilder<'a> {
    module: &'static str,
    handle: ModuleHandle,
    phases: &'a StandardPhases,
    setup: &'a mut Executor,
    frame: &'a mut Executor,
    registry: &'a mut ModuleRegistry,
}

impl<'a> ModuleBuilder<'a> {
    pub(crate) fn new(
        module: &'static str,
        handle: ModuleHandle,
        phases: &'a StandardPhases,
        setup: &'a mut Executor,
        frame: &'a mut Executor,
        registry: &'a mut ModuleRegistry,
    ) -> Self {
        Self {
            module,
            handle,
            phases,
            setup,
            frame,
            registry,
        }
    }

    #[inline]
    pub fn module(&self) -> &'static str {
        self.module
    }

    #[inline]
    pub fn handle(&self) -> ModuleHandle {
        self.handle
    }

    #[inline]
    pub fn phases(&self) -> &StandardPhases {
        self.phases
    }

    /// Runs once, during `Engine::start`, in setup phase order.
    pub fn setup_task<F>(&mut self, phase: PhaseId, f: F) -> EngineResult<TaskId>
    where
        F: FnMut(&mut ModuleCtx<'_>) -> EngineResult<()> + 'static,
    {
        self.setup.register_task(phase, self.module, Box::new(f), true)
    }

    /// Runs every tick. The returned switch gates it.
    pub fn frame_task<F>(&mut self, phase: PhaseId, f: F) -> EngineResult<TaskSwitch>
    where
        F: FnMut(&mut ModuleCtx<'_>) -> EngineResult<()> + 'static,
    {
        self.add_frame_task(phase, Box::new(f), true)
    }

    /// Same as [`Self::frame_task`] but starts disabled.
    pub fn frame_task_disabled<F>(&mut self, phase: PhaseId, f: F) -> EngineResult<TaskSwitch>
    where
        F: FnMut(&mut ModuleCtx<'_>) -> EngineResult<()> + 'static,
    {
        self.add_frame_task(phase, Box::new(f), false)
    }

    /// Declares a frame phase ordered after every phase in `after` and before
    /// every phase in `before`. Only possible before the engine starts.
    pub fn declare_frame_phase(
        &mut self,
        name: &str,
        after: &[PhaseId],
        before: &[PhaseId],
    ) -> EngineResult<PhaseId> {
        let graph = self.frame.graph_mut()?;
        let phase = graph.declare_phase(name);
        for &dep in after {
            graph.add_dependency(phase, dep)?;
        }
        for &next in before {
            graph.add_dependency(next, phase)?;
        }
        Ok(phase)
    }

    /// Subscribes to the cleanup broadcast. Runs at most once per run.
    pub fn on_cleanup<F>(&mut self, f: F) -> EngineResult<()>
    where
        F: FnMut(&mut Resources) + 'static,
    {
        self.registry.subscribe_cleanup(self.handle, Box::new(f))
    }

    fn add_frame_task(
        &mut self,
        phase: PhaseId,
        run: TaskFn,
        enabled: bool,
    ) -> EngineResult<TaskSwitch> {
        let id = self.frame.register_task(phase, self.module, run, enabled)?;
        self.frame
            .switch(id)
            .ok_or_else(|| EngineError::other(format!("{}: task switch missing", self.module)))
    }
}
