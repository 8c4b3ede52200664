use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::fatal;
use crate::frame::{Frame, FrameClock};
use crate::module::{Module, ModuleBuilder, ModuleRegistry, Resources};
use crate::phase::{PhaseGraph, StandardPhases};
use crate::platform::PlatformState;
use crate::sched::{Executor, TickReport};

/// Owns the shared store, both executors and the module registry.
///
/// Lifecycle: `new` -> `add_module`* -> `start` -> `tick`* -> `shutdown`.
/// Dropping an engine that was not shut down broadcasts cleanup first.
pub struct Engine {
    config: EngineConfig,
    resources: Resources,
    phases: StandardPhases,
    setup: Executor,
    frame: Executor,
    registry: ModuleRegistry,
    started: bool,
    shut_down: bool,
    skipped_ticks: u64,
    // First fatal build or setup error. Keeps the scheduler from starting.
    failure: Option<EngineError>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> EngineResult<Self> {
        let mut setup_graph = PhaseGraph::new();
        let mut frame_graph = PhaseGraph::new();
        let phases = StandardPhases::declare(&mut setup_graph, &mut frame_graph)?;

        Ok(Self {
            config,
            resources: Resources::new(),
            phases,
            setup: Executor::new("setup", setup_graph),
            frame: Executor::new("frame", frame_graph),
            registry: ModuleRegistry::new(),
            started: false,
            shut_down: false,
            skipped_ticks: 0,
            failure: None,
        })
    }

    #[inline]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[inline]
    pub fn phases(&self) -> &StandardPhases {
        &self.phases
    }

    #[inline]
    pub fn resources(&self) -> &Resources {
        &self.resources
    }

    #[inline]
    pub fn resources_mut(&mut self) -> &mut Resources {
        &mut self.resources
    }

    #[inline]
    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    #[inline]
    pub fn frame_executor(&self) -> &Executor {
        &self.frame
    }

    /// Only until `start`.
    #[inline]
    pub fn setup_graph_mut(&mut self) -> EngineResult<&mut PhaseGraph> {
        self.setup.graph_mut()
    }

    /// Only until `start`.
    #[inline]
    pub fn frame_graph_mut(&mut self) -> EngineResult<&mut PhaseGraph> {
        self.frame.graph_mut()
    }

    /// Clock bounded by this engine's `max_frame_dt`.
    #[inline]
    pub fn make_clock(&self) -> FrameClock {
        FrameClock::new(self.config.max_frame_dt)
    }

    #[inline]
    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Ticks cut short by a recoverable task error.
    #[inline]
    pub fn skipped_ticks(&self) -> u64 {
        self.skipped_ticks
    }

    /// Error that stopped the engine from starting, if any.
    #[inline]
    pub fn failure(&self) -> Option<&EngineError> {
        self.failure.as_ref()
    }

    /// Registers the module and lets it bind its tasks and cleanup callbacks.
    ///
    /// A failing build leaves nothing behind: its registration, tasks, phases and
    /// callbacks are undone. A fatal build error (a phase cycle) additionally
    /// keeps the engine from starting.
    pub fn add_module(&mut self, module: Box<dyn Module>) -> EngineResult<()> {
        if self.started {
            return Err(EngineError::InvalidState {
                op: "add_module",
                state: "started",
            });
        }

        let name = module.name();
        let handle = self.registry.register_module(name)?;
        let setup_mark = self.setup.mark();
        let frame_mark = self.frame.mark();

        let mut builder = ModuleBuilder::new(
            name,
            handle,
            &self.phases,
            &mut self.setup,
            &mut self.frame,
            &mut self.registry,
        );
        let Err(e) = module.build(&mut builder) else {
            return Ok(());
        };

        self.setup.rollback(setup_mark);
        self.frame.rollback(frame_mark);
        self.registry.unregister_last(handle);
        log::warn!("module '{name}' failed to build, registration undone: {e}");

        if e.is_fatal() {
            return Err(self.fail(e));
        }
        Err(e)
    }

    /// Freezes both phase orders and runs the setup chain once.
    ///
    /// A cycle or any fatal setup error is escalated per `abort_on_fatal`.
    pub fn start(&mut self) -> EngineResult<()> {
        if let Some(e) = &self.failure {
            return Err(e.clone());
        }
        if self.started {
            return Err(EngineError::InvalidState {
                op: "start",
                state: "started",
            });
        }

        let setup_order = self.setup.finalize().map(|_| ());
        setup_order.map_err(|e| self.fail(e))?;
        let frame_order = self.frame.finalize().map(|_| ());
        frame_order.map_err(|e| self.fail(e))?;

        log::info!(
            "engine: starting {} modules ({} setup tasks, {} frame tasks)",
            self.registry.len(),
            self.setup.task_count(),
            self.frame.task_count()
        );

        match self.setup.tick(&mut self.resources, Frame::setup()) {
            Ok(_) => {}
            Err(EngineError::ExitRequested) => {
                self.resources.get_or_create::<PlatformState>().request_quit();
            }
            // Setup does not rerun, so even a recoverable error leaves it half done.
            Err(e) => return Err(self.fail(e)),
        }

        self.started = true;
        Ok(())
    }

    /// Runs the frame chain once.
    ///
    /// A recoverable task error skips the later phases of this tick and is not returned.
    /// A fatal one is escalated per `abort_on_fatal`.
    pub fn tick(&mut self, frame: Frame) -> EngineResult<TickReport> {
        if let Some(e) = &self.failure {
            return Err(e.clone());
        }
        if !self.started || self.shut_down {
            return Err(EngineError::InvalidState {
                op: "tick",
                state: if self.shut_down { "shut down" } else { "not started" },
            });
        }

        match self.frame.tick(&mut self.resources, frame) {
            Ok(report) => Ok(report),
            Err(EngineError::ExitRequested) => {
                self.resources.get_or_create::<PlatformState>().request_quit();
                Ok(TickReport::default())
            }
            Err(e) if e.is_fatal() => Err(self.escalate(e)),
            Err(_) => {
                // Already logged by the executor.
                self.skipped_ticks += 1;
                Ok(TickReport::default())
            }
        }
    }

    #[inline]
    pub fn should_quit(&self) -> bool {
        self.resources
            .try_get::<PlatformState>()
            .is_some_and(|p| p.should_quit)
    }

    /// Outer loop: `pump` feeds platform input, then one tick runs.
    /// Stops once the should-quit flag is observed, then shuts down.
    ///
    /// Returns the number of ticks run.
    pub fn run<P>(&mut self, clock: &mut FrameClock, mut pump: P) -> EngineResult<u64>
    where
        P: FnMut(&mut Resources) -> EngineResult<()>,
    {
        if !self.started {
            self.start()?;
        }

        let mut ticks = 0u64;
        while !self.should_quit() {
            pump(&mut self.resources)?;
            if self.should_quit() {
                break;
            }
            self.tick(clock.next())?;
            ticks += 1;
        }

        log::info!("engine: quit requested after {ticks} ticks");
        self.shutdown();
        Ok(ticks)
    }

    /// Broadcasts cleanup. Returns the number of modules cleaned by this call.
    pub fn shutdown(&mut self) -> usize {
        let cleaned = self.registry.broadcast_cleanup(&mut self.resources);
        self.shut_down = true;
        cleaned
    }

    #[inline]
    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    /// Records the first start-blocking error, then escalates it.
    fn fail(&mut self, err: EngineError) -> EngineError {
        if self.failure.is_none() {
            self.failure = Some(err.clone());
        }
        self.escalate(err)
    }

    fn escalate(&self, err: EngineError) -> EngineError {
        if err.is_fatal() && self.config.abort_on_fatal {
            fatal::abort_with(&err);
        }
        err
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if !self.shut_down {
            self.shutdown();
        }
        self.resources.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::ModuleCtx;

    #[derive(Default)]
    struct Counter(u32);

    struct Ticker;

    impl Module for Ticker {
        fn name(&self) -> &'static str {
            "ticker"
        }

        fn build(self: Box<Self>, b: &mut ModuleBuilder<'_>) -> EngineResult<()> {
            let p = b.phases().frame.logic_update;
            b.frame_task(p, |ctx: &mut ModuleCtx<'_>| {
                let c = ctx.resources_mut().get_or_create::<Counter>();
                c.0 += 1;
                if c.0 == 3 {
                    ctx.request_exit();
                }
                Ok(())
            })?;
            Ok(())
        }
    }

    #[test]
    fn tick_before_start_is_invalid() {
        let mut e = Engine::new(EngineConfig::non_aborting()).unwrap();
        assert!(matches!(
            e.tick(Frame::setup()),
            Err(EngineError::InvalidState { op: "tick", .. })
        ));
    }

    #[test]
    fn run_stops_on_quit_flag_and_cleans_up() {
        let mut e = Engine::new(EngineConfig::non_aborting()).unwrap();
        e.add_module(Box::new(Ticker)).unwrap();

        let mut clock = e.make_clock();
        let ticks = e.run(&mut clock, |_| Ok(())).unwrap();

        assert_eq!(ticks, 3);
        assert!(e.is_shut_down());
        assert!(e.registry().all_cleaned());
        assert_eq!(e.shutdown(), 0);
    }

    #[test]
    fn modules_cannot_join_after_start() {
        let mut e = Engine::new(EngineConfig::non_aborting()).unwrap();
        e.start().unwrap();
        assert!(e.add_module(Box::new(Ticker)).is_err());
        assert!(e.frame_graph_mut().is_err());
    }
}
