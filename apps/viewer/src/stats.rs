use neoframe_core::{EngineResult, Module, ModuleBuilder, ModuleCtx, Resources};
use neoframe_render_vulkan_ash::GpuContext;

/// Frame-rate sampler.
#[derive(Debug, Default)]
pub struct FrameStats {
    pub frames: u64,
    pub last_fps: Option<f32>,
    window_frames: u32,
    window_time: f32,
}

impl FrameStats {
    /// Folds one tick in; returns the rate once `interval` seconds have accumulated.
    pub fn sample(&mut self, dt: f32, interval: f32) -> Option<f32> {
        self.frames += 1;
        self.window_frames += 1;
        self.window_time += dt;

        if self.window_time < interval || self.window_time <= 0.0 {
            return None;
        }

        let fps = self.window_frames as f32 / self.window_time;
        self.window_frames = 0;
        self.window_time = 0.0;
        self.last_fps = Some(fps);
        Some(fps)
    }
}

/// Logs frame rate and presented frames from the GUI phases.
pub struct StatsModule {
    interval: f32,
}

impl StatsModule {
    pub fn new(interval_secs: f32) -> Self {
        Self {
            interval: interval_secs.max(0.1),
        }
    }
}

impl Default for StatsModule {
    fn default() -> Self {
        Self::new(2.0)
    }
}

/// Rate computed in update-gui, reported in end-gui.
#[derive(Debug, Default)]
struct PendingReport(Option<f32>);

impl Module for StatsModule {
    fn name(&self) -> &'static str {
        "stats"
    }

    fn build(self: Box<Self>, b: &mut ModuleBuilder<'_>) -> EngineResult<()> {
        let interval = self.interval;
        let phases = b.phases().frame;

        b.frame_task(phases.update_gui, move |ctx: &mut ModuleCtx<'_>| {
            let dt = ctx.dt();
            let fps = ctx.resources_mut().get_or_create::<FrameStats>().sample(dt, interval);
            ctx.resources_mut().get_or_create::<PendingReport>().0 = fps;
            Ok(())
        })?;

        b.frame_task(phases.end_gui, |ctx: &mut ModuleCtx<'_>| {
            let Some(fps) = ctx.resources_mut().get_or_create::<PendingReport>().0.take() else {
                return Ok(());
            };

            let frame = ctx.frame().index;
            match ctx.resources().try_get::<GpuContext>() {
                Some(gpu) => log::info!(
                    "stats: frame {frame} {fps:.1} fps, presented {} skipped {} resizes {}",
                    gpu.frames_presented(),
                    gpu.frames_skipped(),
                    gpu.resizes()
                ),
                None => log::info!("stats: frame {frame} {fps:.1} fps"),
            }
            Ok(())
        })?;

        b.on_cleanup(|res: &mut Resources| {
            if let Some(s) = res.try_get::<FrameStats>() {
                log::info!("stats: {} frames total", s.frames);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use neoframe_core::{Engine, EngineConfig, Frame};

    #[test]
    fn rate_reported_once_per_interval() {
        let mut s = FrameStats::default();
        assert_eq!(s.sample(0.25, 1.0), None);
        assert_eq!(s.sample(0.25, 1.0), None);
        assert_eq!(s.sample(0.25, 1.0), None);
        assert_eq!(s.sample(0.25, 1.0), Some(4.0));
        assert_eq!(s.sample(0.25, 1.0), None);
        assert_eq!(s.frames, 5);
        assert_eq!(s.last_fps, Some(4.0));
    }

    #[test]
    fn zero_dt_never_divides() {
        let mut s = FrameStats::default();
        for _ in 0..10 {
            assert_eq!(s.sample(0.0, 0.0), None);
        }
    }

    #[test]
    fn counts_frames_without_gpu() {
        let mut e = Engine::new(EngineConfig::non_aborting()).unwrap();
        e.add_module(Box::new(StatsModule::new(0.1))).unwrap();
        e.start().unwrap();

        for i in 1..=4 {
            e.tick(Frame::new(i, 0.05)).unwrap();
        }

        let s = e.resources().try_get::<FrameStats>().unwrap();
        assert_eq!(s.frames, 4);
        assert!(s.last_fps.is_some());
        assert!(e.resources().try_get::<PendingReport>().is_some_and(|p| p.0.is_none()));
        assert_eq!(e.shutdown(), 1);
    }
}
