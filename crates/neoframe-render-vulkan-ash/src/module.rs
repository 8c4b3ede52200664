use neoframe_core::{
    EngineError, EngineResult, Module, ModuleBuilder, ModuleCtx, PlatformState, Resources,
    StartupConfig,
};
use neoframe_platform_winit::WinitWindow;

use crate::context::GpuContext;
use crate::error::VkResult;
use crate::frame::SurfaceSize;

#[derive(Debug, Clone, PartialEq)]
pub struct VulkanRenderConfig {
    pub clear_color: [f32; 4],
    pub vsync: bool,
    /// Enables the Khronos validation layer when it is installed.
    pub validation: bool,
}

impl Default for VulkanRenderConfig {
    #[inline]
    fn default() -> Self {
        Self {
            clear_color: [0.02, 0.02, 0.03, 1.0],
            vsync: true,
            validation: cfg!(debug_assertions),
        }
    }
}

impl From<&StartupConfig> for VulkanRenderConfig {
    fn from(cfg: &StartupConfig) -> Self {
        Self {
            clear_color: cfg.clear_color,
            vsync: cfg.vsync,
            ..Self::default()
        }
    }
}

/// Owns the `GpuContext` block: builds it over the setup chain, drives the
/// frame synchronizer over the frame chain and releases it on cleanup.
///
/// The pipeline setup phase is left to effect modules; they draw from the
/// render phase through [`GpuContext::recording`].
pub struct VulkanRenderModule {
    config: VulkanRenderConfig,
}

impl VulkanRenderModule {
    #[inline]
    pub fn new(config: VulkanRenderConfig) -> Self {
        Self { config }
    }
}

impl Default for VulkanRenderModule {
    fn default() -> Self {
        Self::new(VulkanRenderConfig::default())
    }
}

/// Runs a setup step unless the block is missing or already faulted.
fn setup_step<F>(ctx: &mut ModuleCtx<'_>, step: F) -> EngineResult<()>
where
    F: FnOnce(&mut GpuContext) -> VkResult<()>,
{
    match ctx.resources_mut().try_get_mut::<GpuContext>() {
        Some(gpu) if !gpu.fault.is_raised() => step(gpu).map_err(EngineError::from),
        _ => Ok(()),
    }
}

/// Runs a frame step only once the frame slot exists.
fn frame_step<F>(ctx: &mut ModuleCtx<'_>, step: F) -> EngineResult<()>
where
    F: FnOnce(&mut GpuContext) -> EngineResult<()>,
{
    match ctx.resources_mut().try_get_mut::<GpuContext>() {
        Some(gpu) if gpu.is_ready() => step(gpu),
        _ => Ok(()),
    }
}

fn surface_size(res: &mut Resources) -> SurfaceSize {
    let platform = res.get_or_create::<PlatformState>();
    SurfaceSize {
        width: platform.width,
        height: platform.height,
        resized: platform.take_resized().is_some(),
    }
}

impl Module for VulkanRenderModule {
    fn name(&self) -> &'static str {
        "render.vulkan.ash"
    }

    fn build(self: Box<Self>, b: &mut ModuleBuilder<'_>) -> EngineResult<()> {
        let config = self.config;
        let setup = b.phases().setup;
        let frame = b.phases().frame;

        b.setup_task(setup.instance, move |ctx: &mut ModuleCtx<'_>| {
            let window = ctx
                .resources()
                .try_get::<WinitWindow>()
                .and_then(|w| w.handles);

            let gpu = ctx.resources_mut().get_or_create::<GpuContext>();
            gpu.validation = config.validation;
            gpu.vsync = config.vsync;
            gpu.clear_color = config.clear_color;

            match window {
                Some(handles) => gpu.create_instance(handles).map_err(EngineError::from),
                None => {
                    gpu.fault.raise("no window handles; rendering disabled");
                    Ok(())
                }
            }
        })?;

        b.setup_task(setup.surface, |ctx: &mut ModuleCtx<'_>| {
            setup_step(ctx, GpuContext::create_surface)
        })?;
        b.setup_task(setup.device, |ctx: &mut ModuleCtx<'_>| {
            setup_step(ctx, GpuContext::create_device)
        })?;
        b.setup_task(setup.swapchain, |ctx: &mut ModuleCtx<'_>| {
            let size = surface_size(ctx.resources_mut());
            setup_step(ctx, |gpu| gpu.create_swapchain(size.width, size.height))
        })?;
        b.setup_task(setup.render_pass, |ctx: &mut ModuleCtx<'_>| {
            setup_step(ctx, GpuContext::create_render_pass)
        })?;
        b.setup_task(setup.framebuffers, |ctx: &mut ModuleCtx<'_>| {
            setup_step(ctx, GpuContext::create_framebuffers)
        })?;
        b.setup_task(setup.command_pool, |ctx: &mut ModuleCtx<'_>| {
            setup_step(ctx, GpuContext::create_command_pool)
        })?;
        b.setup_task(setup.command_buffer, |ctx: &mut ModuleCtx<'_>| {
            setup_step(ctx, GpuContext::allocate_command_buffer)
        })?;
        b.setup_task(setup.sync_objects, |ctx: &mut ModuleCtx<'_>| {
            setup_step(ctx, GpuContext::create_frame_slot)
        })?;

        b.frame_task(frame.begin_render, |ctx: &mut ModuleCtx<'_>| {
            let size = surface_size(ctx.resources_mut());
            frame_step(ctx, |gpu| gpu.begin_render(size).map(|_| ()))
        })?;
        b.frame_task(frame.begin_command_buffer, |ctx: &mut ModuleCtx<'_>| {
            frame_step(ctx, GpuContext::record)
        })?;
        b.frame_task(frame.render, |ctx: &mut ModuleCtx<'_>| {
            frame_step(ctx, |gpu| {
                gpu.clear_pass();
                Ok(())
            })
        })?;
        b.frame_task(frame.end_command_buffer, |ctx: &mut ModuleCtx<'_>| {
            frame_step(ctx, GpuContext::submit)
        })?;
        b.frame_task(frame.end_render, |ctx: &mut ModuleCtx<'_>| {
            frame_step(ctx, GpuContext::present)
        })?;

        b.on_cleanup(|res: &mut Resources| {
            if let Some(gpu) = res.try_get_mut::<GpuContext>() {
                gpu.destroy_all();
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use neoframe_core::{Engine, EngineConfig, FrameClock};

    #[test]
    fn headless_run_disables_rendering_without_failing() {
        let mut engine = Engine::new(EngineConfig::non_aborting()).unwrap();
        engine
            .add_module(Box::new(VulkanRenderModule::default()))
            .unwrap();
        engine.start().unwrap();

        let mut clock = FrameClock::default();
        engine.tick(clock.next()).unwrap();

        let gpu = engine.resources().try_get::<GpuContext>().unwrap();
        assert!(gpu.fault.is_raised());
        assert!(!gpu.is_ready());
        assert_eq!(gpu.frames_presented(), 0);

        assert_eq!(engine.shutdown(), 1);
    }
}
