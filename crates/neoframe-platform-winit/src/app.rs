use neoframe_core::{Engine, EngineError, EngineResult, FrameClock, PlatformState};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use winit::{
    application::ApplicationHandler,
    dpi::{PhysicalPosition, PhysicalSize},
    event::{ElementState, KeyEvent, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowAttributes, WindowId},
};

use crate::config::{WinitAppConfig, WinitWindowPlacement};
use crate::resources::{WinitWindow, WinitWindowHandles};

// Field order matters: the engine (and its GPU objects) drops before the window.
struct App {
    engine: Engine,
    config: WinitAppConfig,
    clock: FrameClock,
    started: bool,
    fatal: Option<EngineError>,
    shutting_down: bool,

    window: Option<Window>,
}

impl App {
    #[inline]
    fn new(engine: Engine, config: WinitAppConfig) -> Self {
        let clock = engine.make_clock();
        Self {
            engine,
            config,
            clock,
            started: false,
            fatal: None,
            shutting_down: false,
            window: None,
        }
    }

    fn build_window_attributes(event_loop: &ActiveEventLoop, config: &WinitAppConfig) -> WindowAttributes {
        let (width, height) = config.size;
        let attrs = WindowAttributes::default()
            .with_title(config.title.clone())
            .with_inner_size(PhysicalSize::new(width, height));

        match config.placement {
            WinitWindowPlacement::OsDefault => attrs,
            WinitWindowPlacement::Centered { offset: (ox, oy) } => {
                let Some(monitor) = event_loop.primary_monitor() else {
                    return attrs;
                };

                let ms = monitor.size();
                let mp = monitor.position();

                let cx = mp.x.saturating_add((ms.width as i32).saturating_sub(width as i32) / 2);
                let cy = mp.y.saturating_add((ms.height as i32).saturating_sub(height as i32) / 2);

                attrs.with_position(PhysicalPosition::new(cx.saturating_add(ox), cy.saturating_add(oy)))
            }
        }
    }

    #[inline]
    fn request_redraw(&self) {
        if let Some(w) = &self.window {
            w.request_redraw();
        }
    }

    #[inline]
    fn platform(&mut self) -> &mut PlatformState {
        self.engine.resources_mut().get_or_create::<PlatformState>()
    }

    fn install_window_resources(&mut self) {
        let Some(w) = &self.window else { return };

        let PhysicalSize { width, height } = w.inner_size();
        let handles = match (w.window_handle(), w.display_handle()) {
            (Ok(window), Ok(display)) => Some(WinitWindowHandles {
                window: window.as_raw(),
                display: display.as_raw(),
            }),
            (Err(e), _) | (_, Err(e)) => {
                log::error!("winit: raw handles unavailable: {e}");
                None
            }
        };

        let res = self.engine.resources_mut();
        res.get_or_create::<WinitWindow>().handles = handles;
        let platform = res.get_or_create::<PlatformState>();
        platform.set_size(width, height);
        // Initial size is not a resize.
        platform.take_resized();
        if handles.is_none() {
            platform.fault.raise("window handles unavailable");
        }
    }

    fn set_fatal_and_exit(&mut self, event_loop: &ActiveEventLoop, e: EngineError) {
        log::error!("winit host fatal: {e}");
        self.fatal = Some(e);
        self.shutdown_and_exit(event_loop);
    }

    /// Broadcasts cleanup while the window still exists, then leaves the loop.
    fn shutdown_and_exit(&mut self, event_loop: &ActiveEventLoop) {
        if !self.shutting_down {
            self.shutting_down = true;
            self.platform().request_quit();

            let cleaned = self.engine.shutdown();
            log::info!("winit: shutdown, {cleaned} modules cleaned");
        }
        event_loop.exit();
    }

    fn on_key(&mut self, event: &KeyEvent) {
        if event.state == ElementState::Pressed
            && !event.repeat
            && event.physical_key == PhysicalKey::Code(KeyCode::Escape)
        {
            log::info!("winit: escape pressed, quitting");
            self.platform().request_quit();
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        event_loop.set_control_flow(ControlFlow::Poll);

        if self.window.is_none() {
            let attrs = Self::build_window_attributes(event_loop, &self.config);
            match event_loop.create_window(attrs) {
                Ok(w) => self.window = Some(w),
                Err(e) => {
                    self.set_fatal_and_exit(event_loop, EngineError::other(e.to_string()));
                    return;
                }
            }
            self.install_window_resources();
        }

        if !self.started {
            if let Err(e) = self.engine.start() {
                self.set_fatal_and_exit(event_loop, e);
                return;
            }
            self.started = true;
        }

        self.request_redraw();
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                self.platform().request_quit();
                self.shutdown_and_exit(event_loop);
                return;
            }
            WindowEvent::Resized(PhysicalSize { width, height }) => {
                self.platform().set_size(width, height);
            }
            WindowEvent::ScaleFactorChanged { .. } => {
                if let Some(w) = &self.window {
                    let PhysicalSize { width, height } = w.inner_size();
                    self.platform().set_size(width, height);
                }
            }
            WindowEvent::KeyboardInput { ref event, .. } => self.on_key(event),
            _ => {}
        }

        self.request_redraw();
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.shutting_down {
            event_loop.exit();
            return;
        }
        if !self.started {
            return;
        }

        if self.engine.should_quit() {
            self.shutdown_and_exit(event_loop);
            return;
        }

        let frame = self.clock.next();
        if self.platform().is_minimized() {
            return;
        }

        if let Err(e) = self.engine.tick(frame) {
            self.set_fatal_and_exit(event_loop, e);
            return;
        }

        if self.engine.should_quit() {
            self.shutdown_and_exit(event_loop);
        } else {
            self.request_redraw();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if !self.engine.is_shut_down() {
            self.engine.shutdown();
        }
        self.window = None;
    }
}

/// Runs the OS event loop until the should-quit flag is observed.
///
/// Creates the window on `resumed`, starts the engine once, ticks it from
/// `about_to_wait` and broadcasts cleanup before the window goes away.
pub fn run_winit_app(engine: Engine, config: WinitAppConfig) -> EngineResult<()> {
    let event_loop = EventLoop::new().map_err(|e| EngineError::other(e.to_string()))?;
    let mut app = App::new(engine, config);

    event_loop
        .run_app(&mut app)
        .map_err(|e| EngineError::other(e.to_string()))?;

    match app.fatal.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
