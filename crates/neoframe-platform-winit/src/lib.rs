#![forbid(unsafe_op_in_unsafe_fn)]

mod app;
mod config;
mod resources;

pub use app::run_winit_app;
pub use config::{WinitAppConfig, WinitWindowPlacement};
pub use resources::{WinitWindow, WinitWindowHandles};
