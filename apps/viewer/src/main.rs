mod script;
mod stats;

use std::path::Path;

use neoframe_core::{Engine, EngineConfig, EngineResult, StartupLoader};
use neoframe_modules_logging::{init_console_logger, ConsoleLoggerConfig, ConsoleLoggerModule};
use neoframe_platform_winit::{run_winit_app, WinitAppConfig};
use neoframe_render_vulkan_ash::{VulkanRenderConfig, VulkanRenderModule};

use script::ScriptModule;
use stats::StatsModule;

const CONFIG_FILE: &str = "neoframe.json";

fn main() -> EngineResult<()> {
    let (startup, report) = StartupLoader::load_json(Some(Path::new(CONFIG_FILE)))?;

    // Installed before the engine exists so config and module registration are logged too.
    // The logger module then finds it and leaves it alone.
    let log_config = ConsoleLoggerConfig::from_env().with_level_str(&startup.log_level);
    init_console_logger(&log_config);
    report.log();

    let mut engine = Engine::new(EngineConfig::from(&startup))?;

    engine.add_module(Box::new(ConsoleLoggerModule::new(log_config)))?;
    engine.add_module(Box::new(VulkanRenderModule::new(VulkanRenderConfig::from(
        &startup,
    ))))?;
    engine.add_module(Box::new(ScriptModule::from_path(startup.script_path.clone())))?;
    engine.add_module(Box::new(StatsModule::default()))?;

    run_winit_app(engine, WinitAppConfig::from(&startup))
}
