use env_logger::{Builder, WriteStyle};
use log::LevelFilter;
use neoframe_core::{EngineResult, Module, ModuleBuilder, ModuleCtx, Resources};

use std::io::Write;

pub const ENV_LOG: &str = "NEOFRAME_LOG";
pub const ENV_LOG_COLORS: &str = "NEOFRAME_LOG_COLORS";
pub const ENV_LOG_MODULE: &str = "NEOFRAME_LOG_MODULE";

#[derive(Debug, Clone)]
pub struct ConsoleLoggerConfig {
    pub level: LevelFilter,
    pub colors: bool,
    pub include_module: bool,
    /// Level string that failed to parse, reported once the logger is installed.
    pub rejected_level: Option<String>,
}

impl ConsoleLoggerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    pub fn from_lookup(env: impl Fn(&str) -> Option<String>) -> Self {
        let level = env(ENV_LOG)
            .and_then(|v| v.parse::<LevelFilter>().ok())
            .unwrap_or(LevelFilter::Info);
        let colors = env(ENV_LOG_COLORS).map(|v| v != "0").unwrap_or(true);
        let include_module = env(ENV_LOG_MODULE).map(|v| v != "0").unwrap_or(true);

        Self {
            level,
            colors,
            include_module,
            rejected_level: None,
        }
    }

    /// Overrides the level with a startup-config value. An unparsable value keeps
    /// the current level and is reported by [`init_console_logger`].
    pub fn with_level_str(mut self, level: &str) -> Self {
        match level.parse::<LevelFilter>() {
            Ok(l) => {
                self.level = l;
                self.rejected_level = None;
            }
            Err(_) => self.rejected_level = Some(level.to_owned()),
        }
        self
    }
}

impl Default for ConsoleLoggerConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

/// Logger lifecycle, shared so a second module instance or an early init is detected.
#[derive(Debug, Default)]
pub struct LoggerState {
    pub initialized: bool,
}

/// Installs the console logger. Returns `false` if a logger was already set.
pub fn init_console_logger(config: &ConsoleLoggerConfig) -> bool {
    let mut builder = Builder::new();
    builder.filter_level(config.level);
    builder.write_style(if config.colors {
        WriteStyle::Auto
    } else {
        WriteStyle::Never
    });

    let include_module = config.include_module;
    builder.format(move |buf, record| {
        let style = buf.default_level_style(record.level());
        if include_module {
            writeln!(
                buf,
                "[{style}{:<5}{style:#}] {:<28} {}",
                record.level(),
                record.target(),
                record.args()
            )
        } else {
            writeln!(buf, "[{style}{:<5}{style:#}] {}", record.level(), record.args())
        }
    });

    if builder.try_init().is_err() {
        return false;
    }
    if let Some(bad) = &config.rejected_level {
        log::warn!("unknown log level '{bad}', keeping {}", config.level);
    }
    true
}

pub struct ConsoleLoggerModule {
    config: ConsoleLoggerConfig,
}

impl ConsoleLoggerModule {
    #[inline]
    pub fn new(config: ConsoleLoggerConfig) -> Self {
        Self { config }
    }
}

impl Module for ConsoleLoggerModule {
    fn name(&self) -> &'static str {
        "console-logger"
    }

    fn build(self: Box<Self>, b: &mut ModuleBuilder<'_>) -> EngineResult<()> {
        let config = self.config;

        // First setup phase, so every later phase logs through it.
        let first = b.phases().setup.instance;
        b.setup_task(first, move |ctx: &mut ModuleCtx<'_>| {
            let state = ctx.resources_mut().get_or_create::<LoggerState>();
            if state.initialized {
                return Ok(());
            }

            if init_console_logger(&config) {
                log::info!("console logger: level={}", config.level);
            } else {
                log::debug!("console logger: a logger is already installed");
            }
            state.initialized = true;
            Ok(())
        })?;

        b.on_cleanup(|res: &mut Resources| {
            if res.try_get::<LoggerState>().is_some_and(|s| s.initialized) {
                log::logger().flush();
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_lookup_parses_flags() {
        let cfg = ConsoleLoggerConfig::from_lookup(|k| match k {
            ENV_LOG => Some("debug".to_owned()),
            ENV_LOG_COLORS => Some("0".to_owned()),
            _ => None,
        });
        assert_eq!(cfg.level, LevelFilter::Debug);
        assert!(!cfg.colors);
        assert!(cfg.include_module);
    }

    #[test]
    fn bad_level_keeps_previous() {
        let cfg = ConsoleLoggerConfig::from_lookup(|_| None).with_level_str("loud");
        assert_eq!(cfg.level, LevelFilter::Info);
        assert_eq!(cfg.rejected_level.as_deref(), Some("loud"));

        let cfg = cfg.with_level_str("warn");
        assert_eq!(cfg.level, LevelFilter::Warn);
        assert_eq!(cfg.rejected_level, None);
    }
}
