use crate::error::{EngineError, EngineResult};
use crate::frame::FrameClock;

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_WINDOW_TITLE: &str = "NEOFRAME_WINDOW_TITLE";
pub const ENV_LOG: &str = "NEOFRAME_LOG";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StartupConfigSource {
    #[default]
    Defaults,
    File {
        path: PathBuf,
    },
    Mixed,
}

/// Normalized startup configuration.
/// All fields have concrete defaults (no Option), except the script.
#[derive(Debug, Clone, PartialEq)]
pub struct StartupConfig {
    pub source: StartupConfigSource,

    pub log_level: String,
    pub window_title: String,
    pub window_size: (u32, u32),

    pub clear_color: [f32; 4],
    pub vsync: bool,

    pub abort_on_fatal: bool,
    pub max_frame_dt_ms: u32,

    pub script_path: Option<PathBuf>,
}

impl Default for StartupConfig {
    #[inline]
    fn default() -> Self {
        Self {
            source: StartupConfigSource::Defaults,

            log_level: "info".to_owned(),
            window_title: "NeoFrame".to_owned(),
            window_size: (1280, 720),

            clear_color: [0.02, 0.02, 0.03, 1.0],
            vsync: true,

            abort_on_fatal: true,
            max_frame_dt_ms: FrameClock::DEFAULT_MAX_DT.as_millis() as u32,

            script_path: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartupOverrideSource {
    File,
    Env,
}

#[derive(Debug, Clone)]
pub struct StartupOverride {
    pub key: &'static str,
    pub source: StartupOverrideSource,
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Default)]
pub struct StartupLoadReport {
    pub source: StartupConfigSource,
    /// File actually read, if any.
    pub file: Option<PathBuf>,
    pub overrides: Vec<StartupOverride>,
}

impl StartupLoadReport {
    #[inline]
    pub fn has_overrides(&self) -> bool {
        !self.overrides.is_empty()
    }

    #[inline]
    pub fn is_defaults(&self) -> bool {
        matches!(self.source, StartupConfigSource::Defaults)
    }

    /// Logs the outcome at `info`, each override at `debug`.
    pub fn log(&self) {
        match &self.file {
            Some(p) => log::info!("startup config: {:?} ({})", self.source, p.display()),
            None => log::info!("startup config: {:?}", self.source),
        }
        for o in &self.overrides {
            log::debug!("  {} [{:?}]: {} -> {}", o.key, o.source, o.from, o.to);
        }
    }
}

/// Subset of the startup config the engine core consumes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    /// Upper bound for a frame delta.
    pub max_frame_dt: Duration,
    /// Abort the process on a fatal error instead of returning it.
    pub abort_on_fatal: bool,
}

impl Default for EngineConfig {
    #[inline]
    fn default() -> Self {
        Self {
            max_frame_dt: FrameClock::DEFAULT_MAX_DT,
            abort_on_fatal: true,
        }
    }
}

impl EngineConfig {
    /// Returns fatal errors to the caller. Used by tests and embedders.
    #[inline]
    pub fn non_aborting() -> Self {
        Self {
            abort_on_fatal: false,
            ..Self::default()
        }
    }
}

impl From<&StartupConfig> for EngineConfig {
    fn from(cfg: &StartupConfig) -> Self {
        Self {
            max_frame_dt: Duration::from_millis(u64::from(cfg.max_frame_dt_ms.max(1))),
            abort_on_fatal: cfg.abort_on_fatal,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RootJson {
    window: Option<WindowJson>,
    logging: Option<LoggingJson>,
    render: Option<RenderJson>,
    engine: Option<EngineJson>,
    script: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WindowJson {
    title: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct LoggingJson {
    level: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RenderJson {
    clear_color: Option<[f32; 4]>,
    vsync: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct EngineJson {
    abort_on_fatal: Option<bool>,
    max_frame_dt_ms: Option<u32>,
}

pub struct StartupLoader;

impl StartupLoader {
    /// Loads startup config with layering: defaults -> file -> env.
    ///
    /// A missing file is not an error; a malformed one is.
    pub fn load_json(path: Option<&Path>) -> EngineResult<(StartupConfig, StartupLoadReport)> {
        Self::load_json_with_env(path, |k| std::env::var(k).ok())
    }

    /// Same as [`Self::load_json`] with an explicit environment lookup.
    pub fn load_json_with_env(
        path: Option<&Path>,
        env: impl Fn(&str) -> Option<String>,
    ) -> EngineResult<(StartupConfig, StartupLoadReport)> {
        let mut cfg = StartupConfig::default();
        let mut report = StartupLoadReport::default();

        if let Some(path) = path.filter(|p| p.is_file()) {
            let data = fs::read_to_string(path).map_err(|e| {
                EngineError::Config(format!("read failed: path={} err={e}", path.display()))
            })?;
            Self::apply_json(&mut cfg, &mut report, &data)
                .map_err(|e| EngineError::Config(format!("path={}: {e}", path.display())))?;

            cfg.source = StartupConfigSource::File {
                path: path.to_path_buf(),
            };
            report.file = Some(path.to_path_buf());
        } else if let Some(path) = path {
            log::debug!("startup config: {} not found, using defaults", path.display());
        }

        apply_env(&mut cfg, &mut report, env);

        if report
            .overrides
            .iter()
            .any(|o| o.source == StartupOverrideSource::Env)
        {
            cfg.source = StartupConfigSource::Mixed;
        }
        report.source = cfg.source.clone();

        Ok((cfg, report))
    }

    /// Parses a JSON document over the defaults. No env layer.
    pub fn parse_json(json: &str) -> EngineResult<StartupConfig> {
        let mut cfg = StartupConfig::default();
        let mut report = StartupLoadReport::default();
        Self::apply_json(&mut cfg, &mut report, json).map_err(EngineError::Config)?;
        Ok(cfg)
    }

    fn apply_json(
        cfg: &mut StartupConfig,
        report: &mut StartupLoadReport,
        json: &str,
    ) -> Result<(), String> {
        let root: RootJson =
            serde_json::from_str(json).map_err(|e| format!("parse failed (json): {e}"))?;
        let src = StartupOverrideSource::File;

        if let Some(w) = root.window {
            if let Some(t) = w.title {
                apply_string(report, src, "window_title", &mut cfg.window_title, t);
            }
            let size = (
                w.width.unwrap_or(cfg.window_size.0),
                w.height.unwrap_or(cfg.window_size.1),
            );
            if size.0 == 0 || size.1 == 0 {
                return Err(format!("window size must be non-zero, got {}x{}", size.0, size.1));
            }
            apply_value(report, src, "window_size", &mut cfg.window_size, size);
        }

        if let Some(level) = root.logging.and_then(|l| l.level) {
            apply_string(report, src, "log_level", &mut cfg.log_level, level);
        }

        if let Some(r) = root.render {
            if let Some(c) = r.clear_color {
                apply_value(report, src, "clear_color", &mut cfg.clear_color, c);
            }
            if let Some(v) = r.vsync {
                apply_value(report, src, "vsync", &mut cfg.vsync, v);
            }
        }

        if let Some(e) = root.engine {
            if let Some(v) = e.abort_on_fatal {
                apply_value(report, src, "abort_on_fatal", &mut cfg.abort_on_fatal, v);
            }
            if let Some(v) = e.max_frame_dt_ms {
                if v == 0 {
                    return Err("engine.max_frame_dt_ms must be > 0".to_owned());
                }
                apply_value(report, src, "max_frame_dt_ms", &mut cfg.max_frame_dt_ms, v);
            }
        }

        if let Some(s) = root.script {
            let to = Some(PathBuf::from(s));
            if cfg.script_path != to {
                report.overrides.push(StartupOverride {
                    key: "script_path",
                    source: src,
                    from: format_path(cfg.script_path.as_deref()),
                    to: format_path(to.as_deref()),
                });
                cfg.script_path = to;
            }
        }

        Ok(())
    }
}

fn apply_env(
    cfg: &mut StartupConfig,
    report: &mut StartupLoadReport,
    env: impl Fn(&str) -> Option<String>,
) {
    let src = StartupOverrideSource::Env;

    if let Some(v) = env(ENV_WINDOW_TITLE).filter(|v| !v.is_empty()) {
        apply_string(report, src, "window_title", &mut cfg.window_title, v);
    }
    if let Some(v) = env(ENV_LOG).filter(|v| !v.is_empty()) {
        apply_string(report, src, "log_level", &mut cfg.log_level, v);
    }
}

fn apply_string(
    report: &mut StartupLoadReport,
    source: StartupOverrideSource,
    key: &'static str,
    slot: &mut String,
    to: String,
) {
    if *slot == to {
        return;
    }
    let from = std::mem::replace(slot, to.clone());
    report.overrides.push(StartupOverride {
        key,
        source,
        from,
        to,
    });
}

fn apply_value<T>(
    report: &mut StartupLoadReport,
    source: StartupOverrideSource,
    key: &'static str,
    slot: &mut T,
    to: T,
) where
    T: PartialEq + std::fmt::Debug,
{
    if *slot == to {
        return;
    }
    let from = format!("{slot:?}");
    let to_s = format!("{to:?}");
    *slot = to;
    report.overrides.push(StartupOverride {
        key,
        source,
        from,
        to: to_s,
    });
}

fn format_path(p: Option<&Path>) -> String {
    p.map_or_else(|| "<unset>".to_owned(), |p| p.display().to_string())
}
