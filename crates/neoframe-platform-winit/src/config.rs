use neoframe_core::StartupConfig;

/// Window placement policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WinitWindowPlacement {
    /// Let the OS decide.
    OsDefault,
    /// Place the window in the center of the primary monitor.
    Centered { offset: (i32, i32) },
}

/// Winit host configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WinitAppConfig {
    pub title: String,
    pub size: (u32, u32),
    pub placement: WinitWindowPlacement,
}

impl Default for WinitAppConfig {
    #[inline]
    fn default() -> Self {
        Self {
            title: "NeoFrame".to_owned(),
            size: (1280, 720),
            placement: WinitWindowPlacement::Centered { offset: (0, 0) },
        }
    }
}

impl From<&StartupConfig> for WinitAppConfig {
    fn from(cfg: &StartupConfig) -> Self {
        Self {
            title: cfg.window_title.clone(),
            size: cfg.window_size,
            ..Self::default()
        }
    }
}
