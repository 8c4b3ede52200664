use raw_window_handle::{RawDisplayHandle, RawWindowHandle};

/// Engine-thread local window handles (not Send/Sync on some platforms).
#[derive(Debug, Clone, Copy)]
pub struct WinitWindowHandles {
    pub window: RawWindowHandle,
    pub display: RawDisplayHandle,
}

/// Window block in the shared store.
///
/// `handles` is `None` until the window exists; surface creation skips until then.
#[derive(Debug, Default)]
pub struct WinitWindow {
    pub handles: Option<WinitWindowHandles>,
}
