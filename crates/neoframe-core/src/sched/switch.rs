use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Enable/disable flag of one task.
///
/// The executor checks it before every invocation. Clones share the flag, so a
/// module can keep one and flip it from any of its other tasks (e.g. enable the
/// script update once a script loaded).
#[derive(Clone, Debug)]
pub struct TaskSwitch {
    flag: Arc<AtomicBool>,
}

impl TaskSwitch {
    #[inline]
    pub fn new(enabled: bool) -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(enabled)),
        }
    }

    #[inline]
    pub fn set(&self, enabled: bool) {
        self.flag.store(enabled, Ordering::Relaxed);
    }

    #[inline]
    pub fn enable(&self) {
        self.set(true);
    }

    #[inline]
    pub fn disable(&self) {
        self.set(false);
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

impl Default for TaskSwitch {
    #[inline]
    fn default() -> Self {
        Self::new(true)
    }
}
