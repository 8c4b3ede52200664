use crate::error::{EngineError, EngineResult};
use crate::module::Resources;

use std::collections::HashMap;

/// Cleanup callback. Must tolerate partially or fully released state.
pub type CleanupFn = Box<dyn FnMut(&mut Resources)>;

/// Opaque module identity issued at registration.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct ModuleHandle(u32);

impl ModuleHandle {
    #[inline]
    fn index(self) -> usize {
        self.0 as usize
    }
}

struct ModuleRecord {
    name: &'static str,
    cleaned: bool,
    cleanup: Vec<CleanupFn>,
}

/// Registered modules plus the cleanup broadcast.
///
/// Modules are never removed during a run; the `cleaned` flag alone records
/// lifecycle state and moves false -> true exactly once.
#[derive(Default)]
pub struct ModuleRegistry {
    modules: Vec<ModuleRecord>,
    by_name: HashMap<&'static str, ModuleHandle>,
}

impl ModuleRegistry {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_module(&mut self, name: &'static str) -> EngineResult<ModuleHandle> {
        if self.by_name.contains_key(name) {
            return Err(EngineError::Other(format!("module already registered: {name}")));
        }

        let handle = ModuleHandle(self.modules.len() as u32);
        self.modules.push(ModuleRecord {
            name,
            cleaned: false,
            cleanup: Vec::new(),
        });
        self.by_name.insert(name, handle);

        log::debug!("module registered: {name}");
        Ok(handle)
    }

    /// Forgets `module` and its callbacks. Only the most recent registration can be
    /// undone, which is all a failed build needs.
    pub(crate) fn unregister_last(&mut self, module: ModuleHandle) -> bool {
        if module.index() + 1 != self.modules.len() {
            return false;
        }
        match self.modules.pop() {
            Some(record) => {
                self.by_name.remove(record.name);
                log::debug!("module unregistered: {}", record.name);
                true
            }
            None => false,
        }
    }

    /// Subscribes a cleanup callback for `module` against the broadcast.
    pub fn subscribe_cleanup(&mut self, module: ModuleHandle, f: CleanupFn) -> EngineResult<()> {
        let record = self
            .modules
            .get_mut(module.index())
            .ok_or_else(|| EngineError::other(format!("unknown module handle: {module:?}")))?;
        record.cleanup.push(f);
        Ok(())
    }

    /// Delivers the cleanup signal to every module not yet cleaned.
    ///
    /// Modules are visited in reverse registration order so dependents usually go
    /// first, but callbacks must not rely on that. Returns how many modules were
    /// cleaned by this call; a repeated broadcast returns 0 and runs nothing.
    pub fn broadcast_cleanup(&mut self, resources: &mut Resources) -> usize {
        let mut cleaned = 0usize;

        for record in self.modules.iter_mut().rev() {
            if record.cleaned {
                log::debug!("cleanup: '{}' already cleaned, skipping", record.name);
                continue;
            }

            log::info!("cleanup: '{}'", record.name);
            for f in record.cleanup.iter_mut() {
                f(resources);
            }

            record.cleaned = true;
            cleaned += 1;
        }

        cleaned
    }

    #[inline]
    pub fn is_cleaned(&self, module: ModuleHandle) -> bool {
        self.modules
            .get(module.index())
            .is_some_and(|m| m.cleaned)
    }

    #[inline]
    pub fn all_cleaned(&self) -> bool {
        self.modules.iter().all(|m| m.cleaned)
    }

    #[inline]
    pub fn name(&self, module: ModuleHandle) -> Option<&'static str> {
        self.modules.get(module.index()).map(|m| m.name)
    }

    /// Name lookup for diagnostics.
    #[inline]
    pub fn lookup(&self, name: &str) -> Option<ModuleHandle> {
        self.by_name.get(name).copied()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}
