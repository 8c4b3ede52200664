use ash::vk;
use neoframe_core::EngineError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VkRenderError {
    #[error("vulkan loader: {0}")]
    Loader(String),

    #[error("{op} failed: {result}")]
    Vk {
        op: &'static str,
        #[source]
        result: vk::Result,
    },

    #[error("ash-window error: {0}")]
    AshWindow(String),

    #[error("no physical device with graphics and present support")]
    NoSuitableDevice,

    /// A setup step ran before the one that creates its input.
    #[error("{0} not created yet")]
    Missing(&'static str),
}

pub type VkResult<T> = Result<T, VkRenderError>;

impl VkRenderError {
    /// Name of the failing operation, for diagnostics.
    pub fn op(&self) -> &'static str {
        match self {
            VkRenderError::Loader(_) => "Entry::load",
            VkRenderError::Vk { op, .. } => op,
            VkRenderError::AshWindow(_) => "ash_window",
            VkRenderError::NoSuitableDevice => "pick_physical_device",
            VkRenderError::Missing(_) => "setup order",
        }
    }
}

/// Every Vulkan failure that reaches the engine is fatal. Out-of-date surfaces
/// never get here: the frame backend turns them into flags.
impl From<VkRenderError> for EngineError {
    fn from(e: VkRenderError) -> Self {
        EngineError::fatal_gpu(e.op(), e)
    }
}

/// Tags a raw `vk::Result` with the call that produced it.
pub(crate) trait VkCall<T> {
    fn vk(self, op: &'static str) -> VkResult<T>;
}

impl<T> VkCall<T> for Result<T, vk::Result> {
    #[inline]
    fn vk(self, op: &'static str) -> VkResult<T> {
        self.map_err(|result| VkRenderError::Vk { op, result })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vk_failures_map_to_fatal_with_op() {
        let r: Result<(), vk::Result> = Err(vk::Result::ERROR_DEVICE_LOST);
        let e: EngineError = r.vk("vkQueueSubmit").unwrap_err().into();

        assert!(e.is_fatal());
        assert!(matches!(e, EngineError::FatalGpu { op: "vkQueueSubmit", .. }));
    }
}
