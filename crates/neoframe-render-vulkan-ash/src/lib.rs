mod backend;
mod context;
mod error;
mod frame;
mod module;
mod release;
mod setup;

pub use backend::VkFrameBackend;
pub use context::{GpuContext, SwapchainState};
pub use error::{VkRenderError, VkResult};
pub use module::{VulkanRenderConfig, VulkanRenderModule};
