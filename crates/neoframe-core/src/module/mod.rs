pub mod builder;
pub mod ctx;
pub mod fault;
pub mod module;
pub mod registry;
pub mod resources;

pub use builder::ModuleBuilder;
pub use ctx::ModuleCtx;
pub use fault::FaultFlag;
pub use module::Module;
pub use registry::{CleanupFn, ModuleHandle, ModuleRegistry};
pub use resources::Resources;
