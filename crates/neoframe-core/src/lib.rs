pub mod config;
pub mod engine;
pub mod error;
pub mod fatal;
pub mod frame;
pub mod gpu;
pub mod module;
pub mod phase;
pub mod platform;
pub mod sched;

pub use config::{EngineConfig, StartupConfig, StartupLoadReport, StartupLoader};
pub use engine::Engine;
pub use error::{EngineError, EngineResult};
pub use frame::{Frame, FrameClock};
pub use gpu::{AcquireOutcome, FrameBackend, FrameSlot, FrameSynchronizer, GpuStatus, SyncState};
pub use module::{
    FaultFlag, Module, ModuleBuilder, ModuleCtx, ModuleHandle, ModuleRegistry, Resources,
};
pub use phase::{PhaseGraph, PhaseId, StandardPhases};
pub use platform::PlatformState;
pub use sched::{Executor, TaskId, TaskSwitch};
