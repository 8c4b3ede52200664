mod backend;
mod sync;

pub use backend::{AcquireOutcome, FrameBackend, GpuStatus};
pub use sync::{FrameSlot, FrameSynchronizer, SyncState};
