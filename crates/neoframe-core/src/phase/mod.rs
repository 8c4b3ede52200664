pub mod graph;
pub mod standard;

pub use graph::{PhaseGraph, PhaseId};
pub use standard::{FramePhases, SetupPhases, StandardPhases};
