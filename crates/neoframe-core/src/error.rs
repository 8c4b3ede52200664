use thiserror::Error;

pub type EngineResult<T> = Result<T, EngineError>;

/// Engine-wide error.
///
/// Keep this small and stable. Modules may define their own error types and map them into
/// `EngineError` at the task boundary.
///
/// An out-of-date surface is not an error: the synchronizer records it as a flag
/// (see [`crate::gpu::AcquireOutcome`]).
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    /// Graceful shutdown was requested.
    #[error("exit requested")]
    ExitRequested,

    /// The phase dependency relation is not acyclic.
    #[error("phase dependency cycle detected: {}", .phases.join(" -> "))]
    Cycle { phases: Vec<String> },

    /// Any GPU call failure other than an out-of-date surface.
    #[error("gpu call '{op}' failed: {detail}")]
    FatalGpu { op: &'static str, detail: String },

    /// A context block is not created yet, or the module owning it has not finished setup.
    #[error("shared state absent: {type_name}")]
    Absent { type_name: &'static str },

    /// Misuse of a state machine (programming error).
    #[error("invalid state: '{op}' called while {state}")]
    InvalidState { op: &'static str, state: &'static str },

    #[error("config error: {0}")]
    Config(String),

    /// Error produced by a module task, attributed to its phase.
    #[error("module '{module}' phase '{phase}': {cause}")]
    Module {
        module: String,
        phase: String,
        #[source]
        cause: Box<EngineError>,
    },

    /// Generic error (fallback).
    #[error("{0}")]
    Other(String),
}

impl EngineError {
    #[inline]
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    #[inline]
    pub fn fatal_gpu(op: &'static str, detail: impl ToString) -> Self {
        Self::FatalGpu {
            op,
            detail: detail.to_string(),
        }
    }

    #[inline]
    pub fn absent<T: ?Sized>() -> Self {
        Self::Absent {
            type_name: std::any::type_name::<T>(),
        }
    }

    /// Attributes an error to the module and phase that produced it.
    ///
    /// `ExitRequested` is passed through untouched so the loop can still match on it.
    pub fn with_module_phase(module: &str, phase: &str, err: EngineError) -> Self {
        match err {
            EngineError::ExitRequested => EngineError::ExitRequested,
            other => EngineError::Module {
                module: module.to_owned(),
                phase: phase.to_owned(),
                cause: Box::new(other),
            },
        }
    }

    /// Fatal errors abort the process (see [`crate::fatal`]); everything else degrades a frame.
    pub fn is_fatal(&self) -> bool {
        match self {
            EngineError::Cycle { .. }
            | EngineError::FatalGpu { .. }
            | EngineError::InvalidState { .. } => true,
            EngineError::Module { cause, .. } => cause.is_fatal(),
            _ => false,
        }
    }

    /// Innermost error, skipping module attribution.
    pub fn root(&self) -> &EngineError {
        match self {
            EngineError::Module { cause, .. } => cause.root(),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_message_lists_path() {
        let e = EngineError::Cycle {
            phases: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(e.to_string(), "phase dependency cycle detected: a -> b -> a");
    }

    #[test]
    fn module_wrapping_keeps_fatality_and_root() {
        let e = EngineError::with_module_phase(
            "render.vulkan",
            "begin-render",
            EngineError::fatal_gpu("vkQueueSubmit", "ERROR_DEVICE_LOST"),
        );
        assert!(e.is_fatal());
        assert!(matches!(e.root(), EngineError::FatalGpu { op: "vkQueueSubmit", .. }));
        assert!(std::error::Error::source(&e).is_some());

        let soft = EngineError::with_module_phase("ui", "update-gui", EngineError::other("no font"));
        assert!(!soft.is_fatal());
    }

    #[test]
    fn exit_requested_is_not_wrapped() {
        let e = EngineError::with_module_phase("m", "p", EngineError::ExitRequested);
        assert!(matches!(e, EngineError::ExitRequested));
    }

    #[test]
    fn absent_is_recoverable() {
        assert!(!EngineError::absent::<u32>().is_fatal());
        assert!(EngineError::InvalidState { op: "record", state: "recording" }.is_fatal());
    }
}
