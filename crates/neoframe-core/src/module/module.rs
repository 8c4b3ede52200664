use super::builder::ModuleBuilder;
use crate::error::EngineResult;

/// An independently developed feature unit (render backend, UI, scripting, input).
///
/// The core does not know concrete modules. A module keeps its state in the
/// shared context store and plugs into the engine by registering, through the
/// builder:
///
/// - setup tasks bound to the one-time setup chain,
/// - per-frame tasks bound to the frame chain,
/// - one or more cleanup callbacks, which must be idempotent.
pub trait Module {
    fn name(&self) -> &'static str;

    fn build(self: Box<Self>, builder: &mut ModuleBuilder<'_>) -> EngineResult<()>;
}
