mod executor;
mod switch;

pub(crate) use executor::ExecutorMark;
pub use executor::{Executor, TaskFn, TaskId, TickReport};
pub use switch::TaskSwitch;
