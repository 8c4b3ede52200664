//! Fatal error policy.
//!
//! A fatal error leaves GPU state inconsistent, so there is no unwind-and-retry:
//! log what failed and terminate.

use crate::error::EngineError;

#[cold]
#[inline(never)]
pub fn abort_with(err: &EngineError) -> ! {
    log::error!("fatal: {err}");

    let mut cause = std::error::Error::source(err);
    while let Some(c) = cause {
        log::error!("  caused by: {c}");
        cause = c.source();
    }

    log::logger().flush();
    std::process::abort()
}
