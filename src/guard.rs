//! Guarded calls into user code.

use std::panic::{self, AssertUnwindSafe};

use tracing::warn;

/// Run a caller-supplied predicate, converting a panic into `false`.
///
/// Engine state is never borrowed mutably while user code runs, so unwinding
/// out of `f` cannot leave it half-updated.
pub fn guarded<F>(param: &str, f: F) -> bool
where
    F: FnOnce() -> bool,
{
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(_) => {
            warn!(param, "value predicate panicked; treating as rejected");
            false
        }
    }
}
