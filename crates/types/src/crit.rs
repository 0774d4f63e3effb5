//! Handler for unrecoverable errors.

use std::sync::Arc;
use tracing::error;

/// Callback invoked on errors that break consensus invariants (Byzantine
/// quorums, corrupted storage, roots out of order).
///
/// The core stops making progress after invoking it; the handler decides
/// whether to alert, abort the process or just record the failure.
pub type CritHandler = Arc<dyn Fn(&dyn std::error::Error) + Send + Sync>;

/// Handler that logs the error.
pub fn log_crit() -> CritHandler {
    Arc::new(|err: &dyn std::error::Error| {
        error!(error = %err, "Consensus critical error");
    })
}

/// Handler that panics, for tests where any fatal error is a bug.
pub fn panic_crit() -> CritHandler {
    Arc::new(|err: &dyn std::error::Error| panic!("consensus critical error: {err}"))
}
