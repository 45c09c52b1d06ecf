//! Maps the router's error taxonomy onto process exit codes (spec §6).

use fluent_core::error::RouterError;

/// Process exit code for a router error surfaced to the CLI caller.
///
/// Only the five kinds spec §7 lists as reaching the caller have a
/// dedicated code; anything else would mean the propagation rules let an
/// internal-only kind leak through, so it falls back to a generic
/// failure code rather than inventing a new one.
pub fn exit_code(err: &RouterError) -> i32 {
    match err {
        RouterError::NoCandidates => 1,
        RouterError::ProvidersExhausted { .. } => 2,
        RouterError::Cancelled => 3,
        RouterError::InvalidRequest(_) | RouterError::ToolHandlerFailed { .. } => 4,
        RouterError::ProviderUnavailable { .. } => 5,
        other => {
            log::warn!("unexpected error kind reached the CLI boundary: {}", other.kind());
            1
        }
    }
}
