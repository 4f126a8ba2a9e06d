//! `credvault bulk-regenerate` — regenerate everything a CA signs.

use std::sync::atomic::AtomicBool;

use crate::cli::output;
use crate::errors::Result;
use crate::service::CredentialService;

/// Execute the `bulk-regenerate` command.
///
/// Per-certificate failures are reported, not fatal; the command only
/// fails when the walk itself cannot start.
///
/// The cancellation flag is for library callers and is never raised here.
/// Ctrl-C terminates the process instead: each regeneration commits in
/// its own store transaction, so an interrupted run keeps what finished
/// and loses at most the item in flight.
pub fn execute(service: &CredentialService, signed_by: &str) -> Result<()> {
    let cancel = AtomicBool::new(false);
    let result = service.bulk_regenerate(signed_by, &cancel)?;

    output::print_bulk_result(&result);
    if result.failures.is_empty() {
        output::success(&format!(
            "Regenerated {} certificate(s) signed by '{signed_by}'",
            result.regenerated_credentials.len()
        ));
    } else {
        output::warning(&format!(
            "Regenerated {} certificate(s), {} failed",
            result.regenerated_credentials.len(),
            result.failures.len()
        ));
    }
    Ok(())
}
