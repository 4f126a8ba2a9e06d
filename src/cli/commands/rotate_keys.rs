//! `credvault rotate-keys` — re-encrypt stored versions under the active key.

use crate::cli::output;
use crate::errors::Result;
use crate::service::CredentialService;

/// Execute the `rotate-keys` command.
pub fn execute(service: &CredentialService) -> Result<()> {
    let summary = service.rotate_encryption_keys()?;

    output::success(&format!(
        "{} version(s) re-encrypted with the active key",
        summary.reencrypted
    ));
    if summary.skipped > 0 {
        output::warning(&format!(
            "{} version(s) could not be decrypted and were left alone",
            summary.skipped
        ));
    }
    if summary.unknown > 0 {
        output::warning(&format!(
            "{} version(s) use unknown keys and were not touched",
            summary.unknown
        ));
    }
    Ok(())
}
