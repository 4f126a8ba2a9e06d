//! `credvault key-usage` — count versions per encryption key class.

use crate::cli::output;
use crate::errors::Result;
use crate::service::CredentialService;

/// Execute the `key-usage` command.
pub fn execute(service: &CredentialService, json: bool) -> Result<()> {
    let report = service.get_key_usage()?;
    if json {
        return output::print_json(&report);
    }

    output::print_key_usage_table(&report);
    if report.unknown_key_count > 0 {
        output::warning(&format!(
            "{} version(s) are encrypted with keys that are no longer configured",
            report.unknown_key_count
        ));
    }
    if report.inactive_key_count > 0 {
        output::tip("Run `credvault rotate-keys` to move them to the active key.");
    }
    Ok(())
}
