//! `credvault versions` — list a credential's versions in a table.

use crate::cli::output;
use crate::errors::Result;
use crate::service::CredentialService;

/// Execute the `versions` command.
pub fn execute(service: &CredentialService, name: &str) -> Result<()> {
    let versions = service.versions(name)?;
    output::info(&format!("{name} — {} version(s)", versions.len()));
    output::print_versions_table(&versions);
    Ok(())
}
