//! `credvault get` — print a credential version as JSON.

use uuid::Uuid;

use crate::cli::output;
use crate::errors::Result;
use crate::service::CredentialService;

/// Execute the `get` command.
///
/// Prints the current version unless `version_id` is given. Certificate
/// reads carry the CA chain in `value.ca`.
pub fn execute(service: &CredentialService, name: &str, version_id: Option<Uuid>) -> Result<()> {
    let view = match version_id {
        Some(id) => {
            let view = service.get_version(id)?;
            if view.name != name {
                return Err(crate::errors::CredVaultError::EntryNotFound(format!(
                    "version {id} of '{name}'"
                )));
            }
            view
        }
        None => service.get(name)?,
    };
    output::print_json(&view)
}
