//! `credvault transitional` — set, unset or promote a certificate's
//! transitional version.

use crate::cli::output;
use crate::cli::TransitionalAction;
use crate::errors::Result;
use crate::service::CredentialService;

/// Execute a `transitional` subcommand.
pub fn execute(service: &CredentialService, action: &TransitionalAction) -> Result<()> {
    match action {
        TransitionalAction::Set { name, version_id } => {
            service.set_transitional_version(name, *version_id)?;
            output::success(&format!("Version {version_id} of '{name}' is now transitional"));
        }
        TransitionalAction::Unset { name } => {
            service.unset_transitional_version(name)?;
            output::success(&format!("'{name}' has no transitional version"));
        }
        TransitionalAction::Promote { name } => {
            let view = service.promote_transitional_version(name)?;
            output::success(&format!("Version {} of '{name}' is now current", view.id));
        }
    }
    Ok(())
}
