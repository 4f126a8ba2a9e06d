//! `credvault regenerate` — regenerate one credential from its parameters.

use crate::cli::output;
use crate::errors::Result;
use crate::service::CredentialService;

/// Execute the `regenerate` command.
pub fn execute(service: &CredentialService, name: &str, transitional: bool) -> Result<()> {
    let view = if transitional {
        service.regenerate_transitional(name)?
    } else {
        service.regenerate(name)?
    };

    if transitional {
        output::success(&format!(
            "Staged version {} of '{}' as transitional",
            view.id, view.name
        ));
        output::tip(&format!(
            "Run `credvault transitional promote {name}` once clients trust it."
        ));
    } else {
        output::success(&format!("Regenerated '{}' (version {})", view.name, view.id));
    }
    Ok(())
}
