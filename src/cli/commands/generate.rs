//! `credvault generate` — generate a new version of a credential.

use crate::cli::output;
use crate::cli::GenerateArgs;
use crate::errors::Result;
use crate::generate::GenerateRequest;
use crate::service::CredentialService;

/// Execute the `generate` command.
pub fn execute(service: &CredentialService, name: &str, args: &GenerateArgs) -> Result<()> {
    let request = GenerateRequest::new(name, args.to_parameters()?);
    let view = service.generate(&request)?;

    output::success(&format!(
        "Generated {} '{}' (version {})",
        request.credential_type(),
        view.name,
        view.id
    ));
    output::print_json(&view)
}
