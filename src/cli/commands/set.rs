//! `credvault set` — store a caller-supplied value as a new version.

use std::io::{self, IsTerminal, Read};

use crate::cli::output;
use crate::credential::{CredentialType, CredentialValue};
use crate::errors::{CredVaultError, Result};
use crate::service::CredentialService;

/// Execute the `set` command.
pub fn execute(
    service: &CredentialService,
    name: &str,
    credential_type: &str,
    value: Option<&str>,
) -> Result<()> {
    let credential_type: CredentialType = credential_type.parse()?;

    // Determine the raw value from one of three sources.
    let raw = if let Some(v) = value {
        // Source 1: Inline value on the command line.
        if credential_type != CredentialType::Value && credential_type != CredentialType::Json {
            output::warning("Value provided on command line — it may appear in shell history.");
        }
        v.to_string()
    } else if !io::stdin().is_terminal() {
        // Source 2: Piped input.
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        buf.trim_end().to_string()
    } else {
        // Source 3: Interactive secure prompt.
        dialoguer::Password::new()
            .with_prompt(format!("Enter value for {name}"))
            .interact()
            .map_err(|e| CredVaultError::CommandFailed(format!("input prompt: {e}")))?
    };

    let value = parse_value(credential_type, &raw)?;
    let view = service.set_value(name, value)?;
    output::success(&format!("Set '{}' (version {})", view.name, view.id));
    Ok(())
}

/// Build a value of `credential_type` from its command-line form.
///
/// Strings are taken as-is; `json` and the structured types take JSON.
fn parse_value(credential_type: CredentialType, raw: &str) -> Result<CredentialValue> {
    fn json<T: serde::de::DeserializeOwned>(kind: CredentialType, raw: &str) -> Result<T> {
        serde_json::from_str(raw).map_err(|e| {
            CredVaultError::CommandFailed(format!("{kind} values must be JSON: {e}"))
        })
    }

    Ok(match credential_type {
        CredentialType::Value => CredentialValue::Value(raw.to_string()),
        CredentialType::Password => CredentialValue::Password(raw.to_string()),
        CredentialType::Json => CredentialValue::Json(json(credential_type, raw)?),
        CredentialType::User => CredentialValue::User(json(credential_type, raw)?),
        CredentialType::Rsa => CredentialValue::Rsa(json(credential_type, raw)?),
        CredentialType::Ssh => CredentialValue::Ssh(json(credential_type, raw)?),
        CredentialType::Certificate => CredentialValue::Certificate(json(credential_type, raw)?),
    })
}
