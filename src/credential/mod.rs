//! Credential data model.
//!
//! This module provides:
//! - `CredentialVersion` and `CertificateMetadata`, the stored form (`version`)
//! - `CredentialValue`, the decrypted payload (`value`)
//! - `GenerationParameters`, the metadata regeneration works from (`parameters`)
//! - `CredentialView`, what reads return (`view`)

pub mod parameters;
pub mod value;
pub mod version;
pub mod view;

use std::fmt;
use std::str::FromStr;

use crate::errors::CredVaultError;

pub use parameters::{
    CertificateParameters, GenerationParameters, PasswordParameters, RsaParameters,
    SshParameters, UserParameters, DEFAULT_CERTIFICATE_DURATION_DAYS, DEFAULT_KEY_LENGTH,
    DEFAULT_PASSWORD_LENGTH,
};
pub use value::{CertificateValue, CredentialValue, RsaValue, SshValue, UserValue};
pub use version::{CertificateMetadata, CredentialVersion, VersionSummary};
pub use view::CredentialView;

/// Credential types understood by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialType {
    Value,
    Json,
    Password,
    User,
    Rsa,
    Ssh,
    Certificate,
}

impl CredentialType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Value => "value",
            Self::Json => "json",
            Self::Password => "password",
            Self::User => "user",
            Self::Rsa => "rsa",
            Self::Ssh => "ssh",
            Self::Certificate => "certificate",
        }
    }
}

impl fmt::Display for CredentialType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CredentialType {
    type Err = CredVaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "value" => Ok(Self::Value),
            "json" => Ok(Self::Json),
            "password" => Ok(Self::Password),
            "user" => Ok(Self::User),
            "rsa" => Ok(Self::Rsa),
            "ssh" => Ok(Self::Ssh),
            "certificate" => Ok(Self::Certificate),
            other => Err(CredVaultError::CommandFailed(format!(
                "unknown credential type '{other}'"
            ))),
        }
    }
}

/// Validate a credential name.
///
/// Names are path-like (`/team/db-password`): ASCII letters, digits, and
/// `_ - . /`, non-empty, at most 1024 characters, no `//`.
pub fn validate_name(name: &str) -> crate::errors::Result<()> {
    if name.is_empty() {
        return Err(CredVaultError::CommandFailed(
            "credential name cannot be empty".into(),
        ));
    }
    if name.len() > 1024 {
        return Err(CredVaultError::CommandFailed(
            "credential name cannot exceed 1024 characters".into(),
        ));
    }
    if !name
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-' | b'.' | b'/'))
    {
        return Err(CredVaultError::CommandFailed(format!(
            "credential name '{name}' contains invalid characters (allowed: ASCII letters, digits, '_', '-', '.', '/')"
        )));
    }
    if name.contains("//") {
        return Err(CredVaultError::CommandFailed(format!(
            "credential name '{name}' cannot contain '//'"
        )));
    }
    Ok(())
}
