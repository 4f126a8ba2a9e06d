//! Decrypted credential payloads.
//!
//! A `CredentialValue` is serialized to JSON and encrypted as a whole; the
//! plaintext never reaches the store.

use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use super::CredentialType;
use crate::errors::{CredVaultError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserValue {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RsaValue {
    pub public_key: String,
    pub private_key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SshValue {
    pub public_key: String,
    pub private_key: String,
    pub public_key_fingerprint: String,
}

/// Certificate material.
///
/// `ca` is never stored; reads fill it in from the signing CA.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CertificateValue {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca: Option<String>,
    pub certificate: String,
    pub private_key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum CredentialValue {
    Value(String),
    Json(serde_json::Value),
    Password(String),
    User(UserValue),
    Rsa(RsaValue),
    Ssh(SshValue),
    Certificate(CertificateValue),
}

impl CredentialValue {
    pub fn credential_type(&self) -> CredentialType {
        match self {
            Self::Value(_) => CredentialType::Value,
            Self::Json(_) => CredentialType::Json,
            Self::Password(_) => CredentialType::Password,
            Self::User(_) => CredentialType::User,
            Self::Rsa(_) => CredentialType::Rsa,
            Self::Ssh(_) => CredentialType::Ssh,
            Self::Certificate(_) => CredentialType::Certificate,
        }
    }

    /// Serialize for encryption.
    pub fn to_plaintext(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self)
            .map_err(|e| CredVaultError::SerializationError(format!("credential value: {e}")))
    }

    /// Parse decrypted bytes, wiping them afterwards.
    pub fn from_plaintext(mut bytes: Vec<u8>) -> Result<Self> {
        let parsed = serde_json::from_slice(&bytes)
            .map_err(|e| CredVaultError::SerializationError(format!("credential value: {e}")));
        bytes.zeroize();
        parsed
    }
}
