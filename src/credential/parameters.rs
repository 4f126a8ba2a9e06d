//! Non-secret generation metadata stored next to each generated version.
//!
//! Regeneration rebuilds its request from these parameters alone, so a new
//! RSA key has the same length as the old one without anything reading the
//! old key.

use serde::{Deserialize, Serialize};

pub const DEFAULT_PASSWORD_LENGTH: usize = 30;
pub const DEFAULT_KEY_LENGTH: u32 = 2048;
pub const DEFAULT_CERTIFICATE_DURATION_DAYS: u32 = 365;

/// Accepted RSA key lengths.
pub const KEY_LENGTHS: [u32; 3] = [2048, 3072, 4096];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordParameters {
    #[serde(default = "default_password_length")]
    pub length: usize,
    #[serde(default)]
    pub exclude_upper: bool,
    #[serde(default)]
    pub exclude_lower: bool,
    #[serde(default)]
    pub exclude_number: bool,
    #[serde(default)]
    pub include_special: bool,
}

fn default_password_length() -> usize {
    DEFAULT_PASSWORD_LENGTH
}

impl Default for PasswordParameters {
    fn default() -> Self {
        Self {
            length: DEFAULT_PASSWORD_LENGTH,
            exclude_upper: false,
            exclude_lower: false,
            exclude_number: false,
            include_special: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserParameters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default)]
    pub password: PasswordParameters,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RsaParameters {
    #[serde(default = "default_key_length")]
    pub key_length: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SshParameters {
    #[serde(default = "default_key_length")]
    pub key_length: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssh_comment: Option<String>,
}

fn default_key_length() -> u32 {
    DEFAULT_KEY_LENGTH
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateParameters {
    pub common_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locality: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    /// DNS names or IP addresses.
    #[serde(default)]
    pub alternative_names: Vec<String>,
    #[serde(default = "default_key_length")]
    pub key_length: u32,
    #[serde(default = "default_duration")]
    pub duration_days: u32,
    /// Name of the signing CA credential; `None` for self-signed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca: Option<String>,
    #[serde(default)]
    pub is_ca: bool,
    #[serde(default)]
    pub self_sign: bool,
}

fn default_duration() -> u32 {
    DEFAULT_CERTIFICATE_DURATION_DAYS
}

impl CertificateParameters {
    pub fn new(common_name: impl Into<String>) -> Self {
        Self {
            common_name: common_name.into(),
            organization: None,
            organization_unit: None,
            locality: None,
            state: None,
            country: None,
            alternative_names: Vec::new(),
            key_length: DEFAULT_KEY_LENGTH,
            duration_days: DEFAULT_CERTIFICATE_DURATION_DAYS,
            ca: None,
            is_ca: false,
            self_sign: false,
        }
    }

    /// Self-signed unless a CA is named.
    pub fn is_self_signed(&self) -> bool {
        self.ca.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GenerationParameters {
    Password(PasswordParameters),
    User(UserParameters),
    Rsa(RsaParameters),
    Ssh(SshParameters),
    Certificate(CertificateParameters),
}
