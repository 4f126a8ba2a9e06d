//! CLI module — Clap argument parser, output helpers, and command implementations.

pub mod commands;
pub mod output;

use std::path::{Path, PathBuf};

use clap::Parser;
use uuid::Uuid;

use crate::config::Settings;
use crate::credential::{
    CertificateParameters, CredentialType, GenerationParameters, PasswordParameters,
    RsaParameters, SshParameters, UserParameters, DEFAULT_CERTIFICATE_DURATION_DAYS,
    DEFAULT_KEY_LENGTH, DEFAULT_PASSWORD_LENGTH,
};
use crate::errors::{CredVaultError, Result};

/// credvault CLI: versioned credential store.
#[derive(Parser)]
#[command(
    name = "credvault",
    about = "Versioned credential store with key and certificate rotation",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to the config file
    #[arg(
        long,
        env = "CREDVAULT_CONFIG",
        default_value = Settings::FILE_NAME,
        global = true
    )]
    pub config: String,
}

/// All available subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Generate a new version of a credential
    Generate {
        /// Credential name (e.g. /prod/db/password)
        name: String,

        #[command(flatten)]
        args: GenerateArgs,
    },

    /// Store a value you supply as a new version
    Set {
        /// Credential name
        name: String,

        /// Credential type: value, json, password, user, rsa, ssh, certificate
        #[arg(short = 't', long = "type", default_value = "value")]
        credential_type: String,

        /// Value (omit for stdin or an interactive prompt). Structured
        /// types take a JSON object.
        value: Option<String>,
    },

    /// Print the current version of a credential as JSON
    Get {
        /// Credential name
        name: String,

        /// Print this version instead of the current one
        #[arg(long)]
        version_id: Option<Uuid>,
    },

    /// List the versions of a credential, newest first
    Versions {
        /// Credential name
        name: String,
    },

    /// Regenerate a credential from its stored parameters
    Regenerate {
        /// Credential name
        name: String,

        /// Stage the new CA version as transitional instead of current
        #[arg(long)]
        transitional: bool,
    },

    /// Regenerate every certificate signed by a CA, recursively
    BulkRegenerate {
        /// Name of the signing CA
        #[arg(long)]
        signed_by: String,
    },

    /// Manage the transitional version of a certificate
    Transitional {
        #[command(subcommand)]
        action: TransitionalAction,
    },

    /// Show how many versions each class of encryption key protects
    KeyUsage {
        /// Print the counts as JSON
        #[arg(long)]
        json: bool,
    },

    /// Re-encrypt everything under the active encryption key
    RotateKeys,

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for (bash, zsh, fish, powershell)
        shell: String,
    },
}

/// Transitional subcommands.
#[derive(clap::Subcommand)]
pub enum TransitionalAction {
    /// Flag an existing version as transitional
    Set {
        /// Certificate name
        name: String,
        /// Version to flag
        version_id: Uuid,
    },

    /// Clear the transitional flag (no-op if none is set)
    Unset {
        /// Certificate name
        name: String,
    },

    /// Make the transitional version current
    Promote {
        /// Certificate name
        name: String,
    },
}

/// Options for `credvault generate`. Only the ones relevant to `--type`
/// are read.
#[derive(clap::Args, Debug, Default)]
pub struct GenerateArgs {
    /// Credential type: password, user, rsa, ssh, certificate
    #[arg(short = 't', long = "type", default_value = "password")]
    pub credential_type: String,

    // ── password / user ──
    /// Password length
    #[arg(long, default_value_t = DEFAULT_PASSWORD_LENGTH)]
    pub length: usize,
    #[arg(long)]
    pub exclude_upper: bool,
    #[arg(long)]
    pub exclude_lower: bool,
    #[arg(long)]
    pub exclude_number: bool,
    #[arg(long)]
    pub include_special: bool,
    /// Username for user credentials (random if omitted)
    #[arg(long)]
    pub username: Option<String>,

    // ── rsa / ssh / certificate ──
    /// RSA key length: 2048, 3072 or 4096
    #[arg(long, default_value_t = DEFAULT_KEY_LENGTH)]
    pub key_length: u32,
    /// Comment appended to the SSH public key
    #[arg(long)]
    pub ssh_comment: Option<String>,

    // ── certificate ──
    #[arg(long)]
    pub common_name: Option<String>,
    #[arg(long)]
    pub organization: Option<String>,
    #[arg(long)]
    pub organization_unit: Option<String>,
    #[arg(long)]
    pub locality: Option<String>,
    #[arg(long)]
    pub state: Option<String>,
    #[arg(long)]
    pub country: Option<String>,
    /// Subject alternative name (DNS name or IP); repeatable
    #[arg(long = "alternative-name")]
    pub alternative_names: Vec<String>,
    /// Validity in days (at most 100 years)
    #[arg(
        long,
        default_value_t = DEFAULT_CERTIFICATE_DURATION_DAYS,
        value_parser = clap::value_parser!(u32).range(1..=36_500)
    )]
    pub duration: u32,
    /// Name of the signing CA credential
    #[arg(long)]
    pub ca: Option<String>,
    #[arg(long)]
    pub is_ca: bool,
    #[arg(long)]
    pub self_sign: bool,
}

impl GenerateArgs {
    /// Build generation parameters for the requested type.
    pub fn to_parameters(&self) -> Result<GenerationParameters> {
        let password = PasswordParameters {
            length: self.length,
            exclude_upper: self.exclude_upper,
            exclude_lower: self.exclude_lower,
            exclude_number: self.exclude_number,
            include_special: self.include_special,
        };

        match self.credential_type.parse::<CredentialType>()? {
            CredentialType::Password => Ok(GenerationParameters::Password(password)),
            CredentialType::User => Ok(GenerationParameters::User(UserParameters {
                username: self.username.clone(),
                password,
            })),
            CredentialType::Rsa => Ok(GenerationParameters::Rsa(RsaParameters {
                key_length: self.key_length,
            })),
            CredentialType::Ssh => Ok(GenerationParameters::Ssh(SshParameters {
                key_length: self.key_length,
                ssh_comment: self.ssh_comment.clone(),
            })),
            CredentialType::Certificate => {
                let common_name = self.common_name.clone().ok_or_else(|| {
                    CredVaultError::CommandFailed("certificates need --common-name".into())
                })?;
                if self.ca.is_some() && self.self_sign {
                    return Err(CredVaultError::CommandFailed(
                        "--ca and --self-sign are mutually exclusive".into(),
                    ));
                }
                Ok(GenerationParameters::Certificate(CertificateParameters {
                    common_name,
                    organization: self.organization.clone(),
                    organization_unit: self.organization_unit.clone(),
                    locality: self.locality.clone(),
                    state: self.state.clone(),
                    country: self.country.clone(),
                    alternative_names: self.alternative_names.clone(),
                    key_length: self.key_length,
                    duration_days: self.duration,
                    ca: self.ca.clone(),
                    is_ca: self.is_ca,
                    self_sign: self.self_sign,
                }))
            }
            other => Err(CredVaultError::CommandFailed(format!(
                "'{other}' credentials cannot be generated; use `credvault set`"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Shared helpers used by multiple commands
// ---------------------------------------------------------------------------

/// Path of the config file from the CLI arguments.
pub fn config_path(cli: &Cli) -> PathBuf {
    PathBuf::from(&cli.config)
}

/// Directory the config's relative `data_dir` is resolved against.
pub fn base_dir(cli: &Cli) -> PathBuf {
    match Path::new(&cli.config).parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Load settings from the configured path.
pub fn load_settings(cli: &Cli) -> Result<Settings> {
    Settings::load(&config_path(cli))
}

/// Open the SQLite-backed service described by the config file.
#[cfg(feature = "sqlite-store")]
pub fn open_service(
    cli: &Cli,
    settings: &Settings,
) -> Result<crate::service::CredentialService> {
    crate::service::CredentialService::open(settings, &base_dir(cli))
}
