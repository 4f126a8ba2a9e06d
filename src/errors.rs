use std::path::PathBuf;

use thiserror::Error;
use uuid::Uuid;

/// All errors that can occur in credvault.
#[derive(Debug, Error)]
pub enum CredVaultError {
    // --- Crypto errors ---
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed — wrong key or corrupted data")]
    DecryptionFailed,

    #[error("Key derivation failed: {0}")]
    KeyDerivationFailed(String),

    #[error("Value is encrypted with unknown encryption key {0}")]
    UnknownEncryptionKey(Uuid),

    #[error("Encryption key {0} does not match its canary (key material changed under a stable id)")]
    KeyCanaryMismatch(Uuid),

    // --- Credential errors ---
    #[error("Not found: {0}")]
    EntryNotFound(String),

    #[error("Credential '{0}' is not a certificate")]
    NotACertificate(String),

    #[error("Transitional version conflict: {0}")]
    TransitionalVersionConflict(String),

    #[error("Invalid transitional version: {0}")]
    InvalidTransitionalVersion(String),

    #[error("Credentials of type '{0}' cannot be regenerated")]
    UnsupportedRegeneration(String),

    #[error("Credential '{0}' was not generated and cannot be regenerated")]
    NonGeneratedCredential(String),

    #[error("Signing CA '{0}' could not be found")]
    SigningCaMissing(String),

    #[error("Generation failed: {0}")]
    GenerationFailed(String),

    // --- Store errors ---
    #[error("Credential store error: {0}")]
    StoreError(String),

    // --- Config errors ---
    #[error("Config file error: {0}")]
    ConfigError(String),

    #[error("Config file not found at {0}")]
    ConfigNotFound(PathBuf),

    // --- IO errors ---
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // --- Serialization errors ---
    #[error("Serialization error: {0}")]
    SerializationError(String),

    // --- CLI errors ---
    #[error("Command failed: {0}")]
    CommandFailed(String),
}

/// Convenience type alias for credvault results.
pub type Result<T> = std::result::Result<T, CredVaultError>;
