use std::collections::HashSet;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::crypto::kdf::Argon2Params;
use crate::errors::{CredVaultError, Result};

/// Deployment configuration, loaded from `credvault.toml`.
///
/// Built once at process start and shared read-only.  Every field except
/// the key list has a sensible default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Directory (relative to the config file) holding the credential database.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Return current + transitional CA bodies as one chain on leaf reads.
    #[serde(default)]
    pub concatenate_cas: bool,

    /// Default tracing filter when `CREDVAULT_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// How many versions the key rotator re-encrypts per batch.
    #[serde(default = "default_rotation_batch_size")]
    pub rotation_batch_size: usize,

    /// Configured encryption keys; exactly one must be active.
    #[serde(default)]
    pub encryption_keys: Vec<EncryptionKeyConfig>,
}

/// One configured encryption key.
///
/// Either `key_material` (base64) or `encryption_password` + `salt`
/// (base64) must be set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptionKeyConfig {
    pub id: Uuid,

    #[serde(default)]
    pub active: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_material: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encryption_password: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salt: Option<String>,

    #[serde(default)]
    pub argon2: Argon2Params,
}

/// Decoded form of an [`EncryptionKeyConfig`].
pub enum KeySpec {
    Material(Vec<u8>),
    Password {
        password: String,
        salt: Vec<u8>,
        params: Argon2Params,
    },
}

// ── Serde default helpers ────────────────────────────────────────────

fn default_data_dir() -> String {
    ".credvault".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_rotation_batch_size() -> usize {
    50
}

// ── Implementation ───────────────────────────────────────────────────

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            concatenate_cas: false,
            log_level: default_log_level(),
            rotation_batch_size: default_rotation_batch_size(),
            encryption_keys: Vec::new(),
        }
    }
}

impl Settings {
    /// Default name of the config file.
    pub const FILE_NAME: &'static str = "credvault.toml";

    /// Load settings from `path`.
    ///
    /// If the file does not exist, defaults (with no keys) are returned.
    /// If the file exists it must parse and pass [`Settings::validate`].
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let settings = Self::from_toml_str(&contents).map_err(|e| match e {
            CredVaultError::ConfigError(msg) => {
                CredVaultError::ConfigError(format!("{}: {msg}", path.display()))
            }
            other => other,
        })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Parse settings from TOML text without validating the key list.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents)
            .map_err(|e| CredVaultError::ConfigError(format!("failed to parse settings: {e}")))
    }

    /// Check the key list: at least one key, unique ids, exactly one
    /// active, and every key fully specified.
    pub fn validate(&self) -> Result<()> {
        if self.encryption_keys.is_empty() {
            return Err(CredVaultError::ConfigError(
                "no encryption keys configured".into(),
            ));
        }

        let mut seen = HashSet::new();
        for key in &self.encryption_keys {
            if !seen.insert(key.id) {
                return Err(CredVaultError::ConfigError(format!(
                    "encryption key {} is configured twice",
                    key.id
                )));
            }
            key.spec()?;
        }

        let active = self.encryption_keys.iter().filter(|k| k.active).count();
        if active != 1 {
            return Err(CredVaultError::ConfigError(format!(
                "exactly one encryption key must be active (found {active})"
            )));
        }

        if self.rotation_batch_size == 0 {
            return Err(CredVaultError::ConfigError(
                "rotation_batch_size must be at least 1".into(),
            ));
        }

        Ok(())
    }

    /// Resolve the data directory against the directory holding the config.
    pub fn data_path(&self, base_dir: &Path) -> PathBuf {
        base_dir.join(&self.data_dir)
    }
}

impl EncryptionKeyConfig {
    /// Decode the configured key source.
    pub fn spec(&self) -> Result<KeySpec> {
        match (&self.key_material, &self.encryption_password) {
            (Some(material), None) => {
                let bytes = BASE64.decode(material).map_err(|e| {
                    CredVaultError::ConfigError(format!(
                        "key {}: key_material is not valid base64: {e}",
                        self.id
                    ))
                })?;
                Ok(KeySpec::Material(bytes))
            }
            (None, Some(password)) => {
                let salt = self.salt.as_deref().ok_or_else(|| {
                    CredVaultError::ConfigError(format!(
                        "key {}: password-derived keys need a fixed salt",
                        self.id
                    ))
                })?;
                let salt = BASE64.decode(salt).map_err(|e| {
                    CredVaultError::ConfigError(format!(
                        "key {}: salt is not valid base64: {e}",
                        self.id
                    ))
                })?;
                Ok(KeySpec::Password {
                    password: password.clone(),
                    salt,
                    params: self.argon2,
                })
            }
            (Some(_), Some(_)) => Err(CredVaultError::ConfigError(format!(
                "key {}: set either key_material or encryption_password, not both",
                self.id
            ))),
            (None, None) => Err(CredVaultError::ConfigError(format!(
                "key {}: missing key_material or encryption_password",
                self.id
            ))),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const TWO_KEYS: &str = r#"
concatenate_cas = true

[[encryption_keys]]
id = "6b1f3c7e-0d7a-4a6e-9a55-0f1b7c2d9e01"
active = true
key_material = "MDEyMzQ1Njc4OWFiY2RlZjAxMjM0NTY3ODlhYmNkZWY="

[[encryption_keys]]
id = "0c0ffee0-1111-4222-8333-944455556666"
encryption_password = "correct horse battery staple"
salt = "c2FsdHNhbHRzYWx0c2FsdA=="

[encryption_keys.argon2]
memory_kib = 8192
iterations = 1
parallelism = 1
"#;

    #[test]
    fn default_settings_are_sensible() {
        let s = Settings::default();
        assert_eq!(s.data_dir, ".credvault");
        assert!(!s.concatenate_cas);
        assert_eq!(s.log_level, "info");
        assert_eq!(s.rotation_batch_size, 50);
        assert!(s.encryption_keys.is_empty());
    }

    #[test]
    fn load_returns_defaults_when_no_config_file() {
        let tmp = TempDir::new().unwrap();
        let settings = Settings::load(&tmp.path().join(Settings::FILE_NAME)).unwrap();
        assert!(settings.encryption_keys.is_empty());
    }

    #[test]
    fn load_parses_toml_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(Settings::FILE_NAME);
        fs::write(&path, TWO_KEYS).unwrap();

        let settings = Settings::load(&path).unwrap();
        assert!(settings.concatenate_cas);
        assert_eq!(settings.encryption_keys.len(), 2);
        assert!(settings.encryption_keys[0].active);
        assert_eq!(settings.encryption_keys[1].argon2.iterations, 1);
        assert!(matches!(
            settings.encryption_keys[1].spec().unwrap(),
            KeySpec::Password { .. }
        ));
    }

    #[test]
    fn load_errors_on_invalid_toml() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(Settings::FILE_NAME);
        fs::write(&path, "not valid {{toml").unwrap();
        assert!(Settings::load(&path).is_err());
    }

    #[test]
    fn validate_requires_exactly_one_active_key() {
        let mut settings = Settings::from_toml_str(TWO_KEYS).unwrap();
        settings.encryption_keys[1].active = true;
        assert!(settings.validate().is_err());

        settings.encryption_keys[0].active = false;
        settings.encryption_keys[1].active = false;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn validate_rejects_duplicate_ids() {
        let mut settings = Settings::from_toml_str(TWO_KEYS).unwrap();
        settings.encryption_keys[1].id = settings.encryption_keys[0].id;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn password_key_without_salt_is_rejected() {
        let mut settings = Settings::from_toml_str(TWO_KEYS).unwrap();
        settings.encryption_keys[1].salt = None;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn data_path_is_relative_to_base_dir() {
        let s = Settings::default();
        assert_eq!(
            s.data_path(Path::new("/srv/credvault")),
            PathBuf::from("/srv/credvault/.credvault")
        );
    }
}
