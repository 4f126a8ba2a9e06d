//! `EncryptionKeySet`: the registry of configured encryption keys.
//!
//! Built once at startup from [`Settings`] and shared behind an `Arc`.
//! Nothing mutates it afterwards, so concurrent requests read it without
//! locking.  New ciphertext is always produced with the active key;
//! decryption accepts any known key.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::{KeySpec, Settings};
use crate::crypto::KeyProxy;
use crate::encoding::{base64_decode, base64_encode};
use crate::errors::{CredVaultError, Result};

/// A ciphertext tagged with the id of the key that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedValue {
    pub encryption_key_id: Uuid,

    #[serde(serialize_with = "base64_encode", deserialize_with = "base64_decode")]
    pub cipher_text: Vec<u8>,

    #[serde(serialize_with = "base64_encode", deserialize_with = "base64_decode")]
    pub nonce: Vec<u8>,
}

/// One configured key: stable id, its proxy, and whether it is active.
#[derive(Debug)]
pub struct EncryptionKey {
    id: Uuid,
    proxy: KeyProxy,
    active: bool,
}

impl EncryptionKey {
    pub fn new(id: Uuid, proxy: KeyProxy, active: bool) -> Self {
        Self { id, proxy, active }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn proxy(&self) -> &KeyProxy {
        &self.proxy
    }

    pub fn is_active(&self) -> bool {
        self.active
    }
}

/// All configured encryption keys, exactly one of them active.
#[derive(Debug)]
pub struct EncryptionKeySet {
    keys: Vec<EncryptionKey>,
    active_index: usize,
}

impl EncryptionKeySet {
    /// Build the key set from validated settings, deriving every key.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        settings.validate()?;

        let mut keys = Vec::with_capacity(settings.encryption_keys.len());
        for config in &settings.encryption_keys {
            let proxy = match config.spec()? {
                KeySpec::Material(mut material) => {
                    let proxy = KeyProxy::from_material(&material);
                    zeroize::Zeroize::zeroize(&mut material);
                    proxy?
                }
                KeySpec::Password {
                    password,
                    salt,
                    params,
                } => {
                    let password = zeroize::Zeroizing::new(password);
                    KeyProxy::from_password(password.as_bytes(), &salt, &params)?
                }
            };
            debug!(key_id = %config.id, active = config.active, "encryption key loaded");
            keys.push(EncryptionKey::new(config.id, proxy, config.active));
        }

        let set = Self::new(keys)?;
        info!(
            active_key = %set.active_id(),
            known_keys = set.keys.len(),
            "encryption key set ready"
        );
        Ok(set)
    }

    /// Build a key set from already-constructed keys.
    ///
    /// Fails unless ids are unique and exactly one key is active.
    pub fn new(keys: Vec<EncryptionKey>) -> Result<Self> {
        let mut seen = HashSet::new();
        if let Some(dup) = keys.iter().find(|k| !seen.insert(k.id)) {
            return Err(CredVaultError::ConfigError(format!(
                "encryption key {} is configured twice",
                dup.id
            )));
        }

        let active: Vec<usize> = keys
            .iter()
            .enumerate()
            .filter(|(_, k)| k.active)
            .map(|(i, _)| i)
            .collect();
        if active.len() != 1 {
            return Err(CredVaultError::ConfigError(format!(
                "exactly one encryption key must be active (found {})",
                active.len()
            )));
        }

        Ok(Self {
            keys,
            active_index: active[0],
        })
    }

    pub fn active(&self) -> &EncryptionKey {
        &self.keys[self.active_index]
    }

    pub fn active_id(&self) -> Uuid {
        self.active().id
    }

    /// Ids of every configured key (active and legacy).
    pub fn known_ids(&self) -> HashSet<Uuid> {
        self.keys.iter().map(|k| k.id).collect()
    }

    /// Ids of configured keys other than the active one.
    pub fn inactive_ids(&self) -> Vec<Uuid> {
        self.keys
            .iter()
            .filter(|k| !k.active)
            .map(|k| k.id)
            .collect()
    }

    pub fn get(&self, id: &Uuid) -> Option<&EncryptionKey> {
        self.keys.iter().find(|k| k.id == *id)
    }

    pub fn keys(&self) -> &[EncryptionKey] {
        &self.keys
    }

    /// Encrypt `plaintext` for the credential version `version_id` with the
    /// active key.
    pub fn encrypt(&self, plaintext: &[u8], version_id: Uuid) -> Result<EncryptedValue> {
        let key = self.active();
        encrypt_with(key, plaintext, version_id)
    }

    /// Decrypt a value with whichever known key produced it.
    ///
    /// Fails with [`CredVaultError::UnknownEncryptionKey`] when the value's
    /// key id is not configured.
    pub fn decrypt(&self, value: &EncryptedValue, version_id: Uuid) -> Result<Vec<u8>> {
        let key = self
            .get(&value.encryption_key_id)
            .ok_or(CredVaultError::UnknownEncryptionKey(value.encryption_key_id))?;
        key.proxy
            .decrypt(&value.cipher_text, &value.nonce, version_id.as_bytes())
    }
}

/// Encrypt under a specific key; used for new values and for canaries.
pub(crate) fn encrypt_with(
    key: &EncryptionKey,
    plaintext: &[u8],
    aad_id: Uuid,
) -> Result<EncryptedValue> {
    let sealed = key.proxy.encrypt(plaintext, aad_id.as_bytes())?;
    Ok(EncryptedValue {
        encryption_key_id: key.id,
        cipher_text: sealed.cipher_text,
        nonce: sealed.nonce.to_vec(),
    })
}
