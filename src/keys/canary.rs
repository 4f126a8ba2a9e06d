//! Key canaries.
//!
//! Each configured key id gets one known plaintext encrypted under it.
//! If the material behind an id is ever changed, the canary stops
//! decrypting and startup fails instead of producing ciphertext that
//! older values can't be told apart from.

use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use tracing::{debug, info};
use uuid::Uuid;

use super::key_set::{encrypt_with, EncryptedValue, EncryptionKeySet};
use crate::errors::{CredVaultError, Result};
use crate::store::CredentialVersionStore;

const CANARY_PLAINTEXT: &[u8] = b"credvault key canary v1";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyCanary {
    pub encrypted_value: EncryptedValue,
}

impl KeyCanary {
    pub fn key_id(&self) -> Uuid {
        self.encrypted_value.encryption_key_id
    }
}

/// Check every configured key against its stored canary.
///
/// Missing canaries are created. Returns how many were created.
pub fn verify_canaries(
    key_set: &EncryptionKeySet,
    store: &dyn CredentialVersionStore,
) -> Result<usize> {
    let mut created = 0;

    for key in key_set.keys() {
        let id = key.id();
        match store.find_canary(id)? {
            Some(canary) => {
                let plaintext = key
                    .proxy()
                    .decrypt(
                        &canary.encrypted_value.cipher_text,
                        &canary.encrypted_value.nonce,
                        id.as_bytes(),
                    )
                    .map_err(|_| CredVaultError::KeyCanaryMismatch(id))?;
                if !bool::from(plaintext.as_slice().ct_eq(CANARY_PLAINTEXT)) {
                    return Err(CredVaultError::KeyCanaryMismatch(id));
                }
                debug!(key_id = %id, "key canary verified");
            }
            None => {
                let encrypted_value = encrypt_with(key, CANARY_PLAINTEXT, id)?;
                store.save_canary(&KeyCanary { encrypted_value })?;
                info!(key_id = %id, "created key canary");
                created += 1;
            }
        }
    }

    Ok(created)
}
