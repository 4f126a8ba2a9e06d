//! Re-encryption of stored versions under the active key.

use std::collections::HashSet;

use tracing::{info, warn};
use uuid::Uuid;

use super::key_set::EncryptionKeySet;
use super::usage::classify;
use crate::errors::{CredVaultError, Result};
use crate::store::CredentialVersionStore;

/// Outcome of one rotation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RotationSummary {
    pub reencrypted: usize,
    /// Versions that could not be decrypted and were left alone.
    pub skipped: usize,
    /// Versions under key ids that are not configured (never touched).
    pub unknown: i64,
}

/// Moves ciphertext from known inactive keys to the active key.
pub struct EncryptionKeyRotator<'a> {
    store: &'a dyn CredentialVersionStore,
    key_set: &'a EncryptionKeySet,
    batch_size: usize,
}

impl<'a> EncryptionKeyRotator<'a> {
    pub fn new(
        store: &'a dyn CredentialVersionStore,
        key_set: &'a EncryptionKeySet,
        batch_size: usize,
    ) -> Self {
        Self {
            store,
            key_set,
            batch_size: batch_size.max(1),
        }
    }

    /// Re-encrypt every version under a known inactive key.
    ///
    /// Each write compares on the old key id, so a concurrent rotation
    /// can't be overwritten. Versions that fail to decrypt are skipped
    /// and reported, and the pass moves on.
    pub fn rotate(&self) -> Result<RotationSummary> {
        let inactive = self.key_set.inactive_ids();
        let mut summary = RotationSummary {
            unknown: classify(self.key_set, &self.store.count_versions_by_encryption_key()?)
                .unknown_key_count,
            ..RotationSummary::default()
        };
        if summary.unknown > 0 {
            warn!(
                versions = summary.unknown,
                "versions under unconfigured keys left untouched"
            );
        }
        if inactive.is_empty() {
            return Ok(summary);
        }

        let mut passed_over: HashSet<Uuid> = HashSet::new();
        loop {
            let batch = self
                .store
                .find_versions_encrypted_with(&inactive, self.batch_size + passed_over.len())?;
            let pending: Vec<_> = batch
                .into_iter()
                .filter(|v| !passed_over.contains(&v.version_id))
                .collect();
            if pending.is_empty() {
                break;
            }

            for version in pending {
                let old_key = version.encryption_key_id();
                let rotated = self
                    .key_set
                    .decrypt(&version.encrypted_value, version.version_id)
                    .and_then(|mut plaintext| {
                        let value = self.key_set.encrypt(&plaintext, version.version_id);
                        zeroize::Zeroize::zeroize(&mut plaintext);
                        value
                    });

                match rotated {
                    Ok(value) => {
                        if self
                            .store
                            .update_encrypted_value(version.version_id, old_key, &value)?
                        {
                            summary.reencrypted += 1;
                        } else {
                            passed_over.insert(version.version_id);
                        }
                    }
                    Err(CredVaultError::DecryptionFailed) => {
                        warn!(
                            version_id = %version.version_id,
                            key_id = %old_key,
                            "could not decrypt version; skipped"
                        );
                        summary.skipped += 1;
                        passed_over.insert(version.version_id);
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        info!(
            reencrypted = summary.reencrypted,
            skipped = summary.skipped,
            active_key = %self.key_set.active_id(),
            "encryption key rotation finished"
        );
        Ok(summary)
    }
}
