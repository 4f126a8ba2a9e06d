//! Credential version storage.
//!
//! The core talks to storage only through [`CredentialVersionStore`].
//! Every method is individually atomic; the transitional-flag writes do
//! their check-and-set inside the store's critical section so two callers
//! can never both end up holding the flag.
//!
//! "Newest" always means most recently appended, not `created_at`.

pub mod memory;
#[cfg(feature = "sqlite-store")]
pub mod sqlite;

use std::collections::HashMap;

use uuid::Uuid;

use crate::credential::CredentialVersion;
use crate::errors::{CredVaultError, Result};
use crate::keys::{EncryptedValue, KeyCanary};

pub use memory::MemoryStore;
#[cfg(feature = "sqlite-store")]
pub use sqlite::SqliteStore;

pub trait CredentialVersionStore: Send + Sync {
    /// Number of stored versions per encryption key id.
    fn count_versions_by_encryption_key(&self) -> Result<HashMap<Uuid, i64>>;

    /// Newest non-transitional version of `name`.
    fn find_current_version(&self, name: &str) -> Result<Option<CredentialVersion>>;

    fn find_transitional_version(&self, name: &str) -> Result<Option<CredentialVersion>>;

    fn find_version(&self, version_id: Uuid) -> Result<Option<CredentialVersion>>;

    /// All versions of `name`, newest first.
    fn find_versions(&self, name: &str) -> Result<Vec<CredentialVersion>>;

    /// Current version of every credential whose current version names
    /// `ca_name` as its signer, ordered by credential name.
    fn find_versions_signed_by(&self, ca_name: &str) -> Result<Vec<CredentialVersion>>;

    /// Append a new version.
    ///
    /// A version appended already flagged transitional fails with
    /// `TransitionalVersionConflict` if its credential has one.
    fn append_version(&self, version: &CredentialVersion) -> Result<()>;

    /// Flag `previous` transitional and append `version` as the new
    /// current version, in one step.
    ///
    /// Fails with `TransitionalVersionConflict`, leaving the store
    /// untouched, if `previous` is no longer current or the credential
    /// already has a transitional version. See [`check_replace_current`].
    fn append_replacing_current(&self, previous: Uuid, version: &CredentialVersion) -> Result<()>;

    /// Flag `version_id` transitional. See [`check_set_transitional`].
    fn set_transitional(&self, credential_id: Uuid, version_id: Uuid) -> Result<()>;

    /// Clear the flag. Returns whether a flag was set.
    fn clear_transitional(&self, credential_id: Uuid) -> Result<bool>;

    /// Move the flag from `expected` to `new` in one step.
    ///
    /// Fails with `TransitionalVersionConflict` if `expected` no longer
    /// holds the flag.
    fn swap_transitional(&self, credential_id: Uuid, expected: Uuid, new: Uuid) -> Result<()>;

    /// Up to `limit` versions encrypted under any of `key_ids`, oldest first.
    fn find_versions_encrypted_with(
        &self,
        key_ids: &[Uuid],
        limit: usize,
    ) -> Result<Vec<CredentialVersion>>;

    /// Replace a version's ciphertext if it is still encrypted under
    /// `expected_key_id`. Returns `false` when it was not.
    fn update_encrypted_value(
        &self,
        version_id: Uuid,
        expected_key_id: Uuid,
        value: &EncryptedValue,
    ) -> Result<bool>;

    fn find_canary(&self, key_id: Uuid) -> Result<Option<KeyCanary>>;

    /// Insert or replace the canary for its key id.
    fn save_canary(&self, canary: &KeyCanary) -> Result<()>;
}

/// Validate flagging `version_id` among the versions of one credential.
///
/// Returns `Ok(true)` when the version already holds the flag. Both
/// stores run this inside their critical section.
pub(crate) fn check_set_transitional<'a, I>(versions: I, version_id: Uuid) -> Result<bool>
where
    I: IntoIterator<Item = &'a CredentialVersion>,
{
    let versions: Vec<&CredentialVersion> = versions.into_iter().collect();

    let target = versions
        .iter()
        .find(|v| v.version_id == version_id)
        .ok_or_else(|| CredVaultError::EntryNotFound(format!("version {version_id}")))?;
    if target.certificate.is_none() {
        return Err(CredVaultError::NotACertificate(target.name.clone()));
    }
    if target.is_transitional() {
        return Ok(true);
    }
    if let Some(other) = versions.iter().find(|v| v.is_transitional()) {
        return Err(CredVaultError::TransitionalVersionConflict(format!(
            "'{}' already has transitional version {}",
            other.name, other.version_id
        )));
    }
    Ok(false)
}

/// Validate appending `version` next to the existing versions of its name.
pub(crate) fn check_append<'a, I>(existing: I, version: &CredentialVersion) -> Result<()>
where
    I: IntoIterator<Item = &'a CredentialVersion>,
{
    let mut has_current = false;
    for other in existing {
        if other.version_id == version.version_id {
            return Err(CredVaultError::StoreError(format!(
                "version {} already exists",
                version.version_id
            )));
        }
        if other.name == version.name && other.credential_id != version.credential_id {
            return Err(CredVaultError::StoreError(format!(
                "'{}' belongs to credential {}",
                version.name, other.credential_id
            )));
        }
        if version.is_transitional() && other.is_transitional() {
            return Err(CredVaultError::TransitionalVersionConflict(format!(
                "'{}' already has transitional version {}",
                other.name, other.version_id
            )));
        }
        has_current |= !other.is_transitional();
    }
    if version.is_transitional() && !has_current {
        return Err(CredVaultError::InvalidTransitionalVersion(format!(
            "'{}' would have no current version",
            version.name
        )));
    }
    Ok(())
}

/// Validate replacing the current version of `version.name` with
/// `version`, flagging `previous` transitional.
///
/// `related` holds the versions sharing the new version's name or id, in
/// append order.
pub(crate) fn check_replace_current<'a, I>(
    related: I,
    previous: Uuid,
    version: &CredentialVersion,
) -> Result<()>
where
    I: IntoIterator<Item = &'a CredentialVersion>,
{
    let related: Vec<&CredentialVersion> = related.into_iter().collect();
    check_append(related.iter().copied(), version)?;

    if version.is_transitional() {
        return Err(CredVaultError::InvalidTransitionalVersion(format!(
            "replacement for '{}' must not be transitional",
            version.name
        )));
    }
    if let Some(other) = related.iter().find(|v| v.is_transitional()) {
        return Err(CredVaultError::TransitionalVersionConflict(format!(
            "'{}' already has transitional version {}",
            other.name, other.version_id
        )));
    }
    let current = related
        .iter()
        .rev()
        .find(|v| v.name == version.name && !v.is_transitional());
    match current {
        Some(current) if current.version_id == previous => {
            if current.certificate.is_none() {
                return Err(CredVaultError::NotACertificate(current.name.clone()));
            }
            Ok(())
        }
        _ => Err(CredVaultError::TransitionalVersionConflict(format!(
            "current version of '{}' is no longer {previous}",
            version.name
        ))),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    use crate::credential::{CertificateMetadata, CredentialVersion};
    use crate::keys::EncryptedValue;

    /// A certificate version with dummy ciphertext.
    pub fn cert_version(
        credential_id: Uuid,
        name: &str,
        key_id: Uuid,
        ca_name: Option<&str>,
    ) -> CredentialVersion {
        CredentialVersion {
            credential_id,
            name: name.to_string(),
            version_id: Uuid::new_v4(),
            credential_type: "certificate".into(),
            encrypted_value: EncryptedValue {
                encryption_key_id: key_id,
                cipher_text: vec![1, 2, 3],
                nonce: vec![0; 12],
            },
            created_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            generation_parameters: None,
            certificate: Some(CertificateMetadata {
                transitional: false,
                ca_name: ca_name.map(str::to_string),
                certificate: format!("CERT {name}"),
                expiry_date: Utc.with_ymd_and_hms(2027, 1, 1, 0, 0, 0).unwrap(),
                self_signed: ca_name.is_none(),
                certificate_authority: ca_name.is_none(),
            }),
        }
    }

    pub fn value_version(credential_id: Uuid, name: &str, key_id: Uuid) -> CredentialVersion {
        let mut version = cert_version(credential_id, name, key_id, None);
        version.credential_type = "value".into();
        version.certificate = None;
        version
    }

    pub fn transitional(mut version: CredentialVersion) -> CredentialVersion {
        if let Some(meta) = version.certificate.as_mut() {
            meta.transitional = true;
        }
        version
    }
}

/// Behaviour every store must share. Each store's test module runs these.
#[cfg(test)]
pub(crate) mod contract {
    use uuid::Uuid;

    use super::test_support::{cert_version, transitional, value_version};
    use super::CredentialVersionStore;
    use crate::errors::CredVaultError;
    use crate::keys::{EncryptedValue, KeyCanary};

    pub fn current_is_newest_non_transitional(store: &dyn CredentialVersionStore) {
        let id = Uuid::new_v4();
        let key = Uuid::new_v4();
        let v1 = cert_version(id, "/ca", key, None);
        let v2 = cert_version(id, "/ca", key, None);
        store.append_version(&v1).unwrap();
        store.append_version(&v2).unwrap();

        let current = store.find_current_version("/ca").unwrap().unwrap();
        assert_eq!(current.version_id, v2.version_id);

        let all = store.find_versions("/ca").unwrap();
        let ids: Vec<Uuid> = all.iter().map(|v| v.version_id).collect();
        assert_eq!(ids, vec![v2.version_id, v1.version_id]);

        // Staged: appended transitional, so v2 stays current.
        let v3 = transitional(cert_version(id, "/ca", key, None));
        store.append_version(&v3).unwrap();
        assert_eq!(
            store.find_current_version("/ca").unwrap().unwrap().version_id,
            v2.version_id
        );
        assert_eq!(
            store.find_transitional_version("/ca").unwrap().unwrap().version_id,
            v3.version_id
        );
    }

    pub fn second_transitional_conflicts(store: &dyn CredentialVersionStore) {
        let id = Uuid::new_v4();
        let key = Uuid::new_v4();
        let v1 = cert_version(id, "/ca", key, None);
        let v2 = cert_version(id, "/ca", key, None);
        let v3 = cert_version(id, "/ca", key, None);
        for v in [&v1, &v2, &v3] {
            store.append_version(v).unwrap();
        }

        store.set_transitional(id, v1.version_id).unwrap();
        // Re-flagging the holder is fine.
        store.set_transitional(id, v1.version_id).unwrap();

        let err = store.set_transitional(id, v2.version_id).unwrap_err();
        assert!(matches!(err, CredVaultError::TransitionalVersionConflict(_)));
        assert_eq!(
            store.find_transitional_version("/ca").unwrap().unwrap().version_id,
            v1.version_id
        );

        let staged = transitional(cert_version(id, "/ca", key, None));
        let err = store.append_version(&staged).unwrap_err();
        assert!(matches!(err, CredVaultError::TransitionalVersionConflict(_)));
        assert!(store.find_version(staged.version_id).unwrap().is_none());
    }

    pub fn replace_current(store: &dyn CredentialVersionStore) {
        let id = Uuid::new_v4();
        let key = Uuid::new_v4();
        let v1 = cert_version(id, "/ca", key, None);
        store.append_version(&v1).unwrap();

        let v2 = cert_version(id, "/ca", key, None);
        store.append_replacing_current(v1.version_id, &v2).unwrap();
        assert_eq!(
            store.find_current_version("/ca").unwrap().unwrap().version_id,
            v2.version_id
        );
        assert_eq!(
            store.find_transitional_version("/ca").unwrap().unwrap().version_id,
            v1.version_id
        );

        // v1 is no longer current and already holds the flag.
        let late = cert_version(id, "/ca", key, None);
        let err = store.append_replacing_current(v1.version_id, &late).unwrap_err();
        assert!(matches!(err, CredVaultError::TransitionalVersionConflict(_)));

        // v2 is current, but the flag is still taken.
        let err = store.append_replacing_current(v2.version_id, &late).unwrap_err();
        assert!(matches!(err, CredVaultError::TransitionalVersionConflict(_)));
        assert!(store.find_version(late.version_id).unwrap().is_none());
        assert_eq!(store.find_versions("/ca").unwrap().len(), 2);

        store.clear_transitional(id).unwrap();
        let err = store.append_replacing_current(v1.version_id, &late).unwrap_err();
        assert!(matches!(err, CredVaultError::TransitionalVersionConflict(_)));
        assert!(store.find_transitional_version("/ca").unwrap().is_none());

        let value_id = Uuid::new_v4();
        let plain = value_version(value_id, "/plain", key);
        store.append_version(&plain).unwrap();
        let err = store
            .append_replacing_current(plain.version_id, &value_version(value_id, "/plain", key))
            .unwrap_err();
        assert!(matches!(err, CredVaultError::NotACertificate(_)));
        assert_eq!(store.find_versions("/plain").unwrap().len(), 1);
    }

    pub fn set_transitional_validation(store: &dyn CredentialVersionStore) {
        let id = Uuid::new_v4();
        let key = Uuid::new_v4();
        let only = cert_version(id, "/solo", key, None);
        store.append_version(&only).unwrap();

        let err = store.set_transitional(id, Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, CredVaultError::EntryNotFound(_)));

        let value_id = Uuid::new_v4();
        let plain = value_version(value_id, "/plain", key);
        store
            .append_version(&value_version(value_id, "/plain", key))
            .unwrap();
        store.append_version(&plain).unwrap();
        let err = store.set_transitional(value_id, plain.version_id).unwrap_err();
        assert!(matches!(err, CredVaultError::NotACertificate(_)));
    }

    pub fn clear_and_swap(store: &dyn CredentialVersionStore) {
        let id = Uuid::new_v4();
        let key = Uuid::new_v4();
        assert!(!store.clear_transitional(id).unwrap());

        let old = cert_version(id, "/ca", key, None);
        store.append_version(&old).unwrap();
        let staged = transitional(cert_version(id, "/ca", key, None));
        store.append_version(&staged).unwrap();

        let err = store
            .swap_transitional(id, old.version_id, staged.version_id)
            .unwrap_err();
        assert!(matches!(err, CredVaultError::TransitionalVersionConflict(_)));

        store
            .swap_transitional(id, staged.version_id, old.version_id)
            .unwrap();
        assert_eq!(
            store.find_current_version("/ca").unwrap().unwrap().version_id,
            staged.version_id
        );
        assert_eq!(
            store.find_transitional_version("/ca").unwrap().unwrap().version_id,
            old.version_id
        );

        assert!(store.clear_transitional(id).unwrap());
        assert!(store.find_transitional_version("/ca").unwrap().is_none());
    }

    pub fn signed_by_uses_current_versions(store: &dyn CredentialVersionStore) {
        let key = Uuid::new_v4();
        store
            .append_version(&cert_version(Uuid::new_v4(), "/ca", key, None))
            .unwrap();
        store
            .append_version(&cert_version(Uuid::new_v4(), "/b-leaf", key, Some("/ca")))
            .unwrap();
        store
            .append_version(&cert_version(Uuid::new_v4(), "/a-leaf", key, Some("/ca")))
            .unwrap();

        // Re-signed by another CA since; no longer a child of /ca.
        let moved = Uuid::new_v4();
        store
            .append_version(&cert_version(moved, "/moved", key, Some("/ca")))
            .unwrap();
        store
            .append_version(&cert_version(moved, "/moved", key, Some("/other-ca")))
            .unwrap();

        let names: Vec<String> = store
            .find_versions_signed_by("/ca")
            .unwrap()
            .into_iter()
            .map(|v| v.name)
            .collect();
        assert_eq!(names, vec!["/a-leaf", "/b-leaf"]);
    }

    pub fn counts_and_reencryption(store: &dyn CredentialVersionStore) {
        let old_key = Uuid::new_v4();
        let new_key = Uuid::new_v4();
        let a = value_version(Uuid::new_v4(), "/a", old_key);
        let b = value_version(Uuid::new_v4(), "/b", old_key);
        let c = value_version(Uuid::new_v4(), "/c", new_key);
        for v in [&a, &b, &c] {
            store.append_version(v).unwrap();
        }

        let counts = store.count_versions_by_encryption_key().unwrap();
        assert_eq!(counts.get(&old_key), Some(&2));
        assert_eq!(counts.get(&new_key), Some(&1));

        let page = store.find_versions_encrypted_with(&[old_key], 1).unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].version_id, a.version_id);

        let fresh = EncryptedValue {
            encryption_key_id: new_key,
            cipher_text: vec![9, 9],
            nonce: vec![1; 12],
        };
        assert!(store
            .update_encrypted_value(a.version_id, old_key, &fresh)
            .unwrap());
        // Compare fails once the key changed.
        assert!(!store
            .update_encrypted_value(a.version_id, old_key, &fresh)
            .unwrap());

        let stored = store.find_version(a.version_id).unwrap().unwrap();
        assert_eq!(stored.encrypted_value, fresh);

        let rest = store.find_versions_encrypted_with(&[old_key], 10).unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].version_id, b.version_id);
        assert!(store.find_versions_encrypted_with(&[], 10).unwrap().is_empty());
    }

    pub fn canaries(store: &dyn CredentialVersionStore) {
        let key = Uuid::new_v4();
        assert!(store.find_canary(key).unwrap().is_none());

        let canary = KeyCanary {
            encrypted_value: EncryptedValue {
                encryption_key_id: key,
                cipher_text: vec![4, 5, 6],
                nonce: vec![2; 12],
            },
        };
        store.save_canary(&canary).unwrap();
        assert_eq!(store.find_canary(key).unwrap(), Some(canary.clone()));

        let replaced = KeyCanary {
            encrypted_value: EncryptedValue {
                cipher_text: vec![7],
                ..canary.encrypted_value
            },
        };
        store.save_canary(&replaced).unwrap();
        assert_eq!(store.find_canary(key).unwrap(), Some(replaced));
    }

    pub fn name_belongs_to_one_credential(store: &dyn CredentialVersionStore) {
        let key = Uuid::new_v4();
        store
            .append_version(&value_version(Uuid::new_v4(), "/taken", key))
            .unwrap();
        let err = store
            .append_version(&value_version(Uuid::new_v4(), "/taken", key))
            .unwrap_err();
        assert!(matches!(err, CredVaultError::StoreError(_)));
    }

    pub fn run_all<S: CredentialVersionStore>(make: impl Fn() -> S) {
        current_is_newest_non_transitional(&make());
        second_transitional_conflicts(&make());
        replace_current(&make());
        set_transitional_validation(&make());
        clear_and_swap(&make());
        signed_by_uses_current_versions(&make());
        counts_and_reencryption(&make());
        canaries(&make());
        name_belongs_to_one_credential(&make());
    }
}
