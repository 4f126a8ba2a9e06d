//! In-memory store. One mutex guards all state.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use uuid::Uuid;

use super::{check_append, check_replace_current, check_set_transitional, CredentialVersionStore};
use crate::credential::CredentialVersion;
use crate::errors::{CredVaultError, Result};
use crate::keys::{EncryptedValue, KeyCanary};

#[derive(Default)]
struct State {
    /// Append order; index = age.
    versions: Vec<CredentialVersion>,
    canaries: HashMap<Uuid, KeyCanary>,
}

impl State {
    fn of_credential(&self, credential_id: Uuid) -> impl Iterator<Item = &CredentialVersion> {
        self.versions
            .iter()
            .filter(move |v| v.credential_id == credential_id)
    }

    fn current(&self, name: &str) -> Option<&CredentialVersion> {
        self.versions
            .iter()
            .rev()
            .find(|v| v.name == name && !v.is_transitional())
    }

    fn set_flag(&mut self, credential_id: Uuid, version_id: Uuid, on: bool) {
        for v in self.versions.iter_mut() {
            if v.credential_id == credential_id && v.version_id == version_id {
                if let Some(meta) = v.certificate.as_mut() {
                    meta.transitional = on;
                }
            }
        }
    }
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| CredVaultError::StoreError("memory store lock poisoned".into()))
    }
}

impl CredentialVersionStore for MemoryStore {
    fn count_versions_by_encryption_key(&self) -> Result<HashMap<Uuid, i64>> {
        let state = self.lock()?;
        let mut counts = HashMap::new();
        for v in &state.versions {
            *counts.entry(v.encryption_key_id()).or_insert(0) += 1;
        }
        Ok(counts)
    }

    fn find_current_version(&self, name: &str) -> Result<Option<CredentialVersion>> {
        Ok(self.lock()?.current(name).cloned())
    }

    fn find_transitional_version(&self, name: &str) -> Result<Option<CredentialVersion>> {
        let state = self.lock()?;
        Ok(state
            .versions
            .iter()
            .find(|v| v.name == name && v.is_transitional())
            .cloned())
    }

    fn find_version(&self, version_id: Uuid) -> Result<Option<CredentialVersion>> {
        let state = self.lock()?;
        Ok(state
            .versions
            .iter()
            .find(|v| v.version_id == version_id)
            .cloned())
    }

    fn find_versions(&self, name: &str) -> Result<Vec<CredentialVersion>> {
        let state = self.lock()?;
        Ok(state
            .versions
            .iter()
            .rev()
            .filter(|v| v.name == name)
            .cloned()
            .collect())
    }

    fn find_versions_signed_by(&self, ca_name: &str) -> Result<Vec<CredentialVersion>> {
        let state = self.lock()?;
        let mut by_name: BTreeMap<&str, &CredentialVersion> = BTreeMap::new();
        for v in &state.versions {
            if let Some(current) = state.current(&v.name) {
                by_name.insert(current.name.as_str(), current);
            }
        }
        Ok(by_name
            .into_values()
            .filter(|v| v.ca_name() == Some(ca_name))
            .cloned()
            .collect())
    }

    fn append_version(&self, version: &CredentialVersion) -> Result<()> {
        let mut state = self.lock()?;
        let related = state
            .versions
            .iter()
            .filter(|v| v.name == version.name || v.version_id == version.version_id);
        check_append(related, version)?;
        state.versions.push(version.clone());
        Ok(())
    }

    fn append_replacing_current(&self, previous: Uuid, version: &CredentialVersion) -> Result<()> {
        let mut state = self.lock()?;
        let related = state
            .versions
            .iter()
            .filter(|v| v.name == version.name || v.version_id == version.version_id);
        check_replace_current(related, previous, version)?;
        state.set_flag(version.credential_id, previous, true);
        state.versions.push(version.clone());
        Ok(())
    }

    fn set_transitional(&self, credential_id: Uuid, version_id: Uuid) -> Result<()> {
        let mut state = self.lock()?;
        let already = check_set_transitional(state.of_credential(credential_id), version_id)?;
        if !already {
            state.set_flag(credential_id, version_id, true);
        }
        Ok(())
    }

    fn clear_transitional(&self, credential_id: Uuid) -> Result<bool> {
        let mut state = self.lock()?;
        let mut cleared = false;
        for v in state.versions.iter_mut() {
            if v.credential_id != credential_id {
                continue;
            }
            if let Some(meta) = v.certificate.as_mut() {
                cleared |= meta.transitional;
                meta.transitional = false;
            }
        }
        Ok(cleared)
    }

    fn swap_transitional(&self, credential_id: Uuid, expected: Uuid, new: Uuid) -> Result<()> {
        let mut state = self.lock()?;

        let holder = state
            .of_credential(credential_id)
            .find(|v| v.is_transitional())
            .map(|v| v.version_id);
        if holder != Some(expected) {
            return Err(CredVaultError::TransitionalVersionConflict(format!(
                "version {expected} no longer holds the transitional flag"
            )));
        }
        if expected == new {
            return Ok(());
        }
        let target = state
            .of_credential(credential_id)
            .find(|v| v.version_id == new)
            .ok_or_else(|| CredVaultError::EntryNotFound(format!("version {new}")))?;
        if target.certificate.is_none() {
            return Err(CredVaultError::NotACertificate(target.name.clone()));
        }

        state.set_flag(credential_id, expected, false);
        state.set_flag(credential_id, new, true);
        Ok(())
    }

    fn find_versions_encrypted_with(
        &self,
        key_ids: &[Uuid],
        limit: usize,
    ) -> Result<Vec<CredentialVersion>> {
        let state = self.lock()?;
        Ok(state
            .versions
            .iter()
            .filter(|v| key_ids.contains(&v.encryption_key_id()))
            .take(limit)
            .cloned()
            .collect())
    }

    fn update_encrypted_value(
        &self,
        version_id: Uuid,
        expected_key_id: Uuid,
        value: &EncryptedValue,
    ) -> Result<bool> {
        let mut state = self.lock()?;
        let version = state
            .versions
            .iter_mut()
            .find(|v| v.version_id == version_id)
            .ok_or_else(|| CredVaultError::EntryNotFound(format!("version {version_id}")))?;
        if version.encryption_key_id() != expected_key_id {
            return Ok(false);
        }
        version.encrypted_value = value.clone();
        Ok(true)
    }

    fn find_canary(&self, key_id: Uuid) -> Result<Option<KeyCanary>> {
        Ok(self.lock()?.canaries.get(&key_id).cloned())
    }

    fn save_canary(&self, canary: &KeyCanary) -> Result<()> {
        self.lock()?
            .canaries
            .insert(canary.key_id(), canary.clone());
        Ok(())
    }
}
