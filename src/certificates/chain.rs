//! CA chain assembly for certificate reads.
//!
//! The `ca` field handed to callers is never stored. It is computed on
//! every read from the signer's public certificate bodies, which live in
//! plaintext metadata, so building it needs no decryption.

use crate::credential::CredentialVersion;
use crate::errors::{CredVaultError, Result};
use crate::store::CredentialVersionStore;

#[derive(Debug, Clone, Copy)]
pub struct CertificateChainBuilder {
    concatenate_cas: bool,
}

impl CertificateChainBuilder {
    pub fn new(concatenate_cas: bool) -> Self {
        Self { concatenate_cas }
    }

    /// Join CA bodies: current first, then the transitional one if enabled.
    pub fn build(&self, current_ca: &str, transitional_ca: Option<&str>) -> String {
        match transitional_ca {
            Some(transitional) if self.concatenate_cas => {
                let mut chain = String::with_capacity(current_ca.len() + transitional.len());
                chain.push_str(current_ca);
                chain.push_str(transitional);
                chain
            }
            _ => current_ca.to_string(),
        }
    }

    /// The CA value for a certificate version. `None` for other types.
    ///
    /// Self-signed certificates report their own body.
    pub fn ca_for(
        &self,
        store: &dyn CredentialVersionStore,
        version: &CredentialVersion,
    ) -> Result<Option<String>> {
        let Some(meta) = version.certificate.as_ref() else {
            return Ok(None);
        };
        let Some(ca_name) = meta.ca_name.as_deref() else {
            return Ok(Some(meta.certificate.clone()));
        };

        let current = store
            .find_current_version(ca_name)?
            .and_then(|v| v.certificate)
            .ok_or_else(|| CredVaultError::SigningCaMissing(ca_name.to_string()))?;
        let transitional = if self.concatenate_cas {
            store
                .find_transitional_version(ca_name)?
                .and_then(|v| v.certificate)
        } else {
            None
        };

        Ok(Some(self.build(
            &current.certificate,
            transitional.as_ref().map(|t| t.certificate.as_str()),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_support::{cert_version, value_version};
    use crate::store::MemoryStore;
    use uuid::Uuid;

    const A: &str = "-----BEGIN CERTIFICATE-----\nAAAA\n-----END CERTIFICATE-----\n";
    const B: &str = "-----BEGIN CERTIFICATE-----\nBBBB\n-----END CERTIFICATE-----\n";

    #[test]
    fn enabled_appends_transitional_after_current() {
        let chain = CertificateChainBuilder::new(true).build(A, Some(B));
        assert_eq!(chain, format!("{A}{B}"));
    }

    #[test]
    fn disabled_returns_current_only() {
        assert_eq!(CertificateChainBuilder::new(false).build(A, Some(B)), A);
        assert_eq!(CertificateChainBuilder::new(true).build(A, None), A);
    }

    fn ca_store() -> (MemoryStore, CredentialVersion) {
        let store = MemoryStore::new();
        let key = Uuid::new_v4();
        let ca_id = Uuid::new_v4();

        let mut old = cert_version(ca_id, "/ca", key, None);
        old.certificate.as_mut().unwrap().certificate = B.into();
        let mut new = cert_version(ca_id, "/ca", key, None);
        new.certificate.as_mut().unwrap().certificate = A.into();
        store.append_version(&old).unwrap();
        store.append_version(&new).unwrap();
        store.set_transitional(ca_id, old.version_id).unwrap();

        let leaf = cert_version(Uuid::new_v4(), "/leaf", key, Some("/ca"));
        store.append_version(&leaf).unwrap();
        (store, leaf)
    }

    #[test]
    fn leaf_reads_current_then_transitional_ca() {
        let (store, leaf) = ca_store();
        let ca = CertificateChainBuilder::new(true)
            .ca_for(&store, &leaf)
            .unwrap();
        assert_eq!(ca.as_deref(), Some(format!("{A}{B}").as_str()));

        let ca = CertificateChainBuilder::new(false)
            .ca_for(&store, &leaf)
            .unwrap();
        assert_eq!(ca.as_deref(), Some(A));
    }

    #[test]
    fn self_signed_reports_itself() {
        let store = MemoryStore::new();
        let root = cert_version(Uuid::new_v4(), "/root", Uuid::new_v4(), None);
        let ca = CertificateChainBuilder::new(true)
            .ca_for(&store, &root)
            .unwrap();
        assert_eq!(ca.as_deref(), Some("CERT /root"));
    }

    #[test]
    fn missing_signer_and_non_certificates() {
        let store = MemoryStore::new();
        let orphan = cert_version(Uuid::new_v4(), "/orphan", Uuid::new_v4(), Some("/gone"));
        assert!(matches!(
            CertificateChainBuilder::new(false).ca_for(&store, &orphan),
            Err(CredVaultError::SigningCaMissing(_))
        ));

        let plain = value_version(Uuid::new_v4(), "/plain", Uuid::new_v4());
        assert_eq!(
            CertificateChainBuilder::new(true)
                .ca_for(&store, &plain)
                .unwrap(),
            None
        );
    }
}
