//! Key material handling.
//!
//! Raw key material from configuration may have any length (legacy
//! deployments used 16-byte AES-128 dev keys).  It is expanded to a
//! 32-byte AES-256 key with HKDF-SHA256 so every proxy works with the same
//! cipher.

use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::Zeroize;

use crate::errors::{CredVaultError, Result};

/// Length of an encryption key (256 bits).
pub const KEY_LEN: usize = 32;

/// HKDF `info` string binding expanded keys to this purpose.
const ENCRYPTION_KEY_INFO: &[u8] = b"credvault-encryption-key";

/// Expand configured raw key material into a 32-byte encryption key.
pub fn expand_key_material(material: &[u8]) -> Result<[u8; KEY_LEN]> {
    if material.len() < 16 {
        return Err(CredVaultError::KeyDerivationFailed(format!(
            "key material must be at least 16 bytes (got {})",
            material.len()
        )));
    }

    // No salt: HKDF uses a zero-filled one.
    let hk = Hkdf::<Sha256>::new(None, material);

    let mut okm = [0u8; KEY_LEN];
    hk.expand(ENCRYPTION_KEY_INFO, &mut okm)
        .map_err(|e| CredVaultError::KeyDerivationFailed(format!("HKDF expand failed: {e}")))?;

    Ok(okm)
}

/// A 32-byte encryption key that zeroes its memory when dropped.
#[derive(Zeroize)]
#[zeroize(drop)]
pub struct KeyMaterial {
    bytes: [u8; KEY_LEN],
}

impl KeyMaterial {
    pub fn new(bytes: [u8; KEY_LEN]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("KeyMaterial(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expansion_is_deterministic() {
        let a = expand_key_material(&[0x42u8; 16]).unwrap();
        let b = expand_key_material(&[0x42u8; 16]).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn different_material_different_key() {
        let a = expand_key_material(&[0x42u8; 16]).unwrap();
        let b = expand_key_material(&[0x43u8; 16]).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn rejects_short_material() {
        assert!(expand_key_material(&[1u8; 8]).is_err());
    }

    #[test]
    fn debug_does_not_leak_bytes() {
        let key = KeyMaterial::new([7u8; KEY_LEN]);
        assert_eq!(format!("{key:?}"), "KeyMaterial(..)");
    }
}
