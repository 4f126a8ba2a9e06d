//! AES-256-GCM authenticated encryption.
//!
//! Each call to `encrypt` generates a fresh random 12-byte nonce from the
//! OS generator.  The nonce is returned next to the ciphertext because
//! stored credential versions keep the two in separate columns.
//!
//! Callers pass associated data (the owning version id) so a ciphertext
//! cannot be moved to another row and still decrypt.

use aes_gcm::aead::{Aead, KeyInit, OsRng, Payload};
use aes_gcm::{AeadCore, Aes256Gcm, Nonce};

use crate::errors::{CredVaultError, Result};

/// Size of the AES-256-GCM nonce in bytes.
pub const NONCE_LEN: usize = 12;

/// Ciphertext (with its 16-byte auth tag) and the nonce it was sealed with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sealed {
    pub cipher_text: Vec<u8>,
    pub nonce: [u8; NONCE_LEN],
}

/// Encrypt `plaintext` with a 32-byte `key`, authenticating `aad`.
pub fn encrypt(key: &[u8], plaintext: &[u8], aad: &[u8]) -> Result<Sealed> {
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| CredVaultError::EncryptionFailed(format!("invalid key length: {e}")))?;

    // Never reuse a nonce: draw a new one for every call.
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let cipher_text = cipher
        .encrypt(
            &nonce,
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|e| CredVaultError::EncryptionFailed(format!("encryption error: {e}")))?;

    let mut nonce_bytes = [0u8; NONCE_LEN];
    nonce_bytes.copy_from_slice(&nonce);

    Ok(Sealed {
        cipher_text,
        nonce: nonce_bytes,
    })
}

/// Decrypt data that was produced by `encrypt` with the same `aad`.
pub fn decrypt(key: &[u8], cipher_text: &[u8], nonce: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
    if nonce.len() != NONCE_LEN {
        return Err(CredVaultError::DecryptionFailed);
    }
    let nonce = Nonce::from_slice(nonce);

    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| CredVaultError::DecryptionFailed)?;

    cipher
        .decrypt(
            nonce,
            Payload {
                msg: cipher_text,
                aad,
            },
        )
        .map_err(|_| CredVaultError::DecryptionFailed)
}
