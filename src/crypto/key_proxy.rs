//! `KeyProxy` — one physical encryption key.
//!
//! The proxy owns the derived AES-256 key and performs encrypt/decrypt of
//! single values.  Password-derived proxies run Argon2id once, when the
//! key set is built, so request handling never pays the KDF cost.

use zeroize::Zeroize;

use super::encryption::{self, Sealed};
use super::kdf::{derive_key_with_params, Argon2Params};
use super::keys::{expand_key_material, KeyMaterial};
use crate::errors::Result;

/// Wraps one physical encryption key.
#[derive(Debug)]
pub struct KeyProxy {
    key: KeyMaterial,
}

impl KeyProxy {
    /// Build a proxy from raw key material.
    pub fn from_material(material: &[u8]) -> Result<Self> {
        let mut bytes = expand_key_material(material)?;
        let key = KeyMaterial::new(bytes);
        bytes.zeroize();
        Ok(Self { key })
    }

    /// Derive a proxy from a password, salt and Argon2id parameters.
    pub fn from_password(password: &[u8], salt: &[u8], params: &Argon2Params) -> Result<Self> {
        let mut bytes = derive_key_with_params(password, salt, params)?;
        let key = KeyMaterial::new(bytes);
        bytes.zeroize();
        Ok(Self { key })
    }

    pub fn encrypt(&self, plaintext: &[u8], aad: &[u8]) -> Result<Sealed> {
        encryption::encrypt(self.key.as_bytes(), plaintext, aad)
    }

    pub fn decrypt(&self, cipher_text: &[u8], nonce: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
        encryption::decrypt(self.key.as_bytes(), cipher_text, nonce, aad)
    }
}
