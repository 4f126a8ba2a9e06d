//! RSA and SSH key pairs.
//!
//! Private keys are PKCS#8 PEM, public keys SPKI PEM. SSH public keys use
//! the OpenSSH `ssh-rsa` wire format; OpenSSH reads the PKCS#8 private key
//! as-is.

use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};
use base64::Engine;
use rsa::pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::rand_core::OsRng;
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};

use crate::credential::parameters::KEY_LENGTHS;
use crate::credential::{RsaValue, SshValue};
use crate::errors::{CredVaultError, Result};

/// A generated key pair, PEM-encoded.
pub(crate) struct PemKeyPair {
    pub private_key: String,
    pub public_key: String,
    pub public: RsaPublicKey,
}

pub(crate) fn new_key_pair(key_length: u32) -> Result<PemKeyPair> {
    if !KEY_LENGTHS.contains(&key_length) {
        return Err(CredVaultError::GenerationFailed(format!(
            "key length must be one of {KEY_LENGTHS:?} (got {key_length})"
        )));
    }

    let bits = usize::try_from(key_length)
        .map_err(|_| CredVaultError::GenerationFailed("key length out of range".into()))?;
    let private = RsaPrivateKey::new(&mut OsRng, bits)
        .map_err(|e| CredVaultError::GenerationFailed(format!("RSA key generation: {e}")))?;
    let public = RsaPublicKey::from(&private);

    let private_key = private
        .to_pkcs8_pem(LineEnding::LF)
        .map_err(|e| CredVaultError::GenerationFailed(format!("private key encoding: {e}")))?
        .to_string();
    let public_key = public
        .to_public_key_pem(LineEnding::LF)
        .map_err(|e| CredVaultError::GenerationFailed(format!("public key encoding: {e}")))?;

    Ok(PemKeyPair {
        private_key,
        public_key,
        public,
    })
}

pub fn generate_rsa(key_length: u32) -> Result<RsaValue> {
    let pair = new_key_pair(key_length)?;
    Ok(RsaValue {
        public_key: pair.public_key,
        private_key: pair.private_key,
    })
}

pub fn generate_ssh(key_length: u32, comment: Option<&str>) -> Result<SshValue> {
    let pair = new_key_pair(key_length)?;
    let blob = ssh_rsa_blob(&pair.public);

    let mut public_key = format!("ssh-rsa {}", STANDARD.encode(&blob));
    if let Some(comment) = comment.filter(|c| !c.is_empty()) {
        public_key.push(' ');
        public_key.push_str(comment);
    }

    Ok(SshValue {
        public_key,
        private_key: pair.private_key,
        public_key_fingerprint: fingerprint(&blob),
    })
}

/// `string "ssh-rsa" || mpint e || mpint n`.
fn ssh_rsa_blob(public: &RsaPublicKey) -> Vec<u8> {
    let mut blob = Vec::new();
    put_string(&mut blob, b"ssh-rsa");
    put_mpint(&mut blob, &public.e().to_bytes_be());
    put_mpint(&mut blob, &public.n().to_bytes_be());
    blob
}

fn put_string(out: &mut Vec<u8>, bytes: &[u8]) {
    // Blob fields are far below u32::MAX.
    out.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
    out.extend_from_slice(bytes);
}

/// Two's-complement big-endian; a leading zero keeps positive values
/// positive when the high bit is set.
fn put_mpint(out: &mut Vec<u8>, magnitude: &[u8]) {
    let trimmed: &[u8] = match magnitude.iter().position(|b| *b != 0) {
        Some(first) => &magnitude[first..],
        None => &[],
    };
    if trimmed.first().is_some_and(|b| b & 0x80 != 0) {
        let mut padded = Vec::with_capacity(trimmed.len() + 1);
        padded.push(0);
        padded.extend_from_slice(trimmed);
        put_string(out, &padded);
    } else {
        put_string(out, trimmed);
    }
}

/// `SHA256:<unpadded base64>`, as printed by `ssh-keygen -l`.
fn fingerprint(blob: &[u8]) -> String {
    format!("SHA256:{}", STANDARD_NO_PAD.encode(Sha256::digest(blob)))
}
