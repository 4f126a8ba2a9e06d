//! Cryptographic primitives for credvault.
//!
//! This module provides:
//! - AES-256-GCM encryption and decryption (`encryption`)
//! - Argon2id password-based key derivation (`kdf`)
//! - HKDF expansion of raw key material (`keys`)
//! - `KeyProxy`, the wrapper around one physical key (`key_proxy`)

pub mod encryption;
pub mod kdf;
pub mod key_proxy;
pub mod keys;

pub use encryption::{decrypt, encrypt, Sealed};
pub use kdf::{derive_key_with_params, Argon2Params};
pub use key_proxy::KeyProxy;
