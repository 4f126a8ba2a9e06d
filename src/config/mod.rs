//! Configuration loaded from `credvault.toml`.

pub mod settings;

pub use settings::{EncryptionKeyConfig, KeySpec, Settings};
