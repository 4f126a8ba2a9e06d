//! Encryption key lifecycle: the key set, usage classification, canaries
//! and re-encryption.

pub mod canary;
pub mod key_set;
pub mod rotator;
pub mod usage;

pub use canary::{verify_canaries, KeyCanary};
pub use key_set::{EncryptedValue, EncryptionKey, EncryptionKeySet};
pub use rotator::{EncryptionKeyRotator, RotationSummary};
pub use usage::{classify, KeyUsageClassifier, KeyUsageReport};
