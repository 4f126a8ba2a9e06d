//! Certificate rotation and CA chain assembly.

pub mod chain;
pub mod rotation;

pub use chain::CertificateChainBuilder;
pub use rotation::{BulkRegenerationResult, CertificateRotationOrchestrator};
