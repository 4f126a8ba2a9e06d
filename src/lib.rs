pub mod certificates;
pub mod cli;
pub mod config;
pub mod credential;
pub mod crypto;
mod encoding;
pub mod errors;
pub mod generate;
pub mod keys;
pub mod logging;
pub mod regenerate;
pub mod service;
pub mod store;

pub use errors::{CredVaultError, Result};
pub use service::CredentialService;
