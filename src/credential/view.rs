use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::value::CredentialValue;

/// A decrypted credential version as handed to callers.
///
/// Serializes flat: `{"id", "name", "version_created_at", "transitional",
/// "type", "value"}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CredentialView {
    pub id: Uuid,
    pub name: String,
    pub version_created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub transitional: bool,
    #[serde(flatten)]
    pub value: CredentialValue,
}
