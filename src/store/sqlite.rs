//! SQLite store — durable credential versions at `<data_dir>/credentials.db`.
//!
//! The connection sits behind a mutex and every mutating call runs in an
//! immediate transaction, so the transitional checks and the write they
//! guard see the same snapshot.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use tracing::debug;
use uuid::Uuid;

use super::{
    check_append, check_replace_current, check_set_transitional, CredentialVersionStore,
};
use crate::credential::{CertificateMetadata, CredentialVersion, GenerationParameters};
use crate::errors::{CredVaultError, Result};
use crate::keys::{EncryptedValue, KeyCanary};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS credential_versions (
    seq                   INTEGER PRIMARY KEY AUTOINCREMENT,
    version_id            TEXT NOT NULL UNIQUE,
    credential_id         TEXT NOT NULL,
    name                  TEXT NOT NULL,
    credential_type       TEXT NOT NULL,
    encryption_key_id     TEXT NOT NULL,
    cipher_text           BLOB NOT NULL,
    nonce                 BLOB NOT NULL,
    created_at            TEXT NOT NULL,
    generation_parameters TEXT,
    certificate           TEXT,
    ca_name               TEXT,
    transitional          INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_versions_name ON credential_versions (name);
CREATE INDEX IF NOT EXISTS idx_versions_key ON credential_versions (encryption_key_id);
CREATE INDEX IF NOT EXISTS idx_versions_ca ON credential_versions (ca_name);

CREATE TABLE IF NOT EXISTS key_canaries (
    encryption_key_id TEXT PRIMARY KEY,
    cipher_text       BLOB NOT NULL,
    nonce             BLOB NOT NULL
);
";

const COLUMNS: &str = "credential_id, name, version_id, credential_type, encryption_key_id,
     cipher_text, nonce, created_at, generation_parameters, certificate, transitional";

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub const FILE_NAME: &'static str = "credentials.db";

    /// Open (or create) `<data_dir>/credentials.db`.
    pub fn open(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;
        let db_path = Self::db_path(data_dir);
        let conn = Connection::open(&db_path).map_err(store_err("open"))?;

        // Owner-only, like any other secret file.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(&db_path, perms)?;
        }

        debug!(path = %db_path.display(), "opened credential store");
        Self::with_connection(conn)
    }

    /// Private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(store_err("open"))?;
        Self::with_connection(conn)
    }

    pub fn db_path(data_dir: &Path) -> PathBuf {
        data_dir.join(Self::FILE_NAME)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA).map_err(store_err("schema"))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| CredVaultError::StoreError("sqlite store lock poisoned".into()))
    }

    /// Run `f` inside an immediate transaction, committing on success.
    fn write<T>(&self, f: impl FnOnce(&Transaction<'_>) -> Result<T>) -> Result<T> {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(store_err("begin"))?;
        let out = f(&tx)?;
        tx.commit().map_err(store_err("commit"))?;
        Ok(out)
    }
}

fn store_err(what: &'static str) -> impl Fn(rusqlite::Error) -> CredVaultError {
    move |e| CredVaultError::StoreError(format!("{what}: {e}"))
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| CredVaultError::SerializationError(e.to_string()))
}

/// Raw row; decoded outside the rusqlite closure so JSON and uuid errors
/// map to our error type.
struct RawVersion {
    credential_id: String,
    name: String,
    version_id: String,
    credential_type: String,
    encryption_key_id: String,
    cipher_text: Vec<u8>,
    nonce: Vec<u8>,
    created_at: String,
    generation_parameters: Option<String>,
    certificate: Option<String>,
    transitional: bool,
}

impl RawVersion {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            credential_id: row.get(0)?,
            name: row.get(1)?,
            version_id: row.get(2)?,
            credential_type: row.get(3)?,
            encryption_key_id: row.get(4)?,
            cipher_text: row.get(5)?,
            nonce: row.get(6)?,
            created_at: row.get(7)?,
            generation_parameters: row.get(8)?,
            certificate: row.get(9)?,
            transitional: row.get(10)?,
        })
    }

    fn decode(self) -> Result<CredentialVersion> {
        let generation_parameters = self
            .generation_parameters
            .map(|json| serde_json::from_str::<GenerationParameters>(&json))
            .transpose()
            .map_err(|e| CredVaultError::SerializationError(format!("parameters: {e}")))?;
        let certificate = self
            .certificate
            .map(|json| serde_json::from_str::<CertificateMetadata>(&json))
            .transpose()
            .map_err(|e| CredVaultError::SerializationError(format!("certificate: {e}")))?
            .map(|mut meta| {
                // The column is authoritative; the JSON copy is written once.
                meta.transitional = self.transitional;
                meta
            });
        let created_at = DateTime::parse_from_rfc3339(&self.created_at)
            .map_err(|e| CredVaultError::SerializationError(format!("created_at: {e}")))?
            .with_timezone(&Utc);

        Ok(CredentialVersion {
            credential_id: parse_uuid(&self.credential_id)?,
            name: self.name,
            version_id: parse_uuid(&self.version_id)?,
            credential_type: self.credential_type,
            encrypted_value: EncryptedValue {
                encryption_key_id: parse_uuid(&self.encryption_key_id)?,
                cipher_text: self.cipher_text,
                nonce: self.nonce,
            },
            created_at,
            generation_parameters,
            certificate,
        })
    }
}

fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| CredVaultError::SerializationError(format!("uuid '{s}': {e}")))
}

fn query_versions(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<CredentialVersion>> {
    let mut stmt = conn.prepare(sql).map_err(store_err("prepare"))?;
    let rows = stmt
        .query_map(params, RawVersion::from_row)
        .map_err(store_err("query"))?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row.map_err(store_err("row"))?.decode()?);
    }
    Ok(out)
}

fn versions_of_credential(conn: &Connection, credential_id: Uuid) -> Result<Vec<CredentialVersion>> {
    query_versions(
        conn,
        &format!("SELECT {COLUMNS} FROM credential_versions WHERE credential_id = ?1 ORDER BY seq"),
        params![credential_id.to_string()],
    )
}

fn set_flag(conn: &Connection, version_id: Uuid, on: bool) -> Result<()> {
    conn.execute(
        "UPDATE credential_versions SET transitional = ?1 WHERE version_id = ?2",
        params![on, version_id.to_string()],
    )
    .map_err(store_err("update transitional"))?;
    Ok(())
}

/// Versions sharing `version`'s name or id, in append order.
fn related_versions(conn: &Connection, version: &CredentialVersion) -> Result<Vec<CredentialVersion>> {
    query_versions(
        conn,
        &format!(
            "SELECT {COLUMNS} FROM credential_versions
             WHERE name = ?1 OR version_id = ?2 ORDER BY seq"
        ),
        params![version.name, version.version_id.to_string()],
    )
}

/// A version with its JSON columns serialized ahead of the transaction.
struct VersionRow<'a> {
    version: &'a CredentialVersion,
    generation_parameters: Option<String>,
    certificate: Option<String>,
}

impl<'a> VersionRow<'a> {
    fn encode(version: &'a CredentialVersion) -> Result<Self> {
        Ok(Self {
            version,
            generation_parameters: version
                .generation_parameters
                .as_ref()
                .map(to_json)
                .transpose()?,
            certificate: version.certificate.as_ref().map(to_json).transpose()?,
        })
    }

    fn insert(&self, conn: &Connection) -> Result<()> {
        let version = self.version;
        conn.execute(
            "INSERT INTO credential_versions (
                version_id, credential_id, name, credential_type, encryption_key_id,
                cipher_text, nonce, created_at, generation_parameters, certificate,
                ca_name, transitional
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                version.version_id.to_string(),
                version.credential_id.to_string(),
                version.name,
                version.credential_type,
                version.encryption_key_id().to_string(),
                version.encrypted_value.cipher_text,
                version.encrypted_value.nonce,
                version.created_at.to_rfc3339(),
                self.generation_parameters,
                self.certificate,
                version.ca_name(),
                version.is_transitional(),
            ],
        )
        .map_err(store_err("insert version"))?;
        Ok(())
    }
}

impl CredentialVersionStore for SqliteStore {
    fn count_versions_by_encryption_key(&self) -> Result<HashMap<Uuid, i64>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT encryption_key_id, COUNT(*) FROM credential_versions
                 GROUP BY encryption_key_id",
            )
            .map_err(store_err("prepare"))?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))
            .map_err(store_err("query"))?;

        let mut counts = HashMap::new();
        for row in rows {
            let (id, count) = row.map_err(store_err("row"))?;
            counts.insert(parse_uuid(&id)?, count);
        }
        Ok(counts)
    }

    fn find_current_version(&self, name: &str) -> Result<Option<CredentialVersion>> {
        let conn = self.lock()?;
        let mut found = query_versions(
            &conn,
            &format!(
                "SELECT {COLUMNS} FROM credential_versions
                 WHERE name = ?1 AND transitional = 0 ORDER BY seq DESC LIMIT 1"
            ),
            params![name],
        )?;
        Ok(found.pop())
    }

    fn find_transitional_version(&self, name: &str) -> Result<Option<CredentialVersion>> {
        let conn = self.lock()?;
        let mut found = query_versions(
            &conn,
            &format!(
                "SELECT {COLUMNS} FROM credential_versions
                 WHERE name = ?1 AND transitional = 1 LIMIT 1"
            ),
            params![name],
        )?;
        Ok(found.pop())
    }

    fn find_version(&self, version_id: Uuid) -> Result<Option<CredentialVersion>> {
        let conn = self.lock()?;
        let mut found = query_versions(
            &conn,
            &format!("SELECT {COLUMNS} FROM credential_versions WHERE version_id = ?1"),
            params![version_id.to_string()],
        )?;
        Ok(found.pop())
    }

    fn find_versions(&self, name: &str) -> Result<Vec<CredentialVersion>> {
        let conn = self.lock()?;
        query_versions(
            &conn,
            &format!("SELECT {COLUMNS} FROM credential_versions WHERE name = ?1 ORDER BY seq DESC"),
            params![name],
        )
    }

    fn find_versions_signed_by(&self, ca_name: &str) -> Result<Vec<CredentialVersion>> {
        let conn = self.lock()?;
        // Current version per name, then filter on its signer.
        query_versions(
            &conn,
            &format!(
                "SELECT {COLUMNS} FROM credential_versions v
                 WHERE v.seq = (
                     SELECT MAX(c.seq) FROM credential_versions c
                     WHERE c.name = v.name AND c.transitional = 0
                 )
                 AND v.ca_name = ?1
                 ORDER BY v.name"
            ),
            params![ca_name],
        )
    }

    fn append_version(&self, version: &CredentialVersion) -> Result<()> {
        let row = VersionRow::encode(version)?;
        self.write(|tx| {
            let related = related_versions(tx, version)?;
            check_append(&related, version)?;
            row.insert(tx)
        })
    }

    fn append_replacing_current(&self, previous: Uuid, version: &CredentialVersion) -> Result<()> {
        let row = VersionRow::encode(version)?;
        self.write(|tx| {
            let related = related_versions(tx, version)?;
            check_replace_current(&related, previous, version)?;
            set_flag(tx, previous, true)?;
            row.insert(tx)
        })
    }

    fn set_transitional(&self, credential_id: Uuid, version_id: Uuid) -> Result<()> {
        self.write(|tx| {
            let versions = versions_of_credential(tx, credential_id)?;
            if !check_set_transitional(&versions, version_id)? {
                set_flag(tx, version_id, true)?;
            }
            Ok(())
        })
    }

    fn clear_transitional(&self, credential_id: Uuid) -> Result<bool> {
        self.write(|tx| {
            let changed = tx
                .execute(
                    "UPDATE credential_versions SET transitional = 0
                     WHERE credential_id = ?1 AND transitional = 1",
                    params![credential_id.to_string()],
                )
                .map_err(store_err("clear transitional"))?;
            Ok(changed > 0)
        })
    }

    fn swap_transitional(&self, credential_id: Uuid, expected: Uuid, new: Uuid) -> Result<()> {
        self.write(|tx| {
            let versions = versions_of_credential(tx, credential_id)?;
            let holder = versions
                .iter()
                .find(|v| v.is_transitional())
                .map(|v| v.version_id);
            if holder != Some(expected) {
                return Err(CredVaultError::TransitionalVersionConflict(format!(
                    "version {expected} no longer holds the transitional flag"
                )));
            }
            if expected == new {
                return Ok(());
            }
            let target = versions
                .iter()
                .find(|v| v.version_id == new)
                .ok_or_else(|| CredVaultError::EntryNotFound(format!("version {new}")))?;
            if target.certificate.is_none() {
                return Err(CredVaultError::NotACertificate(target.name.clone()));
            }

            set_flag(tx, expected, false)?;
            set_flag(tx, new, true)
        })
    }

    fn find_versions_encrypted_with(
        &self,
        key_ids: &[Uuid],
        limit: usize,
    ) -> Result<Vec<CredentialVersion>> {
        if key_ids.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }
        let conn = self.lock()?;
        let placeholders = (1..=key_ids.len())
            .map(|i| format!("?{i}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT {COLUMNS} FROM credential_versions
             WHERE encryption_key_id IN ({placeholders})
             ORDER BY seq LIMIT {}",
            i64::try_from(limit).unwrap_or(i64::MAX)
        );
        let ids: Vec<String> = key_ids.iter().map(Uuid::to_string).collect();
        query_versions(&conn, &sql, rusqlite::params_from_iter(ids.iter()))
    }

    fn update_encrypted_value(
        &self,
        version_id: Uuid,
        expected_key_id: Uuid,
        value: &EncryptedValue,
    ) -> Result<bool> {
        self.write(|tx| {
            let exists: Option<String> = tx
                .query_row(
                    "SELECT encryption_key_id FROM credential_versions WHERE version_id = ?1",
                    params![version_id.to_string()],
                    |row| row.get(0),
                )
                .optional()
                .map_err(store_err("lookup version"))?;
            let Some(current_key) = exists else {
                return Err(CredVaultError::EntryNotFound(format!("version {version_id}")));
            };
            if parse_uuid(&current_key)? != expected_key_id {
                return Ok(false);
            }

            tx.execute(
                "UPDATE credential_versions
                 SET encryption_key_id = ?1, cipher_text = ?2, nonce = ?3
                 WHERE version_id = ?4",
                params![
                    value.encryption_key_id.to_string(),
                    value.cipher_text,
                    value.nonce,
                    version_id.to_string(),
                ],
            )
            .map_err(store_err("update ciphertext"))?;
            Ok(true)
        })
    }

    fn find_canary(&self, key_id: Uuid) -> Result<Option<KeyCanary>> {
        let conn = self.lock()?;
        let row: Option<(Vec<u8>, Vec<u8>)> = conn
            .query_row(
                "SELECT cipher_text, nonce FROM key_canaries WHERE encryption_key_id = ?1",
                params![key_id.to_string()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(store_err("lookup canary"))?;

        Ok(row.map(|(cipher_text, nonce)| KeyCanary {
            encrypted_value: EncryptedValue {
                encryption_key_id: key_id,
                cipher_text,
                nonce,
            },
        }))
    }

    fn save_canary(&self, canary: &KeyCanary) -> Result<()> {
        self.write(|tx| {
            tx.execute(
                "INSERT INTO key_canaries (encryption_key_id, cipher_text, nonce)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT (encryption_key_id)
                 DO UPDATE SET cipher_text = excluded.cipher_text, nonce = excluded.nonce",
                params![
                    canary.key_id().to_string(),
                    canary.encrypted_value.cipher_text,
                    canary.encrypted_value.nonce,
                ],
            )
            .map_err(store_err("save canary"))?;
            Ok(())
        })
    }
}
