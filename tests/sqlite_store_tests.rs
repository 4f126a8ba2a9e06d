//! Persistence tests: a service reopened on the same data directory sees
//! exactly what the previous one wrote.

#![cfg(feature = "sqlite-store")]

use std::path::Path;

use tempfile::TempDir;

use credvault::config::Settings;
use credvault::credential::{CertificateParameters, CredentialValue, GenerationParameters};
use credvault::generate::GenerateRequest;
use credvault::store::SqliteStore;
use credvault::{CredVaultError, CredentialService};

const CONFIG: &str = r#"
concatenate_cas = true

[[encryption_keys]]
id = "6b1f3c7e-0d7a-4a6e-9a55-0f1b7c2d9e01"
active = true
key_material = "MDEyMzQ1Njc4OWFiY2RlZjAxMjM0NTY3ODlhYmNkZWY="
"#;

fn settings() -> Settings {
    Settings::from_toml_str(CONFIG).unwrap()
}

fn open(dir: &Path) -> CredentialService {
    CredentialService::open(&settings(), dir).unwrap()
}

#[test]
fn database_lives_under_data_dir() {
    let tmp = TempDir::new().unwrap();
    open(tmp.path());
    assert!(SqliteStore::db_path(&tmp.path().join(".credvault")).exists());
}

#[test]
fn versions_survive_reopen_in_order() {
    let tmp = TempDir::new().unwrap();
    let ids: Vec<_> = {
        let svc = open(tmp.path());
        (1..=3)
            .map(|n| {
                svc.set_value("/app/url", CredentialValue::Value(format!("v{n}")))
                    .unwrap()
                    .id
            })
            .collect()
    };

    let svc = open(tmp.path());
    let history: Vec<_> = svc
        .versions("/app/url")
        .unwrap()
        .into_iter()
        .map(|v| v.version_id)
        .collect();
    assert_eq!(history, ids.iter().rev().copied().collect::<Vec<_>>());
    assert_eq!(
        svc.get("/app/url").unwrap().value,
        CredentialValue::Value("v3".into())
    );
}

#[test]
fn transitional_flag_survives_reopen() {
    let tmp = TempDir::new().unwrap();
    let (old, new) = {
        let svc = open(tmp.path());
        let mut params = CertificateParameters::new("Persistent Root");
        params.is_ca = true;
        let old = svc
            .generate(&GenerateRequest::new(
                "/pki/root",
                GenerationParameters::Certificate(params),
            ))
            .unwrap();
        let new = svc.regenerate("/pki/root").unwrap();
        (old.id, new.id)
    };

    let svc = open(tmp.path());
    assert_eq!(svc.get("/pki/root").unwrap().id, new);
    let history = svc.versions("/pki/root").unwrap();
    let transitional: Vec<_> = history.iter().filter(|v| v.transitional).collect();
    assert_eq!(transitional.len(), 1);
    assert_eq!(transitional[0].version_id, old);

    // Still only one transitional version allowed after reopening.
    assert!(matches!(
        svc.regenerate("/pki/root"),
        Err(CredVaultError::TransitionalVersionConflict(_))
    ));
}

#[test]
fn changed_key_material_is_detected_on_open() {
    let tmp = TempDir::new().unwrap();
    open(tmp.path());

    let changed = CONFIG.replace(
        "MDEyMzQ1Njc4OWFiY2RlZjAxMjM0NTY3ODlhYmNkZWY=",
        "ZmVkY2JhOTg3NjU0MzIxMGZlZGNiYTk4NzY1NDMyMTA=",
    );
    let settings = Settings::from_toml_str(&changed).unwrap();
    assert!(matches!(
        CredentialService::open(&settings, tmp.path()),
        Err(CredVaultError::KeyCanaryMismatch(_))
    ));
}
