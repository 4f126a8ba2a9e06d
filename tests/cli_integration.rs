//! Integration tests for the credvault CLI.
//!
//! These tests exercise the binary end-to-end using `assert_cmd`. Each
//! test writes its own `credvault.toml` into a temp dir and passes it via
//! `--config`, so the credential database lands next to it.

use assert_cmd::Command;
use assert_fs::prelude::*;
use assert_fs::TempDir;
use predicates::prelude::*;

const KEY_A: &str = "6b1f3c7e-0d7a-4a6e-9a55-0f1b7c2d9e01";
const KEY_B: &str = "0c0ffee0-1111-4222-8333-944455556666";
const MATERIAL_A: &str = "MDEyMzQ1Njc4OWFiY2RlZjAxMjM0NTY3ODlhYmNkZWY=";
const MATERIAL_B: &str = "ZmVkY2JhOTg3NjU0MzIxMGZlZGNiYTk4NzY1NDMyMTA=";

/// Helper: get a Command pointing at the credvault binary.
fn credvault() -> Command {
    #[allow(deprecated)]
    let mut cmd = Command::cargo_bin("credvault").expect("binary should exist");
    cmd.env_remove("CREDVAULT_CONFIG").env_remove("CREDVAULT_LOG");
    cmd
}

fn key_entry(id: &str, material: &str, active: bool) -> String {
    format!("\n[[encryption_keys]]\nid = \"{id}\"\nactive = {active}\nkey_material = \"{material}\"\n")
}

/// Temp dir with a config holding only key A (active).
fn vault_dir() -> TempDir {
    let tmp = TempDir::new().unwrap();
    write_config(&tmp, &key_entry(KEY_A, MATERIAL_A, true));
    tmp
}

fn write_config(tmp: &TempDir, keys: &str) {
    tmp.child("credvault.toml")
        .write_str(&format!("concatenate_cas = true\n{keys}"))
        .unwrap();
}

/// Command with `--config` pointing into `tmp`.
fn cmd_in(tmp: &TempDir) -> Command {
    let mut cmd = credvault();
    cmd.arg("--config")
        .arg(tmp.child("credvault.toml").path())
        .current_dir(tmp.path());
    cmd
}

// ---------------------------------------------------------------------------
// Argument handling
// ---------------------------------------------------------------------------

#[test]
fn help_flag_shows_usage() {
    credvault()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Versioned credential store"))
        .stdout(predicate::str::contains("generate"))
        .stdout(predicate::str::contains("regenerate"))
        .stdout(predicate::str::contains("bulk-regenerate"))
        .stdout(predicate::str::contains("transitional"))
        .stdout(predicate::str::contains("key-usage"))
        .stdout(predicate::str::contains("rotate-keys"));
}

#[test]
fn version_flag_shows_version() {
    credvault()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("credvault"));
}

#[test]
fn no_args_shows_help() {
    credvault()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn transitional_help_shows_subcommands() {
    credvault()
        .args(["transitional", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("set"))
        .stdout(predicate::str::contains("unset"))
        .stdout(predicate::str::contains("promote"));
}

#[test]
fn completions_work_without_config() {
    let tmp = TempDir::new().unwrap();
    cmd_in(&tmp)
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("credvault"));
}

#[test]
fn missing_keys_are_a_config_error() {
    let tmp = TempDir::new().unwrap();
    cmd_in(&tmp)
        .arg("key-usage")
        .assert()
        .failure()
        .stderr(predicate::str::contains("no encryption keys configured"));
}

// ---------------------------------------------------------------------------
// Values
// ---------------------------------------------------------------------------

#[test]
fn set_then_get_roundtrip() {
    let tmp = vault_dir();

    cmd_in(&tmp)
        .args(["set", "/app/greeting", "hello world"])
        .assert()
        .success();

    cmd_in(&tmp)
        .args(["get", "/app/greeting"])
        .assert()
        .success()
        .stdout(predicate::str::contains("hello world"))
        .stdout(predicate::str::contains("\"type\": \"value\""));

    tmp.child(".credvault/credentials.db")
        .assert(predicate::path::exists());
}

#[test]
fn set_reads_piped_stdin() {
    let tmp = vault_dir();

    cmd_in(&tmp)
        .args(["set", "--type", "password", "/app/db"])
        .write_stdin("s3cret\n")
        .assert()
        .success();

    cmd_in(&tmp)
        .args(["get", "/app/db"])
        .assert()
        .success()
        .stdout(predicate::str::contains("s3cret"));
}

#[test]
fn get_missing_credential_fails() {
    let tmp = vault_dir();
    cmd_in(&tmp)
        .args(["get", "/nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Not found"));
}

#[test]
fn generate_password_honours_length() {
    let tmp = vault_dir();
    cmd_in(&tmp)
        .args(["generate", "/app/token", "--type", "password", "--length", "12"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"type\": \"password\""));

    cmd_in(&tmp)
        .args(["regenerate", "/app/token"])
        .assert()
        .success();

    cmd_in(&tmp)
        .args(["versions", "/app/token"])
        .assert()
        .success()
        .stdout(predicate::str::contains("password"))
        .stderr(predicate::str::contains("2 version(s)"));
}

#[test]
fn set_values_cannot_be_regenerated() {
    let tmp = vault_dir();
    cmd_in(&tmp)
        .args(["set", "/app/plain", "v"])
        .assert()
        .success();
    cmd_in(&tmp)
        .args(["regenerate", "/app/plain"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be regenerated"));
}

// ---------------------------------------------------------------------------
// Encryption keys
// ---------------------------------------------------------------------------

#[test]
fn key_rotation_moves_versions_to_the_new_key() {
    let tmp = vault_dir();
    cmd_in(&tmp).args(["set", "/a", "1"]).assert().success();
    cmd_in(&tmp).args(["set", "/b", "2"]).assert().success();

    // B becomes active, A stays configured as a legacy key.
    write_config(
        &tmp,
        &format!(
            "{}{}",
            key_entry(KEY_B, MATERIAL_B, true),
            key_entry(KEY_A, MATERIAL_A, false)
        ),
    );

    cmd_in(&tmp)
        .args(["key-usage", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"active_key\": 0"))
        .stdout(predicate::str::contains("\"inactive_keys\": 2"));

    cmd_in(&tmp)
        .arg("rotate-keys")
        .assert()
        .success()
        .stderr(predicate::str::contains("2 version(s) re-encrypted"));

    // Dropping A is now safe: nothing is left under it.
    write_config(&tmp, &key_entry(KEY_B, MATERIAL_B, true));
    cmd_in(&tmp)
        .args(["key-usage", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"active_key\": 2"))
        .stdout(predicate::str::contains("\"unknown_keys\": 0"));

    cmd_in(&tmp)
        .args(["get", "/a"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"value\": \"1\""));
}

#[test]
fn changed_key_material_is_refused() {
    let tmp = vault_dir();
    cmd_in(&tmp).args(["set", "/a", "1"]).assert().success();

    // Same id, different material.
    write_config(&tmp, &key_entry(KEY_A, MATERIAL_B, true));
    cmd_in(&tmp)
        .args(["get", "/a"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("canary"));
}

// ---------------------------------------------------------------------------
// Certificates
// ---------------------------------------------------------------------------

#[test]
fn ca_rotation_and_bulk_regeneration() {
    let tmp = vault_dir();

    cmd_in(&tmp)
        .args([
            "generate",
            "/pki/ca",
            "--type",
            "certificate",
            "--common-name",
            "Test Root",
            "--is-ca",
        ])
        .assert()
        .success();

    cmd_in(&tmp)
        .args([
            "generate",
            "/pki/leaf",
            "--type",
            "certificate",
            "--common-name",
            "leaf.internal",
            "--alternative-name",
            "leaf.internal",
            "--ca",
            "/pki/ca",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("BEGIN CERTIFICATE"));

    // Unset with nothing flagged is a no-op.
    cmd_in(&tmp)
        .args(["transitional", "unset", "/pki/ca"])
        .assert()
        .success();

    // Regenerating the CA keeps the old version as transitional.
    cmd_in(&tmp)
        .args(["regenerate", "/pki/ca"])
        .assert()
        .success();
    cmd_in(&tmp)
        .args(["versions", "/pki/ca"])
        .assert()
        .success()
        .stdout(predicate::str::contains("yes"));

    // A second staged version would be a second transitional one.
    cmd_in(&tmp)
        .args(["regenerate", "--transitional", "/pki/ca"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Transitional version conflict"));

    cmd_in(&tmp)
        .args(["bulk-regenerate", "--signed-by", "/pki/ca"])
        .assert()
        .success()
        .stdout(predicate::str::contains("/pki/leaf"))
        .stdout(predicate::str::contains("regenerated"));

    cmd_in(&tmp)
        .args(["transitional", "unset", "/pki/ca"])
        .assert()
        .success();
}

#[test]
fn transitional_on_non_certificate_fails() {
    let tmp = vault_dir();
    cmd_in(&tmp).args(["set", "/a", "1"]).assert().success();
    cmd_in(&tmp)
        .args(["transitional", "unset", "/a"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not a certificate"));
}
