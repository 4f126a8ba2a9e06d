//! Colored terminal output helpers.
//!
//! All user-facing output goes through these functions so we get
//! consistent styling across every command. Status lines go to stderr
//! so stdout carries only data (JSON, tables).

use comfy_table::{ContentArrangement, Table};
use console::style;
use serde::Serialize;

use crate::certificates::BulkRegenerationResult;
use crate::credential::VersionSummary;
use crate::errors::{CredVaultError, Result};
use crate::keys::KeyUsageReport;

/// Print a green success message: "check_mark {msg}"
pub fn success(msg: &str) {
    eprintln!("{} {}", style("\u{2713}").green().bold(), msg);
}

/// Print a red error message: "x_mark {msg}"
pub fn error(msg: &str) {
    eprintln!("{} {}", style("\u{2717}").red().bold(), msg);
}

/// Print a yellow warning: "warning_sign {msg}"
pub fn warning(msg: &str) {
    eprintln!("{} {}", style("\u{26a0}").yellow().bold(), msg);
}

/// Print a blue info message: "info_sign {msg}"
pub fn info(msg: &str) {
    eprintln!("{} {}", style("\u{2139}").blue().bold(), msg);
}

/// Print a dim tip/hint: "arrow {msg}"
pub fn tip(msg: &str) {
    eprintln!("{} {}", style("\u{2192}").dim(), style(msg).dim());
}

/// Pretty-print any serializable value as JSON on stdout.
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| CredVaultError::SerializationError(e.to_string()))?;
    println!("{json}");
    Ok(())
}

/// Print a table of versions (Version, Type, Created, Key, Transitional).
pub fn print_versions_table(versions: &[VersionSummary]) {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Version", "Type", "Created", "Key", "Transitional"]);

    for v in versions {
        table.add_row(vec![
            v.version_id.to_string(),
            v.credential_type.clone(),
            v.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            v.encryption_key_id.to_string(),
            (if v.transitional { "yes" } else { "" }).to_string(),
        ]);
    }

    println!("{table}");
}

/// Print the key usage counts.
pub fn print_key_usage_table(report: &KeyUsageReport) {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Keys", "Versions"]);
    table.add_row(vec![
        "active".to_string(),
        report.active_key_count.to_string(),
    ]);
    table.add_row(vec![
        "inactive".to_string(),
        report.inactive_key_count.to_string(),
    ]);
    table.add_row(vec![
        "unknown".to_string(),
        report.unknown_key_count.to_string(),
    ]);

    println!("{table}");
}

/// Print what a bulk regeneration did, failures included.
pub fn print_bulk_result(result: &BulkRegenerationResult) {
    if result.regenerated_credentials.is_empty() && result.failures.is_empty() {
        info("No certificates are signed by that CA.");
        return;
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Credential", "Result"]);
    for name in &result.regenerated_credentials {
        table.add_row(vec![name.clone(), "regenerated".to_string()]);
    }
    for (name, reason) in &result.failures {
        table.add_row(vec![name.clone(), format!("failed: {reason}")]);
    }

    println!("{table}");
}
