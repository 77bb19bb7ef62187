use anyhow::{Context, Result};
use std::path::Path;

use akira::config::AkiraConfig;
use akira::store::{StateStore, UserKey};

use super::export::ExportData;

#[derive(Debug, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub imported: u64,
    pub skipped: u64,
    pub invalid: u64,
}

/// Write exported states into `store`.
///
/// Existing users are left alone unless `overwrite` is set. Entries whose key
/// is not a valid sanitized key are counted as invalid and skipped.
pub fn restore(store: &dyn StateStore, data: &ExportData, overwrite: bool) -> Result<ImportSummary> {
    let mut summary = ImportSummary::default();

    for entry in &data.users {
        let Some(key) = UserKey::parse(&entry.user) else {
            tracing::warn!(user = %entry.user, "skipping invalid user key");
            summary.invalid += 1;
            continue;
        };

        if !overwrite && store.read(&key).ok().flatten().is_some() {
            summary.skipped += 1;
            continue;
        }

        store
            .save(&key, &entry.state)
            .with_context(|| format!("failed to save state for {key}"))?;
        summary.imported += 1;
    }

    Ok(summary)
}

/// Import user states from a JSON file produced by `export`.
pub fn import(config: &AkiraConfig, file: &Path, overwrite: bool) -> Result<()> {
    let json = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read import file: {}", file.display()))?;

    let data: ExportData = serde_json::from_str(&json).context("failed to parse import JSON")?;

    let store = akira::store::open_store(config)?;
    println!(
        "Importing {} users into the {} backend...",
        data.users.len(),
        store.backend()
    );

    let summary = restore(store.as_ref(), &data, overwrite)?;

    println!(
        "Import complete: {} imported, {} skipped (already exist), {} invalid.",
        summary.imported, summary.skipped, summary.invalid
    );
    Ok(())
}
