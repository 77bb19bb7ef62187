use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use akira::config::AkiraConfig;
use akira::memory::types::UserState;
use akira::store::StateStore;

/// Export format: one entry per stored user.
#[derive(Debug, Serialize, Deserialize)]
pub struct ExportData {
    pub exported_at: String,
    pub users: Vec<ExportedUser>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExportedUser {
    pub user: String,
    pub state: UserState,
}

/// Collect every readable user state. Unreadable entries are skipped with a warning.
pub fn collect(store: &dyn StateStore) -> Result<ExportData> {
    let mut users = Vec::new();
    for key in store.keys().context("failed to list stored users")? {
        match store.read(&key) {
            Ok(Some(state)) => users.push(ExportedUser {
                user: key.to_string(),
                state,
            }),
            Ok(None) => {}
            Err(e) => tracing::warn!(user = %key, error = %e, "skipping unreadable state"),
        }
    }
    Ok(ExportData {
        exported_at: chrono::Utc::now().to_rfc3339(),
        users,
    })
}

/// Export all user states as JSON to stdout.
pub fn export(config: &AkiraConfig) -> Result<()> {
    let store = akira::store::open_store(config)?;
    let data = collect(store.as_ref())?;

    let json = serde_json::to_string_pretty(&data)?;
    println!("{json}");

    eprintln!(
        "Exported {} users from the {} backend.",
        data.users.len(),
        store.backend()
    );
    Ok(())
}
