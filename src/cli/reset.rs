//! CLI `reset` command: delete one or all user states after confirmation.

use anyhow::{bail, Result};
use std::io::Write;

use akira::config::AkiraConfig;
use akira::store::{StateStore, UserKey};

/// Delete stored state. With `user`, only that user; otherwise everyone.
pub fn reset(config: &AkiraConfig, user: Option<&str>) -> Result<()> {
    let store = akira::store::open_store(config)?;
    let key = user.map(UserKey::sanitize);

    match &key {
        Some(key) => println!("WARNING: This will permanently delete the memory and history of {key}."),
        None => println!("WARNING: This will permanently delete ALL user memories and histories."),
    }
    println!("Backend: {}", store.backend());
    print!("\nType YES to confirm: ");
    std::io::stdout().flush()?;

    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;

    if input.trim() != "YES" {
        bail!("reset cancelled");
    }

    let removed = remove_states(store.as_ref(), key.as_ref())?;
    println!("Deleted {removed} user state(s).");
    Ok(())
}

/// Remove `key`, or every stored key when `None`. Returns how many were removed.
pub fn remove_states(store: &dyn StateStore, key: Option<&UserKey>) -> Result<usize> {
    let keys = match key {
        Some(key) => vec![key.clone()],
        None => store.keys()?,
    };

    let mut removed = 0;
    for key in &keys {
        if store.remove(key)? {
            tracing::info!(user = %key, "state removed");
            removed += 1;
        }
    }
    Ok(removed)
}
