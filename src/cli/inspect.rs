//! CLI `inspect` command: display the stored memory and recent turns of one user.

use anyhow::Result;

use akira::config::AkiraConfig;
use akira::store::UserKey;

/// Inspect a single user's state by sender identifier.
pub fn inspect(config: &AkiraConfig, user: &str) -> Result<()> {
    let store = akira::store::open_store(config)?;
    let key = UserKey::sanitize(user);

    let Some(state) = store.read(&key)? else {
        println!("No stored state for {key} ({} backend).", store.backend());
        return Ok(());
    };

    let memory = &state.memory;
    println!("User: {key}");
    println!("{}", "=".repeat(50));
    println!(
        "  Name:           {}",
        memory.user_name.as_deref().unwrap_or("(not set)")
    );
    println!("  Exchanges:      {}", state.exchange_count());

    println!();
    println!("Likes:");
    if memory.likes.is_empty() {
        println!("  (none)");
    }
    for like in &memory.likes {
        println!("  - {like}");
    }

    println!();
    println!("Facts:");
    if memory.facts.is_empty() {
        println!("  (none)");
    }
    for fact in &memory.facts {
        println!("  - {fact}");
    }

    let recent = state.recent_history(config.conversation.history_window);
    if !recent.is_empty() {
        println!();
        println!("Recent turns:");
        for turn in recent {
            println!("  [{}] {}", turn.role, turn.content);
        }
    }

    Ok(())
}
