//! CLI `doctor` command: check storage, completion and OCR configuration.

use std::sync::Arc;

use anyhow::{Context, Result};

use akira::config::AkiraConfig;
use akira::store::sqlite::SqliteStateStore;
use akira::store::StateStore;

/// Run diagnostics and print a health report.
pub fn doctor(config: &AkiraConfig) -> Result<()> {
    println!("Akira Health Report");
    println!("===================");
    println!();

    let store: Arc<dyn StateStore> = match config.storage.backend.as_str() {
        "sqlite" => {
            let db_path = config.resolved_db_path();
            let sqlite = SqliteStateStore::open(&db_path).context("failed to open state store")?;
            println!("Storage backend:   {}", sqlite.backend());
            let file_size = std::fs::metadata(&db_path).map(|m| m.len()).unwrap_or(0);
            println!("Database:          {}", db_path.display());
            println!("File size:         {}", format_bytes(file_size));

            let report = sqlite.health().context("failed to run health check")?;
            println!("Schema version:    {}", report.schema_version);
            println!();
            println!("Row counts:");
            println!("  Users:           {}", report.user_count);
            println!("  Likes/facts:     {}", report.item_count);
            println!("  Turns:           {}", report.turn_count);
            println!();
            if report.integrity_ok {
                println!("Integrity check:   PASSED");
            } else {
                println!("Integrity check:   FAILED ({})", report.integrity_details);
                println!();
                println!("Recovery steps:");
                println!("  1. Restore from a backup of {}", db_path.display());
                println!("  2. Or export from a good copy and reimport:");
                println!("     akira export > backup.json");
                println!("     akira reset && akira import backup.json");
            }
            Arc::new(sqlite)
        }
        _ => {
            let store = akira::store::open_store(config).context("failed to open state store")?;
            println!("Storage backend:   {}", store.backend());
            println!("Directory:         {}", config.resolved_store_dir().display());
            store
        }
    };

    let keys = store.keys().context("failed to list stored users")?;
    let unreadable = keys.iter().filter(|k| store.read(k).is_err()).count();
    println!("Stored users:      {}", keys.len());
    if unreadable > 0 {
        println!("  WARNING: {unreadable} unreadable state(s); they will start fresh on next contact.");
    }

    println!();
    println!("Completion:");
    println!("  Provider:        {}", config.completion.provider);
    println!("  Model:           {}", config.completion.model);
    println!("  Base URL:        {}", config.completion.base_url);
    println!(
        "  API key:         {}",
        if config.completion.api_key.is_some() {
            "set"
        } else {
            "MISSING (set OPENAI_API_KEY)"
        }
    );

    println!();
    println!("Media:");
    println!("  OCR command:     {} ({})", config.media.ocr_command, ocr_status(&config.media.ocr_command));
    println!(
        "  Twilio creds:    {}",
        if config.media.twilio_account_sid.is_some() && config.media.twilio_auth_token.is_some() {
            "set"
        } else {
            "missing (media downloads will fail on protected URLs)"
        }
    );
    println!("  Max reply chars: {}", config.media.max_reply_chars);

    Ok(())
}

fn ocr_status(command: &str) -> String {
    match std::process::Command::new(command).arg("--version").output() {
        Ok(output) if output.status.success() => {
            let text = String::from_utf8_lossy(&output.stdout);
            text.lines().next().unwrap_or("found").trim().to_string()
        }
        Ok(output) => format!("exited with {}", output.status),
        Err(_) => "not found".to_string(),
    }
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
