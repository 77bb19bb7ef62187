//! Akira, a friendly chat companion with per-user memory.
//!
//! Akira answers messages from a WhatsApp-style webhook or the terminal. Each
//! sender gets a small persistent memory (name, likes, facts) plus a rolling
//! conversation history. Simple Spanish commands are handled locally; anything
//! else goes to an OpenAI-compatible chat completion service with the persona,
//! the memory summary and a window of recent turns as context. Images and
//! documents are summarized or explained through the same service, with OCR as
//! a fallback for photographed text.
//!
//! # Modules
//!
//! - [`akira`]: The reply orchestrator, one turn per call, serialized per user
//! - [`completion`]: Chat completion requests and the OpenAI-compatible client
//! - [`config`]: Configuration loading from TOML files and environment variables
//! - [`db`]: SQLite database initialization, schema, migrations, and health checks
//! - [`locks`]: Per-user async locks
//! - [`media`]: Document extraction, OCR, and attachment analysis
//! - [`memory`]: User memory types, the command table, and context composition
//! - [`persona`]: Persona text and canned replies
//! - [`server`]: HTTP server wiring
//! - [`store`]: Per-user state persistence (JSON files or SQLite)
//! - [`webhook`]: Inbound message handling, reply chunking, and TwiML output

pub mod akira;
pub mod completion;
pub mod config;
pub mod db;
pub mod locks;
pub mod media;
pub mod memory;
pub mod persona;
pub mod server;
pub mod store;
pub mod webhook;
