//! Builds the message list for a conversational completion request:
//! persona plus memory summary, a window of recent turns, then the new message.

use super::types::{Turn, UserMemory};
use crate::completion::ChatMessage;

/// Header placed before the memory summary inside the system message.
pub const MEMORY_HEADER: &str = "Memoria del usuario:";

/// One line per non-empty memory section. Empty sections are omitted entirely.
pub fn memory_summary(memory: &UserMemory) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(name) = memory.user_name.as_deref().filter(|n| !n.is_empty()) {
        lines.push(format!("Nombre del usuario: {name}"));
    }
    if !memory.likes.is_empty() {
        lines.push(format!("Gustos del usuario: {}", memory.likes.join(", ")));
    }
    if !memory.facts.is_empty() {
        lines.push(format!("Hechos guardados: {}", memory.facts.join("; ")));
    }
    lines
}

/// Persona text, followed by the memory summary when there is anything to summarize.
pub fn system_prompt(persona: &str, memory: &UserMemory) -> String {
    let summary = memory_summary(memory);
    if summary.is_empty() {
        return persona.to_string();
    }
    format!("{persona}\n\n{MEMORY_HEADER}\n{}", summary.join("\n"))
}

/// `[system] + history + [user: message]`, ready for a completion request.
///
/// `history` is expected to be already windowed (see
/// [`UserState::recent_history`](super::types::UserState::recent_history)).
pub fn compose(
    persona: &str,
    memory: &UserMemory,
    history: &[Turn],
    message: &str,
) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(ChatMessage::system(system_prompt(persona, memory)));
    messages.extend(history.iter().map(ChatMessage::from));
    messages.push(ChatMessage::user(message));
    messages
}
