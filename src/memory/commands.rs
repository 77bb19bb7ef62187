//! Local commands that Akira answers without calling the completion service.
//!
//! Commands are a fixed, ordered rule table. Each [`Rule`] pairs an [`Intent`]
//! with a [`Trigger`]; the first rule whose trigger matches *and* whose intent
//! produces a reply wins. Matching ignores case, but the extracted argument
//! keeps the user's spelling ("me llamo Ana" stores "Ana").

use std::ops::Range;

use super::types::UserMemory;

/// A locally handled command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    IntroduceName,
    RecordLike,
    QueryLikes,
    RememberFact,
    Forget,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IntroduceName => "introduce_name",
            Self::RecordLike => "record_like",
            Self::QueryLikes => "query_likes",
            Self::RememberFact => "remember_fact",
            Self::Forget => "forget",
        }
    }

    /// Apply the intent to `memory` given the extracted argument.
    ///
    /// Returns `None` when the intent declines the message, letting later rules
    /// (or the completion service) handle it.
    fn apply(self, argument: &str, memory: &mut UserMemory) -> Option<String> {
        match self {
            Self::IntroduceName => {
                if argument.is_empty() {
                    return Some("¿Cómo te llamas? 😄".into());
                }
                memory.user_name = Some(argument.to_string());
                Some(format!("¡Mucho gusto, {argument}! 🐶💙 Lo guardo."))
            }
            Self::RecordLike => {
                if argument.is_empty() {
                    return None;
                }
                memory.likes.push(argument.to_string());
                Some(format!("¡Anotado! Te gusta {argument}. 😄"))
            }
            Self::QueryLikes => {
                if memory.likes.is_empty() {
                    Some("Aún no me dijiste tus gustos 😅".into())
                } else {
                    Some(format!("Te gusta: {} 🐾", memory.likes.join(", ")))
                }
            }
            Self::RememberFact => {
                if argument.is_empty() {
                    return Some("¿Qué quieres que recuerde?".into());
                }
                memory.facts.push(argument.to_string());
                Some("¡Listo! Lo guardo en mi memoria 🐾".into())
            }
            Self::Forget => {
                if argument.is_empty() {
                    return Some("Dime qué debería olvidar.".into());
                }
                let removed = forget_matching(memory, argument);
                tracing::debug!(key = argument, removed, "forget applied");
                Some("Hecho. Lo he olvidado 🫡".into())
            }
        }
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a rule recognizes its phrase in a message.
#[derive(Debug, Clone, Copy)]
pub enum Trigger {
    /// Message starts with the phrase; the argument is what follows it.
    Prefix(&'static str),
    /// Message contains the phrase; the argument is what follows its first occurrence.
    Contains(&'static str),
    /// Message contains any of the phrases; there is no argument.
    AnyOf(&'static [&'static str]),
}

impl Trigger {
    /// Returns the raw argument slice of `message` when the trigger fires.
    fn matches<'m>(&self, message: &'m str) -> Option<&'m str> {
        match *self {
            Self::Prefix(phrase) => {
                prefix_len_ignore_case(message, phrase).map(|len| &message[len..])
            }
            Self::Contains(phrase) => {
                find_ignore_case(message, phrase).map(|range| &message[range.end..])
            }
            Self::AnyOf(phrases) => phrases
                .iter()
                .any(|phrase| find_ignore_case(message, phrase).is_some())
                .then_some(""),
        }
    }
}

/// One entry of the command table.
#[derive(Debug, Clone, Copy)]
pub struct Rule {
    pub intent: Intent,
    pub trigger: Trigger,
}

/// The command table, in priority order.
pub const RULES: [Rule; 5] = [
    Rule {
        intent: Intent::IntroduceName,
        trigger: Trigger::Prefix("me llamo"),
    },
    Rule {
        intent: Intent::RecordLike,
        trigger: Trigger::Contains("me gusta"),
    },
    Rule {
        intent: Intent::QueryLikes,
        trigger: Trigger::AnyOf(&["qué me gusta", "que me gusta"]),
    },
    Rule {
        intent: Intent::RememberFact,
        trigger: Trigger::Prefix("recuerda que"),
    },
    Rule {
        intent: Intent::Forget,
        trigger: Trigger::Prefix("olvida"),
    },
];

/// A reply produced by a local command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandReply {
    pub intent: Intent,
    pub text: String,
}

/// Try the command table against `message`, mutating `memory` on a hit.
///
/// Returns `None` when no command handles the message.
pub fn handle(message: &str, memory: &mut UserMemory) -> Option<CommandReply> {
    let message = message.trim();
    RULES.iter().find_map(|rule| {
        let argument = clean_argument(rule.trigger.matches(message)?);
        rule.intent
            .apply(argument, memory)
            .map(|text| CommandReply {
                intent: rule.intent,
                text,
            })
    })
}

/// Remove every like and fact containing `key` (ignoring case). Returns how many were removed.
pub fn forget_matching(memory: &mut UserMemory, key: &str) -> usize {
    let key = key.to_lowercase();
    let before = memory.likes.len() + memory.facts.len();
    memory.likes.retain(|like| !like.to_lowercase().contains(&key));
    memory.facts.retain(|fact| !fact.to_lowercase().contains(&key));
    before - memory.likes.len() - memory.facts.len()
}

fn clean_argument(raw: &str) -> &str {
    raw.trim_matches(|c: char| c.is_whitespace() || ":;,.!?¡¿".contains(c))
}

/// Byte length of the prefix of `text` that matches `phrase` ignoring case.
fn prefix_len_ignore_case(text: &str, phrase: &str) -> Option<usize> {
    let mut wanted = phrase.chars().flat_map(char::to_lowercase).peekable();
    let mut consumed = 0;
    for (idx, ch) in text.char_indices() {
        if wanted.peek().is_none() {
            return Some(idx);
        }
        for lower in ch.to_lowercase() {
            if wanted.next() != Some(lower) {
                return None;
            }
        }
        consumed = idx + ch.len_utf8();
    }
    wanted.peek().is_none().then_some(consumed)
}

/// Byte range of the first occurrence of `phrase` in `text`, ignoring case.
fn find_ignore_case(text: &str, phrase: &str) -> Option<Range<usize>> {
    text.char_indices().find_map(|(start, _)| {
        prefix_len_ignore_case(&text[start..], phrase).map(|len| start..start + len)
    })
}
