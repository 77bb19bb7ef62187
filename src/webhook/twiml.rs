//! TwiML messaging replies.

use std::fmt;

/// A `<Response>` document with one `<Message>` per outgoing text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessagingResponse {
    messages: Vec<String>,
}

impl MessagingResponse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn message(&mut self, body: impl Into<String>) -> &mut Self {
        self.messages.push(body.into());
        self
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }
}

impl FromIterator<String> for MessagingResponse {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self {
            messages: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for MessagingResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(r#"<?xml version="1.0" encoding="UTF-8"?><Response>"#)?;
        for message in &self.messages {
            write!(f, "<Message>{}</Message>", escape_xml(message))?;
        }
        f.write_str("</Response>")
    }
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c if is_xml_char(c) => out.push(c),
            _ => out.push(char::REPLACEMENT_CHARACTER),
        }
    }
    out
}

/// The XML 1.0 `Char` production.
fn is_xml_char(c: char) -> bool {
    matches!(c, '\t' | '\n' | '\r')
        || (c >= ' ' && !matches!(c, '\u{FFFE}' | '\u{FFFF}'))
}
