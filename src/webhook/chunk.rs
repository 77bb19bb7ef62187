/// Split a reply into channel-sized messages of at most `max_chars` characters.
///
/// A reply that fits is returned as-is (trimmed). Longer replies are cut into
/// consecutive chunks, each prefixed with `(i/total)\n`. Lengths are counted
/// in characters, so a chunk never ends inside a multi-byte character.
pub fn split_for_channel(text: &str, max_chars: usize) -> Vec<String> {
    let text = text.trim();
    let max_chars = max_chars.max(1);

    if text.chars().count() <= max_chars {
        return vec![text.to_string()];
    }

    let chars: Vec<char> = text.chars().collect();
    let parts: Vec<String> = chars
        .chunks(max_chars)
        .map(|chunk| chunk.iter().collect())
        .collect();
    let total = parts.len();

    parts
        .into_iter()
        .enumerate()
        .map(|(i, part)| format!("({}/{total})\n{part}", i + 1))
        .collect()
}
