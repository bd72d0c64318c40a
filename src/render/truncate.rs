pub const ELLIPSIS: char = '…';

/// A sentence end counts only when it keeps more than this share of the budget.
const SENTENCE_KEEP_RATIO: f32 = 0.7;

/// Shortens `text` to at most `max_chars` characters, preferring to end on a
/// full sentence. Cuts that are not on a sentence end get a trailing ellipsis,
/// so the result is at most `max_chars + 1` characters long.
pub fn smart_truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let prefix: Vec<char> = text.chars().take(max_chars).collect();
    let last_sentence_end = prefix
        .iter()
        .rposition(|ch| matches!(ch, '.' | '!' | '?'));
    if let Some(end) = last_sentence_end {
        if end as f32 > max_chars as f32 * SENTENCE_KEEP_RATIO {
            return prefix[..=end].iter().collect();
        }
    }

    let cut = match prefix.iter().rposition(|ch| ch.is_whitespace()) {
        Some(space) if space > 0 => space,
        _ => prefix.len(),
    };
    let mut truncated: String = prefix[..cut].iter().collect();
    truncated.push(ELLIPSIS);
    truncated
}
