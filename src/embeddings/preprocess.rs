//! Text cleanup applied before embedding.

/// Rough characters-per-token ratio for English subword tokenizers.
pub const CHARS_PER_TOKEN: usize = 4;

/// Normalize whitespace and cut `text` down to the model's token budget.
///
/// Runs of whitespace collapse to a single space and the ends are trimmed.
/// The result is truncated to `max_tokens * CHARS_PER_TOKEN` characters; the
/// tokenizer truncates exactly afterwards.
#[must_use]
pub fn preprocess_text(text: &str, max_tokens: usize) -> String {
    let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let max_chars = max_tokens.saturating_mul(CHARS_PER_TOKEN);

    match normalized.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => normalized[..byte_idx].trim_end().to_string(),
        None => normalized,
    }
}
