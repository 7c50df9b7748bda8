//! Query clean-up before embedding.

const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
];

/// Lowercase, keep only `a-z`, digits, whitespace and `. , ? !`, then trim and
/// collapse whitespace runs to single spaces.
pub fn normalize_query(query: &str) -> String {
    let kept: String = query
        .to_lowercase()
        .chars()
        .filter(|c| {
            c.is_ascii_lowercase()
                || c.is_ascii_digit()
                || c.is_whitespace()
                || matches!(c, '.' | ',' | '?' | '!')
        })
        .collect();
    kept.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Words of a normalized query longer than two characters that are not stop words.
pub fn extract_key_terms(normalized: &str) -> Vec<String> {
    normalized
        .split(' ')
        .filter(|term| term.len() > 2 && !STOP_WORDS.contains(term))
        .map(String::from)
        .collect()
}
