//! Token count estimation.

/// Estimates how many tokens a text costs a provider's tokenizer.
///
/// Chunk packing and the ingestion size guard must use the same estimator so
/// they agree on what fits.
pub trait TokenEstimator: Send + Sync {
    fn estimate(&self, text: &str) -> usize;
}

impl<F> TokenEstimator for F
where
    F: Fn(&str) -> usize + Send + Sync,
{
    fn estimate(&self, text: &str) -> usize {
        self(text)
    }
}

/// Characters that end a word in addition to whitespace.
const WORD_DELIMITERS: &[char] = &[',', '.', ';', ':', '!', '?', '(', ')', '[', ']', '{', '}', '\'', '"'];

/// Word/punctuation heuristic:
///
/// ```text
/// words   = runs left after splitting on whitespace and , . ; : ! ? ( ) [ ] { } ' "
/// special = chars that are neither ASCII alphanumeric nor whitespace
/// tokens  = ceil(1.3 * words + 0.5 * special)
/// ```
///
/// Computed in integer tenths so the result is exact and reproducible.
/// Appending text never lowers the estimate, and joining two texts with
/// whitespace never costs more than the sum of their estimates.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicEstimator;

impl TokenEstimator for HeuristicEstimator {
    fn estimate(&self, text: &str) -> usize {
        let words = text
            .split(|c: char| c.is_whitespace() || WORD_DELIMITERS.contains(&c))
            .filter(|w| !w.is_empty())
            .count();
        let special = text
            .chars()
            .filter(|c| !c.is_ascii_alphanumeric() && !c.is_whitespace())
            .count();
        (13 * words + 5 * special).div_ceil(10)
    }
}
