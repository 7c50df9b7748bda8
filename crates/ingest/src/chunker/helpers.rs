//! Text segmentation used by the packer.

use super::tokens::TokenEstimator;

/// Split `text` into paragraphs at blank lines (lines holding only
/// whitespace). Paragraphs are trimmed; empty ones are dropped.
pub(crate) fn split_paragraphs(text: &str) -> Vec<String> {
    let mut paragraphs = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in text.lines() {
        if line.trim().is_empty() {
            flush_paragraph(&mut current, &mut paragraphs);
        } else {
            current.push(line);
        }
    }
    flush_paragraph(&mut current, &mut paragraphs);
    paragraphs
}

fn flush_paragraph(lines: &mut Vec<&str>, out: &mut Vec<String>) {
    if lines.is_empty() {
        return;
    }
    let joined = lines.join("\n");
    let para = joined.trim();
    if !para.is_empty() {
        out.push(para.to_string());
    }
    lines.clear();
}

/// Split `text` after `.`, `!` or `?` when followed by whitespace.
/// Returns trimmed, non-empty sentences.
pub(crate) fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((_, c)) = chars.next() {
        if !matches!(c, '.' | '!' | '?') {
            continue;
        }
        if let Some(&(next_idx, next)) = chars.peek() {
            if next.is_whitespace() {
                let s = text[start..next_idx].trim();
                if !s.is_empty() {
                    sentences.push(s);
                }
                start = next_idx;
            }
        }
    }

    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }
    sentences
}

/// Greedily pack whitespace-delimited words into pieces of at most
/// `max_tokens`. A single word above the limit becomes its own piece.
pub(crate) fn pack_words(
    text: &str,
    max_tokens: usize,
    estimator: &dyn TokenEstimator,
) -> Vec<(String, usize)> {
    let mut pieces = Vec::new();
    let mut buf: Vec<&str> = Vec::new();
    let mut buf_tokens = 0;

    for word in text.split_whitespace() {
        let word_tokens = estimator.estimate(word);
        if !buf.is_empty() && buf_tokens + word_tokens > max_tokens {
            pieces.push((buf.join(" "), buf_tokens));
            buf.clear();
            buf_tokens = 0;
        }
        buf.push(word);
        buf_tokens += word_tokens;
    }
    if !buf.is_empty() {
        pieces.push((buf.join(" "), buf_tokens));
    }
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::tokens::HeuristicEstimator;

    #[test]
    fn paragraphs_split_on_blank_lines() {
        let text = "First line\nstill first.\n\n  \n\nSecond.\r\n\r\nThird";
        let paras = split_paragraphs(text);
        assert_eq!(paras, vec!["First line\nstill first.", "Second.", "Third"]);
    }

    #[test]
    fn paragraphs_of_blank_text() {
        assert!(split_paragraphs("").is_empty());
        assert!(split_paragraphs("\n\n   \n").is_empty());
    }

    #[test]
    fn sentences_split_after_terminal_punctuation() {
        let s = split_sentences("One. Two! Three? Four");
        assert_eq!(s, vec!["One.", "Two!", "Three?", "Four"]);
    }

    #[test]
    fn sentences_keep_inline_dots() {
        let s = split_sentences("Version 1.2 shipped. It works...  Really.");
        assert_eq!(s, vec!["Version 1.2 shipped.", "It works...", "Really."]);
    }

    #[test]
    fn sentences_split_across_newlines() {
        let s = split_sentences("Line one.\nLine two.");
        assert_eq!(s, vec!["Line one.", "Line two."]);
    }

    #[test]
    fn words_respect_limit() {
        let text = (0..50).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ");
        let pieces = pack_words(&text, 10, &HeuristicEstimator);
        // Each word costs 2 tokens (ceil 1.3), so 5 words per piece.
        assert_eq!(pieces.len(), 10);
        for (piece, tokens) in &pieces {
            assert!(*tokens <= 10);
            assert_eq!(piece.split_whitespace().count(), 5);
        }
    }

    #[test]
    fn oversized_word_stands_alone() {
        let long = "x".repeat(10);
        let text = format!("a {long} b");
        let pieces = pack_words(&text, 1, &|t: &str| t.len());
        assert_eq!(pieces.len(), 3);
        assert_eq!(pieces[1].0, long);
    }
}
