//! Greedy packing with overlap.
//!
//! Pieces (paragraphs or sentences) are appended to a buffer until the next
//! one would overflow the effective maximum. The buffer is then sealed into a
//! chunk and its tail pieces, up to `overlap_tokens`, seed the next buffer.
//! Buffer accounting sums per-piece estimates, which bounds the estimate of
//! the joined text for any estimator that is subadditive over whitespace
//! joins. A sealed chunk whose own estimate still exceeds the maximum is
//! re-packed by words.

use super::helpers::{pack_words, split_paragraphs, split_sentences};
use super::tokens::{HeuristicEstimator, TokenEstimator};
use super::types::{Chunk, ChunkingError, ChunkingPolicy};

/// Split `text` with the default [`HeuristicEstimator`].
pub fn split(text: &str, policy: &ChunkingPolicy) -> Result<Vec<Chunk>, ChunkingError> {
    split_with(text, policy, &HeuristicEstimator)
}

/// Split `text` into ordered chunks, estimating tokens with `estimator`.
pub fn split_with(
    text: &str,
    policy: &ChunkingPolicy,
    estimator: &dyn TokenEstimator,
) -> Result<Vec<Chunk>, ChunkingError> {
    policy.validate()?;
    let max_tokens = policy.effective_max_tokens();
    let mut packer = Packer::new(max_tokens, policy.overlap_tokens, estimator);

    for paragraph in split_paragraphs(text) {
        let tokens = estimator.estimate(&paragraph);
        if tokens <= max_tokens {
            packer.push(Piece {
                text: paragraph,
                tokens,
                joiner: Joiner::Paragraph,
            });
            continue;
        }

        // Seal at the paragraph boundary first, then pack its sentences.
        packer.make_room(tokens);
        for (i, sentence) in split_sentences(&paragraph).into_iter().enumerate() {
            let joiner = if i == 0 { Joiner::Paragraph } else { Joiner::Sentence };
            let tokens = estimator.estimate(sentence);
            if tokens <= max_tokens {
                packer.push(Piece {
                    text: sentence.to_string(),
                    tokens,
                    joiner,
                });
            } else {
                packer.push_words(sentence);
            }
        }
    }

    Ok(packer.finish())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Joiner {
    /// Starts a new paragraph: joined with a blank line.
    Paragraph,
    /// Continues the previous sentence's paragraph: joined with a space.
    Sentence,
}

impl Joiner {
    fn as_str(self) -> &'static str {
        match self {
            Joiner::Paragraph => "\n\n",
            Joiner::Sentence => " ",
        }
    }
}

#[derive(Debug, Clone)]
struct Piece {
    text: String,
    tokens: usize,
    joiner: Joiner,
}

struct Packer<'a> {
    max_tokens: usize,
    overlap_tokens: usize,
    estimator: &'a dyn TokenEstimator,
    /// Overlap seed pieces first, then `fresh` pieces added since the last seal.
    buffer: Vec<Piece>,
    buffer_tokens: usize,
    fresh: usize,
    chunks: Vec<Chunk>,
}

impl<'a> Packer<'a> {
    fn new(max_tokens: usize, overlap_tokens: usize, estimator: &'a dyn TokenEstimator) -> Self {
        Self {
            max_tokens,
            overlap_tokens,
            estimator,
            buffer: Vec::new(),
            buffer_tokens: 0,
            fresh: 0,
            chunks: Vec::new(),
        }
    }

    /// Seal the buffer if `incoming` more tokens would overflow it.
    fn make_room(&mut self, incoming: usize) {
        if self.fresh > 0 && self.buffer_tokens + incoming > self.max_tokens {
            if self.seal() {
                self.seed_overlap();
            } else {
                self.clear();
            }
        }
    }

    fn push(&mut self, piece: Piece) {
        self.make_room(piece.tokens);
        // Only seed pieces can be left here; drop the oldest until it fits.
        while !self.buffer.is_empty() && self.buffer_tokens + piece.tokens > self.max_tokens {
            let dropped = self.buffer.remove(0);
            self.buffer_tokens -= dropped.tokens;
        }
        self.buffer_tokens += piece.tokens;
        self.buffer.push(piece);
        self.fresh += 1;
    }

    /// Word-level fallback for a sentence above the maximum. No overlap is
    /// carried into or out of the resulting chunks.
    fn push_words(&mut self, sentence: &str) {
        self.seal();
        self.clear();
        for (text, _) in pack_words(sentence, self.max_tokens, self.estimator) {
            self.emit(text, 0, 0);
        }
    }

    fn clear(&mut self) {
        self.buffer.clear();
        self.buffer_tokens = 0;
        self.fresh = 0;
    }

    /// Emit the buffer as a chunk if it holds anything new. Returns `false`
    /// when the buffer had to be re-packed by words, in which case its pieces
    /// no longer describe the last emitted chunk.
    fn seal(&mut self) -> bool {
        if self.fresh == 0 {
            return true;
        }
        let seeds = self.buffer.len() - self.fresh;
        let mut content = String::new();
        let mut overlap_len = 0;
        let mut overlap_tokens = 0;
        for (i, piece) in self.buffer.iter().enumerate() {
            if i > 0 {
                content.push_str(piece.joiner.as_str());
            }
            content.push_str(&piece.text);
            if i < seeds {
                overlap_len = content.len();
                overlap_tokens += piece.tokens;
            }
        }

        self.fresh = 0;
        if self.estimator.estimate(&content) <= self.max_tokens {
            self.emit(content, overlap_len, overlap_tokens);
            return true;
        }
        for (text, _) in pack_words(&content, self.max_tokens, self.estimator) {
            self.emit(text, 0, 0);
        }
        false
    }

    /// Keep the longest tail of the buffer that fits in `overlap_tokens`.
    fn seed_overlap(&mut self) {
        let mut kept = 0;
        let mut kept_tokens = 0;
        for piece in self.buffer.iter().rev() {
            if kept_tokens + piece.tokens > self.overlap_tokens {
                break;
            }
            kept += 1;
            kept_tokens += piece.tokens;
        }
        let start = self.buffer.len() - kept;
        self.buffer.drain(..start);
        self.buffer_tokens = kept_tokens;
        self.fresh = 0;
    }

    fn emit(&mut self, content: String, overlap_len: usize, overlap_tokens: usize) {
        let tokens = self.estimator.estimate(&content);
        self.chunks.push(Chunk {
            index: self.chunks.len(),
            content,
            tokens,
            overlap_len,
            overlap_tokens,
        });
    }

    fn finish(mut self) -> Vec<Chunk> {
        self.seal();
        self.chunks
    }
}
