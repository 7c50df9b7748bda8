//! Token-aware chunking engine.
//!
//! Splits plain text into ordered, overlapping chunks that fit an embedding
//! window: paragraphs are packed greedily, oversized paragraphs fall back to
//! sentences, and sentences that still do not fit fall back to words.

mod helpers;
mod packer;
mod tokens;
mod types;

pub use packer::{split, split_with};
pub use tokens::{HeuristicEstimator, TokenEstimator};
pub use types::{model_token_limit, Chunk, ChunkingError, ChunkingPolicy};
