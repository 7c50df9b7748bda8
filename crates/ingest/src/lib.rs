//! Document ingestion: token-aware chunking, embedding providers, and the
//! [`Ingestor`] that writes chunk vectors into a collection.

pub mod chunker;
pub mod document;
pub mod embedding;
pub mod ingestor;

pub use ingestor::{
    IndexedChunkRef, IngestConfig, IngestError, IngestReport, Ingestor, SkipReason, SkippedChunk,
};
