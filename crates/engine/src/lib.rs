//! Retrieval-augmented generation over an indexed document collection.
//!
//! [`Engine`] is the outward surface: it wires an [`Ingestor`], a
//! [`Retriever`] and a [`Generator`] around one shared collection handle.
//!
//! [`Ingestor`]: quarry_ingest::Ingestor

pub mod engine;
pub mod generator;
pub mod query;
pub mod retriever;

pub use engine::{Engine, EngineError, EngineSettings};
pub use generator::{GenerateError, Generator, GeneratorConfig};
pub use retriever::{RetrieveError, Retriever};
