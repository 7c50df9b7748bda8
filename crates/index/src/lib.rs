//! Vector index access: a backend-neutral [`VectorIndex`] trait, Qdrant and
//! in-memory backends, and the [`Collection`] handle that owns collection
//! lifecycle and dimension checks.

pub mod collection;
pub mod error;
pub mod memory;
pub mod qdrant;
pub mod traits;
pub mod types;

pub use collection::{Collection, MismatchPolicy};
pub use error::IndexError;
pub use memory::InMemoryIndex;
pub use qdrant::QdrantIndex;
pub use traits::VectorIndex;
pub use types::{CollectionInfo, Distance, Point, ScoredPoint};
