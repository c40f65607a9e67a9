//! Retrieval pipeline: embedding generation, vector indexing, and
//! nearest-neighbor search over the memory collection.
//!
//! # Architecture
//!
//! - `embedder`: wraps fastembed for normalized embedding generation
//! - `index`: in-memory vector index, exact inner-product search
//! - `storage`: binary file I/O for the vectors.bin embedding cache

pub mod embedder;
mod index;
mod storage;

pub use embedder::{Embedder, EmbedderError};
pub use index::{Candidate, IndexError, MemoryIndex};
pub use storage::{corpus_hash, VectorStorage, VectorStorageError};
