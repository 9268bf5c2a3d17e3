//! Tutorial corpus indexing: document loading, hierarchical chunking, index
//! backends, and retrieval.
//!
//! Documents are parsed into heading/text blocks, split by [`HierarchicalChunker`]
//! into breadcrumb-scoped chunks, and written to a [`ChunkIndex`] by the
//! [`IngestionPipeline`]. Queries go through the [`Retriever`], which normalises
//! the native scores of each search mode into a single `score` field.

pub mod chunker;
pub mod document;
pub mod error;
pub mod http;
pub mod in_memory;
pub mod pipeline;
pub(crate) mod retry;
pub mod retriever;
pub mod store;
pub mod types;
pub mod weaviate;

pub use chunker::{ChunkerConfig, ChunkerConfigError, HierarchicalChunker, SizeUnit};
pub use error::{IndexError, Result};
pub use in_memory::InMemoryIndex;
pub use pipeline::{IngestError, IngestReport, IngestionPipeline};
pub use retriever::{RetrievalError, Retriever};
pub use store::{BoxFuture, ChunkIndex};
pub use types::{Chunk, Hit, ScoredChunk, SearchMode, SearchRequest};
pub use weaviate::WeaviateIndex;
