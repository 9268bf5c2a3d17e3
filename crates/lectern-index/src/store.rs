use std::future::Future;
use std::pin::Pin;

use crate::error::IndexError;
use crate::types::{Chunk, ScoredChunk, SearchRequest};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Storage and search over a single chunk class.
///
/// Implementations report native relevance signals in [`ScoredChunk`]; turning
/// them into one comparable score is the retriever's job.
pub trait ChunkIndex: Send + Sync {
    /// Verify the backend is reachable.
    fn health_check(&self) -> BoxFuture<'_, Result<(), IndexError>>;

    /// Drop the chunk class if present and create it empty.
    fn recreate(&self) -> BoxFuture<'_, Result<(), IndexError>>;

    /// Remove the chunk class. Dropping an absent class succeeds.
    fn drop_class(&self) -> BoxFuture<'_, Result<(), IndexError>>;

    /// Write a batch of chunks. Any rejected object fails the whole call.
    fn insert_batch(&self, chunks: Vec<Chunk>) -> BoxFuture<'_, Result<(), IndexError>>;

    fn search(&self, request: SearchRequest) -> BoxFuture<'_, Result<Vec<ScoredChunk>, IndexError>>;

    /// Number of stored chunks.
    fn count(&self) -> BoxFuture<'_, Result<u64, IndexError>>;
}
