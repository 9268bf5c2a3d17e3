use std::path::Path;
use std::sync::Arc;

use futures::StreamExt;

use crate::chunker::HierarchicalChunker;
use crate::document::{Document, discover, load_document};
use crate::error::IndexError;
use crate::store::ChunkIndex;
use crate::types::Chunk;

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("failed to prepare the chunk class: {0}")]
    Prepare(#[source] IndexError),

    #[error("batch {batch} (chunks {start}..{end}) failed: {source}")]
    Batch {
        batch: usize,
        start: usize,
        end: usize,
        #[source]
        source: IndexError,
    },

    #[error("could not verify the ingested count: {0}")]
    Verify(#[source] IndexError),

    #[error("index holds {actual} chunks after ingestion, expected {expected}")]
    CountMismatch { expected: u64, actual: u64 },
}

/// Outcome of an ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub documents: usize,
    /// Files that could not be read.
    pub skipped: usize,
    pub chunks: usize,
    /// Count reported by the index after the run; `None` when nothing was written.
    pub indexed: Option<u64>,
}

/// Drop-and-recreate ingestion: chunk every page, replace the class, write in
/// batches, and verify the stored count.
///
/// A failed run drops the class so a partial corpus is never left queryable.
pub struct IngestionPipeline {
    chunker: HierarchicalChunker,
    index: Arc<dyn ChunkIndex>,
    batch_size: usize,
    concurrency: usize,
}

impl IngestionPipeline {
    #[must_use]
    pub fn new(chunker: HierarchicalChunker, index: Arc<dyn ChunkIndex>, batch_size: usize) -> Self {
        Self {
            chunker,
            index,
            batch_size: batch_size.max(1),
            concurrency: 1,
        }
    }

    /// Maximum number of batches in flight.
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Chunk pages in order. Each page's chunks are numbered from zero.
    #[must_use]
    pub fn chunk_documents(&self, documents: &[Document]) -> Vec<Chunk> {
        documents
            .iter()
            .flat_map(|doc| self.chunker.chunk(doc))
            .collect()
    }

    /// Discover, load, and ingest every matching file under `src`.
    ///
    /// Unreadable files are skipped and counted.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to or verifying the index fails.
    pub async fn ingest_dir(
        &self,
        src: &Path,
        patterns: &[String],
    ) -> Result<IngestReport, IngestError> {
        let paths = discover(src, patterns);
        tracing::info!(src = %src.display(), files = paths.len(), "discovered source files");

        let mut documents = Vec::with_capacity(paths.len());
        let mut skipped = 0;
        for path in &paths {
            match load_document(path).await {
                Ok(doc) => documents.push(doc),
                Err(e) => {
                    tracing::warn!(path = %path.display(), "skipping unreadable file: {e}");
                    skipped += 1;
                }
            }
        }

        let mut report = self.ingest_documents(&documents).await?;
        report.skipped = skipped;
        Ok(report)
    }

    /// # Errors
    ///
    /// Returns an error if writing to or verifying the index fails. The class
    /// is dropped before returning a batch or count error.
    pub async fn ingest_documents(&self, documents: &[Document]) -> Result<IngestReport, IngestError> {
        let chunks = self.chunk_documents(documents);
        let mut report = IngestReport {
            documents: documents.len(),
            chunks: chunks.len(),
            ..IngestReport::default()
        };
        if chunks.is_empty() {
            tracing::warn!(documents = documents.len(), "no chunks produced, index left untouched");
            return Ok(report);
        }

        self.index.recreate().await.map_err(IngestError::Prepare)?;

        let expected = chunks.len() as u64;
        if let Err(e) = self.write_batches(chunks).await {
            tracing::error!("ingestion aborted: {e}");
            self.abandon().await;
            return Err(e);
        }

        let actual = match self.index.count().await {
            Ok(actual) => actual,
            Err(e) => {
                tracing::error!("ingested count unavailable: {e}");
                self.abandon().await;
                return Err(IngestError::Verify(e));
            }
        };
        if actual != expected {
            tracing::error!(expected, actual, "ingested count mismatch");
            self.abandon().await;
            return Err(IngestError::CountMismatch { expected, actual });
        }

        report.indexed = Some(actual);
        tracing::info!(
            documents = report.documents,
            chunks = report.chunks,
            indexed = actual,
            "ingestion complete"
        );
        Ok(report)
    }

    async fn write_batches(&self, chunks: Vec<Chunk>) -> Result<(), IngestError> {
        let mut batches = Vec::new();
        let mut start = 0;
        let mut remaining = chunks.into_iter().peekable();
        while remaining.peek().is_some() {
            let batch: Vec<Chunk> = remaining.by_ref().take(self.batch_size).collect();
            let end = start + batch.len();
            batches.push((batches.len(), start, end, batch));
            start = end;
        }
        let total = batches.len();

        let mut results = futures::stream::iter(batches.into_iter().map(|(batch, start, end, items)| {
            let index = Arc::clone(&self.index);
            async move {
                index
                    .insert_batch(items)
                    .await
                    .map_err(|source| IngestError::Batch {
                        batch,
                        start,
                        end,
                        source,
                    })?;
                tracing::debug!(batch, total, start, end, "batch inserted");
                Ok::<_, IngestError>(())
            }
        }))
        .buffered(self.concurrency);

        while let Some(result) = results.next().await {
            result?;
        }
        Ok(())
    }

    async fn abandon(&self) {
        if let Err(e) = self.index.drop_class().await {
            tracing::warn!("failed to drop partially ingested class: {e}");
        }
    }
}
