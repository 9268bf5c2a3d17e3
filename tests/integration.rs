use std::path::Path;
use std::sync::Arc;

use lectern_core::answer::{AnswerSettings, OOD_REPLY};
use lectern_core::{Answerer, ConfidenceGate, GateConfig, Outcome};
use lectern_index::document::loader::{discover, load_document};
use lectern_index::document::Document;
use lectern_index::{
    ChunkIndex, ChunkerConfig, HierarchicalChunker, InMemoryIndex, IngestError, IngestionPipeline,
    Retriever, SearchMode, SizeUnit, WeaviateIndex,
};
use lectern_llm::mock::MockProvider;
use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const WALLS_MD: &str = "# Walls

Walls are the basic building element in a project.

## Create a wall

Open the Architecture tab and click Wall. Pick a wall type in the Type Selector,
then click two points in the drawing area.

## Edit a wall profile

Select the wall, click Edit Profile, and sketch the new outline of the wall.
";

const FAMILIES_HTML: &str = "<html><head><title>Families</title></head><body>
<nav><a href=\"/\">Home</a></nav>
<h1>Families</h1>
<p>A family type is a named set of parameter values within a family.</p>
<h2>Type catalogs</h2>
<p>Type catalogs list many family types in a text file next to the family.</p>
<p>Watch <a href=\"https://www.youtube.com/watch?v=abc123\">the video</a>.</p>
</body></html>";

const ROOFS_JSONL: &str = r#"{"title": "Roofs", "url": "https://help.example.com/roofs", "category": "Modeling"}
{"heading": "Roof by footprint", "text": "Sketch the building footprint and define slopes for each edge."}
{"heading": "Roof by extrusion", "text": "Sketch a profile in an elevation and extrude it along the roof."}
"#;

fn chunker() -> HierarchicalChunker {
    HierarchicalChunker::new(ChunkerConfig {
        unit: SizeUnit::Tokens,
        target_size: 40,
        min_size: 3,
        max_size: 80,
        overlap: 0,
        max_depth: 6,
    })
    .unwrap()
}

fn write_corpus(dir: &Path) {
    std::fs::create_dir_all(dir.join("walls")).unwrap();
    std::fs::write(dir.join("walls/walls.md"), WALLS_MD).unwrap();
    std::fs::write(dir.join("families.html"), FAMILIES_HTML).unwrap();
    std::fs::write(dir.join("roofs.jsonl"), ROOFS_JSONL).unwrap();
}

fn patterns() -> Vec<String> {
    vec!["**/*.md".into(), "**/*.html".into(), "**/*.jsonl".into()]
}

async fn load_corpus(dir: &Path) -> Vec<Document> {
    let mut documents = Vec::new();
    for path in discover(dir, &patterns()) {
        documents.push(load_document(&path).await.unwrap());
    }
    documents
}

fn answerer(index: Arc<dyn ChunkIndex>, provider: MockProvider, mode: SearchMode) -> Answerer<MockProvider> {
    Answerer::new(
        Retriever::new(index),
        ConfidenceGate::new(GateConfig::default()),
        provider,
        AnswerSettings {
            mode,
            k: 5,
            ..AnswerSettings::default()
        },
    )
}

#[tokio::test]
async fn ingest_count_and_answer_in_memory() {
    let dir = tempfile::tempdir().unwrap();
    write_corpus(dir.path());

    let index = Arc::new(InMemoryIndex::default());
    let pipeline = IngestionPipeline::new(chunker(), index.clone(), 2).with_concurrency(2);
    let report = pipeline.ingest_dir(dir.path(), &patterns()).await.unwrap();

    assert_eq!(report.documents, 3);
    assert_eq!(report.skipped, 0);
    assert!(report.chunks >= 3);
    assert_eq!(report.indexed, Some(report.chunks as u64));
    assert_eq!(index.count().await.unwrap(), report.chunks as u64);

    let provider = MockProvider::with_responses(vec![
        "<think>source 1 defines it</think>A family type is a named set of parameter values [1].".into(),
    ]);
    let answerer = answerer(index.clone(), provider, SearchMode::Bm25);

    let answer = answerer.ask("What is a family type?").await;
    assert_eq!(answer.outcome, Outcome::Answered);
    assert_eq!(answer.text, "A family type is a named set of parameter values [1].");
    assert!(answer.sources.contains("Families"));
    assert_eq!(answer.hits[0].chunk.page_title, "Families");

    let rejected = answerer.ask("quantum chromodynamics lattice").await;
    assert!(matches!(rejected.outcome, Outcome::Rejected { .. }));
    assert_eq!(rejected.text, OOD_REPLY);
    assert_eq!(answerer.provider().prompts().len(), 1);
}

#[tokio::test]
async fn chunk_metadata_survives_loading() {
    let dir = tempfile::tempdir().unwrap();
    write_corpus(dir.path());
    let documents = load_corpus(dir.path()).await;

    let pipeline = IngestionPipeline::new(chunker(), Arc::new(InMemoryIndex::default()), 10);
    let chunks = pipeline.chunk_documents(&documents);

    let families: Vec<_> = chunks.iter().filter(|c| c.page_title == "Families").collect();
    assert!(!families.is_empty());
    assert!(families.iter().all(|c| c.breadcrumb.first().map(String::as_str) == Some("Families")));
    assert!(
        families
            .iter()
            .any(|c| c.video_links == vec!["https://www.youtube.com/watch?v=abc123".to_owned()])
    );

    let roofs: Vec<_> = chunks.iter().filter(|c| c.page_title == "Roofs").collect();
    assert!(roofs.iter().all(|c| c.page_url == "https://help.example.com/roofs"));
    assert!(roofs.iter().all(|c| c.category.as_deref() == Some("Modeling")));

    for page in ["Walls", "Families", "Roofs"] {
        let indices: Vec<u32> = chunks
            .iter()
            .filter(|c| c.page_title == page)
            .map(|c| c.chunk_index)
            .collect();
        let expected: Vec<u32> = (0..).take(indices.len()).collect();
        assert_eq!(indices, expected, "{page}");
    }
}

#[tokio::test]
async fn reingestion_replaces_corpus() {
    let dir = tempfile::tempdir().unwrap();
    write_corpus(dir.path());

    let index = Arc::new(InMemoryIndex::default());
    let pipeline = IngestionPipeline::new(chunker(), index.clone(), 3);
    let first = pipeline.ingest_dir(dir.path(), &patterns()).await.unwrap();
    let second = pipeline.ingest_dir(dir.path(), &patterns()).await.unwrap();

    assert_eq!(first.chunks, second.chunks);
    assert_eq!(index.count().await.unwrap(), second.chunks as u64);
}

async fn mount_schema(server: &MockServer, drops: u64) {
    Mock::given(method("DELETE"))
        .and(path("/v1/schema/TutorialChunk"))
        .respond_with(ResponseTemplate::new(200))
        .expect(drops)
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/schema"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(server)
        .await;
}

async fn mount_batch_and_count(server: &MockServer, accepted: usize, counted: usize) {
    let results: Vec<_> = (0..accepted).map(|_| json!({ "result": {} })).collect();
    Mock::given(method("POST"))
        .and(path("/v1/batch/objects"))
        .respond_with(ResponseTemplate::new(200).set_body_json(results))
        .expect(1)
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/graphql"))
        .and(body_string_contains("Aggregate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "Aggregate": { "TutorialChunk": [ { "meta": { "count": counted } } ] } }
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn weaviate_ingestion_verifies_count() {
    let dir = tempfile::tempdir().unwrap();
    write_corpus(dir.path());
    let documents = load_corpus(dir.path()).await;

    let server = MockServer::start().await;
    let index: Arc<dyn ChunkIndex> = Arc::new(WeaviateIndex::new(&server.uri(), "TutorialChunk"));
    let pipeline = IngestionPipeline::new(chunker(), index, 500);
    let expected = pipeline.chunk_documents(&documents).len();

    mount_schema(&server, 1).await;
    mount_batch_and_count(&server, expected, expected).await;

    let report = pipeline.ingest_documents(&documents).await.unwrap();
    assert_eq!(report.indexed, Some(expected as u64));
}

#[tokio::test]
async fn weaviate_count_mismatch_drops_class() {
    let dir = tempfile::tempdir().unwrap();
    write_corpus(dir.path());
    let documents = load_corpus(dir.path()).await;

    let server = MockServer::start().await;
    let index: Arc<dyn ChunkIndex> = Arc::new(WeaviateIndex::new(&server.uri(), "TutorialChunk"));
    let pipeline = IngestionPipeline::new(chunker(), index, 500);
    let expected = pipeline.chunk_documents(&documents).len();

    mount_schema(&server, 2).await;
    mount_batch_and_count(&server, expected, expected - 1).await;

    let err = pipeline.ingest_documents(&documents).await.unwrap_err();
    assert!(
        matches!(err, IngestError::CountMismatch { expected: e, actual: a } if e == expected as u64 && a + 1 == e),
        "{err:?}"
    );
}

#[tokio::test]
async fn weaviate_search_failure_fails_closed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/graphql"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
        .mount(&server)
        .await;

    let index = Arc::new(WeaviateIndex::new(&server.uri(), "TutorialChunk"));
    let answerer = answerer(index, MockProvider::default(), SearchMode::Hybrid);
    let answer = answerer.ask("How do I create a wall?").await;

    assert!(matches!(answer.outcome, Outcome::RetrievalUnavailable(_)));
    assert_eq!(answer.text, OOD_REPLY);
    assert!(answerer.provider().prompts().is_empty());
}
