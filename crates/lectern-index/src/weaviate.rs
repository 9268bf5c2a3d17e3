//! Weaviate backend over its REST and GraphQL HTTP APIs.

use std::time::Duration;

use serde_json::{Value, json};

use crate::error::IndexError;
use crate::http::default_client;
use crate::retry::send_with_retry;
use crate::store::{BoxFuture, ChunkIndex};
use crate::types::{Chunk, ScoredChunk, SearchMode, SearchRequest};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_RETRIES: u32 = 3;

/// Properties searched by `bm25` and the lexical half of `hybrid`.
const SEARCH_PROPERTIES: &[&str] = &["chunk_text", "page_title", "toc_title"];

const RETURN_FIELDS: &str = "page_title toc_title chunk_text page_url breadcrumb chunk_index \
     video_links category time_required tutorial_files_used _additional { score distance }";

#[derive(Debug, Clone)]
pub struct WeaviateIndex {
    client: reqwest::Client,
    base_url: String,
    class_name: String,
    vectorizer: String,
}

impl WeaviateIndex {
    #[must_use]
    pub fn new(base_url: &str, class_name: impl Into<String>) -> Self {
        Self {
            client: default_client(DEFAULT_TIMEOUT),
            base_url: base_url.trim_end_matches('/').to_owned(),
            class_name: class_name.into(),
            vectorizer: "text2vec-transformers".into(),
        }
    }

    /// Bound every HTTP request to the index.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = default_client(timeout);
        self
    }

    #[must_use]
    pub fn with_vectorizer(mut self, vectorizer: impl Into<String>) -> Self {
        self.vectorizer = vectorizer.into();
        self
    }

    #[must_use]
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn class_schema(&self) -> Value {
        let text = |name: &str| json!({ "name": name, "dataType": ["text"] });
        let text_array = |name: &str| json!({ "name": name, "dataType": ["text[]"] });
        let mut module_config = serde_json::Map::new();
        module_config.insert(
            self.vectorizer.clone(),
            json!({ "vectorizeClassName": false }),
        );
        json!({
            "class": self.class_name,
            "description": "Tutorial chunks with heading breadcrumbs",
            "vectorizer": self.vectorizer,
            "moduleConfig": module_config,
            "properties": [
                text("page_title"),
                text("toc_title"),
                text("chunk_text"),
                text("page_url"),
                text_array("breadcrumb"),
                { "name": "chunk_index", "dataType": ["int"] },
                text_array("video_links"),
                text("category"),
                text("time_required"),
                text_array("tutorial_files_used"),
            ],
        })
    }

    async fn get(&self, path: &str) -> Result<reqwest::Response, IndexError> {
        let url = self.url(path);
        send_with_retry(MAX_RETRIES, || self.client.get(&url).send()).await
    }

    async fn post(&self, path: &str, body: &Value) -> Result<reqwest::Response, IndexError> {
        let url = self.url(path);
        send_with_retry(MAX_RETRIES, || self.client.post(&url).json(body).send()).await
    }

    async fn graphql(&self, query: String) -> Result<Value, IndexError> {
        let body = json!({ "query": query });
        let response = expect_success(self.post("/v1/graphql", &body).await?).await?;
        let payload: Value = response.json().await?;
        if let Some(errors) = payload.get("errors").and_then(Value::as_array)
            && !errors.is_empty()
        {
            let message = errors
                .iter()
                .filter_map(|e| e.get("message").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join("; ");
            return Err(IndexError::GraphQl(message));
        }
        Ok(payload)
    }

    async fn drop_class_inner(&self) -> Result<(), IndexError> {
        let url = self.url(&format!("/v1/schema/{}", self.class_name));
        let response = send_with_retry(MAX_RETRIES, || self.client.delete(&url).send()).await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            tracing::debug!(class = %self.class_name, "class absent, nothing to drop");
            return Ok(());
        }
        expect_success(response).await?;
        tracing::info!(class = %self.class_name, "class dropped");
        Ok(())
    }

    async fn create_class(&self) -> Result<(), IndexError> {
        let response = self.post("/v1/schema", &self.class_schema()).await?;
        let status = response.status();
        if status == reqwest::StatusCode::UNPROCESSABLE_ENTITY {
            let body = response.text().await.unwrap_or_default();
            if body.to_lowercase().contains("already exists") {
                return Ok(());
            }
            return Err(IndexError::Status {
                status: status.as_u16(),
                body,
            });
        }
        expect_success(response).await?;
        tracing::info!(class = %self.class_name, vectorizer = %self.vectorizer, "class created");
        Ok(())
    }

    async fn insert_batch_inner(&self, chunks: Vec<Chunk>) -> Result<(), IndexError> {
        let total = chunks.len();
        let objects: Vec<Value> = chunks
            .iter()
            .map(|chunk| json!({ "class": self.class_name, "properties": chunk }))
            .collect();
        let body = json!({ "objects": objects });
        let response = expect_success(self.post("/v1/batch/objects", &body).await?).await?;
        let results: Value = response.json().await?;
        check_batch_results(&results, total)?;
        tracing::debug!(class = %self.class_name, objects = total, "batch written");
        Ok(())
    }

    async fn search_inner(&self, request: SearchRequest) -> Result<Vec<ScoredChunk>, IndexError> {
        let query = build_get_query(&self.class_name, &request)?;
        let payload = self.graphql(query).await?;
        parse_get_response(&self.class_name, &payload)
    }

    async fn count_inner(&self) -> Result<u64, IndexError> {
        let query = format!("{{ Aggregate {{ {} {{ meta {{ count }} }} }} }}", self.class_name);
        let payload = self.graphql(query).await?;
        parse_count(&self.class_name, &payload)
    }
}

impl ChunkIndex for WeaviateIndex {
    fn health_check(&self) -> BoxFuture<'_, Result<(), IndexError>> {
        Box::pin(async move {
            expect_success(self.get("/v1/schema").await?).await?;
            Ok(())
        })
    }

    fn recreate(&self) -> BoxFuture<'_, Result<(), IndexError>> {
        Box::pin(async move {
            self.drop_class_inner().await?;
            self.create_class().await
        })
    }

    fn drop_class(&self) -> BoxFuture<'_, Result<(), IndexError>> {
        Box::pin(self.drop_class_inner())
    }

    fn insert_batch(&self, chunks: Vec<Chunk>) -> BoxFuture<'_, Result<(), IndexError>> {
        Box::pin(self.insert_batch_inner(chunks))
    }

    fn search(&self, request: SearchRequest) -> BoxFuture<'_, Result<Vec<ScoredChunk>, IndexError>> {
        Box::pin(self.search_inner(request))
    }

    fn count(&self) -> BoxFuture<'_, Result<u64, IndexError>> {
        Box::pin(self.count_inner())
    }
}

async fn expect_success(response: reqwest::Response) -> Result<reqwest::Response, IndexError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(IndexError::Status {
        status: status.as_u16(),
        body,
    })
}

/// Any per-object error fails the whole batch.
fn check_batch_results(results: &Value, total: usize) -> Result<(), IndexError> {
    let Some(items) = results.as_array() else {
        return Err(IndexError::Other(format!(
            "unexpected batch response: {results}"
        )));
    };
    let messages: Vec<&str> = items
        .iter()
        .filter_map(|item| item.pointer("/result/errors/error"))
        .filter_map(Value::as_array)
        .filter_map(|errors| errors.first())
        .map(|e| e.get("message").and_then(Value::as_str).unwrap_or("unknown error"))
        .collect();
    if let Some(first) = messages.first() {
        return Err(IndexError::BatchRejected {
            failed: messages.len(),
            total,
            first: (*first).to_owned(),
        });
    }
    if items.len() != total {
        return Err(IndexError::Other(format!(
            "batch response covered {} of {total} objects",
            items.len()
        )));
    }
    Ok(())
}

pub(crate) fn build_get_query(class: &str, request: &SearchRequest) -> Result<String, IndexError> {
    let text = serde_json::to_string(&request.query)?;
    let properties = serde_json::to_string(SEARCH_PROPERTIES)?;
    let operator = match request.mode {
        SearchMode::Vector => format!("nearText: {{ concepts: [{text}] }}"),
        SearchMode::Bm25 => format!("bm25: {{ query: {text}, properties: {properties} }}"),
        SearchMode::Hybrid => format!(
            "hybrid: {{ query: {text}, alpha: {}, properties: {properties} }}",
            request.alpha.clamp(0.0, 1.0)
        ),
    };
    Ok(format!(
        "{{ Get {{ {class}({operator}, limit: {}) {{ {RETURN_FIELDS} }} }} }}",
        request.k
    ))
}

pub(crate) fn parse_get_response(class: &str, payload: &Value) -> Result<Vec<ScoredChunk>, IndexError> {
    let Some(items) = payload
        .get("data")
        .and_then(|d| d.get("Get"))
        .and_then(|g| g.get(class))
    else {
        return Err(IndexError::Other(format!("no Get.{class} in response")));
    };
    let Some(items) = items.as_array() else {
        return Ok(Vec::new());
    };

    items
        .iter()
        .map(|item| -> Result<ScoredChunk, IndexError> {
            let chunk: Chunk = serde_json::from_value(item.clone())?;
            let additional = item.get("_additional");
            Ok(ScoredChunk {
                chunk,
                score: additional.and_then(|a| number(a.get("score"))),
                distance: additional.and_then(|a| number(a.get("distance"))),
            })
        })
        .collect()
}

/// Scores come back as strings for `bm25`/`hybrid` and numbers elsewhere.
#[allow(clippy::cast_possible_truncation)]
fn number(value: Option<&Value>) -> Option<f32> {
    match value? {
        Value::Number(n) => n.as_f64().map(|f| f as f32),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub(crate) fn parse_count(class: &str, payload: &Value) -> Result<u64, IndexError> {
    payload
        .pointer(&format!("/data/Aggregate/{class}/0/meta/count"))
        .and_then(Value::as_u64)
        .ok_or_else(|| IndexError::Other(format!("no Aggregate.{class} count in response")))
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_partial_json, body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn request(mode: SearchMode) -> SearchRequest {
        SearchRequest {
            query: "family \"type\"".into(),
            mode,
            k: 5,
            alpha: 0.4,
        }
    }

    fn get_payload() -> Value {
        json!({
            "data": { "Get": { "TutorialChunk": [
                {
                    "page_title": "Families", "toc_title": "Types", "chunk_text": "A family type...",
                    "page_url": "https://example.com/families", "breadcrumb": ["Families", "Types"],
                    "chunk_index": 2, "video_links": [], "category": null, "time_required": null,
                    "tutorial_files_used": null,
                    "_additional": { "score": "0.73", "distance": null }
                },
                {
                    "page_title": "Walls", "toc_title": "Walls", "chunk_text": "Walls...",
                    "page_url": "u", "breadcrumb": [], "chunk_index": 0, "video_links": null,
                    "_additional": { "score": null, "distance": 0.25 }
                }
            ] } }
        })
    }

    #[test]
    fn query_escapes_text() {
        let query = build_get_query("TutorialChunk", &request(SearchMode::Bm25)).unwrap();
        assert!(query.contains(r#"bm25: { query: "family \"type\"""#), "{query}");
        assert!(query.contains(r#"properties: ["chunk_text","page_title","toc_title"]"#));
        assert!(query.contains("limit: 5"));
    }

    #[test]
    fn hybrid_query_carries_alpha() {
        let query = build_get_query("TutorialChunk", &request(SearchMode::Hybrid)).unwrap();
        assert!(query.contains("hybrid: {"));
        assert!(query.contains("alpha: 0.4"));
    }

    #[test]
    fn vector_query_uses_near_text() {
        let query = build_get_query("TutorialChunk", &request(SearchMode::Vector)).unwrap();
        assert!(query.contains("nearText: { concepts: ["));
        assert!(query.contains("_additional { score distance }"));
    }

    #[test]
    fn parse_get_reads_string_and_numeric_signals() {
        let hits = parse_get_response("TutorialChunk", &get_payload()).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].chunk.breadcrumb, vec!["Families", "Types"]);
        assert_eq!(hits[0].score, Some(0.73));
        assert_eq!(hits[0].distance, None);
        assert_eq!(hits[1].score, None);
        assert_eq!(hits[1].distance, Some(0.25));
        assert!(hits[1].chunk.video_links.is_empty());
    }

    #[test]
    fn parse_get_null_class_is_empty() {
        let payload = json!({ "data": { "Get": { "TutorialChunk": null } } });
        assert!(parse_get_response("TutorialChunk", &payload).unwrap().is_empty());
    }

    #[test]
    fn parse_count_reads_meta() {
        let payload = json!({ "data": { "Aggregate": { "TutorialChunk": [ { "meta": { "count": 42 } } ] } } });
        assert_eq!(parse_count("TutorialChunk", &payload).unwrap(), 42);
        assert!(parse_count("Other", &payload).is_err());
    }

    #[test]
    fn batch_errors_fail_batch() {
        let results = json!([
            { "result": {} },
            { "result": { "errors": { "error": [ { "message": "vectorizer down" } ] } } }
        ]);
        let err = check_batch_results(&results, 2).unwrap_err();
        assert!(
            matches!(&err, IndexError::BatchRejected { failed: 1, total: 2, first } if first == "vectorizer down"),
            "got {err:?}"
        );
        assert!(check_batch_results(&json!([{ "result": {} }]), 1).is_ok());
    }

    #[test]
    fn schema_lists_all_properties() {
        let index = WeaviateIndex::new("http://localhost:8080/", "TutorialChunk");
        let schema = index.class_schema();
        let names: Vec<&str> = schema["properties"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["name"].as_str().unwrap())
            .collect();
        assert_eq!(
            names,
            vec![
                "page_title", "toc_title", "chunk_text", "page_url", "breadcrumb", "chunk_index",
                "video_links", "category", "time_required", "tutorial_files_used",
            ]
        );
        assert_eq!(schema["moduleConfig"]["text2vec-transformers"]["vectorizeClassName"], false);
        assert_eq!(index.url("/v1/schema"), "http://localhost:8080/v1/schema");
    }

    #[tokio::test]
    async fn recreate_drops_then_creates() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/v1/schema/TutorialChunk"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/schema"))
            .and(body_partial_json(json!({ "class": "TutorialChunk" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let index = WeaviateIndex::new(&server.uri(), "TutorialChunk");
        index.recreate().await.unwrap();
    }

    #[tokio::test]
    async fn insert_batch_posts_objects() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/batch/objects"))
            .and(body_string_contains("\"chunk_text\":\"hello\""))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "result": {} }])))
            .expect(1)
            .mount(&server)
            .await;

        let index = WeaviateIndex::new(&server.uri(), "TutorialChunk");
        let chunk = Chunk {
            chunk_text: "hello".into(),
            ..Chunk::default()
        };
        index.insert_batch(vec![chunk]).await.unwrap();
    }

    #[tokio::test]
    async fn search_and_count_via_graphql() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/graphql"))
            .and(body_string_contains("Get"))
            .respond_with(ResponseTemplate::new(200).set_body_json(get_payload()))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/graphql"))
            .and(body_string_contains("Aggregate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "Aggregate": { "TutorialChunk": [ { "meta": { "count": 7 } } ] } }
            })))
            .mount(&server)
            .await;

        let index = WeaviateIndex::new(&server.uri(), "TutorialChunk");
        let hits = index.search(request(SearchMode::Hybrid)).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(index.count().await.unwrap(), 7);
    }

    #[tokio::test]
    async fn graphql_errors_surface() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/graphql"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "errors": [ { "message": "Cannot query field \"TutorialChunk\"" } ]
            })))
            .mount(&server)
            .await;

        let index = WeaviateIndex::new(&server.uri(), "TutorialChunk");
        let err = index.count().await.unwrap_err();
        assert!(matches!(err, IndexError::GraphQl(ref m) if m.contains("Cannot query")), "{err:?}");
    }

    #[tokio::test]
    async fn health_check_reports_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/schema"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let index = WeaviateIndex::new(&server.uri(), "TutorialChunk");
        let err = index.health_check().await.unwrap_err();
        assert!(matches!(err, IndexError::Status { status: 500, .. }), "{err:?}");
    }

    #[tokio::test]
    async fn unreachable_server_is_http_error() {
        let index = WeaviateIndex::new("http://127.0.0.1:1", "TutorialChunk")
            .with_timeout(Duration::from_secs(2));
        assert!(matches!(index.health_check().await, Err(IndexError::Http(_))));
    }
}
