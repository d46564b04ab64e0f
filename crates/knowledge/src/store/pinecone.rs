//! Pinecone vector store over the control-plane and data-plane REST APIs.

use super::VectorStore;
use crate::types::{IndexSpec, IndexedVector, VectorMatch, VectorQuery};
use profrag_core::{AppError, AppResult};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, instrument};

const API_VERSION: &str = "2024-07";

/// Request timeout in seconds
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Readiness polls after index creation
const READY_POLL_ATTEMPTS: u32 = 60;

#[derive(Debug, Serialize)]
struct CreateIndexRequest<'a> {
    name: &'a str,
    dimension: usize,
    metric: &'a str,
    spec: ServerlessSpec<'a>,
}

#[derive(Debug, Serialize)]
struct ServerlessSpec<'a> {
    serverless: ServerlessPlacement<'a>,
}

#[derive(Debug, Serialize)]
struct ServerlessPlacement<'a> {
    cloud: &'a str,
    region: &'a str,
}

#[derive(Debug, Deserialize)]
struct IndexDescription {
    #[serde(default)]
    host: Option<String>,
    #[serde(default)]
    status: Option<IndexStatus>,
}

#[derive(Debug, Deserialize)]
struct IndexStatus {
    #[serde(default)]
    ready: bool,
}

#[derive(Debug, Serialize)]
struct UpsertRequest<'a> {
    vectors: &'a [IndexedVector],
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpsertResponse {
    #[serde(default)]
    upserted_count: usize,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<VectorMatch>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IndexStats {
    #[serde(default)]
    total_vector_count: usize,
}

/// Pinecone serverless store.
pub struct PineconeStore {
    client: Client,

    /// Control plane, e.g. `https://api.pinecone.io`
    controller_url: String,

    api_key: String,

    /// Data plane base per index, from describe calls
    hosts: Mutex<HashMap<String, String>>,

    /// Fixed data plane base instead of the described host
    data_plane_url: Option<String>,

    poll_interval: Duration,
}

impl PineconeStore {
    /// Create a store talking to `controller_url`.
    pub fn new(controller_url: &str, api_key: &str) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| {
                AppError::VectorStore(format!("Failed to create HTTP client for Pinecone: {}", e))
            })?;

        Ok(Self {
            client,
            controller_url: controller_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            hosts: Mutex::new(HashMap::new()),
            data_plane_url: None,
            poll_interval: Duration::from_secs(1),
        })
    }

    /// Send data-plane requests to `url` instead of the described host.
    pub fn with_data_plane_url(mut self, url: &str) -> Self {
        self.data_plane_url = Some(url.trim_end_matches('/').to_string());
        self
    }

    /// Interval between readiness polls after creating an index.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
    }

    async fn send(&self, builder: RequestBuilder, action: &str) -> AppResult<reqwest::Response> {
        let response = self
            .authorized(builder)
            .send()
            .await
            .map_err(|e| AppError::VectorStore(format!("Pinecone {} failed: {}", action, e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::VectorStore(format!(
                "Pinecone {} error ({}): {}",
                action, status, error_text
            )));
        }

        Ok(response)
    }

    /// Describe an index; `None` when it does not exist.
    async fn describe(&self, collection: &str) -> AppResult<Option<IndexDescription>> {
        let url = format!("{}/indexes/{}", self.controller_url, collection);
        let response = self
            .authorized(self.client.get(&url))
            .send()
            .await
            .map_err(|e| AppError::VectorStore(format!("Pinecone describe failed: {}", e)))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::VectorStore(format!(
                "Pinecone describe error ({}): {}",
                status, error_text
            )));
        }

        let description: IndexDescription = response.json().await.map_err(|e| {
            AppError::VectorStore(format!("Failed to parse index description: {}", e))
        })?;
        Ok(Some(description))
    }

    async fn data_plane(&self, collection: &str) -> AppResult<String> {
        if let Some(ref url) = self.data_plane_url {
            return Ok(url.clone());
        }

        if let Some(host) = self.cached_host(collection)? {
            return Ok(host);
        }

        let host = self
            .describe(collection)
            .await?
            .and_then(|d| d.host)
            .ok_or_else(|| {
                AppError::VectorStore(format!("Index '{}' has no data plane host", collection))
            })?;

        let base = if host.starts_with("http") {
            host
        } else {
            format!("https://{}", host)
        };

        self.hosts
            .lock()
            .map_err(|_| AppError::VectorStore("Host cache lock poisoned".to_string()))?
            .insert(collection.to_string(), base.clone());
        Ok(base)
    }

    fn cached_host(&self, collection: &str) -> AppResult<Option<String>> {
        let hosts = self
            .hosts
            .lock()
            .map_err(|_| AppError::VectorStore("Host cache lock poisoned".to_string()))?;
        Ok(hosts.get(collection).cloned())
    }

    async fn wait_until_ready(&self, collection: &str) -> AppResult<()> {
        for attempt in 1..=READY_POLL_ATTEMPTS {
            let ready = self
                .describe(collection)
                .await?
                .and_then(|d| d.status)
                .map(|s| s.ready)
                .unwrap_or(false);

            if ready {
                debug!(collection, attempt, "Index is ready");
                return Ok(());
            }
            tokio::time::sleep(self.poll_interval).await;
        }

        Err(AppError::VectorStore(format!(
            "Index '{}' was not ready after {} polls",
            collection, READY_POLL_ATTEMPTS
        )))
    }
}

#[async_trait::async_trait]
impl VectorStore for PineconeStore {
    fn backend_name(&self) -> &str {
        "pinecone"
    }

    #[instrument(skip(self))]
    async fn exists(&self, collection: &str) -> AppResult<bool> {
        Ok(self.describe(collection).await?.is_some())
    }

    #[instrument(skip(self, spec), fields(dimension = spec.dimension, metric = %spec.metric))]
    async fn create(&self, collection: &str, spec: &IndexSpec) -> AppResult<()> {
        let url = format!("{}/indexes", self.controller_url);
        let body = CreateIndexRequest {
            name: collection,
            dimension: spec.dimension,
            metric: &spec.metric,
            spec: ServerlessSpec {
                serverless: ServerlessPlacement {
                    cloud: &spec.cloud,
                    region: &spec.region,
                },
            },
        };

        self.send(self.client.post(&url).json(&body), "create index")
            .await?;
        tracing::info!(collection, "Created Pinecone index, waiting until ready");

        self.wait_until_ready(collection).await
    }

    #[instrument(skip(self, records), fields(records = records.len()))]
    async fn upsert(&self, collection: &str, records: &[IndexedVector]) -> AppResult<usize> {
        let url = format!("{}/vectors/upsert", self.data_plane(collection).await?);
        let response = self
            .send(
                self.client.post(&url).json(&UpsertRequest { vectors: records }),
                "upsert",
            )
            .await?;

        let body: UpsertResponse = response
            .json()
            .await
            .map_err(|e| AppError::VectorStore(format!("Failed to parse upsert response: {}", e)))?;
        Ok(body.upserted_count)
    }

    #[instrument(skip(self, query), fields(top_k = query.top_k))]
    async fn query(&self, collection: &str, query: &VectorQuery) -> AppResult<Vec<VectorMatch>> {
        let url = format!("{}/query", self.data_plane(collection).await?);
        let response = self
            .send(self.client.post(&url).json(query), "query")
            .await?;

        let body: QueryResponse = response
            .json()
            .await
            .map_err(|e| AppError::VectorStore(format!("Failed to parse query response: {}", e)))?;
        Ok(body.matches)
    }

    async fn count(&self, collection: &str) -> AppResult<usize> {
        let url = format!("{}/describe_index_stats", self.data_plane(collection).await?);
        let response = self
            .send(
                self.client.post(&url).json(&serde_json::json!({})),
                "describe stats",
            )
            .await?;

        let stats: IndexStats = response
            .json()
            .await
            .map_err(|e| AppError::VectorStore(format!("Failed to parse index stats: {}", e)))?;
        Ok(stats.total_vector_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ReviewMetadata;
    use mockito::Matcher;

    fn store(server: &mockito::ServerGuard) -> PineconeStore {
        PineconeStore::new(&server.url(), "pc-key")
            .unwrap()
            .with_data_plane_url(&server.url())
            .with_poll_interval(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_exists_maps_not_found() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/indexes/professors")
            .match_header("api-key", "pc-key")
            .with_status(404)
            .create_async()
            .await;
        server
            .mock("GET", "/indexes/other")
            .with_status(200)
            .with_body(r#"{"name": "other", "host": "other-abc.svc.pinecone.io", "status": {"ready": true}}"#)
            .create_async()
            .await;

        let store = store(&server);
        assert!(!store.exists("professors").await.unwrap());
        assert!(store.exists("other").await.unwrap());
    }

    #[tokio::test]
    async fn test_create_index_request_shape() {
        let mut server = mockito::Server::new_async().await;
        let create = server
            .mock("POST", "/indexes")
            .match_body(Matcher::Json(serde_json::json!({
                "name": "professors",
                "dimension": 768,
                "metric": "cosine",
                "spec": {"serverless": {"cloud": "aws", "region": "us-east-1"}}
            })))
            .with_status(201)
            .with_body("{}")
            .create_async()
            .await;
        server
            .mock("GET", "/indexes/professors")
            .with_status(200)
            .with_body(r#"{"host": "professors-abc.svc.pinecone.io", "status": {"ready": true}}"#)
            .create_async()
            .await;

        store(&server)
            .create("professors", &IndexSpec::default())
            .await
            .unwrap();
        create.assert_async().await;
    }

    #[tokio::test]
    async fn test_upsert_request_shape() {
        let mut server = mockito::Server::new_async().await;
        let upsert = server
            .mock("POST", "/vectors/upsert")
            .match_body(Matcher::Json(serde_json::json!({
                "vectors": [{
                    "id": "review-1",
                    "values": [0.5, 0.5],
                    "metadata": {
                        "professor": "Dr. Jane Smith",
                        "subject": "Mathematics",
                        "starRating": 5,
                        "reviewComment": "Amazing"
                    }
                }]
            })))
            .with_status(200)
            .with_body(r#"{"upsertedCount": 1}"#)
            .create_async()
            .await;

        let record = IndexedVector {
            id: "review-1".to_string(),
            values: vec![0.5, 0.5],
            metadata: ReviewMetadata {
                professor: "Dr. Jane Smith".to_string(),
                subject: "Mathematics".to_string(),
                star_rating: 5,
                review_comment: "Amazing".to_string(),
            },
        };

        let written = store(&server).upsert("professors", &[record]).await.unwrap();
        upsert.assert_async().await;
        assert_eq!(written, 1);
    }

    #[tokio::test]
    async fn test_query_request_and_response() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/query")
            .match_body(Matcher::Json(serde_json::json!({
                "vector": [1.0, 0.0],
                "topK": 10,
                "includeMetadata": true
            })))
            .with_status(200)
            .with_body(
                r#"{"matches": [
                    {"id": "review-4", "score": 0.91, "metadata": {"professor": "Dr. Michael Brown", "subject": "Chemistry", "starRating": 2.0, "reviewComment": "Hard"}},
                    {"id": "review-18", "score": 0.85, "metadata": {"professor": "Dr. James Allen", "subject": "Chemistry", "starRating": 3.0, "reviewComment": "Fast"}}
                ], "namespace": ""}"#,
            )
            .create_async()
            .await;

        let hits = store(&server)
            .query(
                "professors",
                &VectorQuery {
                    vector: vec![1.0, 0.0],
                    top_k: 10,
                    include_metadata: true,
                },
            )
            .await
            .unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "review-4");
        assert_eq!(hits[1].metadata.as_ref().unwrap()["professor"], "Dr. James Allen");
    }

    #[tokio::test]
    async fn test_data_plane_host_from_describe() {
        let mut server = mockito::Server::new_async().await;
        let host = server.url();
        server
            .mock("GET", "/indexes/professors")
            .with_status(200)
            .with_body(format!(r#"{{"host": "{}", "status": {{"ready": true}}}}"#, host))
            .expect(1)
            .create_async()
            .await;
        server
            .mock("POST", "/describe_index_stats")
            .with_status(200)
            .with_body(r#"{"totalVectorCount": 20, "dimension": 768}"#)
            .expect(2)
            .create_async()
            .await;

        let store = PineconeStore::new(&server.url(), "pc-key").unwrap();
        assert_eq!(store.count("professors").await.unwrap(), 20);
        assert_eq!(store.count("professors").await.unwrap(), 20);
    }

    #[tokio::test]
    async fn test_error_status_is_surfaced() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/query")
            .with_status(401)
            .with_body("Invalid API key")
            .create_async()
            .await;

        let err = store(&server)
            .query(
                "professors",
                &VectorQuery {
                    vector: vec![1.0],
                    top_k: 1,
                    include_metadata: true,
                },
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("401"));
    }
}
