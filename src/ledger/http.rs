// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JSON/HTTP clients for the ledger service and blob storage.
//!
//! Failure classification:
//!
//! | Outcome                              | Kind            |
//! |--------------------------------------|-----------------|
//! | connect error, 5xx, 429              | `Transient`     |
//! | request or body read timed out, 504  | `Indeterminate` |
//! | other 4xx, undecodable response      | `Permanent`     |

use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use lru::LruCache;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use super::{
    AccessLedger, BlobPayload, BlobStorage, CollaboratorError, CollaboratorResult, FailureKind,
    LedgerMetadata, LedgerReceipt, Service,
};

/// Resolved retrieval URLs kept in memory. Addresses are immutable, so entries
/// never go stale.
const RESOLVE_CACHE_CAPACITY: usize = 1024;

#[derive(Deserialize)]
struct AccessAnswer {
    allowed: bool,
}

#[derive(Deserialize)]
struct GrantAnswer {
    granted: bool,
}

#[derive(Deserialize)]
struct CompletionAnswer {
    recorded: bool,
}

#[derive(Deserialize)]
struct UploadAnswer {
    address: String,
}

#[derive(Deserialize)]
struct ResolveAnswer {
    url: String,
}

#[derive(Deserialize)]
struct PinAnswer {
    pinned: bool,
}

// =============================================================================
// Ledger Client
// =============================================================================

/// Client for the ledger service.
pub struct HttpLedgerClient {
    base_url: Url,
    http: Client,
}

impl HttpLedgerClient {
    pub fn new(base_url: Url, timeout: Duration) -> CollaboratorResult<Self> {
        Ok(Self {
            base_url,
            http: build_http(Service::Ledger, timeout)?,
        })
    }

    async fn post_json<B, T>(&self, segments: &[&str], body: Option<&B>) -> CollaboratorResult<T>
    where
        B: serde::Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let url = endpoint(Service::Ledger, &self.base_url, segments)?;
        let what = format!("POST {}", url.path());
        let mut request = self.http.post(url);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request
            .send()
            .await
            .map_err(|e| classify_send(Service::Ledger, &what, e))?;
        decode(Service::Ledger, &what, response).await
    }
}

#[async_trait]
impl AccessLedger for HttpLedgerClient {
    async fn store_metadata(
        &self,
        content_id: &str,
        metadata: &LedgerMetadata,
    ) -> CollaboratorResult<LedgerReceipt> {
        debug!(content_id = %content_id, "Writing content metadata to ledger");
        self.post_json(&["v1", "content", content_id, "metadata"], Some(metadata))
            .await
    }

    async fn check_access(&self, user_id: &str, content_id: &str) -> CollaboratorResult<bool> {
        let url = endpoint(
            Service::Ledger,
            &self.base_url,
            &["v1", "access", user_id, content_id],
        )?;
        let what = format!("GET {}", url.path());
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| classify_send(Service::Ledger, &what, e))?;
        let answer: AccessAnswer = decode(Service::Ledger, &what, response).await?;
        Ok(answer.allowed)
    }

    async fn grant_access(&self, user_id: &str, content_id: &str) -> CollaboratorResult<bool> {
        let answer: GrantAnswer = self
            .post_json::<(), _>(&["v1", "access", user_id, content_id], None)
            .await?;
        Ok(answer.granted)
    }

    async fn record_completion(
        &self,
        user_id: &str,
        content_id: &str,
    ) -> CollaboratorResult<bool> {
        let answer: CompletionAnswer = self
            .post_json::<(), _>(&["v1", "completions", user_id, content_id], None)
            .await?;
        Ok(answer.recorded)
    }
}

// =============================================================================
// Blob Storage Client
// =============================================================================

/// Client for content-addressed blob storage.
pub struct HttpBlobStorageClient {
    base_url: Url,
    http: Client,
    resolved: Mutex<LruCache<String, String>>,
}

impl HttpBlobStorageClient {
    pub fn new(base_url: Url, timeout: Duration) -> CollaboratorResult<Self> {
        let capacity = NonZeroUsize::new(RESOLVE_CACHE_CAPACITY).unwrap_or(NonZeroUsize::MIN);
        Ok(Self {
            base_url,
            http: build_http(Service::BlobStorage, timeout)?,
            resolved: Mutex::new(LruCache::new(capacity)),
        })
    }

    fn cached(&self, address: &str) -> Option<String> {
        let mut cache = self.resolved.lock().unwrap_or_else(|p| p.into_inner());
        cache.get(address).cloned()
    }

    fn remember(&self, address: &str, url: &str) {
        let mut cache = self.resolved.lock().unwrap_or_else(|p| p.into_inner());
        cache.put(address.to_string(), url.to_string());
    }
}

#[async_trait]
impl BlobStorage for HttpBlobStorageClient {
    async fn upload(&self, payload: &BlobPayload) -> CollaboratorResult<String> {
        let url = endpoint(Service::BlobStorage, &self.base_url, &["v1", "blobs"])?;
        let what = format!("POST {}", url.path());
        let response = self
            .http
            .post(url)
            .json(payload)
            .send()
            .await
            .map_err(|e| classify_send(Service::BlobStorage, &what, e))?;
        let answer: UploadAnswer = decode(Service::BlobStorage, &what, response).await?;
        Ok(answer.address)
    }

    async fn resolve(&self, address: &str) -> CollaboratorResult<String> {
        if let Some(url) = self.cached(address) {
            return Ok(url);
        }

        let url = endpoint(
            Service::BlobStorage,
            &self.base_url,
            &["v1", "blobs", address, "url"],
        )?;
        let what = format!("GET {}", url.path());
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| classify_send(Service::BlobStorage, &what, e))?;
        let answer: ResolveAnswer = decode(Service::BlobStorage, &what, response).await?;

        self.remember(address, &answer.url);
        Ok(answer.url)
    }

    async fn pin(&self, address: &str) -> CollaboratorResult<bool> {
        let url = endpoint(Service::BlobStorage, &self.base_url, &["v1", "pins", address])?;
        let what = format!("POST {}", url.path());
        let response = self
            .http
            .post(url)
            .send()
            .await
            .map_err(|e| classify_send(Service::BlobStorage, &what, e))?;
        let answer: PinAnswer = decode(Service::BlobStorage, &what, response).await?;
        Ok(answer.pinned)
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn build_http(service: Service, timeout: Duration) -> CollaboratorResult<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| CollaboratorError::permanent(service, format!("failed to build HTTP client: {e}")))
}

/// Append percent-encoded path segments to the base URL.
fn endpoint(service: Service, base: &Url, segments: &[&str]) -> CollaboratorResult<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| {
            CollaboratorError::permanent(service, format!("base URL {base} cannot carry a path"))
        })?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

fn classify_send(service: Service, what: &str, err: reqwest::Error) -> CollaboratorError {
    let kind = if err.is_timeout() {
        FailureKind::Indeterminate
    } else if err.is_builder() || err.is_decode() {
        FailureKind::Permanent
    } else {
        FailureKind::Transient
    };
    CollaboratorError::new(service, kind, format!("{what} failed: {err}"))
}

fn classify_status(status: StatusCode) -> FailureKind {
    if status == StatusCode::GATEWAY_TIMEOUT {
        FailureKind::Indeterminate
    } else if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        FailureKind::Transient
    } else {
        FailureKind::Permanent
    }
}

async fn decode<T: DeserializeOwned>(
    service: Service,
    what: &str,
    response: Response,
) -> CollaboratorResult<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(CollaboratorError::new(
            service,
            classify_status(status),
            format!("{what} returned {status}: {body}"),
        ));
    }

    response.json().await.map_err(|e| {
        let kind = if e.is_timeout() {
            FailureKind::Indeterminate
        } else {
            FailureKind::Permanent
        };
        CollaboratorError::new(service, kind, format!("{what} invalid JSON: {e}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ContentKind, DifficultyLevel};
    use axum::extract::{Path, State};
    use axum::http::StatusCode as AxumStatus;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    async fn spawn(router: Router) -> Url {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        Url::parse(&format!("http://{addr}")).unwrap()
    }

    fn metadata() -> LedgerMetadata {
        LedgerMetadata {
            content_id: "c-1".to_string(),
            title: "Fractions".to_string(),
            kind: ContentKind::Lesson,
            level: DifficultyLevel::Beginner,
            creator_id: "creator-1".to_string(),
            payload_address: "sha256:abc".to_string(),
            approval_fingerprint: None,
        }
    }

    fn ledger_router() -> Router {
        Router::new()
            .route(
                "/v1/content/{id}/metadata",
                post(|Path(id): Path<String>, Json(body): Json<Value>| async move {
                    assert_eq!(body["payload_address"], "sha256:abc");
                    Json(json!({
                        "transaction_ref": format!("tx-{id}"),
                        "timestamp": "2026-01-01T00:00:00Z",
                        "block_height": 42
                    }))
                }),
            )
            .route(
                "/v1/access/{user}/{content}",
                get(|| async { (AxumStatus::SERVICE_UNAVAILABLE, "down for maintenance") })
                    .post(|| async { (AxumStatus::BAD_REQUEST, "unknown user") }),
            )
            .route(
                "/v1/completions/{user}/{content}",
                post(|Path((user, _content)): Path<(String, String)>| async move {
                    if user == "slow" {
                        tokio::time::sleep(Duration::from_secs(2)).await;
                    }
                    Json(json!({ "recorded": true }))
                }),
            )
    }

    #[tokio::test]
    async fn store_metadata_decodes_receipt() {
        let base = spawn(ledger_router()).await;
        let client = HttpLedgerClient::new(base, Duration::from_secs(5)).unwrap();

        let receipt = client.store_metadata("c-1", &metadata()).await.unwrap();
        assert_eq!(receipt.transaction_ref, "tx-c-1");
        assert_eq!(receipt.block_height, Some(42));
    }

    #[tokio::test]
    async fn server_errors_are_transient_and_client_errors_permanent() {
        let base = spawn(ledger_router()).await;
        let client = HttpLedgerClient::new(base, Duration::from_secs(5)).unwrap();

        let err = client.check_access("u-1", "c-1").await.unwrap_err();
        assert_eq!(err.kind, FailureKind::Transient);
        assert!(err.message.contains("503"));

        let err = client.grant_access("u-1", "c-1").await.unwrap_err();
        assert_eq!(err.kind, FailureKind::Permanent);
        assert!(err.message.contains("unknown user"));
    }

    #[tokio::test]
    async fn timeouts_are_indeterminate() {
        let base = spawn(ledger_router()).await;
        let client = HttpLedgerClient::new(base, Duration::from_millis(100)).unwrap();

        assert!(client.record_completion("u-1", "c-1").await.unwrap());

        let err = client.record_completion("slow", "c-1").await.unwrap_err();
        assert_eq!(err.kind, FailureKind::Indeterminate);
    }

    #[tokio::test]
    async fn unreachable_service_is_transient() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let base = Url::parse(&format!("http://{addr}")).unwrap();
        let client = HttpLedgerClient::new(base, Duration::from_secs(2)).unwrap();

        let err = client.check_access("u-1", "c-1").await.unwrap_err();
        assert_eq!(err.kind, FailureKind::Transient);
        assert_eq!(err.service, Service::Ledger);
    }

    #[tokio::test]
    async fn resolve_is_cached_per_address() {
        let hits = Arc::new(AtomicUsize::new(0));
        let router = Router::new()
            .route(
                "/v1/blobs",
                post(|Json(body): Json<Value>| async move {
                    assert_eq!(body["content_id"], "c-1");
                    Json(json!({ "address": "sha256:abc" }))
                }),
            )
            .route(
                "/v1/blobs/{address}/url",
                get(
                    |State(hits): State<Arc<AtomicUsize>>, Path(address): Path<String>| async move {
                        hits.fetch_add(1, Ordering::SeqCst);
                        Json(json!({ "url": format!("https://gateway.example/{address}") }))
                    },
                ),
            )
            .route("/v1/pins/{address}", post(|| async { "pinned" }))
            .with_state(hits.clone());
        let base = spawn(router).await;
        let client = HttpBlobStorageClient::new(base, Duration::from_secs(5)).unwrap();

        let address = client
            .upload(&BlobPayload {
                content_id: "c-1".to_string(),
                source_location: "https://cdn.example/c-1.html".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(address, "sha256:abc");

        let first = client.resolve(&address).await.unwrap();
        let second = client.resolve(&address).await.unwrap();
        assert_eq!(first, "https://gateway.example/sha256:abc");
        assert_eq!(first, second);
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        // Plain-text body where JSON is expected
        let err = client.pin(&address).await.unwrap_err();
        assert_eq!(err.kind, FailureKind::Permanent);
        assert_eq!(err.service, Service::BlobStorage);
    }

    #[test]
    fn endpoint_appends_encoded_segments() {
        let base = Url::parse("http://ledger.internal/api/").unwrap();
        let url = endpoint(Service::Ledger, &base, &["v1", "access", "user 1", "c/1"]).unwrap();
        assert_eq!(url.path(), "/api/v1/access/user%201/c%2F1");
    }

    #[test]
    fn status_classification() {
        assert_eq!(classify_status(StatusCode::BAD_GATEWAY), FailureKind::Transient);
        assert_eq!(classify_status(StatusCode::TOO_MANY_REQUESTS), FailureKind::Transient);
        assert_eq!(classify_status(StatusCode::GATEWAY_TIMEOUT), FailureKind::Indeterminate);
        assert_eq!(classify_status(StatusCode::NOT_FOUND), FailureKind::Permanent);
        assert_eq!(classify_status(StatusCode::CONFLICT), FailureKind::Permanent);
    }
}
