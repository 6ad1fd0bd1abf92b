//! Firestore REST v1 client.
//!
//! Talks to `{base}/projects/{project}/databases/{database}/documents` with
//! `reqwest`. Writes go through `:commit` so the store can fill request-time
//! timestamps and apply atomic increments; counts use
//! `:runAggregationQuery` and never download the collection.
//!
//! # Collections
//!
//! - `waitlist/{auto-id}` - one document per signup
//! - `stats/waitlist` - `totalCount`, `todayCount`, `lastUpdated`
//!
//! HTTP 401/403 (or a `PERMISSION_DENIED`/`UNAUTHENTICATED` body) map to
//! [`RemoteError::PermissionDenied`]; connection failures and timeouts map to
//! [`RemoteError::Network`].

mod value;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use rand::Rng;
use rand::distr::Alphanumeric;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::{DeserializeOwned, IgnoredAny};
use serde_json::json;
use tracing::instrument;
use url::Url;
use zynvo_core::{Email, TimestampMode, WaitlistEntry, WaitlistStats};

pub use value::{Document, Value};

use crate::config::FirestoreConfig;
use crate::services::waitlist::remote::{RemoteError, RemoteStore};

const WAITLIST_COLLECTION: &str = "waitlist";
const STATS_DOCUMENT: &str = "stats/waitlist";
const LIST_PAGE_SIZE: &str = "300";
const AUTO_ID_LENGTH: usize = 20;
const REQUEST_TIME: &str = "REQUEST_TIME";

// =============================================================================
// FirestoreClient
// =============================================================================

/// Firestore-backed [`RemoteStore`]. Cheap to clone.
#[derive(Clone)]
pub struct FirestoreClient {
    inner: Arc<FirestoreClientInner>,
}

struct FirestoreClientInner {
    client: reqwest::Client,
    base_url: Url,
    /// `projects/{project}/databases/{database}/documents`
    documents_path: String,
    api_key: Option<SecretString>,
}

impl std::fmt::Debug for FirestoreClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FirestoreClient")
            .field("base_url", &self.inner.base_url.as_str())
            .field("documents_path", &self.inner.documents_path)
            .finish_non_exhaustive()
    }
}

impl FirestoreClient {
    /// Create a new Firestore client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &FirestoreConfig) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(transport_error)?;

        Ok(Self {
            inner: Arc::new(FirestoreClientInner {
                client,
                base_url: config.base_url.clone(),
                documents_path: format!(
                    "projects/{}/databases/{}/documents",
                    config.project_id, config.database
                ),
                api_key: config.api_key.clone(),
            }),
        })
    }

    /// Full resource name of a document.
    fn document_name(&self, relative: &str) -> String {
        format!("{}/{relative}", self.inner.documents_path)
    }

    /// Endpoint under the documents root. `suffix` is either a `/path` or a
    /// `:method`.
    fn url(&self, suffix: &str) -> Url {
        let mut url = self.inner.base_url.clone();
        let path = format!(
            "{}/{}{suffix}",
            url.path().trim_end_matches('/'),
            self.inner.documents_path
        );
        url.set_path(&path);
        if let Some(key) = &self.inner.api_key {
            url.query_pairs_mut().append_pair("key", key.expose_secret());
        }
        url
    }

    async fn post<T: DeserializeOwned>(
        &self,
        url: Url,
        body: &serde_json::Value,
    ) -> Result<T, RemoteError> {
        let response = self
            .inner
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;
        decode(response).await
    }

    async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T, RemoteError> {
        let response = self
            .inner
            .client
            .get(url)
            .send()
            .await
            .map_err(transport_error)?;
        decode(response).await
    }

    async fn commit(&self, write: serde_json::Value) -> Result<(), RemoteError> {
        let _: IgnoredAny = self
            .post(self.url(":commit"), &json!({ "writes": [write] }))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for FirestoreClient {
    #[instrument(skip(self, entry), fields(email = %entry.email))]
    async fn add_entry(
        &self,
        entry: &WaitlistEntry,
        timestamp: TimestampMode,
    ) -> Result<String, RemoteError> {
        let id = auto_id();
        let server_time = timestamp == TimestampMode::Server;
        let fields = value::entry_fields(entry, !server_time);

        let mut write = json!({
            "update": {
                "name": self.document_name(&format!("{WAITLIST_COLLECTION}/{id}")),
                "fields": fields,
            },
            "currentDocument": { "exists": false },
        });
        if server_time && let Some(write) = write.as_object_mut() {
            write.insert(
                "updateTransforms".to_string(),
                json!([{ "fieldPath": value::TIMESTAMP, "setToServerValue": REQUEST_TIME }]),
            );
        }

        self.commit(write).await?;
        tracing::debug!(id = %id, "Created waitlist document");
        Ok(id)
    }

    #[instrument(skip(self, email), fields(email = %email))]
    async fn email_exists(&self, email: &Email) -> Result<bool, RemoteError> {
        let body = json!({
            "structuredQuery": {
                "from": [{ "collectionId": WAITLIST_COLLECTION }],
                "where": {
                    "fieldFilter": {
                        "field": { "fieldPath": value::EMAIL },
                        "op": "EQUAL",
                        "value": Value::string(email.as_str()),
                    }
                },
                "limit": 1,
            }
        });

        let rows: Vec<RunQueryRow> = self.post(self.url(":runQuery"), &body).await?;
        Ok(rows.iter().any(|row| row.document.is_some()))
    }

    #[instrument(skip(self))]
    async fn fetch_stats(&self) -> Result<Option<WaitlistStats>, RemoteError> {
        match self.get::<Document>(self.url(&format!("/{STATS_DOCUMENT}"))).await {
            Ok(document) => Ok(Some(value::stats_from_document(&document))),
            Err(RemoteError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self))]
    async fn count_entries(&self) -> Result<u64, RemoteError> {
        let body = json!({
            "structuredAggregationQuery": {
                "structuredQuery": {
                    "from": [{ "collectionId": WAITLIST_COLLECTION }],
                },
                "aggregations": [{ "alias": "count", "count": {} }],
            }
        });

        let rows: Vec<AggregationRow> = self.post(self.url(":runAggregationQuery"), &body).await?;
        rows.iter()
            .find_map(|row| row.result.as_ref())
            .and_then(|result| result.aggregate_fields.get("count"))
            .and_then(Value::as_u64)
            .ok_or_else(|| RemoteError::Decode("aggregation result has no count".to_string()))
    }

    #[instrument(skip(self))]
    async fn list_entries(&self) -> Result<Vec<WaitlistEntry>, RemoteError> {
        let mut entries = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut url = self.url(&format!("/{WAITLIST_COLLECTION}"));
            {
                let mut query = url.query_pairs_mut();
                query.append_pair("pageSize", LIST_PAGE_SIZE);
                if let Some(token) = &page_token {
                    query.append_pair("pageToken", token);
                }
            }

            let page: ListPage = self.get(url).await?;
            for document in &page.documents {
                match value::entry_from_document(document) {
                    Ok(entry) => entries.push(entry),
                    Err(reason) => tracing::warn!(%reason, "Skipping malformed waitlist document"),
                }
            }

            match page.next_page_token.filter(|token| !token.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        tracing::debug!(count = entries.len(), "Listed waitlist documents");
        Ok(entries)
    }

    #[instrument(skip(self))]
    async fn increment_stats(&self) -> Result<(), RemoteError> {
        // Empty mask plus transforms: creates the document when missing and
        // leaves other fields alone.
        self.commit(json!({
            "update": {
                "name": self.document_name(STATS_DOCUMENT),
                "fields": {},
            },
            "updateMask": { "fieldPaths": [] },
            "updateTransforms": [
                { "fieldPath": value::TOTAL_COUNT, "increment": Value::integer(1) },
                { "fieldPath": value::TODAY_COUNT, "increment": Value::integer(1) },
                { "fieldPath": value::LAST_UPDATED, "setToServerValue": REQUEST_TIME },
            ],
        }))
        .await
    }

    async fn is_reachable(&self) -> bool {
        // Any HTTP answer, including a refusal, means the network path works.
        match self
            .inner
            .client
            .get(self.url(&format!("/{STATS_DOCUMENT}")))
            .send()
            .await
        {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!(error = %e, "Firestore unreachable");
                false
            }
        }
    }
}

// =============================================================================
// Wire helpers
// =============================================================================

#[derive(Debug, Deserialize)]
struct RunQueryRow {
    #[serde(default)]
    document: Option<Document>,
}

#[derive(Debug, Deserialize)]
struct AggregationRow {
    #[serde(default)]
    result: Option<AggregationResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AggregationResult {
    #[serde(default)]
    aggregate_fields: HashMap<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListPage {
    #[serde(default)]
    documents: Vec<Document>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
}

/// Client-generated document id, same alphabet and length as the SDKs use.
fn auto_id() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(AUTO_ID_LENGTH)
        .map(char::from)
        .collect()
}

fn transport_error(e: reqwest::Error) -> RemoteError {
    RemoteError::Network(e.to_string())
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, RemoteError> {
    let status = response.status();
    let body = response.text().await.map_err(transport_error)?;

    if !status.is_success() {
        return Err(status_error(status, &body));
    }

    serde_json::from_str(&body).map_err(|e| RemoteError::Decode(e.to_string()))
}

/// Map an error response to a [`RemoteError`].
///
/// Streaming endpoints wrap the error object in an array.
fn status_error(status: StatusCode, body: &str) -> RemoteError {
    let envelope = serde_json::from_str::<ErrorEnvelope>(body).ok().or_else(|| {
        serde_json::from_str::<Vec<ErrorEnvelope>>(body)
            .ok()
            .and_then(|list| list.into_iter().next())
    });

    let (message, code) = envelope.map_or_else(
        || (body.chars().take(500).collect::<String>(), None),
        |envelope| (envelope.error.message, envelope.error.status),
    );

    match (status, code.as_deref()) {
        (StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN, _)
        | (_, Some("PERMISSION_DENIED" | "UNAUTHENTICATED")) => {
            RemoteError::PermissionDenied(message)
        }
        (StatusCode::NOT_FOUND, _) => RemoteError::NotFound(message),
        _ => RemoteError::Api {
            status: status.as_u16(),
            message,
        },
    }
}
