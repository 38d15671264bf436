//! DynamoDB record store.
//!
//! Talks to the DynamoDB JSON 1.0 HTTP API directly: every `Scan` page is a
//! signed `POST /` and pages are followed through `LastEvaluatedKey` until
//! the collection is exhausted.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use time::OffsetDateTime;
use url::Url;

use crate::error::StorageError;
use crate::sigv4::{AwsCredentials, SignableRequest, amz_date, authorization_header};
use crate::traits::RecordStore;
use crate::types::RawRecord;

const SERVICE: &str = "dynamodb";
const SCAN_TARGET: &str = "DynamoDB_20120810.Scan";
const CONTENT_TYPE: &str = "application/x-amz-json-1.0";

/// Connection settings for [`DynamoRecordStore`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DynamoConfig {
    /// AWS region. Defaults to the standard AWS region variables.
    pub region: String,

    /// Endpoint override (DynamoDB Local, tests). Defaults to the regional
    /// public endpoint.
    pub endpoint: Option<Url>,

    /// Upper bound on pages followed for one scan.
    pub max_pages: u32,

    /// `Limit` sent with every page request.
    pub page_size: Option<u32>,

    /// Per-request timeout.
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for DynamoConfig {
    fn default() -> Self {
        Self {
            region: default_region(),
            endpoint: None,
            max_pages: 1000,
            page_size: None,
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// `AWS_REGION`, then `AWS_DEFAULT_REGION`, then `us-east-1`.
fn default_region() -> String {
    ["AWS_REGION", "AWS_DEFAULT_REGION"]
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .map(|v| v.trim().to_string())
        .find(|v| !v.is_empty())
        .unwrap_or_else(|| "us-east-1".to_string())
}

impl DynamoConfig {
    /// Resolves the endpoint to call.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Unavailable` if the region produces an invalid URL.
    pub fn resolved_endpoint(&self) -> Result<Url, StorageError> {
        match &self.endpoint {
            Some(url) => Ok(url.clone()),
            None => Url::parse(&format!("https://dynamodb.{}.amazonaws.com/", self.region))
                .map_err(|e| StorageError::unavailable(format!("invalid region endpoint: {e}"))),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct ScanRequest<'a> {
    table_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    exclusive_start_key: Option<&'a Map<String, JsonValue>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ScanResponse {
    #[serde(default)]
    items: Vec<RawRecord>,
    #[serde(default)]
    last_evaluated_key: Option<Map<String, JsonValue>>,
}

#[derive(Debug, Deserialize)]
struct ServiceErrorBody {
    #[serde(rename = "__type", default)]
    kind: Option<String>,
    #[serde(alias = "Message", default)]
    message: Option<String>,
}

impl ServiceErrorBody {
    /// `com.amazonaws.dynamodb.v20120810#ResourceNotFoundException` becomes
    /// `ResourceNotFoundException`.
    fn short_kind(&self) -> &str {
        self.kind
            .as_deref()
            .and_then(|k| k.rsplit('#').next())
            .unwrap_or("UnknownError")
    }
}

/// Record store reading collections from DynamoDB tables.
#[derive(Debug, Clone)]
pub struct DynamoRecordStore {
    http: reqwest::Client,
    endpoint: Url,
    host: String,
    config: DynamoConfig,
    credentials: AwsCredentials,
}

impl DynamoRecordStore {
    /// Creates a store.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Unavailable` if the endpoint is unusable or the
    /// HTTP client cannot be built.
    pub fn new(config: DynamoConfig, credentials: AwsCredentials) -> Result<Self, StorageError> {
        let endpoint = config.resolved_endpoint()?;
        let host = host_header(&endpoint)?;
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| StorageError::unavailable(format!("cannot build HTTP client: {e}")))?;

        Ok(Self {
            http,
            endpoint,
            host,
            config,
            credentials,
        })
    }

    /// Returns the endpoint requests are sent to.
    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn scan_page(
        &self,
        table: &str,
        start_key: Option<&Map<String, JsonValue>>,
    ) -> Result<ScanResponse, StorageError> {
        let body = serde_json::to_vec(&ScanRequest {
            table_name: table,
            exclusive_start_key: start_key,
            limit: self.config.page_size,
        })
        .map_err(|e| StorageError::unavailable(format!("cannot encode scan request: {e}")))?;

        let now = OffsetDateTime::now_utc();
        let date = amz_date(now);

        let mut signed: Vec<(&str, &str)> = vec![
            ("content-type", CONTENT_TYPE),
            ("host", self.host.as_str()),
            ("x-amz-date", date.as_str()),
            ("x-amz-target", SCAN_TARGET),
        ];
        if let Some(token) = &self.credentials.session_token {
            signed.push(("x-amz-security-token", token.as_str()));
        }

        let authorization = authorization_header(
            &self.credentials,
            &self.config.region,
            SERVICE,
            now,
            &SignableRequest {
                method: "POST",
                path: self.endpoint.path(),
                query: &[],
                headers: &signed,
                payload: &body,
            },
        );

        let mut request = self
            .http
            .post(self.endpoint.clone())
            .header("authorization", authorization);
        for (name, value) in &signed {
            // reqwest derives Host from the URL.
            if *name != "host" {
                request = request.header(*name, *value);
            }
        }

        let response = request.body(body).send().await?;
        let status = response.status();

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = match serde_json::from_str::<ServiceErrorBody>(&text) {
                Ok(err) => format!(
                    "{} ({status}): {}",
                    err.short_kind(),
                    err.message.as_deref().unwrap_or("no message")
                ),
                Err(_) => format!("scan failed with status {status}"),
            };
            return Err(StorageError::unavailable(message));
        }

        response
            .json::<ScanResponse>()
            .await
            .map_err(|e| StorageError::unavailable(format!("invalid scan response: {e}")))
    }
}

/// Host header value: the host name plus the port when it is not the
/// scheme default.
fn host_header(endpoint: &Url) -> Result<String, StorageError> {
    let host = endpoint
        .host_str()
        .ok_or_else(|| StorageError::unavailable(format!("endpoint has no host: {endpoint}")))?;
    Ok(match endpoint.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

#[async_trait]
impl RecordStore for DynamoRecordStore {
    async fn scan_all(&self, collection: &str) -> Result<Vec<RawRecord>, StorageError> {
        let mut records = Vec::new();
        let mut start_key: Option<Map<String, JsonValue>> = None;
        let mut pages = 0u32;

        loop {
            if pages >= self.config.max_pages {
                tracing::warn!(
                    collection,
                    pages,
                    "Scan exceeded page limit, giving up"
                );
                return Err(StorageError::unavailable(format!(
                    "scan of {collection} exceeded {} pages",
                    self.config.max_pages
                )));
            }

            let page = self.scan_page(collection, start_key.as_ref()).await?;
            pages += 1;
            records.extend(page.items);

            match page.last_evaluated_key {
                Some(key) if !key.is_empty() => start_key = Some(key),
                _ => break,
            }
        }

        tracing::debug!(collection, pages, records = records.len(), "Scan complete");
        Ok(records)
    }

    fn backend_name(&self) -> &'static str {
        "dynamodb"
    }
}
