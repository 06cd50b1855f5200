use crate::text::truncate_chars;
use async_trait::async_trait;
use catalog_types::attribute::CategoryAttribute;
use catalog_types::category::UpstreamTree;
use catalog_types::{CatalogError, CategoryId, Marketplace};
use derive_more::{Display, Error};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::sleep;

static DEFAULT_ACCEPT_ENCODING: &str = "br;q=1.0, gzip;q=0.6, deflate;q=0.4, *;q=0.2";
const BODY_PREVIEW_LIMIT: usize = 220;

/// Marketplace API as seen by the catalog: the raw category tree and the
/// attribute definitions of one leaf.
#[async_trait]
pub trait MarketplaceAdapter: Send + Sync {
    fn marketplace(&self) -> Marketplace;

    async fn fetch_tree(&self) -> Result<UpstreamTree, UpstreamError>;

    async fn fetch_attributes(
        &self,
        leaf_id: &CategoryId,
    ) -> Result<Vec<CategoryAttribute>, UpstreamError>;
}

#[derive(Debug, Display, Error)]
pub enum UpstreamError {
    Network(reqwest::Error),
    #[display("Upstream responded with {status}: {body}")]
    Status { status: u16, body: String },
    #[error(ignore)]
    #[display("Unable to decode upstream response: {_0}")]
    Decode(String),
    #[error(ignore)]
    #[display("Malformed upstream data: {_0}")]
    Malformed(String),
    Other(anyhow::Error),
}

impl UpstreamError {
    pub fn into_catalog(self, context: &str) -> CatalogError {
        match self {
            Self::Malformed(msg) => CatalogError::MalformedUpstreamData(format!("{context}: {msg}")),
            err => CatalogError::UpstreamUnavailable(format!("{context}: {err}")),
        }
    }
}

impl From<anyhow::Error> for UpstreamError {
    fn from(err: anyhow::Error) -> Self {
        UpstreamError::Other(err)
    }
}

impl From<reqwest::Error> for UpstreamError {
    fn from(err: reqwest::Error) -> Self {
        UpstreamError::Network(err)
    }
}

impl From<reqwest_middleware::Error> for UpstreamError {
    fn from(err: reqwest_middleware::Error) -> Self {
        match err {
            reqwest_middleware::Error::Middleware(err) => UpstreamError::Other(err),
            reqwest_middleware::Error::Reqwest(err) => UpstreamError::Network(err),
        }
    }
}

impl From<serde_json::Error> for UpstreamError {
    fn from(err: serde_json::Error) -> Self {
        UpstreamError::Decode(err.to_string())
    }
}

pub fn truncate_body(body: &str) -> String {
    let trimmed = body.trim();
    let preview = truncate_chars(trimmed, BODY_PREVIEW_LIMIT);
    if preview.len() < trimmed.len() {
        format!("{preview}...")
    } else {
        preview.to_string()
    }
}

/// Checks the status, then decodes the body. Errors carry a short preview of
/// what the upstream actually sent.
pub async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, UpstreamError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(UpstreamError::Status {
            status: status.as_u16(),
            body: truncate_body(&body),
        });
    }
    decode_body(&body)
}

pub fn decode_body<T: DeserializeOwned>(body: &str) -> Result<T, UpstreamError> {
    if body.trim().is_empty() {
        return Err(UpstreamError::Decode("empty response body".to_string()));
    }
    serde_json::from_str::<T>(body)
        .map_err(|err| UpstreamError::Decode(format!("{err}. Body: {}", truncate_body(body))))
}

/// Releases one permit every `60s / rpm`, shared by every request made
/// through the client it is attached to.
pub struct RateLimiter(Arc<Notify>);

impl RateLimiter {
    pub fn new(rpm: u64) -> Self {
        let notify = Arc::new(Notify::new());
        let n = notify.clone();
        let duration = Duration::from_millis(60_000 / rpm.max(1));
        tokio::spawn(async move {
            let notify = n;
            loop {
                sleep(duration).await;
                notify.notify_one();
            }
        });
        Self(notify)
    }
}

#[async_trait]
impl reqwest_ratelimit::RateLimiter for RateLimiter {
    async fn acquire_permit(&self) {
        self.0.notified().await;
    }
}

pub fn build_client(timeout: Duration, rpm: u64) -> anyhow::Result<ClientWithMiddleware> {
    let mut headers = HeaderMap::new();
    headers.append(
        reqwest::header::ACCEPT_ENCODING,
        HeaderValue::from_static(DEFAULT_ACCEPT_ENCODING),
    );
    let client = reqwest::ClientBuilder::new()
        .connect_timeout(Duration::from_secs(10))
        .timeout(timeout)
        .use_rustls_tls()
        .default_headers(headers)
        .build()?;

    let retry_policy = ExponentialBackoff::builder().build_with_max_retries(3);
    Ok(ClientBuilder::new(client)
        .with(RetryTransientMiddleware::new_with_policy(retry_policy))
        .with(reqwest_ratelimit::all(RateLimiter::new(rpm)))
        .build())
}
