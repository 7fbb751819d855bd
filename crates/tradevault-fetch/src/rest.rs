//! REST implementation of the paged source against the settlement endpoint.
//!
//! Session establishment happens elsewhere; this source only presents a
//! pre-established token with every call.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::{FetchError, FetchResult};
use crate::source::{Page, PagedSource};
use crate::window::RetrievalWindow;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Connection settings for the settlement endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct RestConfig {
    /// URL of the cleared-order listing call.
    pub endpoint: String,
    /// Application key sent with every request.
    pub app_key: String,
    /// Pre-established session token.
    pub session_token: String,
}

/// Pages cleared orders out of the settlement REST API.
pub struct RestSource {
    config: RestConfig,
    client: reqwest::Client,
}

impl RestSource {
    /// Builds a source with a fresh HTTP client.
    pub fn new(config: RestConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ClearedOrderRequest<'a> {
    bet_status: &'a str,
    settled_date_range: DateRange,
    from_record: u64,
    record_count: u32,
    include_item_description: bool,
}

#[derive(Serialize)]
struct DateRange {
    from: String,
    to: String,
}

#[async_trait]
impl PagedSource for RestSource {
    async fn fetch(
        &self,
        window: &RetrievalWindow,
        offset: u64,
        page_size: u32,
    ) -> FetchResult<Page> {
        let request = ClearedOrderRequest {
            bet_status: "SETTLED",
            settled_date_range: DateRange {
                from: window.from.format(TIMESTAMP_FORMAT).to_string(),
                to: window.to.format(TIMESTAMP_FORMAT).to_string(),
            },
            from_record: offset,
            record_count: page_size,
            include_item_description: true,
        };

        let response = self
            .client
            .post(&self.config.endpoint)
            .header("X-Application", &self.config.app_key)
            .header("X-Authentication", &self.config.session_token)
            .json(&request)
            .send()
            .await
            .map_err(|err| FetchError::Upstream(err.to_string()))?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(FetchError::Unauthorized(format!(
                    "status {}",
                    response.status()
                )));
            }
            status if !status.is_success() => {
                return Err(FetchError::Upstream(format!("status {status}")));
            }
            _ => {}
        }

        let payload = response
            .bytes()
            .await
            .map_err(|err| FetchError::Upstream(err.to_string()))?;
        let body: Value = serde_json::from_slice(&payload)
            .map_err(|err| FetchError::BadResponse(err.to_string()))?;
        let records = body
            .get("clearedOrders")
            .and_then(Value::as_array)
            .map(|orders| orders.len() as u32)
            .ok_or_else(|| FetchError::BadResponse("missing clearedOrders".to_string()))?;
        let more_available = body
            .get("moreAvailable")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        debug!(offset, records, more_available, "fetched settled-order page");
        Ok(Page {
            payload,
            records,
            more_available,
        })
    }
}
