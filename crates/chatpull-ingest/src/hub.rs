//! Hugging Face datasets-server client
//!
//! Streams a dataset split through the `/rows` endpoint, which serves at
//! most [`MAX_PAGE_ROWS`] rows per request:
//!
//! ```text
//! GET {endpoint}/rows?dataset=lmsys/lmsys-chat-1m&config=default&split=train&offset=0&length=100
//! Authorization: Bearer <token>
//! ```

use crate::error::{IngestError, Result};
use crate::source::{RowPage, RowSource, SourceRow};
use async_trait::async_trait;
use chatpull_common::HubToken;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

// ============================================================================
// Hub Client Constants
// ============================================================================

/// Public datasets-server endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://datasets-server.huggingface.co";

/// Upper bound the `/rows` endpoint enforces on `length`.
pub const MAX_PAGE_ROWS: usize = 100;

/// Default per-request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Dataset, config and split addressed on the hub
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetRef {
    pub dataset: String,
    pub config: String,
    pub split: String,
}

impl std::fmt::Display for DatasetRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}[{}/{}]", self.dataset, self.config, self.split)
    }
}

#[derive(Debug, Deserialize)]
struct RowsResponse {
    rows: Vec<RowEntry>,
    #[serde(default)]
    num_rows_total: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RowEntry {
    row_idx: u64,
    row: Value,
    #[serde(default)]
    truncated_cells: Vec<String>,
}

/// Forward-only reader over one dataset split
pub struct HubClient {
    client: Client,
    endpoint: String,
    token: HubToken,
    dataset: DatasetRef,
    timeout: Duration,
    offset: u64,
    total: Option<u64>,
}

impl HubClient {
    /// Create a client. No request is made until the first page is fetched.
    pub fn new(
        endpoint: impl Into<String>,
        token: HubToken,
        dataset: DatasetRef,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("chatpull/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| IngestError::InvalidConfig(format!("cannot build HTTP client: {err}")))?;

        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            token,
            dataset,
            timeout,
            offset: 0,
            total: None,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Rows handed out so far
    pub fn offset(&self) -> u64 {
        self.offset
    }

    fn rows_url(&self) -> String {
        format!("{}/rows", self.endpoint)
    }

    async fn request_page(&self, length: usize) -> Result<RowsResponse> {
        let response = self
            .client
            .get(self.rows_url())
            .bearer_auth(self.token.expose())
            .query(&[
                ("dataset", self.dataset.dataset.as_str()),
                ("config", self.dataset.config.as_str()),
                ("split", self.dataset.split.as_str()),
            ])
            .query(&[("offset", self.offset), ("length", length as u64)])
            .send()
            .await
            .map_err(|err| self.transport_error(err))?;

        let status = response.status();
        // Only the opening request can reject the credential; later it is a lost source.
        if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) && self.offset == 0 {
            return Err(IngestError::AuthenticationFailure(format!(
                "hub rejected the token for {} ({})",
                self.dataset, status
            )));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(IngestError::source_unavailable(format!(
                "hub returned {} for {} at offset {}: {}",
                status,
                self.dataset,
                self.offset,
                body.chars().take(200).collect::<String>()
            )));
        }

        response
            .json::<RowsResponse>()
            .await
            .map_err(|err| self.transport_error(err))
    }

    fn transport_error(&self, err: reqwest::Error) -> IngestError {
        if err.is_timeout() {
            IngestError::source_unavailable(format!(
                "request for {} at offset {} timed out after {}s",
                self.dataset,
                self.offset,
                self.timeout.as_secs()
            ))
        } else if err.is_decode() {
            IngestError::source_unavailable(format!("unreadable response from hub: {err}"))
        } else {
            IngestError::source_unavailable(format!("request to hub failed: {err}"))
        }
    }
}

#[async_trait]
impl RowSource for HubClient {
    async fn fetch_page(&mut self, max_rows: usize) -> Result<RowPage> {
        let length = max_rows.min(MAX_PAGE_ROWS);
        if length == 0 || self.total.is_some_and(|total| self.offset >= total) {
            return Ok(RowPage {
                total: self.total,
                ..RowPage::default()
            });
        }

        let response = self.request_page(length).await?;
        if response.num_rows_total.is_some() {
            self.total = response.num_rows_total;
        }

        let mut page = RowPage {
            total: self.total,
            ..RowPage::default()
        };
        for entry in response.rows {
            if !entry.truncated_cells.is_empty() {
                // A truncated cell cannot be written back losslessly.
                warn!(row = entry.row_idx, cells = ?entry.truncated_cells, "Hub truncated row cells");
                page.failure = Some(IngestError::malformed(
                    entry.row_idx,
                    format!("hub truncated cells {:?}", entry.truncated_cells),
                ));
                break;
            }
            page.rows.push(SourceRow {
                index: entry.row_idx,
                value: entry.row,
            });
        }

        self.offset += page.rows.len() as u64;
        debug!(
            dataset = %self.dataset,
            rows = page.rows.len(),
            offset = self.offset,
            total = ?self.total,
            "Fetched page from hub"
        );
        Ok(page)
    }

    fn describe(&self) -> String {
        format!("hub {}", self.dataset)
    }
}
