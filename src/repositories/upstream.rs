//! Paginated retrieval from the upstream project-relations endpoint.
//!
//! Pages are fetched strictly in order: the next offset depends on the page
//! size the server reported for the previous response, which may be lower
//! than the size requested. A rate-limit response suspends the whole
//! pipeline and retries the same page.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{StatusCode, Url};

use super::EntitySource;
use crate::config::SourceConfig;
use crate::error::AppError;
use crate::models::upstream::{ingest_records, Ingest, UpstreamDocument};
use crate::models::{EntityId, RawEntity};

/// Path of the project-relations resource below the base URL.
pub const RELATIONS_PATH: &str = "/api/project-relations";

/// Header carrying the API key.
pub const API_KEY_HEADER: &str = "X-API-Key";

// ============================================================================
// Retry state machine
// ============================================================================

/// Bounded retry for rate-limited requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total requests allowed for one page, the first included.
    pub max_attempts: u32,
    /// Wait used when the server does not say how long to back off.
    pub default_wait: Duration,
}

/// What to do after a rate-limit response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Sleep, then repeat the same request.
    Wait(Duration),
    /// The ceiling is reached; the refresh fails.
    GiveUp { attempts: u32 },
}

/// Attempt counter for a single page request.
#[derive(Debug, Clone)]
pub struct RetryState {
    policy: RetryPolicy,
    attempts: u32,
}

impl RetryState {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            attempts: 0,
        }
    }

    /// Records that a request is about to be sent.
    pub fn begin_attempt(&mut self) -> u32 {
        self.attempts += 1;
        self.attempts
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn on_rate_limited(&self, retry_after: Option<Duration>) -> RetryDecision {
        if self.attempts >= self.policy.max_attempts {
            RetryDecision::GiveUp {
                attempts: self.attempts,
            }
        } else {
            RetryDecision::Wait(retry_after.unwrap_or(self.policy.default_wait))
        }
    }
}

/// Reads `Retry-After` as whole seconds.
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Resolves the project-relations endpoint from a configured base URL.
///
/// The base may be the host root or already point at the resource.
pub fn relations_endpoint(base_url: &str) -> String {
    let base = base_url.trim().trim_end_matches('/');
    if base.contains(RELATIONS_PATH) {
        base.to_string()
    } else {
        format!("{}{}", base, RELATIONS_PATH)
    }
}

// ============================================================================
// Repository
// ============================================================================

/// Client for the upstream data source.
#[derive(Debug, Clone)]
pub struct UpstreamRepository {
    client: reqwest::Client,
    config: SourceConfig,
}

impl UpstreamRepository {
    pub fn new(config: &SourceConfig) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()?;
        Ok(Self::with_client(client, config))
    }

    pub fn with_client(client: reqwest::Client, config: &SourceConfig) -> Self {
        Self {
            client,
            config: config.clone(),
        }
    }

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.config.max_attempts.max(1),
            default_wait: self.config.default_retry_after(),
        }
    }

    /// Endpoint and credential, or the configuration error naming what is missing.
    fn target(&self) -> Result<(String, &str), AppError> {
        let base = self
            .config
            .base_url
            .as_deref()
            .filter(|b| !b.trim().is_empty())
            .ok_or(AppError::MissingConfig("source.base_url"))?;
        let api_key = self
            .config
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or(AppError::MissingConfig("source.api_key"))?;
        Ok((relations_endpoint(base), api_key))
    }

    /// Retrieves every page of the listing.
    ///
    /// A count that differs from the server-reported total is logged, not
    /// treated as an error.
    pub async fn fetch_all_pages(&self) -> Result<Vec<RawEntity>, AppError> {
        let (endpoint, api_key) = self.target()?;
        let page_size = self.config.page_size.max(1).to_string();
        let page_delay = self.config.page_delay();

        tracing::info!(endpoint = %endpoint, page_size = %page_size, "Fetching project relations");

        let mut ingest = Ingest::default();
        let mut offset: u64 = 0;
        let mut page: u32 = 0;
        let mut received: u64 = 0;
        let mut expected_total: Option<u64> = None;

        loop {
            page += 1;
            let offset_param = offset.to_string();
            let url = Url::parse_with_params(
                &endpoint,
                [
                    ("limit", page_size.as_str()),
                    ("offset", offset_param.as_str()),
                    ("includeSnapshot", "false"),
                ],
            )
            .map_err(|e| AppError::InvalidEndpoint {
                url: endpoint.clone(),
                reason: e.to_string(),
            })?;

            let document = self.get_document(url.clone(), api_key).await?;
            let pagination = document.pagination;
            let records = document
                .records()
                .map_err(|reason| AppError::MalformedDocument {
                    url: url.to_string(),
                    reason,
                })?
                .into_vec();

            let in_page = records.len() as u64;
            received += in_page;
            ingest.extend(ingest_records(&records));

            let Some(pagination) = pagination else {
                tracing::debug!(page, "No pagination info, assuming last page");
                break;
            };

            if expected_total.is_none() {
                expected_total = Some(pagination.total);
                tracing::info!(
                    total = pagination.total,
                    limit = pagination.limit,
                    has_more = pagination.has_more,
                    "First page received"
                );
            }

            // The server-reported size wins over the requested one.
            let advance = if pagination.limit > 0 {
                pagination.limit
            } else {
                in_page
            };

            tracing::debug!(
                page,
                in_page,
                fetched = received,
                has_more = pagination.has_more,
                next_offset = offset + advance,
                "Page complete"
            );

            if !pagination.has_more {
                break;
            }
            if advance == 0 {
                tracing::warn!(page, offset, "Server reports more pages but the page was empty; stopping");
                break;
            }
            offset += advance;

            if !page_delay.is_zero() {
                tokio::time::sleep(page_delay).await;
            }
        }

        let expected = expected_total.unwrap_or(received);
        if received != expected {
            tracing::warn!(
                fetched = received,
                expected,
                "Fetched record count differs from the reported total; some projects may be missing"
            );
        }
        if ingest.quarantined > 0 || ingest.dropped_items > 0 {
            tracing::warn!(
                quarantined = ingest.quarantined,
                dropped_items = ingest.dropped_items,
                "Discarded non-conforming upstream records"
            );
        }
        tracing::info!(
            pages = page,
            entities = ingest.entities.len(),
            "Fetch complete"
        );

        Ok(ingest.entities)
    }

    /// Looks up a single entity by id.
    pub async fn fetch_entity(&self, id: &EntityId) -> Result<RawEntity, AppError> {
        let (endpoint, api_key) = self.target()?;
        let url = Url::parse_with_params(&endpoint, [("projectId", id.as_str())]).map_err(|e| {
            AppError::InvalidEndpoint {
                url: endpoint.clone(),
                reason: e.to_string(),
            }
        })?;

        let document = self.get_document(url, api_key).await?;
        let records = match document.records() {
            Ok(records) => records.into_vec(),
            Err(reason) => {
                tracing::debug!(id = %id, reason = %reason, "Entity lookup returned no project");
                return Err(AppError::EntityNotFound(id.to_string()));
            }
        };

        let entities = ingest_records(&records).entities;
        let returned = entities.len();
        entities.into_iter().find(|e| &e.id == id).ok_or_else(|| {
            tracing::debug!(id = %id, returned, "Entity lookup returned no matching project");
            AppError::EntityNotFound(id.to_string())
        })
    }

    /// Sends one request, retrying it while rate limited.
    async fn get_document(&self, url: Url, api_key: &str) -> Result<UpstreamDocument, AppError> {
        let mut retry = RetryState::new(self.retry_policy());

        loop {
            let attempt = retry.begin_attempt();
            let response = self
                .client
                .get(url.clone())
                .header(API_KEY_HEADER, api_key)
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .send()
                .await?;

            let status = response.status();
            if status.is_success() {
                let body = response.bytes().await?;
                return serde_json::from_slice::<UpstreamDocument>(&body).map_err(|e| {
                    AppError::MalformedDocument {
                        url: url.to_string(),
                        reason: e.to_string(),
                    }
                });
            }

            if status != StatusCode::TOO_MANY_REQUESTS {
                return Err(AppError::UpstreamStatus {
                    status: status.as_u16(),
                    url: url.to_string(),
                });
            }

            match retry.on_rate_limited(parse_retry_after(response.headers())) {
                RetryDecision::Wait(wait) => {
                    tracing::warn!(
                        attempt,
                        max_attempts = self.retry_policy().max_attempts,
                        wait_ms = wait.as_millis() as u64,
                        "Rate limited (429); waiting before retrying the same page"
                    );
                    tokio::time::sleep(wait).await;
                }
                RetryDecision::GiveUp { attempts } => {
                    return Err(AppError::RateLimited {
                        url: url.to_string(),
                        attempts,
                    });
                }
            }
        }
    }
}

#[async_trait]
impl EntitySource for UpstreamRepository {
    fn describe(&self) -> String {
        match self.config.base_url.as_deref() {
            Some(base) => format!("upstream {}", relations_endpoint(base)),
            None => "upstream (unconfigured)".to_string(),
        }
    }

    async fn fetch_all(&self) -> Result<Vec<RawEntity>, AppError> {
        self.fetch_all_pages().await
    }
}
