//! HTTP client for the live review scrape service.

use crate::error::SourceError;
use crate::models::Review;
use crate::source::{DayProgress, ReviewQuery, ReviewSource, SourceBatch};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ScrapeRequest<'a> {
    app_id: &'a str,
    package_name: &'a str,
    start_date: String,
    end_date: String,
}

#[derive(Debug, Deserialize)]
struct ScrapeResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Option<ScrapeData>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ScrapeData {
    /// Decoded one by one so a bad record only costs itself.
    #[serde(default)]
    reviews: Vec<serde_json::Value>,
}

/// Live review source that POSTs the window to a scrape endpoint.
pub struct HttpReviewScraper {
    endpoint: Option<String>,
    timeout_seconds: u64,
    http_client: reqwest::Client,
}

impl HttpReviewScraper {
    pub fn new(endpoint: Option<String>, timeout_seconds: u64) -> Result<Self, SourceError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .map_err(|e| SourceError::Unavailable(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            endpoint: endpoint.filter(|e| !e.trim().is_empty()),
            timeout_seconds,
            http_client,
        })
    }
}

#[async_trait]
impl ReviewSource for HttpReviewScraper {
    fn name(&self) -> &'static str {
        "scraper"
    }

    async fn fetch(
        &self,
        query: &ReviewQuery,
        _progress: DayProgress<'_>,
    ) -> Result<SourceBatch, SourceError> {
        let endpoint = self.endpoint.as_deref().ok_or(SourceError::NotConfigured)?;

        let request = ScrapeRequest {
            app_id: &query.app,
            package_name: &query.package,
            start_date: query.start.format("%Y-%m-%d").to_string(),
            end_date: query.end.format("%Y-%m-%d").to_string(),
        };

        info!(
            "Scraping reviews for {} from {} to {}",
            query.package, request.start_date, request.end_date
        );

        let response = self
            .http_client
            .post(endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SourceError::Unavailable(format!("request timed out after {}s", self.timeout_seconds))
                } else {
                    SourceError::Unavailable(e.to_string())
                }
            })?;

        let status = response.status();
        let body: ScrapeResponse = response
            .json()
            .await
            .map_err(|e| SourceError::Unavailable(format!("invalid scrape response ({}): {}", status, e)))?;

        if !status.is_success() || !body.success {
            return Err(SourceError::Unavailable(
                body.error
                    .unwrap_or_else(|| format!("scraping failed with status {}", status)),
            ));
        }

        let raw = body.data.map(|d| d.reviews).unwrap_or_default();
        debug!("Scraper returned {} reviews", raw.len());

        if raw.is_empty() {
            return Err(SourceError::EmptyResult);
        }
        Ok(decode_reviews(raw))
    }
}

fn decode_reviews(raw: Vec<serde_json::Value>) -> SourceBatch {
    let mut batch = SourceBatch::default();
    for value in raw {
        match serde_json::from_value::<Review>(value) {
            Ok(review) => batch.reviews.push(review),
            Err(e) => {
                warn!("Skipping malformed scraped review: {}", e);
                batch.rejected += 1;
            }
        }
    }
    batch
}
