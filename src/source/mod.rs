//! Review sources.
//!
//! A [`ReviewSource`] returns every review of a window. The live source
//! (scraper client) may fail or come back empty; [`fetch_with_fallback`]
//! then switches to the synthetic source for the same window.

pub mod synthetic;
pub mod templates;

use crate::error::SourceError;
use crate::models::Review;
use async_trait::async_trait;
use chrono::NaiveDate;
use tracing::{info, warn};

pub use synthetic::{SyntheticSettings, SyntheticSource};

/// Per-day progress callback: `(day, index, total_days)`.
pub type DayProgress<'a> = &'a (dyn Fn(NaiveDate, usize, usize) + Send + Sync);

/// What to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewQuery {
    pub app: String,
    /// Store package reference for the live scraper.
    pub package: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// Reviews returned by a source plus the records it could not decode.
#[derive(Debug, Default)]
pub struct SourceBatch {
    pub reviews: Vec<Review>,
    pub rejected: usize,
}

impl From<Vec<Review>> for SourceBatch {
    fn from(reviews: Vec<Review>) -> Self {
        Self {
            reviews,
            rejected: 0,
        }
    }
}

#[async_trait]
pub trait ReviewSource: Send + Sync {
    fn name(&self) -> &'static str;

    async fn fetch(
        &self,
        query: &ReviewQuery,
        progress: DayProgress<'_>,
    ) -> Result<SourceBatch, SourceError>;
}

/// Where the reviews of a run came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataOrigin {
    Live,
    Synthetic,
    /// Live was requested but failed; carries the reason.
    SyntheticFallback(String),
}

/// Reviews of a window plus their origin.
#[derive(Debug)]
pub struct FetchedReviews {
    pub reviews: Vec<Review>,
    pub origin: DataOrigin,
    /// Reviews rejected as outside the window or invalid.
    pub discarded: usize,
}

/// Fetch from `live` when given, falling back to `synthetic` on failure
/// or an empty result. Only a failure of the synthetic source is an error.
pub async fn fetch_with_fallback(
    live: Option<&dyn ReviewSource>,
    synthetic: &dyn ReviewSource,
    query: &ReviewQuery,
    progress: DayProgress<'_>,
) -> Result<FetchedReviews, SourceError> {
    let mut fallback_reason = None;

    if let Some(live) = live {
        info!("Fetching live reviews from {} source", live.name());
        let outcome = match live.fetch(query, progress).await {
            Ok(batch) => {
                let (kept, discarded) = retain_valid(batch.reviews, query);
                if kept.is_empty() {
                    Err(SourceError::EmptyResult)
                } else {
                    Ok((kept, discarded + batch.rejected))
                }
            }
            Err(e) => Err(e),
        };

        match outcome {
            Ok((reviews, discarded)) => {
                info!("Fetched {} live reviews", reviews.len());
                return Ok(FetchedReviews {
                    reviews,
                    origin: DataOrigin::Live,
                    discarded,
                });
            }
            Err(e) => {
                warn!("Live review fetch failed, falling back to simulated data: {}", e);
                fallback_reason = Some(e.to_string());
            }
        }
    }

    let batch = synthetic.fetch(query, progress).await?;
    let (reviews, discarded) = retain_valid(batch.reviews, query);
    let discarded = discarded + batch.rejected;

    Ok(FetchedReviews {
        reviews,
        origin: match fallback_reason {
            Some(reason) => DataOrigin::SyntheticFallback(reason),
            None => DataOrigin::Synthetic,
        },
        discarded,
    })
}

/// Drop reviews outside the window, with blank text or an invalid rating.
fn retain_valid(reviews: Vec<Review>, query: &ReviewQuery) -> (Vec<Review>, usize) {
    let before = reviews.len();
    let kept: Vec<Review> = reviews
        .into_iter()
        .filter(|r| {
            r.day >= query.start
                && r.day <= query.end
                && (1..=5).contains(&r.rating)
                && !r.text.trim().is_empty()
        })
        .collect();

    let discarded = before - kept.len();
    if discarded > 0 {
        warn!("Discarded {} reviews outside the window or malformed", discarded);
    }
    (kept, discarded)
}
