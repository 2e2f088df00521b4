//! Synthetic review generation.
//!
//! Used when live data is not requested or the live source fails. The
//! per-day split between issues, feedback and requests is deterministic;
//! texts, ratings, authors and the day-to-day variance are random.

use super::templates::{templates_for, AUTHORS, TIME_PLACEHOLDER};
use super::{DayProgress, ReviewQuery, ReviewSource, SourceBatch};
use crate::error::SourceError;
use crate::models::Review;
use async_trait::async_trait;
use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use std::time::Duration;
use tracing::{debug, info};

/// Kind of a generated review; decides template list and rating band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewKind {
    Issue,
    Request,
    Feedback,
}

impl ReviewKind {
    fn slug(&self) -> &'static str {
        match self {
            ReviewKind::Issue => "issue",
            ReviewKind::Request => "request",
            ReviewKind::Feedback => "feedback",
        }
    }

    /// Inclusive star rating band.
    pub fn rating_band(&self) -> (u8, u8) {
        match self {
            ReviewKind::Issue => (1, 2),
            ReviewKind::Request => (2, 3),
            ReviewKind::Feedback => (4, 5),
        }
    }
}

/// How many reviews of each kind a day gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailySplit {
    pub issues: usize,
    pub feedback: usize,
    pub requests: usize,
}

impl DailySplit {
    /// 50% issues, 30% feedback, the remainder requests.
    pub fn of(count: usize) -> Self {
        let issues = count / 2;
        let feedback = count * 3 / 10;
        Self {
            issues,
            feedback,
            requests: count - issues - feedback,
        }
    }

    #[cfg(test)]
    pub fn total(&self) -> usize {
        self.issues + self.feedback + self.requests
    }
}

/// Generator tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntheticSettings {
    pub daily_count: usize,
    /// Maximum day-to-day deviation from `daily_count`, either way.
    pub variance: usize,
    /// Lower bound applied after the variance.
    pub floor: usize,
    /// Fixed seed for reproducible runs.
    pub seed: Option<u64>,
}

impl Default for SyntheticSettings {
    fn default() -> Self {
        Self {
            daily_count: 50,
            variance: 15,
            floor: 20,
            seed: None,
        }
    }
}

impl SyntheticSettings {
    /// Review count for one day.
    pub fn count_for_day<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        let base = self.daily_count as i64;
        let offset = if self.variance == 0 {
            0
        } else {
            let v = self.variance as i64;
            rng.random_range(-v..=v)
        };
        (base + offset).max(self.floor as i64) as usize
    }
}

/// Generate `count` reviews for `app` on `day`.
pub fn generate_reviews_for_day<R: Rng + ?Sized>(
    app: &str,
    day: NaiveDate,
    count: usize,
    rng: &mut R,
) -> Vec<Review> {
    let split = DailySplit::of(count);
    let mut reviews = Vec::with_capacity(count);

    for (kind, n) in [
        (ReviewKind::Issue, split.issues),
        (ReviewKind::Feedback, split.feedback),
        (ReviewKind::Request, split.requests),
    ] {
        for i in 0..n {
            reviews.push(generate_review(app, day, kind, i, rng));
        }
    }

    reviews
}

fn generate_review<R: Rng + ?Sized>(
    app: &str,
    day: NaiveDate,
    kind: ReviewKind,
    index: usize,
    rng: &mut R,
) -> Review {
    let (low, high) = kind.rating_band();
    let author = AUTHORS.choose(rng).copied().unwrap_or("anonymous");

    Review {
        id: format!("{}-{}-{}", day.format("%Y-%m-%d"), kind.slug(), index),
        day,
        rating: rng.random_range(low..=high),
        text: review_text(app, kind, rng),
        app: app.to_string(),
        author: author.to_string(),
    }
}

fn review_text<R: Rng + ?Sized>(app: &str, kind: ReviewKind, rng: &mut R) -> String {
    let templates = templates_for(app);
    let list = match kind {
        ReviewKind::Issue => templates.issues,
        ReviewKind::Request => templates.requests,
        ReviewKind::Feedback => templates.feedback,
    };
    let template = list.choose(rng).copied().unwrap_or("No comment.");
    let minutes: u32 = rng.random_range(15..=74);
    template.replace(TIME_PLACEHOLDER, &minutes.to_string())
}

/// Review source that never fails.
pub struct SyntheticSource {
    settings: SyntheticSettings,
    pause: Duration,
}

impl SyntheticSource {
    pub fn new(settings: SyntheticSettings, pause: Duration) -> Self {
        Self { settings, pause }
    }

    fn rng(&self) -> StdRng {
        match self.settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        }
    }
}

#[async_trait]
impl ReviewSource for SyntheticSource {
    fn name(&self) -> &'static str {
        "synthetic"
    }

    async fn fetch(
        &self,
        query: &ReviewQuery,
        progress: DayProgress<'_>,
    ) -> Result<SourceBatch, SourceError> {
        let days: Vec<NaiveDate> = query.start.iter_days().take_while(|d| *d <= query.end).collect();
        info!(
            "Generating synthetic reviews for {} over {} days",
            query.app,
            days.len()
        );

        let mut rng = self.rng();
        let mut reviews = Vec::new();

        for (i, day) in days.iter().enumerate() {
            progress(*day, i, days.len());

            let count = self.settings.count_for_day(&mut rng);
            debug!(day = %day, count, "generated synthetic reviews");
            reviews.extend(generate_reviews_for_day(&query.app, *day, count, &mut rng));

            if !self.pause.is_zero() {
                tokio::time::sleep(self.pause).await;
            }
        }

        Ok(reviews.into())
    }
}
