//! Final report assembly.

use super::aggregator::TopicEntry;
use super::trend::compute_trend;
use super::window::DateWindow;
use crate::models::{AnalysisReport, ReportSummary, TopicFrequency};
use chrono::Utc;
use uuid::Uuid;

/// Inputs for [`assemble_report`] besides the aggregated topics.
#[derive(Debug, Clone)]
pub struct ReportContext<'a> {
    pub app: &'a str,
    pub window: &'a DateWindow,
    /// Every ingested review, including those of days whose
    /// classification failed.
    pub total_reviews: usize,
    pub new_topics: usize,
}

/// Turn aggregated entries into frequency rows, sorted by total count.
///
/// `entries` must be in discovery order; the sort is stable so equal
/// totals keep that order.
pub fn build_topic_frequencies(entries: Vec<TopicEntry>, window: &DateWindow) -> Vec<TopicFrequency> {
    let mut topics: Vec<TopicFrequency> = entries
        .into_iter()
        .map(|entry| {
            let reading = compute_trend(&entry.frequencies, window);
            let total_count = entry.frequencies.values().sum();
            TopicFrequency {
                topic: entry.label,
                category: entry.category,
                frequencies: entry.frequencies,
                total_count,
                trend: reading.trend,
                trend_percentage: reading.percentage,
            }
        })
        .collect();

    topics.sort_by(|a, b| b.total_count.cmp(&a.total_count));
    topics
}

/// Build the immutable report with a fresh id and timestamp.
pub fn assemble_report(entries: Vec<TopicEntry>, ctx: ReportContext<'_>) -> AnalysisReport {
    let topics = build_topic_frequencies(entries, ctx.window);
    let summary = ReportSummary::from_topics(&topics);

    AnalysisReport {
        id: Uuid::new_v4().to_string(),
        target_date: ctx.window.target(),
        app: ctx.app.to_string(),
        date_range: ctx.window.days().to_vec(),
        topics,
        summary,
        generated_at: Utc::now(),
        total_reviews_analyzed: ctx.total_reviews,
        new_topics_discovered: ctx.new_topics,
    }
}
