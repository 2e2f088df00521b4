//! Data models for the review trend pipeline.
//!
//! This module contains the core data structures shared by every stage:
//! reviews, seed topics, per-topic frequencies and the final report.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Per-day counts keyed by calendar day (serialized as `YYYY-MM-DD`).
pub type DayCounts = BTreeMap<NaiveDate, u32>;

/// Category of a topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Complaints and defects.
    Issue,
    /// Feature requests.
    Request,
    /// Praise or neutral remarks.
    Feedback,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Issue => "issue",
            Category::Request => "request",
            Category::Feedback => "feedback",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    /// Case-insensitive; plural forms are accepted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "issue" | "issues" => Ok(Category::Issue),
            "request" | "requests" => Ok(Category::Request),
            "feedback" | "feedbacks" => Ok(Category::Feedback),
            other => Err(format!("unknown topic category: {}", other)),
        }
    }
}

/// Trend direction of a topic over the last two weeks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
    Stable,
}

impl Trend {
    /// Returns an arrow for table rendering.
    pub fn arrow(&self) -> &'static str {
        match self {
            Trend::Up => "↑",
            Trend::Down => "↓",
            Trend::Stable => "→",
        }
    }
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trend::Up => write!(f, "up"),
            Trend::Down => write!(f, "down"),
            Trend::Stable => write!(f, "stable"),
        }
    }
}

/// A single user review, immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: String,
    /// Calendar day the review belongs to.
    #[serde(rename = "date")]
    pub day: NaiveDate,
    /// Star rating, 1 to 5.
    pub rating: u8,
    pub text: String,
    pub app: String,
    #[serde(rename = "username")]
    pub author: String,
}

/// A topic label offered to the classifier as vocabulary guidance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedTopic {
    pub label: String,
    pub category: Category,
}

impl SeedTopic {
    pub fn new(label: impl Into<String>, category: Category) -> Self {
        Self {
            label: label.into(),
            category,
        }
    }
}

/// An app the pipeline knows how to analyze.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppInfo {
    pub id: &'static str,
    pub name: &'static str,
    /// Store package reference used by the live scraper.
    pub package: &'static str,
}

pub const SUPPORTED_APPS: &[AppInfo] = &[
    AppInfo {
        id: "swiggy",
        name: "Swiggy",
        package: "in.swiggy.android",
    },
    AppInfo {
        id: "zomato",
        name: "Zomato",
        package: "com.application.zomato",
    },
    AppInfo {
        id: "blinkit",
        name: "Blinkit",
        package: "com.grofers.customerapp",
    },
];

/// Look up a supported app by id (case-insensitive).
pub fn find_app(id: &str) -> Option<&'static AppInfo> {
    let id = id.trim();
    SUPPORTED_APPS.iter().find(|a| a.id.eq_ignore_ascii_case(id))
}

const BUILTIN_SEEDS: &[(&str, Category)] = &[
    ("Delivery delayed", Category::Issue),
    ("Food quality poor", Category::Issue),
    ("Delivery partner rude", Category::Issue),
    ("App crashing", Category::Issue),
    ("Payment failed", Category::Issue),
    ("Wrong order delivered", Category::Issue),
    ("Order cancelled", Category::Issue),
    ("Refund not received", Category::Issue),
    ("GPS/Location issues", Category::Issue),
    ("Customer support unhelpful", Category::Issue),
    ("Add more restaurants", Category::Request),
    ("Reduce delivery fees", Category::Request),
    ("Improve packaging", Category::Request),
    ("Add dark mode", Category::Request),
    ("Better discounts", Category::Request),
    ("Faster delivery", Category::Request),
    ("More payment options", Category::Request),
    ("Great service", Category::Feedback),
    ("Fast delivery", Category::Feedback),
    ("Good app experience", Category::Feedback),
    ("Reasonable prices", Category::Feedback),
];

/// The built-in seed vocabulary.
pub fn builtin_seed_topics() -> Vec<SeedTopic> {
    BUILTIN_SEEDS
        .iter()
        .map(|(label, category)| SeedTopic::new(*label, *category))
        .collect()
}

/// One group returned by the deduplicator: variants fold into `canonical`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeGroup {
    pub canonical: String,
    #[serde(default)]
    pub variants: Vec<String>,
}

/// Final per-topic result, derived once when the report is assembled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicFrequency {
    pub topic: String,
    pub category: Category,
    pub frequencies: DayCounts,
    pub total_count: u32,
    pub trend: Trend,
    pub trend_percentage: u32,
}

impl TopicFrequency {
    /// Count for a single day, zero when absent.
    pub fn count_on(&self, day: &NaiveDate) -> u32 {
        self.frequencies.get(day).copied().unwrap_or(0)
    }
}

/// Summary statistics over the topics of a report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub total_topics: usize,
    pub issue_topics: usize,
    pub request_topics: usize,
    pub feedback_topics: usize,
    pub rising: usize,
    pub falling: usize,
    pub stable: usize,
    /// Sum of all topic totals; a review may be attributed to several topics.
    pub total_attributions: u64,
}

impl ReportSummary {
    pub fn from_topics(topics: &[TopicFrequency]) -> Self {
        let mut summary = Self {
            total_topics: topics.len(),
            ..Self::default()
        };

        for topic in topics {
            match topic.category {
                Category::Issue => summary.issue_topics += 1,
                Category::Request => summary.request_topics += 1,
                Category::Feedback => summary.feedback_topics += 1,
            }
            match topic.trend {
                Trend::Up => summary.rising += 1,
                Trend::Down => summary.falling += 1,
                Trend::Stable => summary.stable += 1,
            }
            summary.total_attributions += u64::from(topic.total_count);
        }

        summary
    }
}

/// The complete, immutable analysis report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub id: String,
    pub target_date: NaiveDate,
    pub app: String,
    /// The 31 days of the window, oldest first.
    pub date_range: Vec<NaiveDate>,
    /// Sorted by total count, descending.
    pub topics: Vec<TopicFrequency>,
    pub summary: ReportSummary,
    pub generated_at: DateTime<Utc>,
    pub total_reviews_analyzed: usize,
    pub new_topics_discovered: usize,
}

impl AnalysisReport {
    /// Topics restricted to one category, in report order.
    pub fn topics_in(&self, category: Category) -> impl Iterator<Item = &TopicFrequency> {
        self.topics.iter().filter(move |t| t.category == category)
    }
}

/// Lightweight listing entry for stored reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportListing {
    pub id: String,
    pub app: String,
    pub target_date: NaiveDate,
    pub range_start: Option<NaiveDate>,
    pub range_end: Option<NaiveDate>,
    pub total_reviews_analyzed: usize,
    pub new_topics_discovered: usize,
    pub generated_at: DateTime<Utc>,
}

impl From<&AnalysisReport> for ReportListing {
    fn from(report: &AnalysisReport) -> Self {
        Self {
            id: report.id.clone(),
            app: report.app.clone(),
            target_date: report.target_date,
            range_start: report.date_range.first().copied(),
            range_end: report.date_range.last().copied(),
            total_reviews_analyzed: report.total_reviews_analyzed,
            new_topics_discovered: report.new_topics_discovered,
            generated_at: report.generated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topic(label: &str, category: Category, total: u32, trend: Trend) -> TopicFrequency {
        TopicFrequency {
            topic: label.to_string(),
            category,
            frequencies: DayCounts::new(),
            total_count: total,
            trend,
            trend_percentage: 0,
        }
    }

    #[test]
    fn test_category_from_str() {
        assert_eq!("issue".parse::<Category>(), Ok(Category::Issue));
        assert_eq!("Requests".parse::<Category>(), Ok(Category::Request));
        assert_eq!(" FEEDBACK ".parse::<Category>(), Ok(Category::Feedback));
        assert!("bug".parse::<Category>().is_err());
    }

    #[test]
    fn test_find_app() {
        assert_eq!(find_app("swiggy").map(|a| a.package), Some("in.swiggy.android"));
        assert_eq!(find_app("Zomato").map(|a| a.id), Some("zomato"));
        assert!(find_app("ubereats").is_none());
    }

    #[test]
    fn test_builtin_seed_topics() {
        let seeds = builtin_seed_topics();
        assert_eq!(seeds.len(), 21);
        assert_eq!(seeds.iter().filter(|s| s.category == Category::Issue).count(), 10);
        assert_eq!(seeds.iter().filter(|s| s.category == Category::Request).count(), 7);
        assert_eq!(seeds.iter().filter(|s| s.category == Category::Feedback).count(), 4);
    }

    #[test]
    fn test_report_summary() {
        let topics = vec![
            topic("Delivery delayed", Category::Issue, 40, Trend::Up),
            topic("App crashing", Category::Issue, 12, Trend::Down),
            topic("Add dark mode", Category::Request, 5, Trend::Stable),
        ];

        let summary = ReportSummary::from_topics(&topics);
        assert_eq!(summary.total_topics, 3);
        assert_eq!(summary.issue_topics, 2);
        assert_eq!(summary.request_topics, 1);
        assert_eq!(summary.feedback_topics, 0);
        assert_eq!(summary.rising, 1);
        assert_eq!(summary.falling, 1);
        assert_eq!(summary.stable, 1);
        assert_eq!(summary.total_attributions, 57);
    }

    #[test]
    fn test_review_wire_format() {
        let json = r#"{"id":"r1","date":"2025-01-31","rating":2,"text":"Late again","app":"swiggy","username":"quickbuyer"}"#;
        let review: Review = serde_json::from_str(json).unwrap();
        assert_eq!(review.day, NaiveDate::from_ymd_opt(2025, 1, 31).unwrap());
        assert_eq!(review.author, "quickbuyer");
    }
}
