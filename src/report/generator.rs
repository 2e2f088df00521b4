//! Markdown and JSON report generation.
//!
//! This module renders an [`AnalysisReport`] for humans (Markdown tables
//! of topic trends and daily counts) or machines (pretty JSON).

use crate::models::{find_app, AnalysisReport, Category, ReportListing, ReportSummary, TopicFrequency};
use anyhow::{Context, Result};
use std::path::Path;

/// Days shown in the daily breakdown table.
const DAILY_COLUMNS: usize = 7;

/// Generate a complete Markdown report, optionally for one category only.
pub fn generate_markdown_report(report: &AnalysisReport, filter: Option<Category>) -> String {
    let topics = filtered_topics(report, filter);
    let mut output = String::new();

    output.push_str(&format!("# Review Trend Report: {}\n\n", app_name(&report.app)));

    output.push_str(&generate_metadata_section(report, filter));
    output.push_str(&generate_summary_section(&ReportSummary::from_topics(&topics)));
    output.push_str(&generate_trends_section(&topics));
    output.push_str(&generate_daily_section(report, &topics));
    output.push_str(&generate_footer());

    output
}

fn app_name(app: &str) -> &str {
    find_app(app).map(|a| a.name).unwrap_or(app)
}

fn filtered_topics(report: &AnalysisReport, filter: Option<Category>) -> Vec<TopicFrequency> {
    match filter {
        Some(category) => report.topics_in(category).cloned().collect(),
        None => report.topics.clone(),
    }
}

/// Generate the metadata section.
fn generate_metadata_section(report: &AnalysisReport, filter: Option<Category>) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **App:** {}\n", app_name(&report.app)));
    section.push_str(&format!("- **Target Date:** {}\n", report.target_date));
    if let (Some(start), Some(end)) = (report.date_range.first(), report.date_range.last()) {
        section.push_str(&format!(
            "- **Date Range:** {} to {} ({} days)\n",
            start,
            end,
            report.date_range.len()
        ));
    }
    section.push_str(&format!(
        "- **Generated:** {}\n",
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!(
        "- **Reviews Analyzed:** {}\n",
        report.total_reviews_analyzed
    ));
    section.push_str(&format!(
        "- **New Topics Discovered:** {}\n",
        report.new_topics_discovered
    ));
    if let Some(category) = filter {
        section.push_str(&format!("- **Category Filter:** {}\n", category));
    }
    section.push_str(&format!("- **Report ID:** `{}`\n", report.id));
    section.push('\n');

    section
}

/// Generate the summary section.
fn generate_summary_section(summary: &ReportSummary) -> String {
    let mut section = String::new();

    section.push_str("## Summary\n\n");
    section.push_str("| Issues | Requests | Feedback | **Topics** |\n");
    section.push_str("|:---:|:---:|:---:|:---:|\n");
    section.push_str(&format!(
        "| {} | {} | {} | **{}** |\n\n",
        summary.issue_topics, summary.request_topics, summary.feedback_topics, summary.total_topics
    ));

    section.push_str("| ↑ Rising | ↓ Falling | → Stable | Attributions |\n");
    section.push_str("|:---:|:---:|:---:|:---:|\n");
    section.push_str(&format!(
        "| {} | {} | {} | {} |\n\n",
        summary.rising, summary.falling, summary.stable, summary.total_attributions
    ));

    section
}

/// Generate the topic trend table.
fn generate_trends_section(topics: &[TopicFrequency]) -> String {
    let mut section = String::new();

    section.push_str("## Topic Trends\n\n");

    if topics.is_empty() {
        section.push_str("No topics were identified for this period.\n\n");
        return section;
    }

    section.push_str("| # | Topic | Category | Total | Trend |\n");
    section.push_str("|:---:|:---|:---|:---:|:---:|\n");
    for (i, topic) in topics.iter().enumerate() {
        section.push_str(&format!(
            "| {} | {} | {} | {} | {} {}% |\n",
            i + 1,
            escape_cell(&topic.topic),
            topic.category,
            topic.total_count,
            topic.trend.arrow(),
            topic.trend_percentage
        ));
    }
    section.push('\n');

    section
}

/// Generate the per-day table for the last days of the window.
fn generate_daily_section(report: &AnalysisReport, topics: &[TopicFrequency]) -> String {
    if topics.is_empty() || report.date_range.is_empty() {
        return String::new();
    }

    let days = &report.date_range[report.date_range.len().saturating_sub(DAILY_COLUMNS)..];
    let mut section = String::new();

    section.push_str(&format!("## Last {} Days\n\n", days.len()));

    section.push_str("| Topic |");
    for day in days {
        section.push_str(&format!(" {} |", day.format("%b %d")));
    }
    section.push('\n');

    section.push_str("|:---|");
    for _ in days {
        section.push_str(":---:|");
    }
    section.push('\n');

    for topic in topics {
        section.push_str(&format!("| {} |", escape_cell(&topic.topic)));
        for day in days {
            section.push_str(&format!(" {} |", topic.count_on(day)));
        }
        section.push('\n');
    }
    section.push('\n');

    section
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|")
}

/// Generate the report footer.
fn generate_footer() -> String {
    let mut footer = String::new();

    footer.push_str("---\n\n");
    footer.push_str(&format!(
        "*Report generated by reviewtrend v{}*\n",
        env!("CARGO_PKG_VERSION")
    ));

    footer
}

/// Generate a JSON report, optionally for one category only.
pub fn generate_json_report(report: &AnalysisReport, filter: Option<Category>) -> Result<String> {
    match filter {
        None => serde_json::to_string_pretty(report).map_err(Into::into),
        Some(_) => {
            let mut filtered = report.clone();
            filtered.topics = filtered_topics(report, filter);
            filtered.summary = ReportSummary::from_topics(&filtered.topics);
            serde_json::to_string_pretty(&filtered).map_err(Into::into)
        }
    }
}

/// Render stored report listings as a Markdown table.
pub fn generate_history_table(listings: &[ReportListing]) -> String {
    if listings.is_empty() {
        return "No saved reports.\n".to_string();
    }

    let mut table = String::new();
    table.push_str("| ID | App | Target Date | Reviews | New Topics | Generated |\n");
    table.push_str("|:---|:---|:---:|:---:|:---:|:---|\n");
    for listing in listings {
        table.push_str(&format!(
            "| `{}` | {} | {} | {} | {} | {} |\n",
            listing.id,
            app_name(&listing.app),
            listing.target_date,
            listing.total_reviews_analyzed,
            listing.new_topics_discovered,
            listing.generated_at.format("%Y-%m-%d %H:%M")
        ));
    }

    table
}

/// Write rendered output to a file.
pub fn write_report(content: &str, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }

    std::fs::write(path, content)
        .with_context(|| format!("Failed to write report to {}", path.display()))
}
