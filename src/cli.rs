//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::models::Category;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// reviewtrend - topic trends from app store reviews
///
/// Classifies 31 days of reviews into short topics with a local LLM,
/// merges near-duplicate topics and reports week-over-week trends.
///
/// Examples:
///   reviewtrend --app swiggy
///   reviewtrend --app zomato --date 2025-01-31 --format json
///   reviewtrend --app blinkit --live --category issue
///   reviewtrend --list-reports
///   reviewtrend --add-topic "Cutlery missing" --topic-category issue --topic-app swiggy
///   reviewtrend --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// App to analyze (swiggy, zomato, blinkit)
    #[arg(short, long, value_name = "APP")]
    pub app: Option<String>,

    /// Target date T of the window T-30..T (YYYY-MM-DD, default: today)
    #[arg(short, long, value_name = "DATE")]
    pub date: Option<String>,

    /// Fetch live reviews from the scrape service
    ///
    /// Falls back to simulated reviews when the service fails or returns nothing.
    #[arg(long)]
    pub live: bool,

    /// Simulated reviews per day
    #[arg(long, value_name = "COUNT")]
    pub daily_count: Option<usize>,

    /// Seed for reproducible simulated reviews
    #[arg(long, value_name = "SEED")]
    pub seed: Option<u64>,

    /// Output file path for the report
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format (markdown, json)
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// Only render topics of this category (issue, request, feedback)
    #[arg(long, value_name = "CATEGORY")]
    pub category: Option<Category>,

    /// Ollama model to use for classification and deduplication
    #[arg(short, long, env = "REVIEWTREND_MODEL")]
    pub model: Option<String>,

    /// Ollama API endpoint URL
    #[arg(long, env = "OLLAMA_URL")]
    pub ollama_url: Option<String>,

    /// Request timeout in seconds for each model call
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Scrape service endpoint used with --live
    #[arg(long, value_name = "URL", env = "REVIEWTREND_SCRAPER_URL")]
    pub scraper_url: Option<String>,

    /// Directory for saved reports
    #[arg(long, value_name = "DIR")]
    pub reports_dir: Option<PathBuf>,

    /// Skip the cooperative pauses between days
    #[arg(long)]
    pub no_pause: bool,

    /// Path to configuration file
    ///
    /// If not specified, looks for .reviewtrend.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .reviewtrend.toml configuration file
    #[arg(long)]
    pub init_config: bool,

    /// List saved reports, newest first
    #[arg(long)]
    pub list_reports: bool,

    /// Render a saved report
    #[arg(long, value_name = "ID")]
    pub show_report: Option<String>,

    /// Delete a saved report
    #[arg(long, value_name = "ID")]
    pub delete_report: Option<String>,

    /// Add a custom seed topic
    #[arg(long, value_name = "LABEL", requires = "topic_category")]
    pub add_topic: Option<String>,

    /// Category of the topic added with --add-topic
    #[arg(long, value_name = "CATEGORY")]
    pub topic_category: Option<Category>,

    /// Restrict the topic added with --add-topic to one app
    #[arg(long, value_name = "APP")]
    pub topic_app: Option<String>,

    /// List custom topics
    #[arg(long)]
    pub list_topics: bool,

    /// Delete a custom topic
    #[arg(long, value_name = "ID")]
    pub delete_topic: Option<String>,

    /// Enable or disable a custom topic
    #[arg(long, value_name = "ID")]
    pub toggle_topic: Option<String>,
}

/// Output format for the report.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

/// What this invocation does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    InitConfig,
    ListReports,
    ShowReport(String),
    DeleteReport(String),
    AddTopic {
        label: String,
        category: Category,
        app: Option<String>,
    },
    ListTopics,
    DeleteTopic(String),
    ToggleTopic(String),
    Analyze,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// The requested action; analysis unless a management flag is set.
    pub fn action(&self) -> Action {
        if self.init_config {
            return Action::InitConfig;
        }
        if self.list_reports {
            return Action::ListReports;
        }
        if let Some(ref id) = self.show_report {
            return Action::ShowReport(id.clone());
        }
        if let Some(ref id) = self.delete_report {
            return Action::DeleteReport(id.clone());
        }
        if let (Some(ref label), Some(category)) = (&self.add_topic, self.topic_category) {
            return Action::AddTopic {
                label: label.clone(),
                category,
                app: self.topic_app.clone(),
            };
        }
        if self.list_topics {
            return Action::ListTopics;
        }
        if let Some(ref id) = self.delete_topic {
            return Action::DeleteTopic(id.clone());
        }
        if let Some(ref id) = self.toggle_topic {
            return Action::ToggleTopic(id.clone());
        }
        Action::Analyze
    }

    fn management_flags(&self) -> usize {
        [
            self.init_config,
            self.list_reports,
            self.show_report.is_some(),
            self.delete_report.is_some(),
            self.add_topic.is_some(),
            self.list_topics,
            self.delete_topic.is_some(),
            self.toggle_topic.is_some(),
        ]
        .iter()
        .filter(|set| **set)
        .count()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if self.management_flags() > 1 {
            return Err("Only one management command can be used at a time".to_string());
        }

        if let Some(ref label) = self.add_topic {
            if label.trim().is_empty() {
                return Err("Topic label must not be empty".to_string());
            }
        }

        if self.action() != Action::Analyze {
            return Ok(());
        }

        if self.app.as_deref().map(str::trim).unwrap_or("").is_empty() {
            return Err("An app is required: use --app swiggy|zomato|blinkit".to_string());
        }

        if let Some(ref url) = self.ollama_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("Ollama URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if let Some(ref url) = self.scraper_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("Scraper URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        if self.daily_count == Some(0) {
            return Err("Daily count must be at least 1".to_string());
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        let mut argv = vec!["reviewtrend"];
        argv.extend_from_slice(args);
        Args::parse_from(argv)
    }

    #[test]
    fn test_analyze_requires_app() {
        assert!(parse(&[]).validate().is_err());
        assert!(parse(&["--app", "swiggy"]).validate().is_ok());
        assert_eq!(parse(&["--app", "swiggy"]).action(), Action::Analyze);
    }

    #[test]
    fn test_management_actions() {
        assert_eq!(parse(&["--list-reports"]).action(), Action::ListReports);
        assert_eq!(
            parse(&["--show-report", "abc"]).action(),
            Action::ShowReport("abc".to_string())
        );
        assert_eq!(
            parse(&["--add-topic", "Cold food", "--topic-category", "issue", "--topic-app", "zomato"])
                .action(),
            Action::AddTopic {
                label: "Cold food".to_string(),
                category: Category::Issue,
                app: Some("zomato".to_string()),
            }
        );
        assert!(parse(&["--list-topics"]).validate().is_ok());
    }

    #[test]
    fn test_add_topic_requires_category() {
        assert!(Args::try_parse_from(["reviewtrend", "--add-topic", "Cold food"]).is_err());
        assert!(
            Args::try_parse_from(["reviewtrend", "--add-topic", "x", "--topic-category", "bug"])
                .is_err()
        );
    }

    #[test]
    fn test_validation_conflicting_options() {
        assert!(parse(&["--app", "swiggy", "--verbose", "--quiet"]).validate().is_err());
        assert!(parse(&["--list-reports", "--list-topics"]).validate().is_err());
        assert!(parse(&["--app", "swiggy", "--daily-count", "0"]).validate().is_err());
        assert!(parse(&["--app", "swiggy", "--ollama-url", "localhost:11434"])
            .validate()
            .is_err());
    }

    #[test]
    fn test_category_filter_parsing() {
        assert_eq!(
            parse(&["--app", "swiggy", "--category", "Requests"]).category,
            Some(Category::Request)
        );
    }

    #[test]
    fn test_log_level() {
        let mut args = parse(&["--app", "swiggy"]);
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }
}
