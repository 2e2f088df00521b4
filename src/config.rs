//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.reviewtrend.toml` files.

use crate::cli::{Args, OutputFormat};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration file name, looked up in the current directory.
pub const CONFIG_FILE: &str = ".reviewtrend.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Model settings.
    #[serde(default)]
    pub model: ModelConfig,

    /// Review source settings.
    #[serde(default)]
    pub source: SourceConfig,

    /// Pipeline pacing.
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Where reports and custom topics are kept.
    #[serde(default)]
    pub storage: StorageConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default output file path.
    #[serde(default = "default_output")]
    pub output: String,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,

    /// Default output format.
    #[serde(default)]
    pub format: OutputFormat,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            verbose: false,
            format: OutputFormat::default(),
        }
    }
}

fn default_output() -> String {
    "review_trends.md".to_string()
}

/// LLM model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model name.
    #[serde(default = "default_model")]
    pub name: String,

    /// Ollama API URL.
    #[serde(default = "default_ollama_url")]
    pub ollama_url: String,

    /// Temperature for topic classification.
    #[serde(default = "default_classifier_temperature")]
    pub classifier_temperature: f32,

    /// Temperature for topic deduplication.
    #[serde(default = "default_dedup_temperature")]
    pub dedup_temperature: f32,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: default_model(),
            ollama_url: default_ollama_url(),
            classifier_temperature: default_classifier_temperature(),
            dedup_temperature: default_dedup_temperature(),
            timeout_seconds: default_timeout(),
        }
    }
}

fn default_model() -> String {
    "llama3.2:latest".to_string()
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_classifier_temperature() -> f32 {
    0.3
}

fn default_dedup_temperature() -> f32 {
    0.2
}

fn default_timeout() -> u64 {
    120
}

/// Review source settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Scrape service endpoint for live reviews.
    #[serde(default)]
    pub scraper_url: Option<String>,

    /// Scrape request timeout in seconds.
    #[serde(default = "default_scraper_timeout")]
    pub scraper_timeout_seconds: u64,

    /// Synthetic reviews per day before variance.
    #[serde(default = "default_daily_count")]
    pub daily_count: usize,

    /// Day-to-day variance of the synthetic count.
    #[serde(default = "default_variance")]
    pub variance: usize,

    /// Minimum synthetic reviews per day.
    #[serde(default = "default_floor")]
    pub floor: usize,

    /// Seed for reproducible synthetic data.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            scraper_url: None,
            scraper_timeout_seconds: default_scraper_timeout(),
            daily_count: default_daily_count(),
            variance: default_variance(),
            floor: default_floor(),
            seed: None,
        }
    }
}

fn default_scraper_timeout() -> u64 {
    60
}

fn default_daily_count() -> usize {
    50
}

fn default_variance() -> usize {
    15
}

fn default_floor() -> usize {
    20
}

/// Cooperative pauses, in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Pause between synthetic generation days.
    #[serde(default = "default_generation_pause")]
    pub generation_pause_ms: u64,

    /// Pause between classifier calls.
    #[serde(default = "default_classify_pause")]
    pub classify_pause_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            generation_pause_ms: default_generation_pause(),
            classify_pause_ms: default_classify_pause(),
        }
    }
}

impl PipelineConfig {
    pub fn generation_pause(&self) -> Duration {
        Duration::from_millis(self.generation_pause_ms)
    }

    pub fn classify_pause(&self) -> Duration {
        Duration::from_millis(self.classify_pause_ms)
    }
}

fn default_generation_pause() -> u64 {
    30
}

fn default_classify_pause() -> u64 {
    100
}

/// Storage locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding one JSON file per saved report.
    #[serde(default = "default_reports_dir")]
    pub reports_dir: PathBuf,

    /// JSON file of user-defined topics.
    #[serde(default = "default_custom_topics_file")]
    pub custom_topics_file: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            reports_dir: default_reports_dir(),
            custom_topics_file: default_custom_topics_file(),
        }
    }
}

fn default_reports_dir() -> PathBuf {
    PathBuf::from(".reviewtrend/reports")
}

fn default_custom_topics_file() -> PathBuf {
    PathBuf::from(".reviewtrend/custom_topics.json")
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// when they were given explicitly.
    pub fn merge_with_args(&mut self, args: &Args) {
        if let Some(ref model) = args.model {
            self.model.name = model.clone();
        }
        if let Some(ref url) = args.ollama_url {
            self.model.ollama_url = url.clone();
        }
        if let Some(timeout) = args.timeout {
            self.model.timeout_seconds = timeout;
        }

        if let Some(ref url) = args.scraper_url {
            self.source.scraper_url = Some(url.clone());
        }
        if let Some(count) = args.daily_count {
            self.source.daily_count = count;
        }
        if let Some(seed) = args.seed {
            self.source.seed = Some(seed);
        }

        if let Some(ref output) = args.output {
            self.general.output = output.display().to_string();
        }
        if let Some(format) = args.format {
            self.general.format = format;
        }
        if let Some(ref dir) = args.reports_dir {
            self.storage.reports_dir = dir.clone();
        }

        if args.no_pause {
            self.pipeline.generation_pause_ms = 0;
            self.pipeline.classify_pause_ms = 0;
        }

        // Flags always override
        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
