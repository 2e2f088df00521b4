//! Clients for the external services: the LLM classifier and
//! deduplicator (via Ollama) and the live review scraper.

pub mod classifier;
pub mod dedup;
pub mod ollama;
pub mod scraper;

pub use classifier::{ClassificationRequest, IndexedReview, LlmTopicClassifier, TopicClassifier};
pub use dedup::{LlmTopicDeduplicator, TopicDeduplicator};
pub use ollama::{OllamaClient, OllamaConfig};
pub use scraper::HttpReviewScraper;
