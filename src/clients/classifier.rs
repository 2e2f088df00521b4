//! Topic classification of one day's review batch.

use super::ollama::{extract_json, OllamaClient};
use crate::error::ServiceError;
use crate::models::{Category, SeedTopic};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

/// A review as presented to the classifier, with its 1-based batch index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexedReview {
    pub index: usize,
    pub text: String,
}

/// One classifier call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationRequest {
    pub reviews: Vec<IndexedReview>,
    pub seed_topics: Vec<SeedTopic>,
    /// Labels already discovered earlier in the run.
    pub existing_topics: Vec<String>,
}

/// One topic returned for a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicMatch {
    pub label: String,
    pub category: Category,
    /// 1-based indices into the batch.
    pub matched_reviews: Vec<usize>,
    pub is_new_topic: bool,
}

#[async_trait]
pub trait TopicClassifier: Send + Sync {
    async fn classify(&self, request: &ClassificationRequest) -> Result<Vec<TopicMatch>, ServiceError>;
}

#[derive(Debug, Deserialize)]
struct RawClassification {
    topics: Vec<RawTopic>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTopic {
    topic: String,
    category: String,
    #[serde(default)]
    matched_reviews: Vec<Value>,
    #[serde(default)]
    is_new_topic: bool,
}

/// Parse the classifier's JSON reply.
///
/// A reply that is not the expected object is malformed as a whole;
/// individual topics with a blank label or unknown category are dropped.
pub fn parse_classification(content: &str) -> Result<Vec<TopicMatch>, ServiceError> {
    let raw: RawClassification = serde_json::from_str(extract_json(content))
        .map_err(|e| ServiceError::MalformedResponse(format!("classification JSON: {}", e)))?;

    let mut topics = Vec::with_capacity(raw.topics.len());
    for topic in raw.topics {
        let label = topic.topic.trim();
        if label.is_empty() {
            warn!("Dropping topic with blank label");
            continue;
        }
        let category = match topic.category.parse::<Category>() {
            Ok(c) => c,
            Err(e) => {
                warn!(topic = %label, "Dropping topic: {}", e);
                continue;
            }
        };

        topics.push(TopicMatch {
            label: label.to_string(),
            category,
            matched_reviews: topic.matched_reviews.iter().filter_map(index_of).collect(),
            is_new_topic: topic.is_new_topic,
        });
    }

    Ok(topics)
}

/// Indices arrive as numbers, occasionally as numeric strings.
fn index_of(value: &Value) -> Option<usize> {
    match value {
        Value::Number(n) => n.as_u64().map(|n| n as usize),
        Value::String(s) => s.trim().trim_start_matches('[').trim_end_matches(']').parse().ok(),
        _ => None,
    }
}

/// Build the classification prompt.
pub fn build_classification_prompt(request: &ClassificationRequest) -> String {
    let mut prompt = String::new();

    prompt.push_str("Analyze the following app reviews and extract topics.\n\n");

    prompt.push_str("SEED TOPICS (examples of the expected format and style):\n");
    for seed in &request.seed_topics {
        prompt.push_str(&format!("- {} ({})\n", seed.label, seed.category));
    }

    prompt.push_str("\nEXISTING TOPICS (match to these first before creating new ones):\n");
    if request.existing_topics.is_empty() {
        prompt.push_str("None yet\n");
    } else {
        for topic in &request.existing_topics {
            prompt.push_str(&format!("- {}\n", topic));
        }
    }

    prompt.push_str("\nREVIEWS TO ANALYZE:\n");
    for review in &request.reviews {
        prompt.push_str(&format!("[{}] \"{}\"\n", review.index, review.text.replace('\n', " ")));
    }

    prompt.push_str(
        r#"
INSTRUCTIONS:
1. Identify the main topic of each review.
2. Topics are SHORT (2-5 words) phrases like "Delivery delayed", "Food quality poor", "App crashing".
3. If a review matches a seed or existing topic semantically, use that EXACT topic name.
4. Only create a new topic when the review discusses something genuinely different.
5. Categorize each topic as "issue" (complaint), "request" (feature request) or "feedback" (praise or neutral).

Return a JSON object with this exact structure:
{"topics": [{"topic": "Topic name", "category": "issue", "matchedReviews": [1, 3, 7], "isNewTopic": false}]}

matchedReviews holds the 1-based review numbers matching the topic.
Set isNewTopic to true only for topics that are in neither the seed nor the existing topics."#,
    );

    prompt
}

/// System prompt for classification.
const CLASSIFIER_SYSTEM_PROMPT: &str = "You are a precise topic extraction agent for app reviews. \
Always return valid JSON only, no explanations or markdown. \
Consolidate semantically similar reviews under one topic.";

/// Classifier backed by an Ollama model.
pub struct LlmTopicClassifier {
    client: OllamaClient,
    temperature: f32,
}

impl LlmTopicClassifier {
    pub fn new(client: OllamaClient, temperature: f32) -> Self {
        Self {
            client,
            temperature,
        }
    }
}

#[async_trait]
impl TopicClassifier for LlmTopicClassifier {
    async fn classify(&self, request: &ClassificationRequest) -> Result<Vec<TopicMatch>, ServiceError> {
        debug!(
            "Classifying {} reviews with {} ({} seed, {} existing topics)",
            request.reviews.len(),
            self.client.model_name(),
            request.seed_topics.len(),
            request.existing_topics.len()
        );

        let prompt = build_classification_prompt(request);
        let reply = self
            .client
            .complete(CLASSIFIER_SYSTEM_PROMPT, &prompt, self.temperature)
            .await?;

        let topics = parse_classification(&reply)?;
        debug!("Extracted {} topics", topics.len());
        Ok(topics)
    }
}
