//! Global topic deduplication.

use super::ollama::{extract_json, OllamaClient};
use crate::error::ServiceError;
use crate::models::MergeGroup;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

#[async_trait]
pub trait TopicDeduplicator: Send + Sync {
    /// Group semantically equivalent labels under a canonical label.
    async fn deduplicate(&self, labels: &[String]) -> Result<Vec<MergeGroup>, ServiceError>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDedup {
    merged_topics: Vec<MergeGroup>,
}

/// Parse the deduplicator's JSON reply.
pub fn parse_merge_groups(content: &str) -> Result<Vec<MergeGroup>, ServiceError> {
    let raw: RawDedup = serde_json::from_str(extract_json(content))
        .map_err(|e| ServiceError::MalformedResponse(format!("dedup JSON: {}", e)))?;

    Ok(raw
        .merged_topics
        .into_iter()
        .filter(|g| !g.canonical.trim().is_empty())
        .collect())
}

pub fn build_dedup_prompt(labels: &[String]) -> String {
    let mut prompt = String::new();

    prompt.push_str("Identify topics that are semantically equivalent and should be merged.\n\n");
    prompt.push_str("TOPICS TO ANALYZE:\n");
    for (i, label) in labels.iter().enumerate() {
        prompt.push_str(&format!("{}. {}\n", i + 1, label));
    }

    prompt.push_str(
        r#"
INSTRUCTIONS:
1. Group topics that refer to the SAME underlying issue, request or feedback.
2. Similar phrasings should be merged, e.g. "Delivery guy was rude" = "Delivery partner rude" = "Delivery person impolite".
3. Choose the clearest, most concise name of each group as canonical. The canonical name MUST be one of the topics above.
4. Topics without duplicates are still listed, with an empty variants array.

Return a JSON object with this exact structure:
{"mergedTopics": [{"canonical": "Delivery partner rude", "variants": ["Delivery guy was rude"]}, {"canonical": "App crashing", "variants": []}]}"#,
    );

    prompt
}

const DEDUP_SYSTEM_PROMPT: &str = "You are a semantic similarity expert. \
Always return valid JSON only. Be aggressive in merging similar topics.";

/// Deduplicator backed by an Ollama model.
pub struct LlmTopicDeduplicator {
    client: OllamaClient,
    temperature: f32,
}

impl LlmTopicDeduplicator {
    pub fn new(client: OllamaClient, temperature: f32) -> Self {
        Self {
            client,
            temperature,
        }
    }
}

#[async_trait]
impl TopicDeduplicator for LlmTopicDeduplicator {
    async fn deduplicate(&self, labels: &[String]) -> Result<Vec<MergeGroup>, ServiceError> {
        if labels.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Deduplicating {} topics", labels.len());
        let prompt = build_dedup_prompt(labels);
        let reply = self
            .client
            .complete(DEDUP_SYSTEM_PROMPT, &prompt, self.temperature)
            .await?;

        let groups = parse_merge_groups(&reply)?;
        debug!(
            "Deduplicator proposed {} merge groups",
            groups.iter().filter(|g| !g.variants.is_empty()).count()
        );
        Ok(groups)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_merge_groups() {
        let content = r#"{"mergedTopics": [
            {"canonical": "Delivery partner rude", "variants": ["Delivery guy was rude"]},
            {"canonical": "App crashing"},
            {"canonical": " ", "variants": ["Orphan"]}
        ]}"#;

        let groups = parse_merge_groups(content).unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].variants, vec!["Delivery guy was rude".to_string()]);
        assert!(groups[1].variants.is_empty());
    }

    #[test]
    fn test_parse_merge_groups_malformed() {
        assert!(matches!(
            parse_merge_groups("[]"),
            Err(ServiceError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_dedup_prompt_numbers_topics() {
        let prompt = build_dedup_prompt(&["App crashing".to_string(), "App crashes".to_string()]);
        assert!(prompt.contains("1. App crashing"));
        assert!(prompt.contains("2. App crashes"));
    }
}
