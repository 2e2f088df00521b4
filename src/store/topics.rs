//! User-defined topics kept in a single JSON file.

use super::{write_atomic, CustomTopicStore};
use crate::error::StoreError;
use crate::models::{Category, SeedTopic};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

/// A topic added by the user to extend the seed vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomTopic {
    pub id: String,
    pub label: String,
    pub category: Category,
    /// `None` applies the topic to every app.
    #[serde(default)]
    pub app_id: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

fn default_active() -> bool {
    true
}

impl CustomTopic {
    fn applies_to(&self, app: Option<&str>) -> bool {
        match (app, self.app_id.as_deref()) {
            (None, _) | (_, None) => true,
            (Some(app), Some(own)) => own.eq_ignore_ascii_case(app),
        }
    }
}

/// File-backed custom topic store.
///
/// Mutations are read-modify-write under a lock so concurrent commands in
/// one process never lose an update.
#[derive(Debug)]
pub struct JsonCustomTopicStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonCustomTopicStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    async fn load(&self) -> Result<Vec<CustomTopic>, StoreError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io(e, format!("reading {}", self.path.display()))),
        };
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&content)
            .map_err(|e| StoreError::json(e, format!("parsing {}", self.path.display())))
    }

    async fn persist(&self, topics: &[CustomTopic]) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(topics)
            .map_err(|e| StoreError::json(e, "serializing custom topics"))?;
        write_atomic(&self.path, &json).await
    }

    /// Every stored topic, newest first.
    pub async fn list_all(&self) -> Result<Vec<CustomTopic>, StoreError> {
        let mut topics = self.load().await?;
        topics.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(topics)
    }

    pub async fn add(
        &self,
        label: &str,
        category: Category,
        app: Option<&str>,
    ) -> Result<CustomTopic, StoreError> {
        let label = label.trim();
        if label.is_empty() {
            return Err(StoreError::Invalid("topic label is empty".to_string()));
        }

        let _guard = self.lock.lock().await;
        let mut topics = self.load().await?;

        let topic = CustomTopic {
            id: Uuid::new_v4().to_string(),
            label: label.to_string(),
            category,
            app_id: app.map(|a| a.trim().to_lowercase()).filter(|a| !a.is_empty()),
            is_active: true,
            created_at: Utc::now(),
        };
        topics.push(topic.clone());
        self.persist(&topics).await?;

        info!("Added custom topic '{}' ({})", topic.label, topic.category);
        Ok(topic)
    }

    pub async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut topics = self.load().await?;

        let before = topics.len();
        topics.retain(|t| t.id != id.trim());
        if topics.len() == before {
            return Err(StoreError::NotFound(format!("custom topic {}", id)));
        }
        self.persist(&topics).await
    }

    /// Returns the updated topic.
    pub async fn set_active(&self, id: &str, active: bool) -> Result<CustomTopic, StoreError> {
        let _guard = self.lock.lock().await;
        let mut topics = self.load().await?;

        let topic = topics
            .iter_mut()
            .find(|t| t.id == id.trim())
            .ok_or_else(|| StoreError::NotFound(format!("custom topic {}", id)))?;
        topic.is_active = active;
        let updated = topic.clone();

        self.persist(&topics).await?;
        Ok(updated)
    }

    /// Flip the active flag of a topic.
    pub async fn toggle(&self, id: &str) -> Result<CustomTopic, StoreError> {
        let current = self
            .load()
            .await?
            .into_iter()
            .find(|t| t.id == id.trim())
            .ok_or_else(|| StoreError::NotFound(format!("custom topic {}", id)))?;
        self.set_active(id, !current.is_active).await
    }
}

#[async_trait]
impl CustomTopicStore for JsonCustomTopicStore {
    async fn list_active(&self, app: Option<&str>) -> Result<Vec<SeedTopic>, StoreError> {
        Ok(self
            .list_all()
            .await?
            .into_iter()
            .filter(|t| t.is_active && t.applies_to(app))
            .map(|t| SeedTopic::new(t.label, t.category))
            .collect())
    }
}
