//! Persistence collaborators: saved reports and user-defined topics.
//!
//! The pipeline only needs [`ReportStore::save`] and
//! [`CustomTopicStore::list_active`]; the rest serves the history and
//! topic management commands of the CLI.

pub mod reports;
pub mod topics;

use crate::error::StoreError;
use crate::models::{AnalysisReport, ReportListing, SeedTopic};
use async_trait::async_trait;
use std::path::Path;

pub use reports::JsonReportStore;
pub use topics::{CustomTopic, JsonCustomTopicStore};

/// Maximum number of entries returned by [`ReportStore::list`].
pub const LIST_LIMIT: usize = 20;

#[async_trait]
pub trait ReportStore: Send + Sync {
    /// Persist a report and return its id.
    async fn save(&self, report: &AnalysisReport) -> Result<String, StoreError>;

    /// Stored reports, newest first, at most [`LIST_LIMIT`].
    async fn list(&self) -> Result<Vec<ReportListing>, StoreError>;

    async fn load_full(&self, id: &str) -> Result<AnalysisReport, StoreError>;

    async fn delete(&self, id: &str) -> Result<(), StoreError>;
}

#[async_trait]
pub trait CustomTopicStore: Send + Sync {
    /// Active topics for `app` plus unscoped ones, newest first.
    /// Without an app every active topic is returned.
    async fn list_active(&self, app: Option<&str>) -> Result<Vec<SeedTopic>, StoreError>;
}

/// Write `contents` to `path` through a sibling temp file and a rename.
pub(crate) async fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::io(e, format!("creating {}", parent.display())))?;
        }
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = std::path::PathBuf::from(tmp);

    tokio::fs::write(&tmp, contents)
        .await
        .map_err(|e| StoreError::io(e, format!("writing {}", tmp.display())))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| StoreError::io(e, format!("renaming into {}", path.display())))?;

    Ok(())
}

/// Reject ids that could escape the store directory.
pub(crate) fn check_id(id: &str) -> Result<&str, StoreError> {
    let id = id.trim();
    if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(StoreError::Invalid(format!("bad id: {:?}", id)));
    }
    Ok(id)
}
