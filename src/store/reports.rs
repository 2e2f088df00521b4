//! Report store backed by one JSON file per report.

use super::{check_id, write_atomic, ReportStore, LIST_LIMIT};
use crate::error::StoreError;
use crate::models::{AnalysisReport, ReportListing};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Stores each report as `<dir>/<id>.json`.
#[derive(Debug, Clone)]
pub struct JsonReportStore {
    dir: PathBuf,
}

impl JsonReportStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, id: &str) -> Result<PathBuf, StoreError> {
        Ok(self.dir.join(format!("{}.json", check_id(id)?)))
    }

    async fn read_report(path: &Path) -> Result<AnalysisReport, StoreError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| StoreError::io(e, format!("reading {}", path.display())))?;
        serde_json::from_str(&content)
            .map_err(|e| StoreError::json(e, format!("parsing {}", path.display())))
    }
}

#[async_trait]
impl ReportStore for JsonReportStore {
    async fn save(&self, report: &AnalysisReport) -> Result<String, StoreError> {
        let path = self.path_for(&report.id)?;
        let json = serde_json::to_vec_pretty(report)
            .map_err(|e| StoreError::json(e, "serializing report"))?;

        write_atomic(&path, &json).await?;
        debug!("Saved report {} to {}", report.id, path.display());
        Ok(report.id.clone())
    }

    async fn list(&self) -> Result<Vec<ReportListing>, StoreError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io(e, format!("listing {}", self.dir.display()))),
        };

        let mut listings = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StoreError::io(e, format!("listing {}", self.dir.display())))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match Self::read_report(&path).await {
                Ok(report) => listings.push(ReportListing::from(&report)),
                Err(e) => warn!("Skipping unreadable report file: {}", e),
            }
        }

        listings.sort_by(|a, b| b.generated_at.cmp(&a.generated_at).then_with(|| a.id.cmp(&b.id)));
        listings.truncate(LIST_LIMIT);
        Ok(listings)
    }

    async fn load_full(&self, id: &str) -> Result<AnalysisReport, StoreError> {
        let path = self.path_for(id)?;
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Err(StoreError::NotFound(format!("report {}", id)));
        }
        Self::read_report(&path).await
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let path = self.path_for(id)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(format!("report {}", id)))
            }
            Err(e) => Err(StoreError::io(e, format!("deleting {}", path.display()))),
        }
    }
}
