//! Caller-owned session: current status and the last report.

use super::runner::{AnalysisRequest, Pipeline, RunOutcome};
use super::status::{PipelineStatus, StatusTracker};
use crate::error::PipelineError;
use crate::models::AnalysisReport;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Holds what a front-end shows between runs.
pub struct AnalysisSession {
    pipeline: Pipeline,
    status: StatusTracker,
    report: watch::Sender<Option<Arc<AnalysisReport>>>,
}

impl AnalysisSession {
    pub fn new(pipeline: Pipeline) -> Self {
        let (report, _rx) = watch::channel(None);
        Self {
            pipeline,
            status: StatusTracker::new(),
            report,
        }
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    #[allow(dead_code)] // Polling accessor; the CLI follows the status through subscribe
    pub fn status(&self) -> PipelineStatus {
        self.status.current()
    }

    pub fn subscribe(&self) -> watch::Receiver<PipelineStatus> {
        self.status.subscribe()
    }

    #[allow(dead_code)] // The CLI renders the outcome of analyze directly
    pub fn last_report(&self) -> Option<Arc<AnalysisReport>> {
        self.report.borrow().clone()
    }

    /// Run one analysis; a run that starts clears the previous report.
    pub async fn analyze(
        &self,
        request: &AnalysisRequest,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome, PipelineError> {
        self.pipeline.validate(request)?;
        if self.status.current().phase.is_active() {
            return Err(PipelineError::AlreadyRunning);
        }
        self.report.send_replace(None);

        let result = self.pipeline.run(request, &self.status, cancel).await;

        match &result {
            Ok(outcome) => {
                self.report.send_replace(Some(Arc::new(outcome.report.clone())));
            }
            Err(PipelineError::InvalidInput(_)) | Err(PipelineError::AlreadyRunning) => {}
            Err(_) => {
                self.report.send_replace(None);
            }
        }

        result
    }

    /// Back to idle with no report.
    #[allow(dead_code)] // Each CLI invocation starts from a fresh session
    pub fn reset(&self) -> Result<(), PipelineError> {
        self.status.reset()?;
        self.report.send_replace(None);
        Ok(())
    }

    /// Show a stored report as the current result.
    pub fn load_from_history(&self, report: AnalysisReport) -> Result<Arc<AnalysisReport>, PipelineError> {
        self.status.loaded("Report loaded from history")?;
        let report = Arc::new(report);
        self.report.send_replace(Some(report.clone()));
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::runner::tests::{
        delivery_classifier, pipeline_with, request, synthetic, FixedTopics, MemoryReports,
        ScriptedDedup,
    };
    use crate::pipeline::runner::{Collaborators, PipelineSettings};
    use crate::pipeline::status::Phase;
    use std::time::Duration;

    fn session() -> (AnalysisSession, Arc<MemoryReports>) {
        let reports = Arc::new(MemoryReports::default());
        let pipeline = pipeline_with(
            synthetic(4),
            Arc::new(delivery_classifier()),
            Arc::new(ScriptedDedup::none()),
            reports.clone(),
        );
        (AnalysisSession::new(pipeline), reports)
    }

    #[tokio::test]
    async fn test_analyze_keeps_last_report() {
        let (session, _reports) = session();
        assert!(session.last_report().is_none());

        let outcome = session.analyze(&request(), &CancellationToken::new()).await.unwrap();
        let last = session.last_report().unwrap();
        assert_eq!(last.id, outcome.report.id);
        assert_eq!(session.status().phase, Phase::Complete);
    }

    #[tokio::test]
    async fn test_reset_clears_everything() {
        let (session, _reports) = session();
        session.analyze(&request(), &CancellationToken::new()).await.unwrap();

        session.reset().unwrap();
        assert!(session.last_report().is_none());
        assert_eq!(session.status(), PipelineStatus::idle());
    }

    #[tokio::test]
    async fn test_starting_run_clears_previous_report() {
        let pipeline = Pipeline::new(
            Collaborators {
                live_source: None,
                synthetic_source: synthetic(4),
                classifier: Arc::new(delivery_classifier()),
                deduplicator: Arc::new(ScriptedDedup::none()),
                reports: Arc::new(MemoryReports::default()),
                custom_topics: Arc::new(FixedTopics::default()),
            },
            PipelineSettings {
                classify_pause: Duration::from_millis(1),
            },
        );
        let session = AnalysisSession::new(pipeline);
        session.analyze(&request(), &CancellationToken::new()).await.unwrap();
        assert!(session.last_report().is_some());

        let cancel = CancellationToken::new();
        let observe = async {
            let mut rx = session.subscribe();
            rx.wait_for(|s| s.phase == Phase::Analyzing).await.unwrap();
            session.last_report()
        };
        let req = request();
        let (outcome, during) = tokio::join!(session.analyze(&req, &cancel), observe);

        assert!(during.is_none());
        assert_eq!(session.last_report().unwrap().id, outcome.unwrap().report.id);
    }

    #[tokio::test]
    async fn test_cancelled_run_drops_report() {
        let (session, _reports) = session();
        session.analyze(&request(), &CancellationToken::new()).await.unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = session.analyze(&request(), &cancel).await.unwrap_err();

        assert!(matches!(err, PipelineError::Cancelled));
        assert!(session.last_report().is_none());
        assert_eq!(session.status().phase, Phase::Cancelled);
    }

    #[tokio::test]
    async fn test_invalid_request_keeps_previous_report() {
        let (session, _reports) = session();
        session.analyze(&request(), &CancellationToken::new()).await.unwrap();

        let mut bad = request();
        bad.app = "nowhere".to_string();
        assert!(session.analyze(&bad, &CancellationToken::new()).await.is_err());
        assert!(session.last_report().is_some());
        assert_eq!(session.status().phase, Phase::Complete);
    }

    #[tokio::test]
    async fn test_load_from_history() {
        let (session, reports) = session();
        let outcome = session.analyze(&request(), &CancellationToken::new()).await.unwrap();
        session.reset().unwrap();

        let id = outcome.saved_id.unwrap();
        let stored = session.pipeline().reports().load_full(&id).await.unwrap();
        session.load_from_history(stored).unwrap();

        let status = session.status();
        assert_eq!(status.phase, Phase::Complete);
        assert_eq!(status.message, "Report loaded from history");
        assert_eq!(status.progress, 100);
        assert_eq!(session.last_report().unwrap().id, id);
        assert_eq!(reports.saved.lock().unwrap().len(), 1);
    }
}
