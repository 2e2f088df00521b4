//! One analysis run: fetch, classify per day, deduplicate, assemble.
//!
//! The pipeline itself is stateless between runs. Status goes to the
//! [`StatusTracker`] passed in; the working aggregate lives only for the
//! duration of [`Pipeline::run`].

use super::status::{Phase, StatusTracker};
use crate::analysis::{assemble_report, merge_seed_topics, DateWindow, ReportContext, TopicTable};
use crate::clients::{ClassificationRequest, IndexedReview, TopicClassifier, TopicDeduplicator};
use crate::error::PipelineError;
use crate::models::{builtin_seed_topics, find_app, AnalysisReport, AppInfo, Review, SeedTopic};
use crate::source::{fetch_with_fallback, DataOrigin, ReviewQuery, ReviewSource};
use crate::store::{CustomTopicStore, ReportStore};
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// What to analyze.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisRequest {
    pub app: String,
    pub target_date: NaiveDate,
    /// Try the live source before the synthetic one.
    pub live: bool,
}

/// The external collaborators of a run.
#[derive(Clone)]
pub struct Collaborators {
    /// `None` when no live source exists; live requests then fall back.
    pub live_source: Option<Arc<dyn ReviewSource>>,
    pub synthetic_source: Arc<dyn ReviewSource>,
    pub classifier: Arc<dyn TopicClassifier>,
    pub deduplicator: Arc<dyn TopicDeduplicator>,
    pub reports: Arc<dyn ReportStore>,
    pub custom_topics: Arc<dyn CustomTopicStore>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSettings {
    /// Cooperative pause between classifier calls.
    pub classify_pause: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            classify_pause: Duration::from_millis(100),
        }
    }
}

/// A degraded path taken during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    LiveData { reviews: usize },
    FallbackToSynthetic { reason: String },
    ReviewsDiscarded { count: usize },
    CustomTopicsUnavailable { reason: String },
    DaysSkipped { days: Vec<NaiveDate> },
    DedupSkipped { reason: String },
    MergeGroupsSkipped { count: usize },
    NotSaved { reason: String },
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::LiveData { reviews } => write!(f, "Fetched {} live reviews", reviews),
            Notice::FallbackToSynthetic { reason } => {
                write!(f, "Live data unavailable ({}), falling back to simulated data", reason)
            }
            Notice::ReviewsDiscarded { count } => {
                write!(f, "Discarded {} reviews outside the window or malformed", count)
            }
            Notice::CustomTopicsUnavailable { reason } => {
                write!(f, "Custom topics could not be loaded ({}), using built-in topics only", reason)
            }
            Notice::DaysSkipped { days } => {
                write!(f, "Skipped {} days due to classifier errors", days.len())
            }
            Notice::DedupSkipped { reason } => {
                write!(f, "Topic deduplication skipped ({}), topics kept as-is", reason)
            }
            Notice::MergeGroupsSkipped { count } => {
                write!(f, "Ignored {} merge groups naming an unknown canonical topic", count)
            }
            Notice::NotSaved { reason } => write!(f, "Report not saved: {}", reason),
        }
    }
}

/// Result of a successful run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub report: AnalysisReport,
    /// Set when the report store accepted the report.
    pub saved_id: Option<String>,
    pub origin: DataOrigin,
    pub notices: Vec<Notice>,
}

/// Counters of the classification phase.
#[derive(Debug, Default)]
struct Classified {
    table: TopicTable,
    new_topics: usize,
    failed_days: Vec<NaiveDate>,
}

pub struct Pipeline {
    collaborators: Collaborators,
    settings: PipelineSettings,
}

impl Pipeline {
    pub fn new(collaborators: Collaborators, settings: PipelineSettings) -> Self {
        Self {
            collaborators,
            settings,
        }
    }

    pub fn reports(&self) -> &Arc<dyn ReportStore> {
        &self.collaborators.reports
    }

    /// Resolve the app and plan the window without touching any state.
    pub fn validate(
        &self,
        request: &AnalysisRequest,
    ) -> Result<(&'static AppInfo, DateWindow), PipelineError> {
        let app = find_app(&request.app).ok_or_else(|| {
            if request.app.trim().is_empty() {
                PipelineError::InvalidInput("no app selected".to_string())
            } else {
                PipelineError::InvalidInput(format!("unsupported app '{}'", request.app))
            }
        })?;
        let window = DateWindow::ending_at(request.target_date)?;
        Ok((app, window))
    }

    /// Run one analysis.
    ///
    /// Input is validated before the status leaves its current state. Once
    /// running, every collaborator failure has a degraded path; only a
    /// failing synthetic source ends the run in `error`, and cancellation
    /// ends it in `cancelled`.
    pub async fn run(
        &self,
        request: &AnalysisRequest,
        status: &StatusTracker,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome, PipelineError> {
        let (app, window) = self.validate(request)?;

        status.begin(format!("Starting analysis for {}...", app.name))?;
        info!(
            "Analyzing {} for {} to {}",
            app.name,
            window.start(),
            window.target()
        );

        match self.execute(app, &window, request.live, status, cancel).await {
            Ok(outcome) => {
                status.update(Phase::Complete, "Analysis complete!", 100, None);
                info!(
                    "Analyzed {} reviews and identified {} topics",
                    outcome.report.total_reviews_analyzed,
                    outcome.report.topics.len()
                );
                Ok(outcome)
            }
            Err(PipelineError::Cancelled) => {
                warn!("Analysis cancelled");
                status.fail(Phase::Cancelled, "Analysis cancelled");
                Err(PipelineError::Cancelled)
            }
            Err(e) => {
                warn!("Analysis failed: {}", e);
                status.fail(Phase::Error, e.to_string());
                Err(e)
            }
        }
    }

    async fn execute(
        &self,
        app: &AppInfo,
        window: &DateWindow,
        live: bool,
        status: &StatusTracker,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome, PipelineError> {
        let mut notices = Vec::new();

        let seed_topics = self.seed_topics(app, &mut notices).await;
        ensure_running(cancel)?;

        let (reviews, origin) = self
            .fetch_reviews(app, window, live, status, &mut notices)
            .await?;
        ensure_running(cancel)?;

        let mut classified = self
            .classify_days(window, &reviews, &seed_topics, status, cancel)
            .await?;
        if !classified.failed_days.is_empty() {
            notices.push(Notice::DaysSkipped {
                days: classified.failed_days.clone(),
            });
        }
        ensure_running(cancel)?;

        status.update(Phase::Deduplicating, "Deduplicating similar topics...", 75, None);
        self.deduplicate(&mut classified.table, &mut notices, cancel).await?;
        ensure_running(cancel)?;

        status.update(Phase::Deduplicating, "Saving report...", 95, None);
        let mut report = assemble_report(
            classified.table.into_entries(),
            ReportContext {
                app: app.id,
                window,
                total_reviews: reviews.len(),
                new_topics: classified.new_topics,
            },
        );

        let saved_id = match self.collaborators.reports.save(&report).await {
            Ok(id) => {
                debug!("Report stored as {}", id);
                report.id = id.clone();
                Some(id)
            }
            Err(e) => {
                warn!("Failed to save report: {}", e);
                notices.push(Notice::NotSaved {
                    reason: e.to_string(),
                });
                None
            }
        };

        Ok(RunOutcome {
            report,
            saved_id,
            origin,
            notices,
        })
    }

    /// Built-in vocabulary plus the app's active custom topics.
    async fn seed_topics(&self, app: &AppInfo, notices: &mut Vec<Notice>) -> Vec<SeedTopic> {
        let custom = match self.collaborators.custom_topics.list_active(Some(app.id)).await {
            Ok(custom) => custom,
            Err(e) => {
                warn!("Failed to load custom topics: {}", e);
                notices.push(Notice::CustomTopicsUnavailable {
                    reason: e.to_string(),
                });
                Vec::new()
            }
        };

        let seeds = merge_seed_topics(builtin_seed_topics(), &custom);
        debug!("Seed vocabulary: {} topics ({} custom)", seeds.len(), custom.len());
        seeds
    }

    async fn fetch_reviews(
        &self,
        app: &AppInfo,
        window: &DateWindow,
        live: bool,
        status: &StatusTracker,
        notices: &mut Vec<Notice>,
    ) -> Result<(Vec<Review>, DataOrigin), PipelineError> {
        let query = ReviewQuery {
            app: app.id.to_string(),
            package: app.package.to_string(),
            start: window.start(),
            end: window.target(),
        };

        let live_source = if live {
            status.update(Phase::Fetching, "Scraping reviews from the store...", 10, None);
            self.collaborators.live_source.as_deref()
        } else {
            status.update(Phase::Fetching, "Generating simulated reviews...", 5, None);
            None
        };

        let progress = |day: NaiveDate, index: usize, total: usize| {
            let pct = 5 + (index * 25 / total.max(1)) as u8;
            status.update(
                Phase::Fetching,
                format!("Generating reviews for {}...", day.format("%b %-d, %Y")),
                pct,
                Some(day),
            );
        };

        let mut fetched = fetch_with_fallback(
            live_source,
            self.collaborators.synthetic_source.as_ref(),
            &query,
            &progress,
        )
        .await
        .map_err(|e| PipelineError::Fatal(format!("review source failed: {}", e)))?;

        if live && live_source.is_none() {
            fetched.origin = DataOrigin::SyntheticFallback("no live review source configured".to_string());
        }

        match &fetched.origin {
            DataOrigin::Live => notices.push(Notice::LiveData {
                reviews: fetched.reviews.len(),
            }),
            DataOrigin::SyntheticFallback(reason) => notices.push(Notice::FallbackToSynthetic {
                reason: reason.clone(),
            }),
            DataOrigin::Synthetic => {}
        }
        if fetched.discarded > 0 {
            notices.push(Notice::ReviewsDiscarded {
                count: fetched.discarded,
            });
        }

        info!("{} reviews ready for analysis", fetched.reviews.len());
        Ok((fetched.reviews, fetched.origin))
    }

    /// Classify each day in order. A failed day is skipped.
    async fn classify_days(
        &self,
        window: &DateWindow,
        reviews: &[Review],
        seed_topics: &[SeedTopic],
        status: &StatusTracker,
        cancel: &CancellationToken,
    ) -> Result<Classified, PipelineError> {
        status.update(Phase::Analyzing, "Analyzing reviews with AI agent...", 35, None);

        let mut by_day: BTreeMap<NaiveDate, Vec<&Review>> = BTreeMap::new();
        for review in reviews.iter().filter(|r| window.contains(&r.day)) {
            by_day.entry(review.day).or_default().push(review);
        }

        let mut classified = Classified::default();
        let mut existing_topics: Vec<String> = Vec::new();
        let total_days = by_day.len();

        for (i, (day, batch)) in by_day.iter().enumerate() {
            ensure_running(cancel)?;

            status.update(
                Phase::Analyzing,
                format!("Analyzing {} reviews for {}...", batch.len(), day),
                35 + (i * 35 / total_days.max(1)) as u8,
                Some(*day),
            );

            let request = ClassificationRequest {
                reviews: batch
                    .iter()
                    .enumerate()
                    .map(|(i, r)| IndexedReview {
                        index: i + 1,
                        text: r.text.clone(),
                    })
                    .collect(),
                seed_topics: seed_topics.to_vec(),
                existing_topics: existing_topics.clone(),
            };

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(PipelineError::Cancelled),
                result = self.collaborators.classifier.classify(&request) => result,
            };

            match result {
                Ok(matches) => {
                    for topic in matches {
                        let indices: BTreeSet<usize> = topic
                            .matched_reviews
                            .iter()
                            .copied()
                            .filter(|idx| (1..=batch.len()).contains(idx))
                            .collect();
                        if indices.len() < topic.matched_reviews.len() {
                            debug!(
                                day = %day,
                                topic = %topic.label,
                                "dropped {} invalid or repeated review indices",
                                topic.matched_reviews.len() - indices.len()
                            );
                        }

                        let created = classified.table.record(
                            &topic.label,
                            topic.category,
                            *day,
                            indices.len() as u32,
                        );
                        if created {
                            existing_topics.push(topic.label.trim().to_string());
                            if topic.is_new_topic {
                                classified.new_topics += 1;
                            }
                        }
                    }
                    debug!(day = %day, topics = classified.table.len(), "day classified");
                }
                Err(e) => {
                    warn!(day = %day, "Classification failed, skipping day: {}", e);
                    classified.failed_days.push(*day);
                }
            }

            if !self.settings.classify_pause.is_zero() && i + 1 < total_days {
                tokio::select! {
                    _ = cancel.cancelled() => return Err(PipelineError::Cancelled),
                    _ = tokio::time::sleep(self.settings.classify_pause) => {}
                }
            }
        }

        if total_days > 0 && classified.failed_days.len() == total_days {
            warn!("Classification failed for every day; the report will have no topics");
        } else if classified.table.is_empty() {
            info!("No topics were identified in this window");
        }

        Ok(classified)
    }

    /// Best-effort merge of variant labels.
    async fn deduplicate(
        &self,
        table: &mut TopicTable,
        notices: &mut Vec<Notice>,
        cancel: &CancellationToken,
    ) -> Result<(), PipelineError> {
        let labels = table.labels();
        if labels.len() < 2 {
            debug!("Fewer than two topics, nothing to deduplicate");
            return Ok(());
        }

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PipelineError::Cancelled),
            result = self.collaborators.deduplicator.deduplicate(&labels) => result,
        };

        match result {
            Ok(groups) => {
                let before = table.total_attributions();
                let stats = table.apply_merges(&groups);
                debug_assert_eq!(before, table.total_attributions());

                info!(
                    "Merged {} topic variants in {} groups",
                    stats.variants_merged, stats.groups_applied
                );
                if stats.groups_skipped > 0 {
                    notices.push(Notice::MergeGroupsSkipped {
                        count: stats.groups_skipped,
                    });
                }
            }
            Err(e) => {
                warn!("Deduplication failed, keeping topics as-is: {}", e);
                notices.push(Notice::DedupSkipped {
                    reason: e.to_string(),
                });
            }
        }
        Ok(())
    }
}

fn ensure_running(cancel: &CancellationToken) -> Result<(), PipelineError> {
    if cancel.is_cancelled() {
        Err(PipelineError::Cancelled)
    } else {
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::clients::classifier::TopicMatch;
    use crate::error::{ServiceError, SourceError, StoreError};
    use crate::models::{Category, MergeGroup, ReportListing, Trend};
    use crate::pipeline::status::PipelineStatus;
    use crate::source::templates::{SWIGGY, TIME_PLACEHOLDER};
    use crate::source::{DayProgress, SourceBatch, SyntheticSettings, SyntheticSource};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    type ClassifyFn =
        dyn Fn(usize, &ClassificationRequest) -> Result<Vec<TopicMatch>, ServiceError> + Send + Sync;
    type DedupFn = dyn Fn(&[String]) -> Result<Vec<MergeGroup>, ServiceError> + Send + Sync;

    /// Classifier answering through a closure of `(call index, request)`.
    pub(crate) struct ScriptedClassifier {
        respond: Box<ClassifyFn>,
        pub requests: Mutex<Vec<ClassificationRequest>>,
    }

    impl ScriptedClassifier {
        pub(crate) fn new(
            respond: impl Fn(usize, &ClassificationRequest) -> Result<Vec<TopicMatch>, ServiceError>
                + Send
                + Sync
                + 'static,
        ) -> Self {
            Self {
                respond: Box::new(respond),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl TopicClassifier for ScriptedClassifier {
        async fn classify(
            &self,
            request: &ClassificationRequest,
        ) -> Result<Vec<TopicMatch>, ServiceError> {
            let index = {
                let mut requests = self.requests.lock().unwrap();
                requests.push(request.clone());
                requests.len() - 1
            };
            (self.respond)(index, request)
        }
    }

    pub(crate) struct ScriptedDedup {
        respond: Box<DedupFn>,
        calls: AtomicUsize,
    }

    impl ScriptedDedup {
        pub(crate) fn new(
            respond: impl Fn(&[String]) -> Result<Vec<MergeGroup>, ServiceError> + Send + Sync + 'static,
        ) -> Self {
            Self {
                respond: Box::new(respond),
                calls: AtomicUsize::new(0),
            }
        }

        pub(crate) fn none() -> Self {
            Self::new(|_| Ok(Vec::new()))
        }
    }

    #[async_trait]
    impl TopicDeduplicator for ScriptedDedup {
        async fn deduplicate(&self, labels: &[String]) -> Result<Vec<MergeGroup>, ServiceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.respond)(labels)
        }
    }

    #[derive(Default)]
    pub(crate) struct MemoryReports {
        fail: bool,
        pub saved: Mutex<Vec<AnalysisReport>>,
    }

    #[async_trait]
    impl ReportStore for MemoryReports {
        async fn save(&self, report: &AnalysisReport) -> Result<String, StoreError> {
            if self.fail {
                return Err(StoreError::Invalid("store offline".to_string()));
            }
            self.saved.lock().unwrap().push(report.clone());
            Ok(report.id.clone())
        }

        async fn list(&self) -> Result<Vec<ReportListing>, StoreError> {
            Ok(self.saved.lock().unwrap().iter().map(ReportListing::from).collect())
        }

        async fn load_full(&self, id: &str) -> Result<AnalysisReport, StoreError> {
            self.saved
                .lock()
                .unwrap()
                .iter()
                .find(|r| r.id == id)
                .cloned()
                .ok_or_else(|| StoreError::NotFound(id.to_string()))
        }

        async fn delete(&self, _id: &str) -> Result<(), StoreError> {
            Ok(())
        }
    }

    #[derive(Default)]
    pub(crate) struct FixedTopics(pub Vec<SeedTopic>);

    #[async_trait]
    impl CustomTopicStore for FixedTopics {
        async fn list_active(&self, _app: Option<&str>) -> Result<Vec<SeedTopic>, StoreError> {
            Ok(self.0.clone())
        }
    }

    struct BrokenSource;

    #[async_trait]
    impl ReviewSource for BrokenSource {
        fn name(&self) -> &'static str {
            "broken"
        }

        async fn fetch(
            &self,
            _query: &ReviewQuery,
            _progress: DayProgress<'_>,
        ) -> Result<SourceBatch, SourceError> {
            Err(SourceError::Unavailable("disk on fire".to_string()))
        }
    }

    pub(crate) fn synthetic(daily_count: usize) -> Arc<dyn ReviewSource> {
        Arc::new(SyntheticSource::new(
            SyntheticSettings {
                daily_count,
                variance: 0,
                floor: 1,
                seed: Some(7),
            },
            Duration::ZERO,
        ))
    }

    pub(crate) fn pipeline_with(
        synthetic_source: Arc<dyn ReviewSource>,
        classifier: Arc<dyn TopicClassifier>,
        deduplicator: Arc<dyn TopicDeduplicator>,
        reports: Arc<dyn ReportStore>,
    ) -> Pipeline {
        Pipeline::new(
            Collaborators {
                live_source: None,
                synthetic_source,
                classifier,
                deduplicator,
                reports,
                custom_topics: Arc::new(FixedTopics::default()),
            },
            PipelineSettings {
                classify_pause: Duration::ZERO,
            },
        )
    }

    pub(crate) fn request() -> AnalysisRequest {
        AnalysisRequest {
            app: "swiggy".to_string(),
            target_date: NaiveDate::from_ymd_opt(2025, 1, 31).unwrap(),
            live: false,
        }
    }

    /// True when `text` was produced from one of the swiggy issue templates.
    fn is_issue_text(text: &str) -> bool {
        SWIGGY.issues.iter().any(|template| match template.split_once(TIME_PLACEHOLDER) {
            Some((prefix, suffix)) => {
                text.len() > prefix.len() + suffix.len()
                    && text.starts_with(prefix)
                    && text.ends_with(suffix)
            }
            None => text == *template,
        })
    }

    /// Labels every issue review "Delivery delayed".
    pub(crate) fn delivery_classifier() -> ScriptedClassifier {
        ScriptedClassifier::new(|_, req| {
            let matched: Vec<usize> = req
                .reviews
                .iter()
                .filter(|r| is_issue_text(&r.text))
                .map(|r| r.index)
                .collect();
            Ok(vec![TopicMatch {
                label: "Delivery delayed".to_string(),
                category: Category::Issue,
                matched_reviews: matched,
                is_new_topic: false,
            }])
        })
    }

    fn topic(label: &str, indices: Vec<usize>, is_new: bool) -> TopicMatch {
        TopicMatch {
            label: label.to_string(),
            category: Category::Issue,
            matched_reviews: indices,
            is_new_topic: is_new,
        }
    }

    #[tokio::test]
    async fn test_end_to_end_synthetic_run() {
        let classifier = Arc::new(delivery_classifier());
        let reports = Arc::new(MemoryReports::default());
        let pipeline = pipeline_with(
            synthetic(50),
            classifier.clone(),
            Arc::new(ScriptedDedup::none()),
            reports.clone(),
        );
        let status = StatusTracker::new();

        let outcome = pipeline
            .run(&request(), &status, &CancellationToken::new())
            .await
            .unwrap();
        let report = &outcome.report;

        assert_eq!(report.total_reviews_analyzed, 1550);
        assert_eq!(report.date_range.len(), 31);
        assert_eq!(report.date_range[0], NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
        assert_eq!(report.topics.len(), 1);

        let delivery = &report.topics[0];
        assert_eq!(delivery.topic, "Delivery delayed");
        assert_eq!(delivery.total_count, 775);
        assert_eq!(delivery.frequencies.len(), 31);
        assert!(delivery.frequencies.values().all(|&c| c == 25));
        assert_eq!(delivery.trend, Trend::Stable);
        assert_eq!(delivery.trend_percentage, 0);

        assert_eq!(classifier.calls(), 31);
        assert_eq!(outcome.origin, DataOrigin::Synthetic);
        assert_eq!(outcome.saved_id.as_deref(), Some(report.id.as_str()));
        assert_eq!(reports.saved.lock().unwrap().len(), 1);

        let final_status = status.current();
        assert_eq!(final_status.phase, Phase::Complete);
        assert_eq!(final_status.progress, 100);
    }

    #[tokio::test]
    async fn test_status_progress_is_monotonic() {
        let pipeline = pipeline_with(
            synthetic(4),
            Arc::new(delivery_classifier()),
            Arc::new(ScriptedDedup::none()),
            Arc::new(MemoryReports::default()),
        );
        let status = StatusTracker::new();
        let mut rx = status.subscribe();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let watcher = tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let s = rx.borrow_and_update().clone();
                let done = s.phase.is_terminal();
                sink.lock().unwrap().push(s);
                if done {
                    break;
                }
            }
        });

        pipeline
            .run(&request(), &status, &CancellationToken::new())
            .await
            .unwrap();
        watcher.await.unwrap();

        let seen = seen.lock().unwrap();
        assert!(seen.windows(2).all(|w| w[0].progress <= w[1].progress));
        assert_eq!(seen.last().map(|s| s.phase), Some(Phase::Complete));
    }

    #[tokio::test]
    async fn test_one_failed_day_is_skipped() {
        let failing_day = 10;
        let classifier = Arc::new(ScriptedClassifier::new(move |call, req| {
            if call == failing_day {
                return Err(ServiceError::RateLimited);
            }
            let all = req.reviews.iter().map(|r| r.index).collect();
            Ok(vec![topic("App crashing", all, true)])
        }));
        let pipeline = pipeline_with(
            synthetic(4),
            classifier,
            Arc::new(ScriptedDedup::none()),
            Arc::new(MemoryReports::default()),
        );

        let outcome = pipeline
            .run(&request(), &StatusTracker::new(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.report.total_reviews_analyzed, 31 * 4);
        assert_eq!(outcome.report.topics[0].total_count, 30 * 4);
        assert_eq!(outcome.report.topics[0].frequencies.len(), 30);
        assert_eq!(outcome.report.new_topics_discovered, 1);
        assert!(outcome.notices.iter().any(|n| matches!(
            n,
            Notice::DaysSkipped { days } if days == &vec![NaiveDate::from_ymd_opt(2025, 1, 11).unwrap()]
        )));
    }

    #[tokio::test]
    async fn test_every_day_failing_yields_empty_report() {
        let dedup = Arc::new(ScriptedDedup::none());
        let pipeline = pipeline_with(
            synthetic(4),
            Arc::new(ScriptedClassifier::new(|_, _| {
                Err(ServiceError::Unavailable("connection refused".to_string()))
            })),
            dedup.clone(),
            Arc::new(MemoryReports::default()),
        );
        let status = StatusTracker::new();

        let outcome = pipeline
            .run(&request(), &status, &CancellationToken::new())
            .await
            .unwrap();

        assert!(outcome.report.topics.is_empty());
        assert_eq!(outcome.report.total_reviews_analyzed, 124);
        assert_eq!(dedup.calls.load(Ordering::SeqCst), 0);
        assert_eq!(status.current().phase, Phase::Complete);
    }

    #[tokio::test]
    async fn test_existing_topics_flow_to_later_days() {
        let classifier = Arc::new(ScriptedClassifier::new(|call, _| {
            Ok(match call {
                0 => vec![topic("Cold food", vec![1], true)],
                1 => vec![topic("cold food.", vec![1, 2], true), topic("Late rider", vec![2], true)],
                _ => Vec::new(),
            })
        }));
        let pipeline = pipeline_with(
            synthetic(4),
            classifier.clone(),
            Arc::new(ScriptedDedup::none()),
            Arc::new(MemoryReports::default()),
        );

        let outcome = pipeline
            .run(&request(), &StatusTracker::new(), &CancellationToken::new())
            .await
            .unwrap();

        let requests = classifier.requests.lock().unwrap();
        assert!(requests[0].existing_topics.is_empty());
        assert_eq!(requests[1].existing_topics, vec!["Cold food".to_string()]);
        assert_eq!(
            requests[2].existing_topics,
            vec!["Cold food".to_string(), "Late rider".to_string()]
        );
        assert_eq!(requests[0].reviews[0].index, 1);
        assert_eq!(requests[0].seed_topics.len(), 21);

        // "cold food." folds into the first-seen spelling and counts once as new.
        assert_eq!(outcome.report.new_topics_discovered, 2);
        let cold = outcome.report.topics.iter().find(|t| t.topic == "Cold food").unwrap();
        assert_eq!(cold.total_count, 3);
    }

    #[tokio::test]
    async fn test_invalid_indices_are_dropped() {
        let classifier = Arc::new(ScriptedClassifier::new(|call, _| {
            Ok(if call == 0 {
                vec![topic("Payment failed", vec![0, 1, 1, 2, 99], false), topic("Ghost", vec![], true)]
            } else {
                Vec::new()
            })
        }));
        let pipeline = pipeline_with(
            synthetic(4),
            classifier,
            Arc::new(ScriptedDedup::none()),
            Arc::new(MemoryReports::default()),
        );

        let outcome = pipeline
            .run(&request(), &StatusTracker::new(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.report.topics.len(), 1);
        assert_eq!(outcome.report.topics[0].total_count, 2);
        assert_eq!(outcome.report.new_topics_discovered, 0);
    }

    #[tokio::test]
    async fn test_dedup_merges_and_conserves() {
        let classifier = Arc::new(ScriptedClassifier::new(|_, _| {
            Ok(vec![
                topic("Delivery partner rude", vec![1], false),
                topic("Delivery guy was rude", vec![2], true),
                topic("Rude rider", vec![3], true),
            ])
        }));
        let dedup = Arc::new(ScriptedDedup::new(|labels| {
            assert_eq!(labels.len(), 3);
            Ok(vec![
                MergeGroup {
                    canonical: "Delivery partner rude".to_string(),
                    variants: vec!["Delivery guy was rude".to_string()],
                },
                MergeGroup {
                    canonical: "Impolite staff".to_string(),
                    variants: vec!["Rude rider".to_string()],
                },
            ])
        }));
        let pipeline = pipeline_with(
            synthetic(4),
            classifier,
            dedup,
            Arc::new(MemoryReports::default()),
        );

        let outcome = pipeline
            .run(&request(), &StatusTracker::new(), &CancellationToken::new())
            .await
            .unwrap();
        let report = &outcome.report;

        let labels: Vec<&str> = report.topics.iter().map(|t| t.topic.as_str()).collect();
        assert_eq!(labels, vec!["Delivery partner rude", "Rude rider"]);
        assert_eq!(report.topics[0].total_count, 62);
        assert_eq!(report.topics[1].total_count, 31);
        assert_eq!(report.summary.total_attributions, 93);
        assert!(outcome
            .notices
            .contains(&Notice::MergeGroupsSkipped { count: 1 }));
    }

    #[tokio::test]
    async fn test_dedup_failure_keeps_topics() {
        let classifier = Arc::new(ScriptedClassifier::new(|_, _| {
            Ok(vec![topic("A", vec![1], true), topic("B", vec![2], true)])
        }));
        let pipeline = pipeline_with(
            synthetic(4),
            classifier,
            Arc::new(ScriptedDedup::new(|_| {
                Err(ServiceError::MalformedResponse("not json".to_string()))
            })),
            Arc::new(MemoryReports::default()),
        );

        let outcome = pipeline
            .run(&request(), &StatusTracker::new(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.report.topics.len(), 2);
        assert!(outcome
            .notices
            .iter()
            .any(|n| matches!(n, Notice::DedupSkipped { .. })));
    }

    #[tokio::test]
    async fn test_store_failure_is_not_fatal() {
        let pipeline = pipeline_with(
            synthetic(4),
            Arc::new(delivery_classifier()),
            Arc::new(ScriptedDedup::none()),
            Arc::new(MemoryReports {
                fail: true,
                ..MemoryReports::default()
            }),
        );
        let status = StatusTracker::new();

        let outcome = pipeline
            .run(&request(), &status, &CancellationToken::new())
            .await
            .unwrap();

        assert!(outcome.saved_id.is_none());
        assert!(!outcome.report.topics.is_empty());
        assert!(outcome.notices.iter().any(|n| matches!(n, Notice::NotSaved { .. })));
        assert_eq!(status.current().phase, Phase::Complete);
    }

    #[tokio::test]
    async fn test_invalid_input_never_leaves_idle() {
        let classifier = Arc::new(delivery_classifier());
        let pipeline = pipeline_with(
            synthetic(4),
            classifier.clone(),
            Arc::new(ScriptedDedup::none()),
            Arc::new(MemoryReports::default()),
        );
        let status = StatusTracker::new();

        let mut bad = request();
        bad.app = "ubereats".to_string();
        let err = pipeline
            .run(&bad, &status, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidInput(_)));

        bad.app = "  ".to_string();
        let err = pipeline
            .run(&bad, &status, &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "invalid input: no app selected");

        let mut early = request();
        early.target_date = NaiveDate::MIN;
        assert!(matches!(
            pipeline.run(&early, &status, &CancellationToken::new()).await,
            Err(PipelineError::InvalidInput(_))
        ));

        assert_eq!(status.current(), PipelineStatus::idle());
        assert_eq!(classifier.calls(), 0);
    }

    #[tokio::test]
    async fn test_cancellation_between_days() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let classifier = Arc::new(ScriptedClassifier::new(move |call, _| {
            if call == 2 {
                trigger.cancel();
            }
            Ok(Vec::new())
        }));
        let reports = Arc::new(MemoryReports::default());
        let pipeline = pipeline_with(
            synthetic(4),
            classifier.clone(),
            Arc::new(ScriptedDedup::none()),
            reports.clone(),
        );
        let status = StatusTracker::new();

        let err = pipeline.run(&request(), &status, &cancel).await.unwrap_err();

        assert!(matches!(err, PipelineError::Cancelled));
        assert_eq!(classifier.calls(), 3);
        assert_eq!(status.current().phase, Phase::Cancelled);
        assert!(reports.saved.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cancellation_during_dedup_saves_nothing() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let classifier = Arc::new(ScriptedClassifier::new(|_, _| {
            Ok(vec![
                topic("Late delivery", vec![1], true),
                topic("Delivery late", vec![2], true),
            ])
        }));
        let dedup = Arc::new(ScriptedDedup::new(move |_| {
            trigger.cancel();
            Ok(Vec::new())
        }));
        let reports = Arc::new(MemoryReports::default());
        let pipeline = pipeline_with(synthetic(4), classifier, dedup.clone(), reports.clone());
        let status = StatusTracker::new();

        let err = pipeline.run(&request(), &status, &cancel).await.unwrap_err();

        assert!(matches!(err, PipelineError::Cancelled));
        assert_eq!(dedup.calls.load(Ordering::SeqCst), 1);
        assert_eq!(status.current().phase, Phase::Cancelled);
        assert!(reports.saved.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failing_synthetic_source_ends_in_error() {
        let pipeline = pipeline_with(
            Arc::new(BrokenSource),
            Arc::new(delivery_classifier()),
            Arc::new(ScriptedDedup::none()),
            Arc::new(MemoryReports::default()),
        );
        let status = StatusTracker::new();

        let err = pipeline
            .run(&request(), &status, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Fatal(_)));
        let current = status.current();
        assert_eq!(current.phase, Phase::Error);
        assert!(current.message.contains("disk on fire"));
    }

    #[tokio::test]
    async fn test_live_failure_falls_back_with_notice() {
        let mut pipeline = pipeline_with(
            synthetic(4),
            Arc::new(delivery_classifier()),
            Arc::new(ScriptedDedup::none()),
            Arc::new(MemoryReports::default()),
        );
        pipeline.collaborators.live_source = Some(Arc::new(BrokenSource));

        let mut live = request();
        live.live = true;
        let outcome = pipeline
            .run(&live, &StatusTracker::new(), &CancellationToken::new())
            .await
            .unwrap();

        assert!(matches!(outcome.origin, DataOrigin::SyntheticFallback(_)));
        assert!(outcome
            .notices
            .iter()
            .any(|n| n.to_string().contains("falling back to simulated data")));
        assert_eq!(outcome.report.total_reviews_analyzed, 124);
    }

    #[tokio::test]
    async fn test_custom_topics_reach_classifier() {
        let classifier = Arc::new(ScriptedClassifier::new(|_, _| Ok(Vec::new())));
        let mut pipeline = pipeline_with(
            synthetic(4),
            classifier.clone(),
            Arc::new(ScriptedDedup::none()),
            Arc::new(MemoryReports::default()),
        );
        pipeline.collaborators.custom_topics = Arc::new(FixedTopics(vec![
            SeedTopic::new("delivery DELAYED!", Category::Issue),
            SeedTopic::new("Cutlery missing", Category::Issue),
        ]));

        pipeline
            .run(&request(), &StatusTracker::new(), &CancellationToken::new())
            .await
            .unwrap();

        let requests = classifier.requests.lock().unwrap();
        let seeds = &requests[0].seed_topics;
        assert_eq!(seeds.len(), 22);
        assert_eq!(seeds.last().map(|s| s.label.as_str()), Some("Cutlery missing"));
    }

    #[tokio::test]
    async fn test_second_run_while_active_is_refused() {
        let pipeline = pipeline_with(
            synthetic(4),
            Arc::new(delivery_classifier()),
            Arc::new(ScriptedDedup::none()),
            Arc::new(MemoryReports::default()),
        );
        let status = StatusTracker::new();
        status.begin("someone else").unwrap();

        let err = pipeline
            .run(&request(), &status, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::AlreadyRunning));
        assert_eq!(status.current().message, "someone else");
    }
}
