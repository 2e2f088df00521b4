//! reviewtrend - topic trends from app store reviews
//!
//! A CLI tool that classifies 31 days of app reviews into topics with a
//! local Ollama model, merges duplicate topics and reports per-day
//! frequencies with week-over-week trends.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime or input error (bad date, unknown app, storage, etc.)
//!   3 - Analysis cancelled (Ctrl-C)

mod analysis;
mod cli;
mod clients;
mod config;
mod error;
mod models;
mod pipeline;
mod report;
mod source;
mod store;

use analysis::DateWindow;
use anyhow::{Context, Result};
use cli::{Action, Args, OutputFormat};
use clients::{HttpReviewScraper, LlmTopicClassifier, LlmTopicDeduplicator, OllamaClient, OllamaConfig};
use config::{Config, CONFIG_FILE};
use error::PipelineError;
use indicatif::{ProgressBar, ProgressStyle};
use models::{AnalysisReport, Category};
use pipeline::{AnalysisRequest, AnalysisSession, Collaborators, Pipeline, PipelineSettings, PipelineStatus};
use source::{DataOrigin, ReviewSource, SyntheticSettings, SyntheticSource};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use store::{JsonCustomTopicStore, JsonReportStore, ReportStore};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

/// Exit code of a cancelled run.
const EXIT_CANCELLED: i32 = 3;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.action() == Action::InitConfig {
        return handle_init_config();
    }

    init_logging(&args);

    info!("reviewtrend v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run(args).await {
        Ok(exit_code) => std::process::exit(exit_code),
        Err(e) => {
            error!("reviewtrend failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .reviewtrend.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE);

    if path.exists() {
        eprintln!("⚠️  {} already exists. Remove it first or edit it manually.", CONFIG_FILE);
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).with_context(|| format!("Failed to write {}", CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE);
    println!("   Edit it to customize the model, review source, pacing and storage.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Dispatch the requested action. Returns the exit code.
async fn run(args: Args) -> Result<i32> {
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    match args.action() {
        Action::Analyze => run_analysis(&args, &config).await,
        Action::ListReports => {
            let store = JsonReportStore::new(&config.storage.reports_dir);
            let listings = store.list().await?;
            print!("{}", report::generate_history_table(&listings));
            Ok(0)
        }
        Action::ShowReport(id) => show_report(&args, &config, &id).await,
        Action::DeleteReport(id) => {
            let store = JsonReportStore::new(&config.storage.reports_dir);
            store.delete(&id).await?;
            println!("🗑️  Deleted report {}", id);
            Ok(0)
        }
        Action::AddTopic { label, category, app } => {
            let topics = JsonCustomTopicStore::new(&config.storage.custom_topics_file);
            let topic = topics.add(&label, category, app.as_deref()).await?;
            println!("✅ Added topic '{}' ({}) with id {}", topic.label, topic.category, topic.id);
            Ok(0)
        }
        Action::ListTopics => {
            let topics = JsonCustomTopicStore::new(&config.storage.custom_topics_file);
            print_custom_topics(&topics.list_all().await?);
            Ok(0)
        }
        Action::DeleteTopic(id) => {
            let topics = JsonCustomTopicStore::new(&config.storage.custom_topics_file);
            topics.delete(&id).await?;
            println!("🗑️  Deleted topic {}", id);
            Ok(0)
        }
        Action::ToggleTopic(id) => {
            let topics = JsonCustomTopicStore::new(&config.storage.custom_topics_file);
            let topic = topics.toggle(&id).await?;
            let state = if topic.is_active { "enabled" } else { "disabled" };
            println!("✅ Topic '{}' {}", topic.label, state);
            Ok(0)
        }
        // Handled before logging is set up
        Action::InitConfig => Ok(0),
    }
}

/// Run one analysis with a progress bar and Ctrl-C cancellation.
async fn run_analysis(args: &Args, config: &Config) -> Result<i32> {
    let start_time = Instant::now();

    let target_date = match args.date {
        Some(ref date) => DateWindow::parse(date)?.target(),
        None => chrono::Local::now().date_naive(),
    };
    let request = AnalysisRequest {
        app: args.app.clone().unwrap_or_default(),
        target_date,
        live: args.live,
    };

    println!("🤖 Initializing review analysis...");
    println!("   App: {}", request.app);
    println!("   Target date: {}", request.target_date);
    println!("   Model: {}", config.model.name);
    println!("   Ollama: {}", config.model.ollama_url);
    if request.live {
        match config.source.scraper_url {
            Some(ref url) => println!("   Live source: {}", url),
            None => println!("   Live source: not configured"),
        }
    }

    let session = build_session(config)?;

    let cancel = CancellationToken::new();
    let ctrl_c = spawn_ctrl_c(cancel.clone());

    let progress_bar = if args.quiet {
        None
    } else {
        Some(Arc::new(new_progress_bar()))
    };
    let progress = progress_bar
        .clone()
        .map(|pb| spawn_progress(session.subscribe(), pb));

    println!("\n🔬 Running topic analysis over 31 days...\n");
    let result = session.analyze(&request, &cancel).await;

    ctrl_c.abort();
    if let Some(progress) = progress {
        progress.abort();
    }
    if let Some(pb) = progress_bar {
        pb.finish_and_clear();
    }

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(PipelineError::Cancelled) => {
            eprintln!("\n⏹️  Analysis cancelled.");
            return Ok(EXIT_CANCELLED);
        }
        Err(e) => return Err(e.into()),
    };

    for notice in &outcome.notices {
        println!("⚠️  {}", notice);
    }

    println!("\n📝 Generating report...");
    let rendered = render(&outcome.report, config.general.format, args.category)?;
    let output = Path::new(&config.general.output);
    report::write_report(&rendered, output)?;

    print_summary(&outcome.report, &outcome.origin);
    if let Some(ref id) = outcome.saved_id {
        println!("   Saved as: {}", id);
    }
    println!("   Duration: {:.1}s", start_time.elapsed().as_secs_f64());
    println!("\n✅ Analysis complete! Report saved to: {}", output.display());

    Ok(0)
}

/// Render a stored report through the session, to stdout or --output.
async fn show_report(args: &Args, config: &Config, id: &str) -> Result<i32> {
    let session = build_session(config)?;
    let stored = session.pipeline().reports().load_full(id).await?;
    let report = session.load_from_history(stored)?;

    let rendered = render(&report, config.general.format, args.category)?;
    match args.output {
        Some(ref path) => {
            report::write_report(&rendered, path)?;
            println!("✅ Report {} written to {}", report.id, path.display());
        }
        None => print!("{}", rendered),
    }
    Ok(0)
}

fn render(report: &AnalysisReport, format: OutputFormat, category: Option<Category>) -> Result<String> {
    match format {
        OutputFormat::Json => report::generate_json_report(report, category),
        OutputFormat::Markdown => Ok(report::generate_markdown_report(report, category)),
    }
}

/// Wire the production collaborators into a session.
fn build_session(config: &Config) -> Result<AnalysisSession> {
    let ollama = OllamaClient::new(OllamaConfig {
        ollama_url: config.model.ollama_url.clone(),
        model_name: config.model.name.clone(),
        timeout_seconds: config.model.timeout_seconds,
    })?;

    let live_source: Option<Arc<dyn ReviewSource>> = match config.source.scraper_url {
        Some(ref url) => Some(Arc::new(HttpReviewScraper::new(
            Some(url.clone()),
            config.source.scraper_timeout_seconds,
        )?)),
        None => None,
    };

    let synthetic = SyntheticSource::new(
        SyntheticSettings {
            daily_count: config.source.daily_count,
            variance: config.source.variance,
            floor: config.source.floor,
            seed: config.source.seed,
        },
        config.pipeline.generation_pause(),
    );

    let collaborators = Collaborators {
        live_source,
        synthetic_source: Arc::new(synthetic),
        classifier: Arc::new(LlmTopicClassifier::new(
            ollama.clone(),
            config.model.classifier_temperature,
        )),
        deduplicator: Arc::new(LlmTopicDeduplicator::new(ollama, config.model.dedup_temperature)),
        reports: Arc::new(JsonReportStore::new(&config.storage.reports_dir)),
        custom_topics: Arc::new(JsonCustomTopicStore::new(&config.storage.custom_topics_file)),
    };

    let settings = PipelineSettings {
        classify_pause: config.pipeline.classify_pause(),
    };

    Ok(AnalysisSession::new(Pipeline::new(collaborators, settings)))
}

fn new_progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(100);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>3}% {msg}")
        .map(|style| style.progress_chars("#>-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb
}

/// Mirror status updates onto the progress bar until a terminal phase.
fn spawn_progress(mut rx: watch::Receiver<PipelineStatus>, pb: Arc<ProgressBar>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let status = rx.borrow_and_update().clone();
            pb.set_position(status.progress as u64);
            match status.current_day {
                Some(day) => pb.set_message(format!("{} ({})", status.message, day)),
                None => pb.set_message(status.message.clone()),
            }
            if status.phase.is_terminal() {
                break;
            }
        }
    })
}

/// Cancel the run on the first Ctrl-C.
fn spawn_ctrl_c(cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                warn!("Received Ctrl-C, cancelling analysis");
                cancel.cancel();
            }
            Err(e) => debug!("Ctrl-C handler unavailable: {}", e),
        }
    })
}

fn print_summary(report: &AnalysisReport, origin: &DataOrigin) {
    let summary = &report.summary;
    let origin = match origin {
        DataOrigin::Live => "live",
        DataOrigin::Synthetic | DataOrigin::SyntheticFallback(_) => "simulated",
    };

    println!("\n📊 Analysis Summary:");
    println!(
        "   Reviews analyzed: {} ({} data)",
        report.total_reviews_analyzed, origin
    );
    println!(
        "   Topics: {} ({} new) - 🔴 Issues: {} | 💡 Requests: {} | 💬 Feedback: {}",
        summary.total_topics,
        report.new_topics_discovered,
        summary.issue_topics,
        summary.request_topics,
        summary.feedback_topics
    );
    println!(
        "   Trends: ↑ {} rising | ↓ {} falling | → {} stable",
        summary.rising, summary.falling, summary.stable
    );
}

fn print_custom_topics(topics: &[store::CustomTopic]) {
    if topics.is_empty() {
        println!("No custom topics.");
        return;
    }

    println!("| ID | Topic | Category | App | Active |");
    println!("|:---|:---|:---|:---|:---:|");
    for topic in topics {
        println!(
            "| `{}` | {} | {} | {} | {} |",
            topic.id,
            topic.label,
            topic.category,
            topic.app_id.as_deref().unwrap_or("all"),
            if topic.is_active { "yes" } else { "no" }
        );
    }
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
