//! TrialScope — PAH clinical trial endpoint extraction
//! Entry point for the `trialscope` binary.

mod config;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::{Months, Utc};
use clap::{Parser, Subcommand};
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use trialscope_common::sandbox::SandboxClient;
use trialscope_db::{Database, TrialRepository};
use trialscope_ingestion::report::{load_reportable, write_html_report};
use trialscope_ingestion::sources::clinicaltrials::StudyFilter;
use trialscope_ingestion::sources::{ClinicalTrialsClient, FmpFilingsClient, WebSearchClient};
use trialscope_ingestion::{
    reprocess_raw_dir, run_pipeline, ExtractionChains, JsonRecordStore, LiteratureTable,
    PipelineJob, PipelineResult, PipelineSources,
};
use trialscope_web::AppState;

use config::Config;

#[derive(Debug, Parser)]
#[command(name = "trialscope", version, about = "PAH clinical trial endpoint extraction")]
struct Cli {
    /// Config file (defaults to TRIALSCOPE_CONFIG, then trialscope.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fetch trials, filings and publications, then extract and save records
    Fetch {
        #[arg(long)]
        condition: Option<String>,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Rebuild records from saved raw registry documents
    Process {
        #[arg(long)]
        raw_dir: Option<PathBuf>,
    },
    /// Load saved records into PostgreSQL
    Load {
        /// Drop and recreate every table first
        #[arg(long)]
        reset: bool,
    },
    /// Serve the query API and dashboard
    Serve {
        #[arg(long)]
        bind: Option<String>,
    },
    /// Write the static HTML endpoint report
    Report {
        #[arg(long, default_value_t = 3)]
        top_n: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    // Initialise structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("trialscope=debug,info")),
        )
        .init();

    let cli = Cli::parse();
    info!(version = env!("CARGO_PKG_VERSION"), "TrialScope starting");

    let config = Config::load(cli.config.as_deref())?;
    let paths = config.paths();
    paths.create_all().context("creating data directories")?;
    let store = JsonRecordStore::new(paths.json_dir());

    match cli.command {
        Command::Fetch { condition, limit } => {
            let chains = build_chains(&config)?;
            let job = PipelineJob {
                condition: condition.unwrap_or_else(|| config.clinicaltrials.condition.clone()),
                limit: limit.unwrap_or(config.clinicaltrials.limit),
                forms: config.filings.forms.clone(),
                limit_per_form: config.filings.limit_per_form,
            };
            let result = fetch(&config, job, &store, &chains).await?;
            log_result("fetch", &result);
        }

        Command::Process { raw_dir } => {
            let chains = build_chains(&config)?;
            let raw_dir = raw_dir.unwrap_or_else(|| paths.raw_clinical_trials());
            let result = reprocess_raw_dir(&raw_dir, &store, &chains);
            log_result("process", &result);
        }

        Command::Load { reset } => {
            let url = config
                .database
                .url
                .as_deref()
                .context("no database configured (set [database].url or DATABASE_URL)")?;
            let db = Arc::new(Database::connect(url).await?);
            if reset {
                db.reset_schema().await?;
            } else {
                db.ensure_schema().await?;
            }
            let records = store.load_all();
            let summary = TrialRepository::new(db).load_records(&records).await?;
            info!(inserted = summary.inserted, skipped = summary.skipped, "records loaded");
        }

        Command::Serve { bind } => {
            let bind = bind.unwrap_or_else(|| config.server.bind.clone());
            let addr: SocketAddr = bind
                .parse()
                .with_context(|| format!("invalid bind address: {}", bind))?;
            let state = AppState::new(connect_optional(&config).await, store);
            info!(db_type = state.db_type(), "Dashboard: http://{}/dashboard", addr);
            trialscope_web::serve(addr, state).await?;
        }

        Command::Report { top_n } => {
            let records = load_reportable(&store);
            if records.is_empty() {
                warn!(dir = %store.dir().display(), "no records with outcome data, report will be empty");
            }
            let path = write_html_report(&records, top_n, &paths)?;
            info!(path = %path.display(), "report ready");
        }
    }

    Ok(())
}

fn build_chains(config: &Config) -> anyhow::Result<ExtractionChains> {
    let table = match &config.literature.path {
        Some(path) => LiteratureTable::from_path(path)
            .with_context(|| format!("loading literature table {}", path.display()))?,
        None => LiteratureTable::builtin()?,
    };
    info!(version = table.version(), use_default = config.literature.use_default, "literature table loaded");
    Ok(ExtractionChains::new(Arc::new(table), config.literature.use_default))
}

async fn fetch(
    config: &Config,
    job: PipelineJob,
    store: &JsonRecordStore,
    chains: &ExtractionChains,
) -> anyhow::Result<PipelineResult> {
    let paths = config.paths();
    let client = SandboxClient::new()?;

    let today = Utc::now().date_naive();
    let filter = StudyFilter {
        min_start_date: today
            .checked_sub_months(Months::new(config.clinicaltrials.start_window_months))
            .unwrap_or(today),
        ..StudyFilter::default()
    };
    let registry = ClinicalTrialsClient::new(client.clone())
        .with_raw_dir(paths.raw_clinical_trials())
        .with_delay(Duration::from_millis(config.clinicaltrials.delay_ms))
        .with_filter(filter);

    if config.filings.api_key.is_none() {
        warn!("no FMP API key configured, filings will be skipped");
    }
    let filings = FmpFilingsClient::new(client.clone(), config.filings.api_key.clone())
        .with_delay(Duration::from_millis(config.filings.delay_ms));

    let publications = WebSearchClient::new(
        client,
        config.publications.api_key.clone(),
        config.publications.engine_id.clone(),
        paths.raw_publications(),
    )
    .with_delay(Duration::from_millis(config.publications.delay_ms))
    .with_limits(config.publications.publication_limit, config.publications.presentation_limit);

    let (tx, mut rx) = broadcast::channel::<trialscope_ingestion::pipeline::PipelineProgress>(64);
    let progress = tokio::spawn(async move {
        while let Ok(p) = rx.recv().await {
            info!(stage = %p.stage, nct_id = ?p.nct_id, saved = p.records_saved, "{}", p.message);
        }
    });

    let sources = PipelineSources {
        registry: &registry,
        filings: &filings,
        publications: &publications,
    };
    let result = run_pipeline(job, sources, store, chains, Some(tx)).await;
    let _ = progress.await;
    Ok(result)
}

/// Connect when a URL is configured; any failure means JSON-only serving.
async fn connect_optional(config: &Config) -> Option<Arc<Database>> {
    let url = config.database.url.as_deref()?;
    match Database::connect(url).await {
        Ok(db) => match db.ensure_schema().await {
            Ok(()) => Some(Arc::new(db)),
            Err(e) => {
                warn!(error = %e, "schema check failed, serving JSON files only");
                None
            }
        },
        Err(e) => {
            warn!(error = %e, "database unavailable, serving JSON files only");
            None
        }
    }
}

fn log_result(command: &str, result: &PipelineResult) {
    info!(
        command,
        trials_found = result.trials_found,
        records_saved = result.records_saved,
        errors = result.errors.len(),
        duration_ms = result.duration_ms,
        "run complete"
    );
    for e in &result.errors {
        warn!(error = %e, "run error");
    }
}
