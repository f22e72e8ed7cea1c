use clap::Parser;
use mediaplan::application::engine::PlacementEngine;
use mediaplan::application::tasks::{TaskRunner, set_task_progress};
use mediaplan::config::Config;
use mediaplan::domain::placement::Placement;
use mediaplan::domain::plan::Partner;
use mediaplan::domain::ports::{
    HistoryStore, JobQueueArc, PlacementStoreBox, RuleStore, TaskStoreArc,
};
use mediaplan::domain::rule::PlanRule;
use mediaplan::domain::task::RequestContext;
use mediaplan::infrastructure::in_memory::{
    InMemoryHistoryStore, InMemoryPlacementStore, InMemoryRuleStore, InMemoryTaskStore,
};
use mediaplan::infrastructure::queue::InMemoryJobQueue;
use mediaplan::interfaces::csv::history_reader::HistoryReader;
use mediaplan::interfaces::csv::placement_writer::PlacementWriter;
use mediaplan::interfaces::json::plan_reader::PlanReader;
use miette::{IntoDiagnostic, Result, miette};
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{Level, info, warn};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input plan JSON file (partner + rules)
    plan: PathBuf,

    /// Historical delivery CSV used to infer default rules
    #[arg(long)]
    history: Option<PathBuf>,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// TOML configuration file for engine and polling knobs
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // CSV output goes to stdout; logs stay on stderr.
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_writer(io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).into_diagnostic()?;

    let config = Config::load(cli.config.as_deref()).into_diagnostic()?;

    let file = File::open(&cli.plan).into_diagnostic()?;
    let (partner, rules) = PlanReader::new(file).read().into_diagnostic()?;
    info!(
        partner = partner.name.as_str(),
        rules = rules.len(),
        "loaded plan"
    );

    let history = InMemoryHistoryStore::new();
    if let Some(path) = &cli.history {
        let file = File::open(path).into_diagnostic()?;
        for record in HistoryReader::new(file).records() {
            match record {
                Ok(record) => history.store(record).await.into_diagnostic()?,
                Err(e) => warn!(error = %e, "skipping malformed history row"),
            }
        }
    }

    match &cli.db_path {
        Some(db_path) => run_persistent(db_path, partner, rules, history, config).await,
        None => {
            run(
                partner,
                rules,
                history,
                Box::new(InMemoryPlacementStore::new()),
                Arc::new(InMemoryTaskStore::new()),
                config,
            )
            .await
        }
    }
}

#[cfg(feature = "storage-rocksdb")]
async fn run_persistent(
    db_path: &std::path::Path,
    partner: Partner,
    rules: Vec<PlanRule>,
    history: InMemoryHistoryStore,
    config: Config,
) -> Result<()> {
    let store = mediaplan::infrastructure::rocksdb::RocksDBStore::open(db_path).into_diagnostic()?;
    run(
        partner,
        rules,
        history,
        Box::new(store.clone()),
        Arc::new(store),
        config,
    )
    .await
}

#[cfg(not(feature = "storage-rocksdb"))]
async fn run_persistent(
    db_path: &std::path::Path,
    partner: Partner,
    rules: Vec<PlanRule>,
    history: InMemoryHistoryStore,
    config: Config,
) -> Result<()> {
    warn!(
        path = %db_path.display(),
        "Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to in-memory storage."
    );
    run(
        partner,
        rules,
        history,
        Box::new(InMemoryPlacementStore::new()),
        Arc::new(InMemoryTaskStore::new()),
        config,
    )
    .await
}

/// Runs generation through the task bridge, the way a request handler
/// would: launch the job, block on it, render the result.
async fn run(
    partner: Partner,
    rules: Vec<PlanRule>,
    history: InMemoryHistoryStore,
    placements: PlacementStoreBox,
    tasks: TaskStoreArc,
    config: Config,
) -> Result<()> {
    let rule_store = InMemoryRuleStore::new();
    for rule in rules {
        rule_store.store(rule).await.into_diagnostic()?;
    }

    let engine = Arc::new(PlacementEngine::new(
        placements,
        Box::new(rule_store),
        Box::new(history),
        config.engine.clone(),
    ));

    let queue = Arc::new(InMemoryJobQueue::new());
    {
        let engine = engine.clone();
        let tasks = tasks.clone();
        let poll = config.poll.clone();
        queue
            .register("generate_placements", move |payload, progress| {
                let engine = engine.clone();
                let tasks = tasks.clone();
                let poll = poll.clone();
                Box::pin(async move {
                    let partner: Partner = serde_json::from_value(payload)?;
                    progress.set(10).await;
                    set_task_progress(&tasks, progress.id(), 10, &poll).await;
                    let rows = engine.generate(&partner).await?;
                    set_task_progress(&tasks, progress.id(), 100, &poll).await;
                    Ok(serde_json::to_value(rows)?)
                })
            })
            .await;
    }

    let queue: JobQueueArc = queue;
    let runner = TaskRunner::new(queue, tasks, config.poll.clone());
    let ctx = RequestContext {
        user: "cli".to_string(),
        plan_id: partner.id,
    };
    let payload = serde_json::to_value(&partner).into_diagnostic()?;
    let task = runner
        .launch_task(
            &ctx,
            "generate_placements",
            "Generate placements from plan rules",
            payload,
        )
        .await
        .into_diagnostic()?;

    let Some(result) = runner.wait_and_get_job(&task, None, true).await else {
        return Err(miette!(
            "placement generation did not complete within the poll budget"
        ));
    };
    let rows: Vec<Placement> = serde_json::from_value(result).into_diagnostic()?;
    info!(placements = rows.len(), "generation complete");

    let stdout = io::stdout();
    let mut writer = PlacementWriter::new(stdout.lock());
    writer
        .write_placements(&partner, &rows)
        .into_diagnostic()?;

    Ok(())
}
