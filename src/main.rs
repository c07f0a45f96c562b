use anyhow::Context;
use canister_research::core::{load_candidates, CandidateId, ResearchRecord};
use canister_research::logging::{init_tracing, init_tracing_json};
use canister_research::probe::{DfxClient, DfxProber, EvidenceCollector, Pacer};
use canister_research::reconcile::{self, UnifiedView};
use canister_research::sink::{self, DfxLabelSink, DryRunSink, LabelSink, RetryingSink};
use canister_research::store::persist::write_json_atomic;
use canister_research::store::{ProgressTracker, ResultStore, StorePaths};
use canister_research::{BatchRunner, Classifier, ResearchConfig, Shutdown};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Top-level CLI parser for the `canister-research` binary.
#[derive(Debug, Parser)]
#[command(
    name = "canister-research",
    version,
    about = "Identify unlabeled canisters from their live interfaces"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose mode (debug logging)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Research candidates not yet in the result store
    Run(RunArgs),
    /// Merge result stores into one view
    Merge(MergeArgs),
    /// Write the candidates no store has processed yet
    Unresearched(UnresearchedArgs),
    /// Re-run the rules over preserved evidence of unknown records
    Reclassify(ReclassifyArgs),
    /// Push every identified label to the registry again
    Resync(ResyncArgs),
    /// Print per-category and per-reason counts
    Stats(StatsArgs),
}

#[derive(Debug, Args)]
struct StoreArgs {
    /// Identified result store
    #[arg(long, default_value = "data/research_results.json")]
    identified: PathBuf,

    /// Unknown result store
    #[arg(long, default_value = "data/research_results_unknown.json")]
    unknown: PathBuf,
}

impl StoreArgs {
    fn paths(&self) -> StorePaths {
        StorePaths::new(&self.identified, &self.unknown)
    }
}

#[derive(Debug, Args)]
struct SinkArgs {
    /// Registry canister receiving labels (overrides sink.backend_canister)
    #[arg(long)]
    backend: Option<String>,

    /// Log label writes instead of performing them
    #[arg(long)]
    dry_run: bool,
}

#[derive(Debug, Args)]
struct RunArgs {
    /// Candidate list (JSON array)
    #[arg(long, default_value = "data/needs_research.json")]
    candidates: PathBuf,

    #[command(flatten)]
    store: StoreArgs,

    /// Progress file
    #[arg(long, default_value = "data/research_progress.json")]
    progress: PathBuf,

    /// Candidates between checkpoints (overrides batch.checkpoint_interval)
    #[arg(long)]
    checkpoint_interval: Option<usize>,

    /// Per-probe timeout in seconds (overrides probe.timeout_secs)
    #[arg(long)]
    timeout: Option<u64>,

    /// Delay between external calls in milliseconds (overrides probe.call_delay_ms)
    #[arg(long)]
    delay_ms: Option<u64>,

    /// Research at most this many candidates of the list
    #[arg(long)]
    limit: Option<usize>,

    #[command(flatten)]
    sink: SinkArgs,
}

#[derive(Debug, Args)]
struct MergeArgs {
    /// Store files to merge; later files win on collision
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Merged identified store
    #[arg(long)]
    out_identified: PathBuf,

    /// Merged unknown store
    #[arg(long)]
    out_unknown: PathBuf,

    /// Also write the unified view as one JSON document
    #[arg(long)]
    view: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct UnresearchedArgs {
    /// Full candidate universe
    #[arg(long)]
    candidates: PathBuf,

    /// Store files whose ids count as processed
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Output candidate list
    #[arg(long, default_value = "data/truly_unresearched.json")]
    output: PathBuf,
}

#[derive(Debug, Args)]
struct ReclassifyArgs {
    #[command(flatten)]
    store: StoreArgs,

    /// Push labels of promoted records
    #[arg(long)]
    push: bool,

    #[command(flatten)]
    sink: SinkArgs,
}

#[derive(Debug, Args)]
struct ResyncArgs {
    #[command(flatten)]
    store: StoreArgs,

    #[command(flatten)]
    sink: SinkArgs,
}

#[derive(Debug, Args)]
struct StatsArgs {
    /// Store files to summarize
    #[arg(required = true)]
    inputs: Vec<PathBuf>,
}

/// Label sink selected from configuration and flags.
enum CliSink {
    Dfx(RetryingSink<DfxLabelSink>),
    DryRun(DryRunSink),
}

impl LabelSink for CliSink {
    async fn set_label(&self, id: &CandidateId, label: Option<&str>) -> bool {
        match self {
            CliSink::Dfx(sink) => sink.set_label(id, label).await,
            CliSink::DryRun(sink) => sink.set_label(id, label).await,
        }
    }
}

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("canister-research error: {error:#}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose { "debug" } else { "info" };
    if cli.json_logs {
        init_tracing_json(level);
    } else {
        init_tracing(level);
    }

    let config = match &cli.config {
        Some(path) => ResearchConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => ResearchConfig::default(),
    };

    match cli.command {
        Commands::Run(args) => run_batch(config, args).await,
        Commands::Merge(args) => merge(args),
        Commands::Unresearched(args) => unresearched(args),
        Commands::Reclassify(args) => reclassify(config, args).await,
        Commands::Resync(args) => resync(config, args).await,
        Commands::Stats(args) => stats(args),
    }
}

fn build_sink(config: &ResearchConfig, args: &SinkArgs, pacer: Arc<Pacer>) -> Option<CliSink> {
    if args.dry_run {
        return Some(CliSink::DryRun(DryRunSink));
    }
    let backend = args
        .backend
        .clone()
        .or_else(|| config.sink.backend_canister.clone())?;
    let client = DfxClient::new(&config.probe.dfx_binary, &config.probe.network);
    let dfx = DfxLabelSink::new(
        client,
        backend,
        &config.sink.method,
        config.sink.timeout(),
        pacer,
    );
    Some(CliSink::Dfx(RetryingSink::new(
        dfx,
        config.sink.max_attempts,
        config.sink.retry_backoff(),
    )))
}

fn spawn_interrupt_listener(shutdown: Shutdown) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; flushing and stopping");
            shutdown.trigger();
        }
    });
}

async fn run_batch(mut config: ResearchConfig, args: RunArgs) -> anyhow::Result<()> {
    if let Some(interval) = args.checkpoint_interval {
        config.batch.checkpoint_interval = interval;
    }
    if let Some(timeout) = args.timeout {
        config.probe.timeout_secs = timeout;
    }
    if let Some(delay) = args.delay_ms {
        config.probe.call_delay_ms = delay;
    }
    config.validate().context("invalid configuration")?;

    let mut candidates = load_candidates(&args.candidates).context("failed to load candidate list")?;
    if let Some(limit) = args.limit {
        candidates.truncate(limit);
    }

    let paths = args.store.paths();
    let mut store = ResultStore::load(&paths).context("failed to load result store")?;
    if let Some(previous) = ProgressTracker::load_previous(&args.progress)? {
        info!(
            researched = previous.researched,
            total = previous.total,
            "previous progress file found; counters will be recomputed from the store"
        );
    }
    let mut tracker = ProgressTracker::new(paths, &args.progress, config.batch.checkpoint_interval);

    let pacer = Arc::new(Pacer::new(config.probe.call_delay()));
    let client = DfxClient::new(&config.probe.dfx_binary, &config.probe.network);
    let prober = DfxProber::new(client, config.probe.timeout());
    let collector = EvidenceCollector::new(prober, Arc::clone(&pacer), config.probe.descriptor_limit);
    let classifier = Classifier::new(config.rules.clone()).context("invalid rule table")?;
    let sink = build_sink(&config, &args.sink, pacer);
    if sink.is_none() {
        info!("no label backend configured; labels stay local");
    }

    let shutdown = Shutdown::new();
    spawn_interrupt_listener(shutdown.clone());
    let runner = BatchRunner::new(collector, classifier, sink).with_shutdown(shutdown);

    let summary = runner
        .run(&candidates, &mut store, &mut tracker)
        .await
        .context("batch run failed")?;

    println!(
        "{} of {} researched ({} identified, {} unknown), {} remaining{}",
        summary.progress.researched,
        summary.progress.total,
        summary.progress.identified,
        summary.progress.unknown_documented,
        summary.progress.remaining,
        if summary.interrupted { " [interrupted]" } else { "" }
    );
    if summary.sink_failures > 0 {
        println!(
            "{} label writes failed; run `resync` to retry them",
            summary.sink_failures
        );
    }
    if summary.rejected > 0 {
        println!("{} records rejected by the store; see the log", summary.rejected);
    }
    Ok(())
}

fn load_inputs(inputs: &[PathBuf]) -> anyhow::Result<Vec<ResultStore>> {
    inputs
        .iter()
        .map(|path| {
            ResultStore::load_file(path).with_context(|| format!("failed to load {}", path.display()))
        })
        .collect()
}

fn merged_view(inputs: &[PathBuf]) -> anyhow::Result<UnifiedView> {
    Ok(reconcile::merge(&load_inputs(inputs)?))
}

fn merge(args: MergeArgs) -> anyhow::Result<()> {
    let view = merged_view(&args.inputs)?;
    if let Some(path) = &args.view {
        write_text(path, &view.to_json()?)?;
    }
    let fingerprint = view.fingerprint()?;
    let stats = view.stats();
    view.save(&StorePaths::new(&args.out_identified, &args.out_unknown))
        .context("failed to write merged store")?;

    println!(
        "merged {} inputs: {} identified, {} unknown (sha256 {fingerprint})",
        args.inputs.len(),
        stats.identified,
        stats.unknown
    );
    Ok(())
}

fn write_text(path: &Path, text: &str) -> anyhow::Result<()> {
    canister_research::store::persist::preflight_writable(path)?;
    std::fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))
}

fn unresearched(args: UnresearchedArgs) -> anyhow::Result<()> {
    let universe = load_candidates(&args.candidates).context("failed to load candidate list")?;
    let view = merged_view(&args.inputs)?;
    let pending = view.unresearched(&universe);

    canister_research::store::persist::preflight_writable(&args.output)?;
    write_json_atomic(&args.output, &pending)
        .with_context(|| format!("failed to write {}", args.output.display()))?;
    println!(
        "{} of {} candidates unresearched -> {}",
        pending.len(),
        universe.len(),
        args.output.display()
    );
    Ok(())
}

async fn reclassify(config: ResearchConfig, args: ReclassifyArgs) -> anyhow::Result<()> {
    let paths = args.store.paths();
    paths.preflight()?;
    let mut store = ResultStore::load(&paths).context("failed to load result store")?;
    let classifier = Classifier::new(config.rules.clone()).context("invalid rule table")?;

    let promoted = reconcile::reclassify(&mut store, &classifier, Utc::now().date_naive());
    store.save(&paths).context("failed to save result store")?;
    println!("{} unknown records promoted", promoted.len());

    if args.push && !promoted.is_empty() {
        let pacer = Arc::new(Pacer::new(config.probe.call_delay()));
        let Some(sink) = build_sink(&config, &args.sink, pacer) else {
            warn!("--push given but no label backend configured");
            return Ok(());
        };
        let records: Vec<&ResearchRecord> = store
            .identified()
            .iter()
            .filter(|r| promoted.contains(&r.canister_id))
            .collect();
        let mut failed = 0;
        for record in records {
            if sink::push_record(&sink, record).await == Some(false) {
                failed += 1;
            }
        }
        println!("{} of {} labels pushed", promoted.len() - failed, promoted.len());
    }
    Ok(())
}

async fn resync(config: ResearchConfig, args: ResyncArgs) -> anyhow::Result<()> {
    let store = ResultStore::load(&args.store.paths()).context("failed to load result store")?;
    let pacer = Arc::new(Pacer::new(config.probe.call_delay()));
    let sink = build_sink(&config, &args.sink, pacer)
        .context("no label backend configured (use --backend or sink.backend_canister)")?;

    let report = sink::resync(&store, &sink).await;
    println!(
        "{} succeeded, {} failed, {} skipped",
        report.succeeded, report.failed, report.skipped
    );
    Ok(())
}

fn stats(args: StatsArgs) -> anyhow::Result<()> {
    let view = merged_view(&args.inputs)?;
    println!("{}", serde_json::to_string_pretty(&view.stats())?);
    Ok(())
}
