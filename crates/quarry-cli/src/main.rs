//! quarry - command-line interface.
//!
//! Covers the document-to-graph lifecycle: `build` extracts a document into
//! the graph store, `dedupe` finds duplicate labels or entities and plans a
//! resolution, `execute` replays a saved resolution plan, and `stats` prints
//! the graph inventory.
//!
//! Exit code is non-zero only for unrecoverable setup problems: unreachable
//! store or LLM, bad arguments, unreadable input. "Nothing found" outcomes
//! and failed plan groups finish with exit code 0 and a report.

use std::io::{self, Write as _};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use quarry_core::extract::cache;
use quarry_core::traits::GraphStore;
use quarry_core::{
    merge, split, ApprovalPolicy, ApprovalRequest, AutoApprove, ChunkProfile, DuplicateDetector,
    DuplicateGroup, ExecutionOptions, ExtractionPipeline, GraphStatistics, GraphWriter,
    PlanExecutor, QuarryConfig, ResolutionPlan, ResolutionPlanner,
};
use quarry_graph_stores::GraphStoreFactory;
use quarry_llm::LlmFactory;
use quarry_loaders::LoaderFactory;

#[derive(Parser)]
#[command(name = "quarry")]
#[command(about = "Extract a knowledge graph from documents with an LLM", long_about = None)]
struct Cli {
    /// Config file (.toml, .json, or .yaml); defaults to ./quarry.toml,
    /// then the user config dir, then environment variables
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Chunk a document, extract entities with the LLM, write the graph
    Build {
        /// Document to ingest (txt, md, or pdf)
        document: PathBuf,

        /// Chunk size in characters
        #[arg(long, conflicts_with = "adaptive")]
        chunk_size: Option<usize>,

        /// Overlap between consecutive chunks in characters
        #[arg(long, conflicts_with = "adaptive")]
        chunk_overlap: Option<usize>,

        /// Pick the chunk size from the document's size band
        #[arg(long)]
        adaptive: bool,

        /// Concurrent extraction workers
        #[arg(long)]
        workers: Option<usize>,

        /// Keep existing graph content instead of clearing it first
        #[arg(long)]
        preserve: bool,

        /// First chunk index to extract (inclusive)
        #[arg(long)]
        start_chunk: Option<usize>,

        /// Last chunk index to extract (inclusive)
        #[arg(long)]
        end_chunk: Option<usize>,

        /// Save extraction results for later reuse
        #[arg(long)]
        save_cache: bool,

        /// Reuse saved extraction results instead of calling the LLM
        #[arg(long)]
        load_cache: bool,

        /// Cache file path (defaults to <cache_dir>/<document stem>.json)
        #[arg(long)]
        cache_file: Option<PathBuf>,

        /// Model override
        #[arg(long)]
        model: Option<String>,

        /// Abandon unfinished chunks after this many seconds
        #[arg(long)]
        global_timeout: Option<u64>,
    },

    /// Detect duplicates, plan a resolution, optionally execute it
    Dedupe {
        /// Deduplicate entities under one label instead of the labels themselves
        #[arg(long, value_name = "LABEL")]
        entity_type: Option<String>,

        /// Deduplicate entity-type labels (the default mode)
        #[arg(long, conflicts_with = "entity_type")]
        labels: bool,

        /// Cap on entities fetched per label for detection
        #[arg(long)]
        limit: Option<usize>,

        /// Model override
        #[arg(long)]
        model: Option<String>,

        /// Detect and save a plan without executing it
        #[arg(long)]
        plan_only: bool,

        /// Execute the plan after planning
        #[arg(long, conflicts_with = "plan_only")]
        execute: bool,

        /// Approve every prompt without asking
        #[arg(long)]
        yes: bool,

        /// Walk the plan without running any query
        #[arg(long)]
        dry_run: bool,

        /// Skip the backup offer before execution
        #[arg(long)]
        skip_backup: bool,

        /// Directory for saved plans and execution reports
        #[arg(long)]
        plans_dir: Option<PathBuf>,
    },

    /// Execute a previously saved resolution plan
    Execute {
        /// Plan file produced by `quarry dedupe`
        plan: PathBuf,

        /// Approve every prompt without asking
        #[arg(long)]
        yes: bool,

        /// Walk the plan without running any query
        #[arg(long)]
        dry_run: bool,

        /// Skip the backup offer before execution
        #[arg(long)]
        skip_backup: bool,
    },

    /// Print the graph inventory
    Stats,
}

struct BuildOpts {
    chunk_size: Option<usize>,
    chunk_overlap: Option<usize>,
    adaptive: bool,
    preserve: bool,
    start_chunk: Option<usize>,
    end_chunk: Option<usize>,
    save_cache: bool,
    load_cache: bool,
    cache_file: Option<PathBuf>,
}

struct DedupeOpts {
    entity_type: Option<String>,
    plan_only: bool,
    execute: bool,
    yes: bool,
    dry_run: bool,
    skip_backup: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Initialize tracing
    let base_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::from_default_env()
                .add_directive(base_level.into())
                .add_directive("quarry=debug".parse().unwrap()),
        )
        .init();

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Build {
            document,
            chunk_size,
            chunk_overlap,
            adaptive,
            workers,
            preserve,
            start_chunk,
            end_chunk,
            save_cache,
            load_cache,
            cache_file,
            model,
            global_timeout,
        } => {
            let mut config = config;
            if let Some(model) = model {
                config.llm.config.model = model;
            }
            if let Some(workers) = workers {
                config.extraction.workers = workers;
            }
            if let Some(secs) = global_timeout {
                config.extraction.global_timeout_secs = secs;
            }
            let opts = BuildOpts {
                chunk_size,
                chunk_overlap,
                adaptive,
                preserve,
                start_chunk,
                end_chunk,
                save_cache,
                load_cache,
                cache_file,
            };
            cmd_build(config, &document, opts).await
        }
        Commands::Dedupe {
            entity_type,
            labels: _,
            limit,
            model,
            plan_only,
            execute,
            yes,
            dry_run,
            skip_backup,
            plans_dir,
        } => {
            let mut config = config;
            if let Some(model) = model {
                config.llm.config.model = model;
            }
            if let Some(limit) = limit {
                config.dedup.entity_limit = limit;
            }
            if let Some(dir) = plans_dir {
                config.dedup.plans_dir = dir;
            }
            let opts = DedupeOpts {
                entity_type,
                plan_only,
                execute,
                yes,
                dry_run,
                skip_backup,
            };
            cmd_dedupe(config, opts).await
        }
        Commands::Execute {
            plan,
            yes,
            dry_run,
            skip_backup,
        } => cmd_execute(config, &plan, yes, dry_run, skip_backup).await,
        Commands::Stats => cmd_stats(config).await,
    }
}

async fn cmd_build(config: QuarryConfig, document: &Path, opts: BuildOpts) -> Result<()> {
    let doc = LoaderFactory::load(document)
        .await
        .with_context(|| format!("Failed to load {}", document.display()))?;
    info!(
        source = %doc.source,
        bytes = doc.size_bytes,
        format = ?doc.format,
        "document loaded"
    );

    let profile = if opts.adaptive {
        ChunkProfile::adaptive(doc.size_bytes)
    } else {
        let mut profile = ChunkProfile::default();
        if let Some(size) = opts.chunk_size {
            profile.chunk_size = size;
        }
        if let Some(overlap) = opts.chunk_overlap {
            profile.overlap = overlap;
        }
        profile
    };

    let mut chunks = split(&doc.text, &profile, Some(&doc.source))?;
    println!(
        "✓ {} chunks (size {}, overlap {})",
        chunks.len(),
        profile.chunk_size,
        profile.overlap
    );

    if opts.start_chunk.is_some() || opts.end_chunk.is_some() {
        let start = opts.start_chunk.unwrap_or(0);
        let end = opts.end_chunk.unwrap_or(usize::MAX);
        chunks.retain(|c| c.index >= start && c.index <= end);
        println!("✓ chunk range selected, {} kept", chunks.len());
    }
    if chunks.is_empty() {
        warn!("no chunks to extract, nothing to do");
        return Ok(());
    }

    let cache_file = opts
        .cache_file
        .unwrap_or_else(|| cache::cache_path(&config.extraction.cache_dir, document));

    let results = if opts.load_cache {
        cache::load(&cache_file)
            .with_context(|| format!("Failed to load cache {}", cache_file.display()))?
    } else {
        let llm = LlmFactory::connect_with_fallbacks(&config.llm).await?;
        let pipeline = ExtractionPipeline::new(llm, config.extraction.clone());
        let batch = pipeline.run(&chunks).await;
        println!(
            "✓ extraction: {}/{} chunks succeeded, {} empty, {} failed, {} cancelled",
            batch.summary.succeeded,
            batch.summary.total,
            batch.summary.empty,
            batch.summary.failed,
            batch.summary.cancelled
        );
        if opts.save_cache {
            // A cache write failure costs a rerun, not the graph
            match cache::save(&cache_file, &batch.results) {
                Ok(()) => println!("✓ cache saved to {}", cache_file.display()),
                Err(e) => warn!(error = %e, "failed to save extraction cache"),
            }
        }
        batch.results
    };

    let delta = merge(results.iter().flatten());
    if delta.is_empty() {
        warn!("extraction produced no entities or relationships");
        return Ok(());
    }
    println!(
        "✓ merged: {} entities, {} relationships",
        delta.entities.len(),
        delta.relationships.len()
    );

    let store = connect_store(&config).await?;
    let writer = GraphWriter::new(store);
    let summary = writer
        .apply(&delta, !opts.preserve)
        .await
        .context("Failed to write the graph")?;
    println!(
        "✓ graph updated: {} entities written ({} failed), {} relationships written ({} skipped, {} failed)",
        summary.entities_written,
        summary.entities_failed,
        summary.relationships_written,
        summary.relationships_skipped,
        summary.relationships_failed
    );
    Ok(())
}

async fn cmd_dedupe(config: QuarryConfig, opts: DedupeOpts) -> Result<()> {
    let store = connect_store(&config).await?;
    let llm = LlmFactory::connect_with_fallbacks(&config.llm).await?;

    let detector = DuplicateDetector::new(llm.clone(), store.clone(), config.dedup.clone());
    let groups = match &opts.entity_type {
        Some(label) => detector.detect_entity_duplicates(label).await?,
        None => detector.detect_label_duplicates().await?,
    };

    if groups.is_empty() {
        println!("No duplicates found.");
        return Ok(());
    }
    print_groups(&groups);

    if !opts.plan_only && !opts.execute {
        println!("\nRerun with --plan-only to save a resolution plan, or --execute to run one.");
        return Ok(());
    }

    let planner = ResolutionPlanner::new(llm, store.clone());
    let plan = match planner.build(&groups).await {
        Ok(plan) => plan,
        Err(e) if e.is_setup_error() => return Err(e.into()),
        Err(e) => {
            // A bad plan is discarded whole; the graph was not touched
            warn!(error = %e, "resolution planning failed, no plan produced");
            println!("Plan discarded: {e}");
            return Ok(());
        }
    };

    let path = plan
        .save(&config.dedup.plans_dir)
        .context("Failed to save the resolution plan")?;
    println!("✓ plan saved to {}", path.display());
    println!("\n{}", plan.render());

    if opts.plan_only {
        return Ok(());
    }

    run_plan(
        store,
        &config,
        &plan,
        opts.yes,
        opts.dry_run,
        opts.skip_backup,
    )
    .await
}

async fn cmd_execute(
    config: QuarryConfig,
    plan_path: &Path,
    yes: bool,
    dry_run: bool,
    skip_backup: bool,
) -> Result<()> {
    let plan = ResolutionPlan::load(plan_path)
        .with_context(|| format!("Failed to load plan {}", plan_path.display()))?;
    println!("{}", plan.render());

    let store = connect_store(&config).await?;
    run_plan(store, &config, &plan, yes, dry_run, skip_backup).await
}

async fn cmd_stats(config: QuarryConfig) -> Result<()> {
    let store = connect_store(&config).await?;
    let stats = GraphStatistics::collect(store.as_ref()).await?;
    println!("{}", stats.render());
    Ok(())
}

/// Execute a plan with the chosen approval policy and save the report.
async fn run_plan(
    store: Arc<dyn GraphStore>,
    config: &QuarryConfig,
    plan: &ResolutionPlan,
    yes: bool,
    dry_run: bool,
    skip_backup: bool,
) -> Result<()> {
    let policy: Arc<dyn ApprovalPolicy> = if yes {
        Arc::new(AutoApprove)
    } else {
        Arc::new(StdinApproval)
    };
    let executor = PlanExecutor::new(store, policy);
    let options = ExecutionOptions {
        dry_run,
        skip_backup,
    };

    let report = executor.execute(plan, &options).await?;
    println!("\n{}", report.render());

    let path = report
        .save(&config.dedup.plans_dir)
        .context("Failed to save the execution report")?;
    println!("✓ report saved to {}", path.display());

    if report.aborted {
        println!("Execution aborted before any changes.");
    }
    Ok(())
}

async fn connect_store(config: &QuarryConfig) -> Result<Arc<dyn GraphStore>> {
    let store = GraphStoreFactory::connect(&config.graph_store)
        .await
        .context("Failed to connect to the graph store")?;
    store
        .ping()
        .await
        .context("Graph store did not answer a ping")?;
    Ok(store)
}

/// Resolve configuration: explicit --config first, then ./quarry.toml, then
/// the user config dir, then environment variables.
fn load_config(explicit: Option<&Path>) -> Result<QuarryConfig> {
    if let Some(path) = explicit {
        return QuarryConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()));
    }

    let local = Path::new("quarry.toml");
    if local.exists() {
        return QuarryConfig::from_file(local).context("Failed to load ./quarry.toml");
    }

    if let Some(dir) = dirs::config_dir() {
        let user = dir.join("quarry").join("config.toml");
        if user.exists() {
            return QuarryConfig::from_file(&user)
                .with_context(|| format!("Failed to load config {}", user.display()));
        }
    }

    Ok(QuarryConfig::from_env())
}

fn print_groups(groups: &[DuplicateGroup]) {
    println!("Found {} duplicate group(s):\n", groups.len());
    for (i, group) in groups.iter().enumerate() {
        let confidence = format!("{:?}", group.confidence).to_lowercase();
        println!(
            "{}. [{} confidence] {}",
            i + 1,
            confidence,
            group.names.join(", ")
        );
        if let Some(entity_type) = &group.entity_type {
            println!("   label: {entity_type}");
        }
        if let Some(target) = &group.merge_target {
            println!("   suggested target: {target}");
        }
        if !group.reasoning.is_empty() {
            println!("   reasoning: {}", group.reasoning);
        }
        if let Some(risk) = &group.risk {
            println!("   risk: {risk}");
        }
    }
}

/// Interactive y/n prompts on stdin. Anything but an explicit yes declines,
/// including EOF, so a closed stdin never approves a merge.
struct StdinApproval;

impl ApprovalPolicy for StdinApproval {
    fn approve(&self, request: &ApprovalRequest<'_>) -> bool {
        match request {
            ApprovalRequest::ValidationPasses { description } => {
                println!("\nValidation: {description}");
                ask("Does this validation pass? (y/n): ")
            }
            ApprovalRequest::RunOperation { description } => {
                println!("\nOperation: {description}");
                ask("Do you want to proceed with this operation? (y/n): ")
            }
            ApprovalRequest::CreateBackup => {
                ask("Create a database backup before proceeding? (recommended) (y/n): ")
            }
            ApprovalRequest::ProceedWithoutBackup => {
                ask("Backup failed or unavailable. Proceed anyway? (y/n): ")
            }
        }
    }
}

fn ask(question: &str) -> bool {
    print!("{question}");
    if io::stdout().flush().is_err() {
        return false;
    }
    let mut answer = String::new();
    match io::stdin().read_line(&mut answer) {
        Ok(0) => false,
        Ok(_) => matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"),
        Err(_) => false,
    }
}
