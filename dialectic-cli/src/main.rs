//! Dialectic batch CLI
//!
//! Runs the nightly reconciliation job against a JSON graph snapshot.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use dialectic_core::{ArgumentGraph, EngineConfig, EscrowStatus};
use dialectic_engine::{track_components, StageSummary};
use dialectic_runtime::{BatchOrchestrator, BatchReport};
use dialectic_store::{GraphSnapshot, MemoryStore};

#[derive(Parser)]
#[command(name = "dialectic-batch")]
#[command(author, version, about = "Dialectic: nightly argument graph reconciliation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbosity level (0-3)
    #[arg(short, long, default_value = "1")]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one batch against a snapshot
    Run {
        /// Graph snapshot (JSON)
        #[arg(short, long, env = "DIALECTIC_SNAPSHOT")]
        snapshot: PathBuf,

        /// Where to write the updated snapshot (default: overwrite input)
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Engine config (TOML)
        #[arg(short, long, env = "DIALECTIC_CONFIG")]
        config: Option<PathBuf>,

        /// Clock for escrow expiry and maturity (RFC 3339, default: now)
        #[arg(long)]
        now: Option<String>,

        /// Also print the full run report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show component statistics without writing anything
    Stats {
        /// Graph snapshot (JSON)
        #[arg(short, long, env = "DIALECTIC_SNAPSHOT")]
        snapshot: PathBuf,

        /// Engine config (TOML)
        #[arg(short, long, env = "DIALECTIC_CONFIG")]
        config: Option<PathBuf>,
    },

    /// Print the effective engine config as TOML
    Config {
        /// Engine config (TOML)
        #[arg(short, long, env = "DIALECTIC_CONFIG")]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => Level::ERROR,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    match cli.command {
        Commands::Run {
            snapshot,
            out,
            config,
            now,
            json,
        } => {
            run_batch(&snapshot, out, config.as_deref(), now.as_deref(), json).await?;
        }
        Commands::Stats { snapshot, config } => {
            show_stats(&snapshot, config.as_deref())?;
        }
        Commands::Config { config } => {
            let config = load_config(config.as_deref())?;
            print!("{}", config.to_toml_string()?);
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => Ok(EngineConfig::default()),
    }
}

fn parse_now(now: Option<&str>) -> Result<DateTime<Utc>> {
    match now {
        Some(raw) => Ok(DateTime::parse_from_rfc3339(raw)
            .with_context(|| format!("Invalid --now timestamp: {}", raw))?
            .with_timezone(&Utc)),
        None => Ok(Utc::now()),
    }
}

async fn run_batch(
    snapshot_path: &Path,
    out: Option<PathBuf>,
    config_path: Option<&Path>,
    now: Option<&str>,
    json: bool,
) -> Result<()> {
    println!("⚖️  Dialectic nightly batch\n");

    let config = load_config(config_path)?;
    let now = parse_now(now)?;
    let snapshot = GraphSnapshot::load(snapshot_path)
        .with_context(|| format!("Failed to load snapshot {}", snapshot_path.display()))?;

    println!(
        "📂 Snapshot: {} ({} nodes, {} schemes, {} edges)",
        snapshot_path.display(),
        snapshot.nodes.len(),
        snapshot.schemes.len(),
        snapshot.edges.len()
    );
    println!("🕐 Clock: {}\n", now.to_rfc3339());

    let store = Arc::new(MemoryStore::from_snapshot(snapshot));
    let orchestrator = BatchOrchestrator::new(store.clone(), config);

    let report = orchestrator
        .run_at(now, |pct| println!("   ⏳ {:>3}%", pct))
        .await?;

    print_report(&report);
    if json {
        println!("\n{}", serde_json::to_string_pretty(&report)?);
    }

    let out = out.unwrap_or_else(|| snapshot_path.to_path_buf());
    store.to_snapshot().save(&out)?;
    println!("\n✅ Batch complete");
    println!("📄 Snapshot saved to: {}", out.display());

    Ok(())
}

fn print_report(report: &BatchReport) {
    println!("\n📊 Run {}", report.run_id);
    for stage in &report.stages {
        let line = match &stage.summary {
            StageSummary::Components {
                components,
                largest,
                escrows_opened,
            } => format!(
                "{} components (largest {}), {} escrows opened",
                components, largest, escrows_opened
            ),
            StageSummary::EvidenceRank(rank) => format!(
                "{} relations, {} rounds, {} defeated{}",
                rank.relations,
                rank.rounds.len(),
                rank.defeated,
                if rank.defeat_set_stable { "" } else { " (defeat set unstable)" }
            ),
            StageSummary::Defeat {
                newly_defeated,
                dependents_notified,
            } => format!(
                "{} newly defeated, {} dependents notified",
                newly_defeated, dependents_notified
            ),
            StageSummary::Karma { authors, emitted } => {
                format!("{:.4} karma to {} authors", emitted, authors)
            }
            StageSummary::Escrow {
                stolen,
                languished,
                paid,
            } => format!("{} paid, {} stolen, {} languished", paid, stolen, languished),
            StageSummary::SourceReputation {
                sources,
                weights_rewritten,
            } => format!("{} sources, {} fact weights rewritten", sources, weights_rewritten),
        };
        println!("   {:<18} {}", stage.name, line);
    }

    let failed = report.notifications_failed();
    println!(
        "📨 Notifications: {} sent{}",
        report.notifications_sent(),
        if failed > 0 {
            format!(", ⚠️  {} failed", failed)
        } else {
            String::new()
        }
    );
}

fn show_stats(snapshot_path: &Path, config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let snapshot = GraphSnapshot::load(snapshot_path)
        .with_context(|| format!("Failed to load snapshot {}", snapshot_path.display()))?;

    let pending = snapshot
        .schemes
        .iter()
        .filter(|s| s.escrow_status == EscrowStatus::Pending)
        .count();
    let resolved = snapshot
        .schemes
        .iter()
        .filter(|s| s.escrow_status.is_resolved())
        .count();
    let graph = ArgumentGraph::new(snapshot.nodes, snapshot.schemes, snapshot.edges);
    let index = graph.index();
    let outcome = track_components(&graph, &index, &config, Utc::now());

    println!("📊 Graph stats for {}\n", snapshot_path.display());
    println!("   Nodes: {}", graph.nodes.len());
    println!("   Schemes: {}", graph.schemes.len());
    println!("   Edges: {}", graph.edges.len());
    if index.dangling_edges > 0 {
        println!("   ⚠️  Dangling edges: {}", index.dangling_edges);
    }
    println!("   Components: {}", outcome.component_count());
    println!("   Largest component: {}", outcome.largest());
    println!("   Candidate bridges: {}", outcome.bridges.len());
    println!("   Pending escrows: {}", pending);
    println!("   Resolved escrows: {}", resolved);

    Ok(())
}
