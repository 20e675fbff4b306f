//! Command-line front end for the feature history engine

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rk_history::document;
use rk_history::{Engine, EngineConfig, FeatureId, PreviewKernel, RegenerationResult};

#[derive(Parser)]
#[command(name = "rk-history", about = "Inspect and regenerate RK feature histories")]
struct Cli {
    /// Engine configuration file (RON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose debug output
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print features in regeneration order
    Show {
        /// Document file (.json or .ron)
        doc: PathBuf,
    },

    /// Regenerate a document with the preview kernel
    Regen {
        /// Document file (.json or .ron)
        doc: PathBuf,

        /// Only regenerate these features and their dependents
        #[arg(long = "feature")]
        features: Vec<String>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Re-encode a document; the format follows each file extension
    Convert {
        input: PathBuf,
        output: PathBuf,
    },

    /// List the branches stored in one or more documents
    Branches {
        /// Document files; the first one is the active branch
        #[arg(required = true)]
        docs: Vec<PathBuf>,
    },
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| "rk_history=info".into())
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(false),
        )
        .init();
}

fn load_config(cli: &Cli) -> Result<EngineConfig> {
    match &cli.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => Ok(EngineConfig::default()),
    }
}

fn open_engine(cli: &Cli, path: &Path) -> Result<Engine> {
    let config = load_config(cli)?;
    Engine::open(config, Arc::new(PreviewKernel::new()), path)
        .with_context(|| format!("failed to open {}", path.display()))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Commands::Show { doc } => cmd_show(&cli, doc),
        Commands::Regen {
            doc,
            features,
            json,
        } => cmd_regen(&cli, doc, features, *json),
        Commands::Convert { input, output } => cmd_convert(input, output),
        Commands::Branches { docs } => cmd_branches(&cli, docs),
    }
}

fn cmd_show(cli: &Cli, path: &Path) -> Result<()> {
    let engine = open_engine(cli, path)?;
    let store = engine.store();
    let order = store
        .graph()
        .full_order()
        .context("document graph is not acyclic")?;

    println!(
        "branch {} ({} features)",
        engine.active_branch().id(),
        store.len()
    );
    for id in &order {
        let Some(node) = store.get(id) else {
            continue;
        };
        let parents = store
            .parents_of(id)
            .unwrap_or_default()
            .iter()
            .map(FeatureId::as_str)
            .collect::<Vec<_>>()
            .join(", ");

        let mut flags = Vec::new();
        if node.feature.suppressed {
            flags.push("suppressed");
        }
        if !store.is_active(id) {
            flags.push("rolled back");
        }

        println!(
            "{:<12} {:<18} {:<20} parents: [{}]{}",
            id,
            node.feature.feature_type(),
            node.feature.name,
            parents,
            if flags.is_empty() {
                String::new()
            } else {
                format!(" ({})", flags.join(", "))
            }
        );
    }
    Ok(())
}

fn cmd_regen(cli: &Cli, path: &Path, features: &[String], json: bool) -> Result<()> {
    let mut engine = open_engine(cli, path)?;

    let scope: Option<HashSet<FeatureId>> = if features.is_empty() {
        None
    } else {
        Some(features.iter().map(|f| FeatureId::from(f.as_str())).collect())
    };
    let result = engine
        .request_regenerate(scope.as_ref())
        .context("regeneration failed")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_result(&engine, &result);
    }
    Ok(())
}

fn print_result(engine: &Engine, result: &RegenerationResult) {
    println!(
        "regenerated {} feature(s), {} error(s), {} skipped in {} ms",
        result.regenerated.len(),
        result.errors.len(),
        result.skipped.len(),
        result.elapsed.as_millis()
    );
    for id in engine.store().ids() {
        if result.regenerated.contains(id) {
            println!("  ok       {id}");
        } else if let Some(err) = result.error_for(id) {
            let status = if err.is_blocked() { "blocked" } else { "error" };
            println!("  {status:<8} {id}: {err}");
        } else if result.skipped.contains(id) {
            println!("  skipped  {id}");
        }
    }
    if result.cancelled {
        println!("  (cancelled)");
    }
}

fn cmd_convert(input: &Path, output: &Path) -> Result<()> {
    let doc = document::load(input).with_context(|| format!("failed to read {}", input.display()))?;
    // Refuse to re-encode a document that would not import
    document::import(doc.clone()).with_context(|| format!("invalid document {}", input.display()))?;
    document::save(&doc, output).with_context(|| format!("failed to write {}", output.display()))?;
    tracing::info!("Converted {} -> {}", input.display(), output.display());
    Ok(())
}

fn cmd_branches(cli: &Cli, docs: &[PathBuf]) -> Result<()> {
    let Some((first, rest)) = docs.split_first() else {
        return Ok(());
    };
    let mut engine = open_engine(cli, first)?;
    for path in rest {
        engine
            .load(path)
            .with_context(|| format!("failed to load {}", path.display()))?;
    }

    let active = engine.active_branch().id().to_owned();
    for meta in engine.list_branches() {
        let count = engine
            .branches()
            .get(&meta.branch_id)
            .map_or(0, |branch| branch.store().len());
        let marker = if meta.branch_id == active { '*' } else { ' ' };
        println!(
            "{marker} {:<16} {:<12} {:>3} features  created {}  {}",
            meta.branch_id,
            meta.author,
            count,
            meta.created_at.format("%Y-%m-%d %H:%M"),
            meta.description
        );
    }
    Ok(())
}
