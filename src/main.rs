use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use parish_organizer::{
    export_summary, load_roster, Config, HierarchyBuilder, HierarchyLevel, Organizer,
};

/// Sort scanned files into Archdeaconry / Parish / Sub-Parish / Individual folders
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// TOML config file
    #[arg(short, long, env = "PARISH_ORGANIZER_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Place roster files (default)
    Organize(CommonArgs),

    /// Build or refresh the hierarchy cache and print a summary
    Hierarchy {
        #[command(flatten)]
        common: CommonArgs,

        /// Write the Archdeaconry / Parish / Sub-Parish table to this CSV
        #[arg(long)]
        export: Option<PathBuf>,
    },
}

#[derive(Args, Default)]
struct CommonArgs {
    /// Roster CSV (Individual Name, Parish Name[, File])
    #[arg(long, env = "PARISH_ORGANIZER_ROSTER")]
    roster: Option<PathBuf>,

    /// Root of the hierarchy
    #[arg(long, env = "PARISH_ORGANIZER_BASE_DIR")]
    base_dir: Option<PathBuf>,

    /// Placement root (defaults to base dir)
    #[arg(long)]
    dest_dir: Option<PathBuf>,

    /// Directory holding the files named in the roster
    #[arg(long)]
    inbox_dir: Option<PathBuf>,

    #[arg(long)]
    cache_file: Option<PathBuf>,

    #[arg(long)]
    ledger_file: Option<PathBuf>,

    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Minimum similarity (0-1) for a folder match
    #[arg(long)]
    threshold: Option<f64>,

    /// Rebuild the hierarchy cache
    #[arg(long)]
    force_refresh: bool,

    /// Rebuild the cache if the directory layout changed
    #[arg(long)]
    verify_freshness: bool,
}

impl CommonArgs {
    fn apply(self, config: &mut Config) {
        if let Some(v) = self.roster {
            config.roster_file = v;
        }
        if let Some(v) = self.base_dir {
            config.base_dir = v;
        }
        if let Some(v) = self.dest_dir {
            config.dest_base_dir = Some(v);
        }
        if let Some(v) = self.inbox_dir {
            config.inbox_dir = Some(v);
        }
        if let Some(v) = self.cache_file {
            config.hierarchy_cache_file = v;
        }
        if let Some(v) = self.ledger_file {
            config.processed_individuals_file = v;
        }
        if let Some(v) = self.log_file {
            config.log_file = Some(v);
        }
        if let Some(v) = self.threshold {
            config.match_threshold = v;
        }
        config.force_refresh |= self.force_refresh;
        config.verify_freshness |= self.verify_freshness;
    }
}

/// What to run once the configuration is settled
enum Action {
    Organize,
    Hierarchy { export: Option<PathBuf> },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_file = cli.config.clone();
    let (action, config) = resolve(cli)?;

    init_tracing(&config)?;
    if let Some(path) = config_file {
        tracing::info!("Loaded config from {}", path.display());
    }

    match action {
        Action::Organize => run_organize(config),
        Action::Hierarchy { export } => run_hierarchy(config, export),
    }
}

/// Config file (if any), then command-line overrides, then validation
fn resolve(cli: Cli) -> Result<(Action, Config)> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };

    let command = cli
        .command
        .unwrap_or_else(|| Command::Organize(CommonArgs::default()));

    let action = match command {
        Command::Organize(common) => {
            common.apply(&mut config);
            Action::Organize
        }
        Command::Hierarchy { common, export } => {
            common.apply(&mut config);
            Action::Hierarchy { export }
        }
    };

    config.validate()?;
    Ok((action, config))
}

fn init_tracing(config: &Config) -> Result<()> {
    let file_layer = match &config.log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file: {}", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Arc::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "parish_organizer=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    Ok(())
}

fn run_organize(config: Config) -> Result<()> {
    println!("📂 Organizing scans");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    // 1. Roster
    println!("\n📋 Reading roster...");
    let roster = load_roster(&config.roster_file)?;
    println!(
        "✓ {} rows ({} rejected)",
        roster.rows.len(),
        roster.rejected.len()
    );

    // 2. Hierarchy + ledger
    println!("\n🌳 Loading hierarchy...");
    let mut organizer = Organizer::open(config)?;
    println!(
        "✓ {} folders in hierarchy, {} individuals already processed",
        organizer.cache().len(),
        organizer.ledger().len()
    );

    // 3. Place
    println!("\n📦 Placing files...");
    let report = organizer.run_roster(&roster)?;
    organizer.finish()?;

    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("✅ {}", report.summary());
    for (parish, count) in &report.parishes_not_found {
        println!("⚠️  Parish not found: {} ({} rows)", parish, count);
    }

    Ok(())
}

fn run_hierarchy(config: Config, export: Option<PathBuf>) -> Result<()> {
    let builder = HierarchyBuilder::new();
    let cache = builder.load_or_build(
        &config.hierarchy_cache_file,
        &config.base_dir,
        config.force_refresh,
        config.verify_freshness,
    )?;

    println!("🌳 Hierarchy under {}", cache.base_dir.display());
    for (level, count) in cache.level_counts() {
        println!("   {:<13} {}", level.as_str(), count);
    }
    if !builder.is_fresh(&cache) {
        println!("⚠️  Directory layout changed since the cache was built (use --force-refresh)");
    }

    let export = export.or(config.hierarchy_export_file);
    if let Some(path) = export {
        let rows = export_summary(&cache, &path)?;
        println!("✓ Wrote {} rows to {}", rows, path.display());
    }

    let individuals = cache.nodes_at(HierarchyLevel::Individual).count();
    if individuals == 0 {
        eprintln!("❌ No individual folders found under {}", config.base_dir.display());
        std::process::exit(1);
    }

    Ok(())
}
