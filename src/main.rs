//! Craftplan - Entry Point
//!
//! Command-line front end: loads the catalog and settings, plans a target
//! item and prints the ranked strategies.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};

use craftplan::data::{default_data_dir, export_default_data, read_ron, DataManager};
use craftplan::pricing::{Listing, MarketSource, NoMarket, StaticMarket, StaticPriceOracle, REFERENCE_CURRENCY};
use craftplan::{CraftingEngine, Objective, RiskTolerance};

/// Crafting strategy planner
#[derive(Parser)]
#[command(name = "craftplan")]
#[command(about = "Simulate and rank crafting strategies", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Plan a target item and print ranked strategies
    Plan(PlanArgs),

    /// Write the built-in catalog and settings as RON files
    ExportData {
        /// Output directory (defaults to the data directory)
        #[arg(long)]
        dir: Option<PathBuf>,
    },
}

#[derive(Args)]
struct PlanArgs {
    /// Target item spec (JSON or RON)
    #[arg(long)]
    target: PathBuf,

    /// Directory holding catalog.ron / engine.ron
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Seed for reproducible runs
    #[arg(long)]
    seed: Option<u64>,

    /// Trials per strategy
    #[arg(long)]
    iterations: Option<usize>,

    /// cost, success_rate, time or profit
    #[arg(long)]
    optimize_for: Option<Objective>,

    /// low, medium or high
    #[arg(long)]
    risk: Option<RiskTolerance>,

    /// Refinement generations (0 = heuristics only)
    #[arg(long)]
    generations: Option<usize>,

    /// Favour guaranteed actions at similar cost
    #[arg(long)]
    prefer_deterministic: bool,

    /// Price table: RON or JSON map of currency id to price in exalted
    #[arg(long)]
    prices: Option<PathBuf>,

    /// Known market price of the finished item, in exalted
    #[arg(long)]
    market_price: Option<f64>,

    /// Print the best strategy as a JSON report
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    // Logs go to stderr so reports on stdout stay clean
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    log::info!("Starting Craftplan v{}", env!("CARGO_PKG_VERSION"));

    let cli = Cli::parse();
    match cli.command {
        Command::Plan(args) => plan(args),
        Command::ExportData { dir } => {
            let dir = dir.unwrap_or_else(default_data_dir);
            export_default_data(&dir)?;
            println!("Wrote default data to {}", dir.display());
            Ok(())
        }
    }
}

fn load_prices(path: &Path) -> Result<StaticPriceOracle> {
    let prices: HashMap<String, f64> = if path.extension().is_some_and(|e| e == "json") {
        let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?
    } else {
        read_ron(path)?
    };
    Ok(StaticPriceOracle::from_prices(prices))
}

fn plan(args: PlanArgs) -> Result<()> {
    let data = match &args.data_dir {
        Some(dir) => DataManager::load_from(dir),
        None => DataManager::new(),
    };

    let mut config = data.engine.clone();
    if let Some(seed) = args.seed {
        config = config.with_seed(seed);
    }
    if let Some(iterations) = args.iterations {
        if iterations == 0 {
            bail!("--iterations must be positive");
        }
        config.sim.iterations = iterations;
    }
    if let Some(objective) = args.optimize_for {
        config.optimizer.optimize_for = objective;
    }
    if let Some(risk) = args.risk {
        config.optimizer.risk_tolerance = risk;
    }
    if let Some(generations) = args.generations {
        config.optimizer.generations = generations;
    }
    config.optimizer.prefer_deterministic |= args.prefer_deterministic;

    let oracle = match &args.prices {
        Some(path) => load_prices(path)?,
        None => StaticPriceOracle::new(),
    };
    let market: Arc<dyn MarketSource> = match args.market_price {
        Some(price) => Arc::new(StaticMarket::new(vec![Listing::new(price, REFERENCE_CURRENCY)])),
        None => Arc::new(NoMarket),
    };

    let optimizer_config = config.optimizer.clone();
    let engine = CraftingEngine::new(data.catalog, Arc::new(oracle), market, config)?;

    let text = fs::read_to_string(&args.target)
        .with_context(|| format!("reading target {}", args.target.display()))?;
    let target = engine.parse_target(&text)?;
    let set = engine.generate_strategies(&target, &optimizer_config)?;

    if args.json {
        let Some(best) = set.best() else {
            bail!(
                "no strategy found: {}",
                set.reason.as_deref().unwrap_or("no candidates")
            );
        };
        println!("{}", engine.export_report(best).to_json()?);
    } else {
        print!("{}", set.to_text());
    }

    log::info!("Craftplan finished");
    Ok(())
}
