//! ScanLab CLI — watchlist runs and cache management.
//!
//! Commands:
//! - `run` — scan, rank, and write the watchlist artifacts
//! - `cache status` — report cached bar/curve/float file counts and size
//! - `cache clean` — remove every cached file

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use scanlab_core::calendar::{market_phase, UsEquityCalendar};
use scanlab_runner::config::{ConfigFile, ProfileRequest, ResolvedConfig};
use scanlab_runner::pipeline::{select_profile, PipelineEnv};
use scanlab_runner::providers::fixture::FixtureSource;
use scanlab_runner::providers::float::{FloatProvider, FmpFloatProvider};
use scanlab_runner::providers::news::{FmpNewsProvider, NewsProvider};
use scanlab_runner::run::{execute, RunOutcome};
use scanlab_runner::BarCache;

#[derive(Parser)]
#[command(name = "scanlab", about = "ScanLab — intraday momentum watchlist")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan, rank, and write the watchlist artifacts.
    Run {
        /// Path to a TOML config file.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Profile: auto, pre, or open.
        #[arg(long, default_value = "auto")]
        profile: String,

        /// JSON fixture to use as the market data source.
        #[arg(long)]
        fixture: PathBuf,

        /// Output directory for watchlist.json and the import list.
        #[arg(long, default_value = "out")]
        out_dir: PathBuf,

        /// Cache directory. Defaults to the config's cache_dir.
        #[arg(long)]
        cache_dir: Option<PathBuf>,
    },
    /// Cache management commands.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Report cached file counts and total size.
    Status {
        /// Cache directory.
        #[arg(long, default_value = "cache")]
        cache_dir: PathBuf,
    },
    /// Remove every cached file.
    Clean {
        /// Cache directory.
        #[arg(long, default_value = "cache")]
        cache_dir: PathBuf,

        /// Actually delete (without this flag, only reports what is there).
        #[arg(long, default_value_t = false)]
        confirm: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            profile,
            fixture,
            out_dir,
            cache_dir,
        } => run_cmd(config, &profile, &fixture, &out_dir, cache_dir),
        Commands::Cache { action } => match action {
            CacheAction::Status { cache_dir } => cache_status_cmd(&cache_dir),
            CacheAction::Clean { cache_dir, confirm } => cache_clean_cmd(&cache_dir, confirm),
        },
    }
}

fn run_cmd(
    config_path: Option<PathBuf>,
    profile_arg: &str,
    fixture_path: &Path,
    out_dir: &Path,
    cache_dir: Option<PathBuf>,
) -> Result<()> {
    let request = ProfileRequest::parse(profile_arg)?;

    let file = config_path
        .map(|p| ConfigFile::load(&p))
        .transpose()?;

    let market = FixtureSource::load(fixture_path)
        .with_context(|| format!("failed to load fixture {}", fixture_path.display()))?;

    let now = Utc::now();
    let phase = market_phase(now, &UsEquityCalendar);
    let profile = select_profile(request, phase);
    let config = ResolvedConfig::resolve(file, profile)?;

    let cache_root = cache_dir.unwrap_or_else(|| PathBuf::from(&config.cache_dir));
    let cache = BarCache::open(&cache_root)?;

    let float_provider = api_key(&config.float.api_key_env)
        .filter(|_| config.float.enabled)
        .map(FmpFloatProvider::new);
    let news_provider = api_key(&config.news.api_key_env)
        .filter(|_| config.news.enabled)
        .map(FmpNewsProvider::new);

    let env = PipelineEnv {
        market: &market,
        float_provider: float_provider
            .as_ref()
            .map(|p| p as &dyn FloatProvider),
        news_provider: news_provider.as_ref().map(|p| p as &dyn NewsProvider),
        cache: &cache,
        calendar: &UsEquityCalendar,
    };

    let outcome = execute(&config, &env, now, out_dir)?;
    print_summary(&outcome);
    Ok(())
}

fn api_key(env_var: &str) -> Option<String> {
    std::env::var(env_var).ok().filter(|k| !k.is_empty())
}

fn cache_status_cmd(cache_dir: &Path) -> Result<()> {
    if !cache_dir.exists() {
        println!("Cache directory does not exist: {}", cache_dir.display());
        return Ok(());
    }
    let cache = BarCache::open(cache_dir)?;
    let status = cache.status()?;

    println!("Cache: {}", cache_dir.display());
    println!("Bar files:    {}", status.bar_files);
    println!("Curve files:  {}", status.curve_files);
    println!("Float files:  {}", status.float_files);
    println!("Symbols seen: {}", status.symbols_seen);
    println!("Total size:   {}", format_size(status.total_bytes));
    Ok(())
}

fn cache_clean_cmd(cache_dir: &Path, confirm: bool) -> Result<()> {
    if !cache_dir.exists() {
        println!("Cache directory does not exist: {}", cache_dir.display());
        return Ok(());
    }
    let cache = BarCache::open(cache_dir)?;
    let status = cache.status()?;
    let files = status.bar_files + status.curve_files + status.float_files;

    if files == 0 {
        println!("Cache is empty: {}", cache_dir.display());
        return Ok(());
    }

    println!(
        "{} cached file(s), {} total.",
        files,
        format_size(status.total_bytes)
    );
    if !confirm {
        println!("Dry run — pass --confirm to actually delete.");
        return Ok(());
    }

    cache.clear()?;
    println!("Done. Removed {files} file(s).");
    Ok(())
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

fn print_summary(outcome: &RunOutcome) {
    let p = &outcome.payload;
    println!();
    println!("=== Watchlist Run ===");
    println!("Run id:         {}", p.run_id);
    println!("Generated:      {} ET", p.generated_exchange_local);
    println!("Market phase:   {}", p.market_phase);
    println!("Profile:        {}", p.config.profile);
    if p.fallback_used {
        println!(
            "FALLBACK:       {}",
            p.fallback_reason.as_deref().unwrap_or("unknown")
        );
    }
    println!();
    println!("--- Funnel ---");
    println!("Raw candidates: {}", p.scan.raw_candidates);
    if p.scan.parse_errors > 0 {
        println!("Parse errors:   {}", p.scan.parse_errors);
    }
    if p.scan.excluded_otc_pink > 0 {
        println!("OTC excluded:   {}", p.scan.excluded_otc_pink);
    }
    println!("Scan:           {}", p.scan.counts.scan);
    println!("Prelim:         {}", p.scan.counts.prelim);
    println!("Filtered:       {}", p.scan.counts.filtered);
    println!("Final:          {}", p.scan.counts.final_count);
    println!("News:           {}", p.news.status);
    println!();

    if p.symbols.is_empty() {
        println!("No candidates.");
    } else {
        println!(
            "{:<8} {:<14} {:>8} {:>8} {:>7} {:>6} {:>6}",
            "Symbol", "TV", "Last", "Chg%", "RVOL", "Grade", "Score"
        );
        println!("{}", "-".repeat(64));
        for row in &p.symbols {
            println!(
                "{:<8} {:<14} {:>8} {:>8} {:>7} {:>6} {:>6}",
                row.symbol,
                row.tv_symbol,
                fmt_opt(row.last, 2),
                fmt_opt(row.change_pct, 1),
                fmt_opt(row.rvol, 1),
                row.grade.map(|g| g.to_string()).unwrap_or_default(),
                fmt_opt(row.score, 2),
            );
        }
    }
    println!();
    println!("Watchlist:      {}", outcome.json_path.display());
    println!("Import list:    {}", outcome.txt_path.display());
}

fn fmt_opt(v: Option<f64>, decimals: usize) -> String {
    match v {
        Some(v) => format!("{v:.decimals$}"),
        None => "-".to_string(),
    }
}
