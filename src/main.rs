//! Harvestman main entry point
//!
//! Command-line interface for the crawl-and-extract engine.

use clap::Parser;
use harvestman::config::{load_config_with_hash, ConfigFile};
use harvestman::crawler::{start_crawl, RunStatus};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Harvestman: a configurable crawl-and-extract engine
///
/// Harvestman walks hyperlinks from a seed URL under depth and
/// domain-scope constraints, builds a link graph, and applies
/// selector-based extraction rules to every fetched page.
#[derive(Parser, Debug)]
#[command(name = "harvestman")]
#[command(version)]
#[command(about = "A configurable crawl-and-extract engine", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Seed URL (overrides the one in the config file)
    #[arg(short, long)]
    seed: Option<String>,

    /// Write the full result snapshot as JSON to this path
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be crawled without crawling
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    let seed = cli
        .seed
        .clone()
        .or_else(|| config.seed.clone())
        .ok_or("no seed URL: set `seed` in the config file or pass --seed")?;

    if cli.dry_run {
        handle_dry_run(&config, &seed)?;
    } else {
        handle_crawl(config, config_hash, seed, cli.output).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("harvestman=info,warn"),
            1 => EnvFilter::new("harvestman=debug,info"),
            2 => EnvFilter::new("harvestman=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &ConfigFile, seed: &str) -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Harvestman Dry Run ===\n");

    println!("Seed: {}", seed);

    println!("\nCrawl Settings:");
    println!("  Max depth: {}", config.crawl.max_depth);
    println!("  Scope: {:?}", config.crawl.scope);
    if !config.crawl.allowed_hosts.is_empty() {
        println!("  Extra allowed hosts:");
        for host in &config.crawl.allowed_hosts {
            println!("    - {}", host);
        }
    }
    println!("  Workers: {}", config.crawl.max_concurrency);
    println!("  Per-host delay: {}ms", config.crawl.per_host_delay_ms);
    println!("  Request timeout: {}s", config.crawl.request_timeout_secs);
    println!("  Follow redirects: {}", config.crawl.follow_redirects);
    println!("  User agent: {}", config.crawl.user_agent);
    if config.crawl.rotate_user_agents {
        println!("  (rotating through browser user agents)");
    }

    println!("\nExtraction Rules ({}):", config.rules.len());
    for rule in &config.rules {
        let target = rule
            .attribute
            .as_deref()
            .map(|a| format!("@{}", a))
            .unwrap_or_else(|| "text".to_string());
        println!(
            "  - {} <- {:?} `{}` ({}{})",
            rule.field_name,
            rule.kind,
            rule.selector,
            target,
            if rule.multiple { ", all matches" } else { "" }
        );
    }

    println!("\n✓ Configuration is valid");
    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(
    config: ConfigFile,
    config_hash: String,
    seed: String,
    output: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let handle = Arc::new(start_crawl(&seed, config.crawl.clone(), &config.rules)?);

    // Cancel cleanly on Ctrl-C; a second interrupt kills the process
    let interrupt = tokio::spawn({
        let handle = handle.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupt received, cancelling crawl");
                handle.cancel();
            }
        }
    });

    let ticker = tokio::spawn({
        let handle = handle.clone();
        async move {
            let mut interval = tokio::time::interval(Duration::from_secs(5));
            interval.tick().await;
            loop {
                interval.tick().await;
                let p = handle.progress();
                if p.status != RunStatus::Running {
                    break;
                }
                tracing::info!(
                    "Progress: {} fetched, {} failed, {} queued, {} in flight",
                    p.fetched,
                    p.failed,
                    p.queued,
                    p.in_flight
                );
            }
        }
    });

    let status = handle.wait().await;
    interrupt.abort();
    ticker.abort();

    let progress = handle.progress();
    println!("\n=== Crawl {} ===", status);
    println!("  Pages discovered: {}", progress.discovered);
    println!("  Pages fetched:    {}", progress.fetched);
    println!("  Pages failed:     {}", progress.failed);
    println!("  Records extracted: {}", handle.records().len());

    if let Some(path) = output {
        let snapshot = handle.export_snapshot(Some(config_hash));
        let json = serde_json::to_string_pretty(&snapshot)?;
        std::fs::write(&path, json)?;
        println!("\n✓ Snapshot written to: {}", path.display());
    }

    Ok(())
}
