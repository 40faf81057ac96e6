use std::path::PathBuf;
use std::process::ExitCode;

use proxy_finder_rs::config::{DiscoveryConfig, ValidationTargets};
use proxy_finder_rs::{output, ports, Discovery, ScanMode};

use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// proxy-finder-rs — find public HTTP forward proxies by sampling the IPv4 space.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "proxy-finder-rs",
    version,
    about = "Find public HTTP forward proxies by sampling the IPv4 space.",
    long_about = None
)]
struct Cli {
    /// How many proxies to find.
    #[arg(short = 'c', long, default_value_t = 1)]
    count: usize,

    /// `fast` tries the well-known proxy ports only; `all` also sweeps 1-65535.
    #[arg(short = 'm', long, value_enum, default_value_t = ScanMode::Fast)]
    mode: ScanMode,

    /// Write found proxies as a JSON array to this path.
    #[arg(short = 'o', long, default_value = "proxies.json")]
    output: PathBuf,

    /// Also append `http://ip:port#cc#google=..#cloudflare=..` lines to this file.
    #[arg(long = "log-file")]
    log_file: Option<PathBuf>,

    /// Replace the well-known port list (one port or range per line).
    #[arg(long)]
    ports: Option<PathBuf>,

    /// Max workers running at once.
    #[arg(
        long,
        default_value_t = 64,
        value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..)
    )]
    concurrency: usize,

    /// Give up a worker after sampling this many addresses.
    #[arg(long = "max-attempts")]
    max_attempts: Option<u64>,

    /// Seed for reproducible address sampling.
    #[arg(long)]
    seed: Option<u64>,

    /// Endpoint that must answer 200 through a candidate proxy.
    #[arg(long = "echo-url")]
    echo_url: Option<String>,

    #[arg(long = "google-url")]
    google_url: Option<String>,

    #[arg(long = "cloudflare-url")]
    cloudflare_url: Option<String>,
}

impl Cli {
    fn discovery_config(&self) -> Result<DiscoveryConfig> {
        let defaults = ValidationTargets::default();
        let mut cfg = DiscoveryConfig {
            targets: ValidationTargets {
                echo_url: self.echo_url.clone().unwrap_or(defaults.echo_url),
                google_url: self.google_url.clone().unwrap_or(defaults.google_url),
                cloudflare_url: self.cloudflare_url.clone().unwrap_or(defaults.cloudflare_url),
            },
            concurrency: self.concurrency,
            max_attempts: self.max_attempts,
            seed: self.seed,
            ..DiscoveryConfig::default()
        };
        if let Some(path) = self.ports.as_deref() {
            cfg.well_known_ports = ports::load_ports_from_path(path)?;
        }
        Ok(cfg)
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();
    let cfg = cli.discovery_config()?;

    println!("proxy-finder-rs configuration:");
    println!("  count        : {}", cli.count);
    println!("  mode         : {}", cli.mode);
    println!("  ports        : {} well-known", cfg.well_known_ports.len());
    println!("  concurrency  : {}", cfg.concurrency);
    println!(
        "  max_attempts : {}",
        cfg.max_attempts
            .map(|n| n.to_string())
            .unwrap_or_else(|| "<unbounded>".to_string())
    );
    println!("  echo target  : {}", cfg.targets.echo_url);
    println!("  output       : {}", cli.output.display());

    // Ctrl-C stops the workers; whatever was found so far is still written.
    let cancel = CancellationToken::new();
    let discovery = Discovery::system(cfg)?.with_cancel(cancel.clone());
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        cancel.cancel();
    });

    let report = discovery.discover_many(cli.count, cli.mode).await;

    for failure in &report.failures {
        warn!(%failure, "discovery failure");
    }

    output::write_json(&cli.output, &report.proxies)?;
    info!(
        found = report.proxies.len(),
        path = %cli.output.display(),
        "wrote proxies"
    );
    if let Some(path) = cli.log_file.as_deref() {
        output::append_log(path, &report.proxies)?;
    }

    if report.proxies.is_empty() && !report.failures.is_empty() {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}
