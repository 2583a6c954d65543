//! host_exporter binary
//!
//! Serves host telemetry for pull-based monitoring, or prints a single scrape.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use host_exporter::collectors::COLLECTOR_NAMES;
use host_exporter::{
    default_registry, start_web_server, SourceConfig, WebConfig, DEFAULT_TOOL_TIMEOUT_MS,
    DEFAULT_WEB_PORT,
};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "host_exporter")]
#[command(about = "Host telemetry exporter for GPU, disk, CPU, memory, host and session metrics")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Web server bind address
    #[arg(long, env = "HOST_EXPORTER_HOST", default_value = "0.0.0.0", global = true)]
    host: String,

    /// Web server port
    #[arg(short, long, env = "HOST_EXPORTER_PORT", default_value_t = DEFAULT_WEB_PORT, global = true)]
    port: u16,

    /// Route serving exposition text
    #[arg(long, default_value = "/metrics", global = true)]
    metrics_path: String,

    /// Route serving the health document
    #[arg(long, default_value = "/health", global = true)]
    health_path: String,

    #[command(flatten)]
    sources: SourceArgs,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Args)]
struct SourceArgs {
    /// GPU query binary
    #[arg(long, default_value = "nvidia-smi", global = true)]
    nvidia_smi: String,

    /// Upper bound on one external tool run, in milliseconds
    #[arg(long, default_value_t = DEFAULT_TOOL_TIMEOUT_MS, global = true)]
    tool_timeout_ms: u64,

    /// procfs mount point
    #[arg(long, default_value = "/proc", global = true)]
    proc_path: PathBuf,

    /// Collectors to skip (comma separated)
    #[arg(long, value_delimiter = ',', global = true)]
    disable: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the web server (default)
    Serve,

    /// Run one scrape, print it and exit
    Scrape(ScrapeArgs),
}

#[derive(Args)]
struct ScrapeArgs {
    /// Output format: text or json
    #[arg(short, long, default_value = "text")]
    format: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(&cli)?;

    match &cli.command {
        Some(Commands::Serve) | None => serve_command(&cli).await,
        Some(Commands::Scrape(args)) => scrape_command(&cli, args).await,
    }
}

fn log_level(cli: &Cli) -> Level {
    if cli.debug {
        Level::DEBUG
    } else if cli.verbose {
        Level::INFO
    } else {
        Level::WARN
    }
}

/// `RUST_LOG`-style directives win; otherwise the level picked by the flags.
fn log_filter(cli: &Cli, directives: Option<&str>) -> EnvFilter {
    directives
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(log_level(cli).as_str()))
}

fn log_subscriber(cli: &Cli, directives: Option<&str>) -> impl tracing::Subscriber + Send + Sync + 'static {
    FmtSubscriber::builder()
        .with_env_filter(log_filter(cli, directives))
        .with_target(false)
        .compact()
        .finish()
}

fn init_logging(cli: &Cli) -> anyhow::Result<()> {
    let directives = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    tracing::subscriber::set_global_default(log_subscriber(cli, directives.as_deref()))?;

    Ok(())
}

fn source_config(cli: &Cli) -> SourceConfig {
    SourceConfig::default()
        .with_nvidia_smi(cli.sources.nvidia_smi.as_str())
        .with_tool_timeout_ms(cli.sources.tool_timeout_ms)
        .with_proc_path(&cli.sources.proc_path)
        .with_disabled(cli.sources.disable.iter().map(String::as_str))
}

fn web_config(cli: &Cli) -> WebConfig {
    WebConfig::new(&cli.host, cli.port)
        .with_metrics_path(cli.metrics_path.as_str())
        .with_health_path(cli.health_path.as_str())
}

async fn serve_command(cli: &Cli) -> anyhow::Result<()> {
    let sources = source_config(cli);
    let registry = default_registry(&sources).context("invalid collector configuration")?;
    let web_config = web_config(cli);

    info!("Starting host exporter {}", env!("CARGO_PKG_VERSION"));
    info!("  - Bind address: {}", web_config.bind_address());
    info!("  - Collectors: {:?}", registry.names());
    info!("  - Tool timeout: {}ms", sources.tool_timeout_ms);

    start_web_server(web_config, registry)
        .await
        .context("web server failed")?;

    Ok(())
}

async fn scrape_command(cli: &Cli, args: &ScrapeArgs) -> anyhow::Result<()> {
    let registry = default_registry(&source_config(cli)).context("invalid collector configuration")?;
    let scrape = registry.scrape().await;

    match args.format.as_str() {
        "text" => print!("{}", scrape.render()),
        "json" => println!("{}", serde_json::to_string_pretty(&scrape.metrics)?),
        other => anyhow::bail!("Unsupported format: {}. Use 'text' or 'json'", other),
    }

    for outcome in scrape.failures() {
        eprintln!("collector {} failed: {:?}", outcome.name, outcome.status);
    }

    Ok(())
}
