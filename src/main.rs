//! Code-quality metrics service entry point.

use std::net::SocketAddr;

use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use codemetric::aggregator::{Aggregator, RepoRequest};
use codemetric::api::{create_router, AppState};
use codemetric::config::Config;
use codemetric::metrics;
use codemetric::utils::shutdown_signal;
use codemetric::ServiceError;

/// Code-quality metrics aggregation service.
#[derive(Parser, Debug)]
#[command(name = "codemetric")]
#[command(about = "Aggregates Code Climate GPA and coverage history per repository")]
#[command(version)]
struct Args {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Option<Command>,

    /// HTTP server port (overrides PORT).
    #[arg(short, long)]
    port: Option<u16>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the HTTP API (default).
    Serve {
        /// HTTP server port (overrides PORT).
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Check configuration validity.
    CheckConfig,

    /// Look up GPA and coverage history for one repository.
    CheckRepo {
        /// Instance id used for the token lookup.
        #[arg(long, env = "INSTANCE_ID")]
        instance_id: String,

        /// Optional user email scoping the token lookup.
        #[arg(long)]
        user_email: Option<String>,

        /// Repository owner.
        #[arg(long)]
        github_user: String,

        /// Repository name.
        #[arg(long)]
        github_repo: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Load configuration before logging so DEBUG can raise verbosity
    let config = Config::load();
    let debug = args.verbose || config.as_ref().is_ok_and(|c| c.debug);
    let rust_log = config
        .as_ref()
        .map(|c| c.rust_log.clone())
        .unwrap_or_else(|_| "info".to_string());
    init_logging(&rust_log, debug, args.json_logs);

    let config = config.map_err(|e| {
        error!("Failed to load configuration: {}", e);
        ServiceError::from(e)
    })?;

    match args.command {
        Some(Command::Serve { port }) => cmd_serve(config, port.or(args.port)).await,
        Some(Command::CheckConfig) => cmd_check_config(config),
        Some(Command::CheckRepo {
            instance_id,
            user_email,
            github_user,
            github_repo,
        }) => {
            let request = RepoRequest {
                instance_id,
                user_email,
                github_user,
                github_repo,
            };
            cmd_check_repo(config, request).await
        }
        None => cmd_serve(config, args.port).await,
    }
}

fn init_logging(rust_log: &str, debug: bool, json: bool) {
    let filter = if debug {
        EnvFilter::new("codemetric=debug,info")
    } else {
        EnvFilter::try_new(rust_log).unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(json.then(|| fmt::layer().json()))
        .with((!json).then(fmt::layer))
        .with(filter)
        .init();
}

fn validated(config: &Config) -> Result<(), ServiceError> {
    config.validate().map_err(|e| {
        error!("Invalid configuration: {}", e);
        ServiceError::InvalidConfig(e)
    })
}

/// Serve the HTTP API until a shutdown signal arrives.
async fn cmd_serve(config: Config, port_override: Option<u16>) -> anyhow::Result<()> {
    validated(&config)?;

    let port = port_override.unwrap_or(config.port);
    info!("Configuration loaded successfully");
    info!("Mode: {}", config.deployment_mode());
    info!("Settings management: {}", config.setting_manage_url);
    info!("Code Climate: {}", config.code_climate_url);
    if config.http_timeout_ms.is_none() {
        warn!("No outbound HTTP timeout configured");
    }

    let mut state = AppState::new(Aggregator::from_config(&config)?);
    if config.metrics_enabled {
        let handle = metrics::install_prometheus().map_err(anyhow::Error::msg)?;
        let _upkeep = metrics::spawn_upkeep(handle.clone(), metrics::UPKEEP_INTERVAL);
        state = state.with_prometheus(handle);
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await.map_err(ServiceError::from)?;
    info!("HTTP server listening on {}", addr);

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

/// Check configuration validity.
fn cmd_check_config(config: Config) -> anyhow::Result<()> {
    println!("======================================================================");
    println!("CODEMETRIC - CONFIGURATION CHECK");
    println!("======================================================================");

    print!("Validating configuration... ");
    match config.validate() {
        Ok(()) => println!("OK"),
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(ServiceError::InvalidConfig(e).into());
        }
    }

    println!("----------------------------------------------------------------------");
    println!("Configuration Summary:");
    println!("  Settings Management URL: {}", config.setting_manage_url);
    println!("  Code Climate URL: {}", config.code_climate_url);
    println!("  Deployment Mode: {}", config.deployment_mode());
    println!(
        "  Environment: {}{}",
        config.env,
        if config.is_dev() { " (development)" } else { "" }
    );
    println!("  Port: {}", config.port);
    match config.http_timeout_ms {
        Some(ms) => println!("  HTTP Timeout: {}ms", ms),
        None => println!("  HTTP Timeout: none"),
    }
    println!(
        "  Metrics: {}",
        if config.metrics_enabled { "Enabled" } else { "Disabled" }
    );
    if config.insecure_secret() {
        println!("  WARNING: SECRET_KEY is the development placeholder");
    }
    println!("======================================================================");
    println!("CONFIGURATION CHECK PASSED");
    println!("======================================================================");

    Ok(())
}

/// Run both lookups once against the live collaborators.
async fn cmd_check_repo(config: Config, request: RepoRequest) -> anyhow::Result<()> {
    validated(&config)?;
    let aggregator = Aggregator::from_config(&config)?;

    println!("Repository: {}", request.slug());

    let report = aggregator.codebase_gpa(&request).await?;
    if !report.found {
        println!("Repository is not tracked by Code Climate");
    }
    println!("{}", serde_json::to_string_pretty(&report.body)?);

    let coverage = aggregator.coverage_history(&request).await?;
    println!("{}", serde_json::to_string_pretty(&coverage)?);

    Ok(())
}
