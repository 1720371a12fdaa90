//! Funnel Dispatch — templated campaign dispatch engine for quiz-funnel
//! leads over SMS, WhatsApp, and email.
//!
//! Main entry point that wires the stores, adapters, and scheduler, then
//! serves the HTTP API.

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};

use funnel_api::{ApiServer, ApiState};
use funnel_audience::{InMemorySubmissionStore, TargetResolver};
use funnel_channels::{DeliveryRouter, EmailAdapter, SmsAdapter, WhatsAppBridge};
use funnel_core::config::AppConfig;
use funnel_ledger::DeliveryLedger;
use funnel_scheduler::{AllowAllCredits, CampaignStore, Dispatcher, RateLimiterSet};

#[derive(Parser, Debug)]
#[command(name = "funnel-dispatch")]
#[command(about = "Templated campaign dispatch engine for quiz-funnel leads")]
#[command(version)]
struct Cli {
    /// Node identifier (overrides config)
    #[arg(long, env = "FUNNEL_DISPATCH__NODE_ID")]
    node_id: Option<String>,

    /// HTTP port (overrides config)
    #[arg(long, env = "FUNNEL_DISPATCH__API__HTTP_PORT")]
    http_port: Option<u16>,

    /// Scheduler tick interval in seconds (overrides config)
    #[arg(long, env = "FUNNEL_DISPATCH__SCHEDULER__TICK_INTERVAL_SECS")]
    tick_interval: Option<u64>,

    /// Skip the dispatch loop (API-only mode)
    #[arg(long, default_value_t = false)]
    api_only: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "funnel_dispatch=info,tower_http=info".into()),
        )
        .json()
        .init();

    let cli = Cli::parse();

    info!("Funnel Dispatch starting up");

    // Load configuration
    let mut config = AppConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });

    // Apply CLI overrides
    if let Some(node_id) = cli.node_id {
        config.node_id = node_id;
    }
    if let Some(port) = cli.http_port {
        config.api.http_port = port;
    }
    if let Some(interval) = cli.tick_interval {
        config.scheduler.tick_interval_secs = interval;
    }

    info!(
        node_id = %config.node_id,
        http_port = config.api.http_port,
        tick_interval_secs = config.scheduler.tick_interval_secs,
        "Configuration loaded"
    );

    // Lead source. Production: the relational lead store behind the same trait.
    let submissions = Arc::new(InMemorySubmissionStore::new());

    // Delivery adapters
    let bridge = Arc::new(WhatsAppBridge::new(&config.extension));
    let router = DeliveryRouter::new(
        SmsAdapter::new(config.sms.clone()),
        bridge.clone(),
        EmailAdapter::new(config.email.clone()),
    );

    // Stores and scheduler
    let store = Arc::new(CampaignStore::new(Box::new(AllowAllCredits)));
    let ledger = Arc::new(DeliveryLedger::new());
    let dispatcher = Arc::new(Dispatcher::new(
        store.clone(),
        TargetResolver::new(submissions.clone()),
        router,
        ledger.clone(),
        RateLimiterSet::new(&config.rate),
        config.scheduler.clone(),
    ));

    if cli.api_only {
        info!("Running in API-only mode (no dispatch loop)");
    } else {
        tokio::spawn(dispatcher.clone().run());
    }

    // Start API server
    let api_server = ApiServer::new(
        config.clone(),
        ApiState {
            store,
            ledger,
            bridge,
        },
    );

    if let Err(e) = api_server.start_metrics().await {
        error!(error = %e, "Failed to start metrics exporter");
    }

    info!("Funnel Dispatch is ready to serve traffic");

    // Start HTTP server (blocks until shutdown)
    api_server.start_http().await?;

    Ok(())
}
