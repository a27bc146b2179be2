//! Dialcast - Outbound call campaign engine entry point

use anyhow::Result;
use dialcast_api::AppState;
use dialcast_common::config::Config;
use dialcast_core::{
    BridgeConfig, BridgeOrchestrator, CampaignDispatchWorker, CampaignManager, LamlClient,
    LamlConfig,
};
use dialcast_storage::db::DatabasePool;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    init_logging();

    info!("Starting Dialcast campaign engine...");

    // Load configuration
    let config = Config::load()?;

    // Initialize database
    let db_pool = DatabasePool::new(&config.database).await?;
    info!("Database connection established");

    // Run migrations
    db_pool.migrate().await?;
    info!("Database migrations completed");

    // Campaign lifecycle manager
    let manager = Arc::new(
        CampaignManager::new(db_pool.clone()).with_max_recipients(config.dispatch.max_recipients),
    );

    // Telephony client and two-leg bridge orchestrator
    let laml_client = LamlClient::new(LamlConfig {
        space_url: config.telephony.space_url.clone(),
        project_id: config.telephony.project_id.clone(),
        api_token: config.telephony.api_token.clone(),
        ..LamlConfig::default()
    });
    let bridge = BridgeOrchestrator::new(
        db_pool.clone(),
        laml_client,
        BridgeConfig {
            agent_sip_domain: config.telephony.agent_sip_domain.clone(),
            public_url: config.server.public_url.clone(),
        },
    );

    // Dispatch worker
    let worker = Arc::new(
        CampaignDispatchWorker::new(db_pool.clone(), manager.clone(), bridge)
            .with_chunk_size(config.dispatch.chunk_size)
            .with_inter_call_delay_ms(config.dispatch.inter_call_delay_ms)
            .with_system_ceiling(config.dispatch.system_ceiling)
            .with_poll_interval(config.dispatch.poll_interval_secs),
    );

    // Start the sweep loop
    let worker_handle = {
        let worker = worker.clone();
        tokio::spawn(async move {
            worker.run().await;
        })
    };
    info!(
        "Dispatch worker started (sweep every {}s)",
        config.dispatch.poll_interval_secs
    );

    // Start API server
    let api_handle = {
        let state = AppState {
            db_pool: db_pool.clone(),
            manager: manager.clone(),
            worker: worker.clone(),
        };
        let api_port = config.api.port;
        tokio::spawn(async move {
            let app = dialcast_api::create_router(state);
            let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", api_port))
                .await
                .expect("Failed to bind API server");
            info!("Starting API server on port {}", api_port);
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!("API server error: {}", e);
            }
        })
    };

    info!("Dialcast started successfully");

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    // Cleanup
    worker_handle.abort();
    api_handle.abort();

    info!("Dialcast shutdown complete");

    Ok(())
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,dialcast=debug"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_level(true))
        .with(filter)
        .init();
}
