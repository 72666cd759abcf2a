//! DealFlow Backend Service
//!
//! Main entry point for the DealFlow real-estate deal backend.
//! This service provides:
//! - HTTP JSON API for agents, underwriters, admins and investors
//! - WebSocket feed for notifications and deal status changes

use dealflow_backend::config::{AppConfig, LogFormat};
use dealflow_backend::database::{create_pool, run_migrations};
use dealflow_backend::error::{AppError, AppResult};
use dealflow_backend::services::AuditFileMirror;
use dealflow_backend::storage::LocalObjectStore;
use dealflow_backend::{api, AppState};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

fn init_tracing(config: &AppConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "dealflow_backend={},sqlx=warn,tower_http=info",
            config.log_level
        )
        .into()
    });

    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}

#[tokio::main]
async fn main() -> AppResult<()> {
    // Load environment variables first
    dotenv::dotenv().ok();

    let config = AppConfig::from_env().map_err(|e| {
        eprintln!("Configuration error: {}", e);
        AppError::Config(e)
    })?;

    init_tracing(&config);

    info!("╔══════════════════════════════════════════════════════════╗");
    info!("║           DealFlow Backend Service Starting              ║");
    info!("╚══════════════════════════════════════════════════════════╝");
    info!("Environment: {}", config.environment);
    info!("Log level: {}", config.log_level);
    info!("HTTP port: {}", config.http_port);
    if let Some(ws_port) = config.ws_port {
        info!("WebSocket port: {}", ws_port);
    }

    // =========================================================================
    // DATABASE SETUP
    // =========================================================================
    info!("Connecting to database...");

    let pool = create_pool(&config.database).await.map_err(|e| {
        error!("Failed to create database pool: {}", e);
        AppError::Database(e)
    })?;

    info!("Database connection pool created successfully");
    info!("Max connections: {}", config.database.max_connections);

    info!("Running database migrations...");
    run_migrations(&pool, None).await.map_err(|e| {
        error!("Database migration failed: {}", e);
        AppError::Database(e)
    })?;

    info!("Database migrations completed successfully");

    // =========================================================================
    // CORE SERVICES INITIALIZATION
    // =========================================================================
    info!("Initializing core services...");

    let store = LocalObjectStore::new(&config.storage_dir)
        .await
        .map_err(|e| {
            error!("Failed to open object store: {}", e);
            AppError::Storage(e)
        })?;
    info!("✓ Object store ready at {}", store.root().display());

    let audit_mirror = match &config.audit_log_dir {
        Some(dir) => match AuditFileMirror::new(dir.clone()) {
            Ok(mirror) => {
                info!("✓ Audit log mirror writing to {}", dir.display());
                Some(mirror)
            }
            Err(e) => {
                warn!("Could not create audit log directory {}: {}", dir.display(), e);
                None
            }
        },
        None => None,
    };

    let http_port = config.http_port;
    let ws_port = config.ws_port;
    let environment = config.environment.clone();
    let bootstrap_email = config.bootstrap_admin_email.clone();

    let state = Arc::new(AppState::new(
        pool,
        config,
        Arc::new(store),
        audit_mirror,
    ));
    info!("✓ Application state initialized with repositories and services");

    if !state.integrations.dispatcher.is_enabled() {
        warn!("NOTIFY_WEBHOOK_URL not configured - email/SMS delivery disabled");
    }

    if let Some(email) = bootstrap_email {
        match state.profile_service.bootstrap_admin(&email).await? {
            Some(issued) => info!("✓ Bootstrap admin {} created", issued.profile.email),
            None => info!("✓ Admin profile already present, bootstrap skipped"),
        }
    }

    // =========================================================================
    // START SERVERS
    // =========================================================================
    let http_addr = SocketAddr::from(([0, 0, 0, 0], http_port));
    info!("Starting HTTP server on {}...", http_addr);

    let listener = TcpListener::bind(http_addr)
        .await
        .map_err(|e| AppError::Message(format!("Failed to bind HTTP server: {}", e)))?;
    let app = api::router(state.clone());

    let http_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("HTTP server error: {}", e);
        }
    });
    info!("✓ HTTP server started on {}", http_addr);

    let ws_handle = if let Some(ws_port) = ws_port {
        let ws_addr = SocketAddr::from(([0, 0, 0, 0], ws_port));
        info!("Starting WebSocket server on {}...", ws_addr);

        let listener = TcpListener::bind(ws_addr).await.map_err(|e| {
            AppError::Message(format!("Failed to bind WebSocket server: {}", e))
        })?;
        let ws_state = state.clone();

        let handle = tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, addr)) => {
                        info!("New WebSocket connection from {}", addr);
                        let ws = ws_state.ws_server.clone();
                        let profiles = ws_state.profile_service.clone();
                        let deals = ws_state.deal_service.clone();
                        tokio::spawn(async move {
                            if let Err(e) = ws.handle_connection(stream, profiles, deals).await {
                                error!("WebSocket connection error: {}", e);
                            }
                        });
                    }
                    Err(e) => {
                        error!("WebSocket accept error: {}", e);
                    }
                }
            }
        });

        info!("✓ WebSocket server started on {}", ws_addr);
        Some(handle)
    } else {
        warn!("WS_PORT not configured - WebSocket server not started");
        None
    };

    // =========================================================================
    // READY
    // =========================================================================
    info!("╔══════════════════════════════════════════════════════════╗");
    info!("║           DealFlow Backend Service Ready!                ║");
    info!("╠══════════════════════════════════════════════════════════╣");
    info!("║  HTTP API:     0.0.0.0:{}                              ║", http_port);
    if let Some(ws_port) = ws_port {
        info!("║  WebSocket:    0.0.0.0:{}                              ║", ws_port);
    }
    info!("║  Environment:  {}                                 ║", environment);
    info!("╚══════════════════════════════════════════════════════════╝");
    info!("Press Ctrl+C to shutdown gracefully");

    // =========================================================================
    // SHUTDOWN HANDLING
    // =========================================================================
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received, shutting down gracefully...");
        }
        _ = http_handle => {
            error!("HTTP server exited unexpectedly");
        }
        _ = async {
            if let Some(handle) = ws_handle {
                handle.await.ok();
            } else {
                // Never completes if WebSocket is not running
                futures::future::pending::<()>().await;
            }
        } => {
            error!("WebSocket server exited unexpectedly");
        }
    }

    info!("DealFlow backend service shutdown complete");
    Ok(())
}
