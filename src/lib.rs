//! DealFlow Backend Library
//!
//! This module exposes the backend components for use by tests and other consumers.

pub mod api;
pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod integrations;
pub mod models;
pub mod repositories;
pub mod services;
pub mod storage;
pub mod underwriting;
pub mod websocket;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{AppError, AppResult};

use database::Database;
use integrations::Integrations;
use repositories::*;
use services::*;
use std::sync::Arc;
use storage::ObjectStore;
use websocket::WebSocketServer;

/// Application state containing all services
pub struct AppState {
    pub database: Database,
    pub config: AppConfig,
    pub ws_server: Arc<WebSocketServer>,
    pub integrations: Integrations,
    pub audit: Arc<AuditTrailService>,
    pub profile_service: Arc<ProfileService>,
    pub deal_service: Arc<DealService>,
    pub underwriting_service: Arc<UnderwritingService>,
    pub funding_service: Arc<FundingService>,
    pub notification_service: Arc<NotificationService>,
    pub attachment_service: Arc<AttachmentService>,
    pub dashboard_service: Arc<DashboardService>,
}

impl AppState {
    /// Wire repositories and services over a pool
    pub fn new(
        pool: sqlx::PgPool,
        config: AppConfig,
        store: Arc<dyn ObjectStore>,
        audit_mirror: Option<AuditFileMirror>,
    ) -> Self {
        let database = Database::new(pool.clone());

        let profile_repo = Arc::new(ProfileRepository::new(pool.clone()));
        let deal_repo = Arc::new(DealRepository::new(pool.clone()));
        let record_repo = Arc::new(UnderwritingRepository::new(pool.clone()));
        let formula_repo = Arc::new(FormulaRepository::new(pool.clone()));
        let attachment_repo = Arc::new(AttachmentRepository::new(pool.clone()));
        let notification_repo = Arc::new(NotificationRepository::new(pool.clone()));
        let audit_repo = Arc::new(AuditLogRepository::new(pool.clone()));
        let funding_repo = Arc::new(FundingRepository::new(pool));

        let ws_server = Arc::new(WebSocketServer::new());
        let integrations = Integrations::from_config(&config.integrations);
        let audit = Arc::new(AuditTrailService::new(audit_repo, audit_mirror));

        let notification_service = Arc::new(NotificationService::new(
            notification_repo.clone(),
            profile_repo.clone(),
            ws_server.clone(),
            integrations.dispatcher.clone(),
        ));
        let profile_service = Arc::new(ProfileService::new(profile_repo.clone(), audit.clone()));
        let deal_service = Arc::new(DealService::new(
            deal_repo.clone(),
            profile_repo.clone(),
            attachment_repo.clone(),
            store.clone(),
            audit.clone(),
            notification_service.clone(),
            ws_server.clone(),
            integrations.geocoding.clone(),
        ));
        let underwriting_service = Arc::new(UnderwritingService::new(
            deal_repo.clone(),
            record_repo.clone(),
            formula_repo,
            audit.clone(),
            notification_service.clone(),
        ));
        let funding_service = Arc::new(FundingService::new(
            funding_repo.clone(),
            deal_repo.clone(),
            profile_repo.clone(),
            audit.clone(),
            notification_service.clone(),
        ));
        let attachment_service = Arc::new(AttachmentService::new(
            attachment_repo,
            deal_repo.clone(),
            store,
            audit.clone(),
            notification_service.clone(),
            config.max_upload_bytes,
        ));
        let dashboard_service = Arc::new(DashboardService::new(
            deal_repo,
            profile_repo,
            record_repo,
            funding_repo,
            notification_repo,
        ));

        Self {
            database,
            config,
            ws_server,
            integrations,
            audit,
            profile_service,
            deal_service,
            underwriting_service,
            funding_service,
            notification_service,
            attachment_service,
            dashboard_service,
        }
    }
}
