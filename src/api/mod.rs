//! HTTP JSON API.
//!
//! Each submodule contributes a `router()`; they are merged here with the
//! shared tracing and CORS layers.

pub mod attachments;
pub mod dashboard;
pub mod deals;
pub mod funding;
pub mod health;
pub mod integrations;
pub mod notifications;
pub mod profiles;
pub mod underwriting;

use crate::AppState;
use axum::Router;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Build the complete API router
pub fn router(state: Arc<AppState>) -> Router {
    let max_upload_bytes = state.config.max_upload_bytes;

    Router::new()
        .merge(health::router())
        .merge(profiles::router())
        .merge(deals::router())
        .merge(underwriting::router())
        .merge(attachments::router(max_upload_bytes))
        .merge(funding::router())
        .merge(notifications::router())
        .merge(dashboard::router())
        .merge(integrations::router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
