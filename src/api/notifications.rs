use crate::auth::AuthUser;
use crate::error::AppResult;
use crate::models::Notification;
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct NotificationQuery {
    #[serde(default)]
    pub unread_only: bool,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct UnreadCount {
    pub count: i64,
}

#[derive(Debug, Serialize)]
pub struct MarkedRead {
    pub updated: u64,
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/notifications", get(list_notifications))
        .route("/notifications/unread-count", get(unread_count))
        .route("/notifications/read-all", post(mark_all_read))
        .route("/notifications/:id/read", post(mark_read))
}

/// GET /notifications
async fn list_notifications(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Query(query): Query<NotificationQuery>,
) -> AppResult<Json<Vec<Notification>>> {
    let notifications = state
        .notification_service
        .list(user.id(), query.unread_only, query.limit)
        .await?;
    Ok(Json(notifications))
}

/// GET /notifications/unread-count
async fn unread_count(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<UnreadCount>> {
    let count = state.notification_service.unread_count(user.id()).await?;
    Ok(Json(UnreadCount { count }))
}

/// POST /notifications/:id/read
async fn mark_read(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Notification>> {
    Ok(Json(
        state.notification_service.mark_read(id, user.id()).await?,
    ))
}

/// POST /notifications/read-all
async fn mark_all_read(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<MarkedRead>> {
    let updated = state.notification_service.mark_all_read(user.id()).await?;
    Ok(Json(MarkedRead { updated }))
}
