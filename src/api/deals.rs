use crate::auth::AuthUser;
use crate::error::AppResult;
use crate::models::{Deal, DealFilter, DealStatus, DealUpdate, DealWithProperty, NewDeal, Role};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct AssignRequest {
    /// Required for admins; underwriters may omit it to take the deal themselves
    pub underwriter_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct StatusChange {
    pub status: DealStatus,
    pub reason: Option<String>,
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/deals", get(list_deals).post(submit_deal))
        .route(
            "/deals/:id",
            get(get_deal).patch(update_deal).delete(delete_deal),
        )
        .route("/deals/:id/assign", post(assign_deal))
        .route("/deals/:id/status", post(change_status))
}

/// GET /deals
async fn list_deals(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Query(filter): Query<DealFilter>,
) -> AppResult<Json<Vec<Deal>>> {
    Ok(Json(state.deal_service.list(&user.profile, filter).await?))
}

/// POST /deals
async fn submit_deal(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Json(new): Json<NewDeal>,
) -> AppResult<(StatusCode, Json<DealWithProperty>)> {
    user.require_any(&[Role::Agent, Role::Admin])?;
    let created = state.deal_service.submit(&user.profile, &new).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /deals/:id
async fn get_deal(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<DealWithProperty>> {
    Ok(Json(state.deal_service.get(&user.profile, id).await?))
}

/// PATCH /deals/:id
async fn update_deal(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(update): Json<DealUpdate>,
) -> AppResult<Json<DealWithProperty>> {
    Ok(Json(
        state.deal_service.update(&user.profile, id, &update).await?,
    ))
}

/// DELETE /deals/:id
async fn delete_deal(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    state.deal_service.delete(&user.profile, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /deals/:id/assign
async fn assign_deal(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(request): Json<AssignRequest>,
) -> AppResult<Json<Deal>> {
    user.require_any(&[Role::Underwriter, Role::Admin])?;
    let deal = state
        .deal_service
        .assign(&user.profile, id, request.underwriter_id)
        .await?;
    Ok(Json(deal))
}

/// POST /deals/:id/status
async fn change_status(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(change): Json<StatusChange>,
) -> AppResult<Json<Deal>> {
    let deal = state
        .deal_service
        .transition(&user.profile, id, change.status, change.reason.as_deref())
        .await?;
    Ok(Json(deal))
}
