use crate::auth::AuthUser;
use crate::error::AppResult;
use crate::models::{FundingRequest, FundingStatus, Role};
use crate::services::{DealFunding, FundingDecision, NewFundingRequest};
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
pub struct FundingQuery {
    pub deal_id: Option<Uuid>,
    pub status: Option<FundingStatus>,
}

#[derive(Debug, Deserialize)]
pub struct DecisionRequest {
    pub decision: FundingDecision,
}

const FUNDING_ROLES: [Role; 2] = [Role::Investor, Role::Admin];

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/deals/:id/funding",
            get(deal_funding).post(request_funding),
        )
        .route("/funding", get(list_funding))
        .route("/funding/:id/decision", post(decide_funding))
        .route("/funding/:id/withdraw", post(withdraw_funding))
}

/// GET /deals/:id/funding
async fn deal_funding(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(deal_id): Path<Uuid>,
) -> AppResult<Json<DealFunding>> {
    user.require_any(&FUNDING_ROLES)?;
    Ok(Json(
        state.funding_service.for_deal(&user.profile, deal_id).await?,
    ))
}

/// POST /deals/:id/funding
async fn request_funding(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(deal_id): Path<Uuid>,
    Json(new): Json<NewFundingRequest>,
) -> AppResult<(StatusCode, Json<FundingRequest>)> {
    user.require_any(&[Role::Investor])?;
    let request = state
        .funding_service
        .request(&user.profile, deal_id, &new)
        .await?;
    Ok((StatusCode::CREATED, Json(request)))
}

/// GET /funding
async fn list_funding(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Query(query): Query<FundingQuery>,
) -> AppResult<Json<Vec<FundingRequest>>> {
    user.require_any(&FUNDING_ROLES)?;
    let requests = state
        .funding_service
        .list(&user.profile, query.deal_id, query.status)
        .await?;
    Ok(Json(requests))
}

/// POST /funding/:id/decision
async fn decide_funding(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(request): Json<DecisionRequest>,
) -> AppResult<Json<FundingRequest>> {
    user.require_any(&[Role::Admin])?;
    let decided = state
        .funding_service
        .decide(&user.profile, id, request.decision)
        .await?;
    Ok(Json(decided))
}

/// POST /funding/:id/withdraw
async fn withdraw_funding(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<FundingRequest>> {
    user.require_any(&[Role::Investor])?;
    Ok(Json(state.funding_service.withdraw(&user.profile, id).await?))
}
