use crate::auth::AuthUser;
use crate::error::AppResult;
use crate::models::{CustomFormula, NewCustomFormula, Role, UnderwritingRecord};
use crate::services::underwriting_service::{can_own_formulas, validate_expression};
use crate::services::{EvaluateDealRequest, Evaluation, FormulaValidation};
use crate::underwriting::UnderwritingInputs;
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct CalculateRequest {
    #[serde(flatten)]
    pub inputs: UnderwritingInputs,
    /// Also run the caller's saved formulas
    #[serde(default)]
    pub include_custom: bool,
}

#[derive(Debug, Deserialize)]
pub struct ValidateRequest {
    pub expression: String,
}

const FORMULA_ROLES: [Role; 2] = [Role::Underwriter, Role::Admin];

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/underwriting/calculate", post(calculate))
        .route(
            "/deals/:id/underwriting",
            get(list_records).post(evaluate_deal),
        )
        .route("/formulas", get(list_formulas).post(create_formula))
        .route("/formulas/validate", post(validate_formula))
        .route("/formulas/:id", put(update_formula).delete(delete_formula))
}

/// POST /underwriting/calculate
async fn calculate(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Json(request): Json<CalculateRequest>,
) -> AppResult<Json<Evaluation>> {
    user.require_any(&[Role::Underwriter, Role::Admin, Role::Agent])?;
    let include_custom = request.include_custom && can_own_formulas(user.role());
    let evaluation = state
        .underwriting_service
        .calculate(&user.profile, request.inputs, include_custom)
        .await?;
    Ok(Json(evaluation))
}

/// GET /deals/:id/underwriting
async fn list_records(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(deal_id): Path<Uuid>,
) -> AppResult<Json<Vec<UnderwritingRecord>>> {
    Ok(Json(
        state
            .underwriting_service
            .records(&user.profile, deal_id)
            .await?,
    ))
}

/// POST /deals/:id/underwriting
async fn evaluate_deal(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(deal_id): Path<Uuid>,
    Json(request): Json<EvaluateDealRequest>,
) -> AppResult<(StatusCode, Json<UnderwritingRecord>)> {
    user.require_any(&FORMULA_ROLES)?;
    let record = state
        .underwriting_service
        .evaluate_deal(&user.profile, deal_id, request)
        .await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// GET /formulas
async fn list_formulas(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<Vec<CustomFormula>>> {
    user.require_any(&FORMULA_ROLES)?;
    Ok(Json(
        state.underwriting_service.list_formulas(&user.profile).await?,
    ))
}

/// POST /formulas
async fn create_formula(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Json(new): Json<NewCustomFormula>,
) -> AppResult<(StatusCode, Json<CustomFormula>)> {
    user.require_any(&FORMULA_ROLES)?;
    let formula = state
        .underwriting_service
        .create_formula(&user.profile, &new)
        .await?;
    Ok((StatusCode::CREATED, Json(formula)))
}

/// POST /formulas/validate
async fn validate_formula(
    user: AuthUser,
    Json(request): Json<ValidateRequest>,
) -> AppResult<Json<FormulaValidation>> {
    user.require_any(&FORMULA_ROLES)?;
    Ok(Json(validate_expression(&request.expression)))
}

/// PUT /formulas/:id
async fn update_formula(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(new): Json<NewCustomFormula>,
) -> AppResult<Json<CustomFormula>> {
    user.require_any(&FORMULA_ROLES)?;
    let formula = state
        .underwriting_service
        .update_formula(&user.profile, id, &new)
        .await?;
    Ok(Json(formula))
}

/// DELETE /formulas/:id
async fn delete_formula(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    user.require_any(&FORMULA_ROLES)?;
    state
        .underwriting_service
        .delete_formula(&user.profile, id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
