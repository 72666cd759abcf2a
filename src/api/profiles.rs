use crate::auth::AuthUser;
use crate::error::AppResult;
use crate::models::{AuditLog, AuditLogFilter, IssuedToken, NewProfile, Profile, Role};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct ProfileQuery {
    pub role: Option<Role>,
}

#[derive(Debug, Deserialize)]
pub struct RoleChange {
    pub role: Role,
}

#[derive(Debug, Deserialize)]
pub struct ActiveChange {
    pub is_active: bool,
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/me", get(me))
        .route("/admin/profiles", get(list_profiles).post(create_profile))
        .route("/admin/profiles/:id", get(get_profile))
        .route("/admin/profiles/:id/role", patch(change_role))
        .route("/admin/profiles/:id/active", patch(change_active))
        .route("/admin/profiles/:id/token", post(rotate_token))
        .route("/admin/audit-logs", get(audit_logs))
}

/// GET /me
async fn me(user: AuthUser) -> Json<Profile> {
    Json(user.profile)
}

/// GET /admin/profiles
async fn list_profiles(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Query(query): Query<ProfileQuery>,
) -> AppResult<Json<Vec<Profile>>> {
    user.require_any(&[Role::Admin])?;
    Ok(Json(state.profile_service.list(query.role).await?))
}

/// POST /admin/profiles
///
/// The access token is only ever returned here and by token rotation.
async fn create_profile(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Json(new): Json<NewProfile>,
) -> AppResult<(StatusCode, Json<IssuedToken>)> {
    user.require_any(&[Role::Admin])?;
    let issued = state.profile_service.create(Some(user.id()), &new).await?;
    Ok((StatusCode::CREATED, Json(issued)))
}

/// GET /admin/profiles/:id
async fn get_profile(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Profile>> {
    user.require_any(&[Role::Admin])?;
    Ok(Json(state.profile_service.get(id).await?))
}

/// PATCH /admin/profiles/:id/role
async fn change_role(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(change): Json<RoleChange>,
) -> AppResult<Json<Profile>> {
    user.require_any(&[Role::Admin])?;
    let profile = state
        .profile_service
        .update_role(user.id(), id, change.role)
        .await?;
    Ok(Json(profile))
}

/// PATCH /admin/profiles/:id/active
async fn change_active(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(change): Json<ActiveChange>,
) -> AppResult<Json<Profile>> {
    user.require_any(&[Role::Admin])?;
    let profile = state
        .profile_service
        .set_active(user.id(), id, change.is_active)
        .await?;
    Ok(Json(profile))
}

/// POST /admin/profiles/:id/token
async fn rotate_token(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<IssuedToken>> {
    user.require_any(&[Role::Admin])?;
    Ok(Json(state.profile_service.rotate_token(user.id(), id).await?))
}

/// GET /admin/audit-logs
async fn audit_logs(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Query(filter): Query<AuditLogFilter>,
) -> AppResult<Json<Vec<AuditLog>>> {
    user.require_any(&[Role::Admin])?;
    Ok(Json(state.audit.list(&filter).await?))
}
