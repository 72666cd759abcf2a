use crate::auth::AuthUser;
use crate::error::AppResult;
use crate::services::Dashboard;
use crate::AppState;
use axum::{extract::State, routing::get, Json, Router};
use std::sync::Arc;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/dashboard", get(dashboard))
}

/// GET /dashboard
async fn dashboard(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<Dashboard>> {
    Ok(Json(
        state.dashboard_service.for_profile(&user.profile).await?,
    ))
}
