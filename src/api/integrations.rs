use crate::auth::AuthUser;
use crate::error::{AppError, AppResult};
use crate::integrations::{comps::CompsResult, esign::EnvelopeResult, geocoding::GeocodeResult};
use crate::models::Role;
use crate::services::access::can_underwrite_deal;
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

const DEFAULT_RADIUS_MILES: f64 = 1.0;
const MAX_RADIUS_MILES: f64 = 25.0;

#[derive(Debug, Default, Deserialize)]
pub struct EnvelopeRequest {
    /// Defaults to the deal's agent
    pub signer_email: Option<String>,
    pub signer_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GeocodeQuery {
    pub address: String,
}

#[derive(Debug, Deserialize)]
pub struct CompsQuery {
    pub address: String,
    pub zip: String,
    pub radius_miles: Option<f64>,
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/integrations/esign/:deal_id", post(create_envelope))
        .route("/integrations/geocode", get(geocode))
        .route("/integrations/comps", get(comparables))
}

/// POST /integrations/esign/:deal_id
async fn create_envelope(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(deal_id): Path<Uuid>,
    request: Option<Json<EnvelopeRequest>>,
) -> AppResult<Json<EnvelopeResult>> {
    user.require_any(&[Role::Underwriter, Role::Admin])?;
    let Json(request) = request.unwrap_or_default();

    let deal = state.deal_service.find_visible(&user.profile, deal_id).await?;
    if !can_underwrite_deal(user.id(), user.role(), &deal) {
        return Err(AppError::Forbidden(
            "Only the assigned underwriter or an admin can send documents for signature"
                .to_string(),
        ));
    }

    let (signer_email, signer_name) = match (request.signer_email, request.signer_name) {
        (Some(email), name) => {
            let email = email.trim().to_string();
            if !email.contains('@') {
                return Err(AppError::Validation(
                    "signer_email is not a valid address".to_string(),
                ));
            }
            let name = name.unwrap_or_else(|| email.clone());
            (email, name)
        }
        (None, _) => {
            let agent = state.profile_service.get(deal.agent_id).await?;
            (agent.email, agent.full_name)
        }
    };

    let envelope = state
        .integrations
        .esign
        .create_envelope(&deal, &signer_email, &signer_name)
        .await;

    state
        .audit
        .record_quietly(
            Some(user.id()),
            "esign_envelope_created",
            "deal",
            Some(deal.id),
            json!({
                "envelope_id": envelope.envelope_id,
                "signer_email": signer_email,
                "source": envelope.source,
            }),
        )
        .await;

    Ok(Json(envelope))
}

/// GET /integrations/geocode?address=
async fn geocode(
    _user: AuthUser,
    State(state): State<Arc<AppState>>,
    Query(query): Query<GeocodeQuery>,
) -> AppResult<Json<GeocodeResult>> {
    let address = required("address", &query.address)?;
    Ok(Json(state.integrations.geocoding.geocode(address).await))
}

/// GET /integrations/comps?address=&zip=&radius_miles=
async fn comparables(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Query(query): Query<CompsQuery>,
) -> AppResult<Json<CompsResult>> {
    user.require_any(&[Role::Underwriter, Role::Admin, Role::Agent])?;
    let address = required("address", &query.address)?;
    let zip = required("zip", &query.zip)?;
    let radius = validate_radius(query.radius_miles)?;

    Ok(Json(
        state
            .integrations
            .comps
            .comparables(address, zip, radius)
            .await,
    ))
}

fn required<'a>(field: &str, value: &'a str) -> AppResult<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::Validation(format!("{} is required", field)));
    }
    Ok(value)
}

fn validate_radius(radius: Option<f64>) -> AppResult<f64> {
    let radius = radius.unwrap_or(DEFAULT_RADIUS_MILES);
    if !radius.is_finite() || radius <= 0.0 || radius > MAX_RADIUS_MILES {
        return Err(AppError::Validation(format!(
            "radius_miles must be greater than 0 and at most {}",
            MAX_RADIUS_MILES
        )));
    }
    Ok(radius)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_radius() {
        assert_eq!(validate_radius(None).unwrap(), DEFAULT_RADIUS_MILES);
        assert_eq!(validate_radius(Some(2.5)).unwrap(), 2.5);
        assert!(validate_radius(Some(0.0)).is_err());
        assert!(validate_radius(Some(-1.0)).is_err());
        assert!(validate_radius(Some(26.0)).is_err());
        assert!(validate_radius(Some(f64::NAN)).is_err());
    }

    #[test]
    fn test_required_trims() {
        assert_eq!(required("zip", " 78701 ").unwrap(), "78701");
        assert!(required("zip", "  ").is_err());
    }
}
