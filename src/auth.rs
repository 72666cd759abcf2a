use crate::error::{AppError, AppResult};
use crate::models::{Profile, Role};
use crate::AppState;
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use uuid::Uuid;

/// Prefix on every issued access token
const TOKEN_PREFIX: &str = "dft_";

/// Generate a new random access token
///
/// Two v4 UUIDs give 244 random bits, rendered as 64 hex characters.
pub fn generate_token() -> String {
    format!(
        "{}{}{}",
        TOKEN_PREFIX,
        Uuid::new_v4().simple(),
        Uuid::new_v4().simple()
    )
}

/// SHA-256 of a token, hex encoded. Only this value is persisted.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Pull the bearer token out of the `Authorization` header
pub fn extract_bearer(headers: &HeaderMap) -> AppResult<&str> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or_else(|| AppError::Unauthorized("Missing Authorization header".to_string()))?
        .to_str()
        .map_err(|_| AppError::Unauthorized("Malformed Authorization header".to_string()))?;

    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Unauthorized("Expected a Bearer token".to_string()))?;

    if !token.starts_with(TOKEN_PREFIX) {
        return Err(AppError::Unauthorized("Invalid access token".to_string()));
    }

    Ok(token)
}

/// The authenticated caller, resolved from the bearer token
///
/// ```ignore
/// async fn handler(user: AuthUser, State(state): State<Arc<AppState>>) -> AppResult<...> {
///     user.require_any(&[Role::Admin])?;
///     ...
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub profile: Profile,
}

impl AuthUser {
    pub fn id(&self) -> Uuid {
        self.profile.id
    }

    pub fn role(&self) -> Role {
        self.profile.role_enum()
    }

    pub fn is(&self, role: Role) -> bool {
        self.role() == role
    }

    pub fn is_admin(&self) -> bool {
        self.is(Role::Admin)
    }

    /// Fail with 403 unless the caller holds one of `roles`
    pub fn require_any(&self, roles: &[Role]) -> AppResult<()> {
        if roles.contains(&self.role()) {
            Ok(())
        } else {
            Err(AppError::Forbidden(format!(
                "Role '{}' may not perform this action",
                self.role()
            )))
        }
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_bearer(&parts.headers)?;
        let profile = state.profile_service.authenticate(token).await?;
        Ok(AuthUser { profile })
    }
}
