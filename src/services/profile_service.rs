use crate::auth;
use crate::error::{AppError, AppResult};
use crate::models::{IssuedToken, NewProfile, Profile, Role};
use crate::repositories::ProfileRepository;
use crate::services::AuditTrailService;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Service for user profiles and their access tokens
pub struct ProfileService {
    profile_repo: Arc<ProfileRepository>,
    audit: Arc<AuditTrailService>,
}

impl ProfileService {
    pub fn new(profile_repo: Arc<ProfileRepository>, audit: Arc<AuditTrailService>) -> Self {
        Self {
            profile_repo,
            audit,
        }
    }

    /// Create a profile and issue its first access token
    pub async fn create(&self, actor_id: Option<Uuid>, new: &NewProfile) -> AppResult<IssuedToken> {
        validate_new_profile(new)?;

        let access_token = auth::generate_token();
        let profile = self
            .profile_repo
            .create(new, &auth::hash_token(&access_token))
            .await?;

        info!("Created {} profile {} ({})", profile.role, profile.email, profile.id);
        self.audit
            .record_quietly(
                actor_id,
                "profile_created",
                "profile",
                Some(profile.id),
                json!({ "email": profile.email, "role": profile.role }),
            )
            .await;

        Ok(IssuedToken {
            profile,
            access_token,
        })
    }

    pub async fn get(&self, id: Uuid) -> AppResult<Profile> {
        self.profile_repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Profile {} not found", id)))
    }

    pub async fn list(&self, role: Option<Role>) -> AppResult<Vec<Profile>> {
        Ok(self.profile_repo.list(role).await?)
    }

    pub async fn update_role(&self, actor_id: Uuid, id: Uuid, role: Role) -> AppResult<Profile> {
        if actor_id == id && role != Role::Admin {
            return Err(AppError::Conflict(
                "Admins cannot remove their own admin role".to_string(),
            ));
        }

        let before = self.get(id).await?;
        let profile = self.profile_repo.update_role(id, role).await?;

        self.audit
            .record_quietly(
                Some(actor_id),
                "profile_role_changed",
                "profile",
                Some(id),
                json!({ "from": before.role, "to": profile.role }),
            )
            .await;

        Ok(profile)
    }

    pub async fn set_active(&self, actor_id: Uuid, id: Uuid, is_active: bool) -> AppResult<Profile> {
        if actor_id == id && !is_active {
            return Err(AppError::Conflict(
                "Admins cannot deactivate themselves".to_string(),
            ));
        }

        self.get(id).await?;
        let profile = self.profile_repo.set_active(id, is_active).await?;

        let action = if is_active {
            "profile_activated"
        } else {
            "profile_deactivated"
        };
        self.audit
            .record_quietly(Some(actor_id), action, "profile", Some(id), json!({}))
            .await;

        Ok(profile)
    }

    /// Issue a new token; the previous one stops working immediately
    pub async fn rotate_token(&self, actor_id: Uuid, id: Uuid) -> AppResult<IssuedToken> {
        self.get(id).await?;

        let access_token = auth::generate_token();
        let profile = self
            .profile_repo
            .update_token_hash(id, &auth::hash_token(&access_token))
            .await?;

        self.audit
            .record_quietly(Some(actor_id), "token_rotated", "profile", Some(id), json!({}))
            .await;

        Ok(IssuedToken {
            profile,
            access_token,
        })
    }

    /// Resolve a bearer token to an active profile
    pub async fn authenticate(&self, token: &str) -> AppResult<Profile> {
        let profile = self
            .profile_repo
            .find_by_token_hash(&auth::hash_token(token))
            .await?
            .ok_or_else(|| AppError::Unauthorized("Invalid access token".to_string()))?;

        if !profile.is_active {
            return Err(AppError::Unauthorized("Profile is deactivated".to_string()));
        }

        Ok(profile)
    }

    /// Create the first admin when the database has no profiles yet
    pub async fn bootstrap_admin(&self, email: &str) -> AppResult<Option<IssuedToken>> {
        if self.profile_repo.count().await? > 0 {
            return Ok(None);
        }

        let new = NewProfile {
            email: email.to_string(),
            full_name: "Administrator".to_string(),
            phone: None,
            role: Role::Admin,
        };
        let issued = self.create(None, &new).await?;
        warn!(
            "Bootstrapped admin {}. Access token (shown once): {}",
            issued.profile.email, issued.access_token
        );
        Ok(Some(issued))
    }
}

fn validate_new_profile(new: &NewProfile) -> AppResult<()> {
    let email = new.email.trim();
    let valid_email = email
        .split_once('@')
        .map(|(local, domain)| !local.is_empty() && domain.contains('.') && !domain.ends_with('.'))
        .unwrap_or(false);
    if !valid_email || email.len() > 254 {
        return Err(AppError::Validation(format!("Invalid email: {}", new.email)));
    }
    if new.full_name.trim().is_empty() {
        return Err(AppError::Validation("full_name must not be empty".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_profile(email: &str, name: &str) -> NewProfile {
        NewProfile {
            email: email.to_string(),
            full_name: name.to_string(),
            phone: None,
            role: Role::Agent,
        }
    }

    #[test]
    fn test_validate_new_profile() {
        assert!(validate_new_profile(&new_profile("agent@example.com", "Ann Agent")).is_ok());
        assert!(validate_new_profile(&new_profile("agent@example", "Ann")).is_err());
        assert!(validate_new_profile(&new_profile("@example.com", "Ann")).is_err());
        assert!(validate_new_profile(&new_profile("no-at-sign", "Ann")).is_err());
        assert!(validate_new_profile(&new_profile("agent@example.com", "  ")).is_err());
    }
}
