use crate::error::RepositoryError;
use crate::models::{NewProfile, Profile, Role};
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

const PROFILE_COLUMNS: &str =
    "id, email, full_name, phone, role, token_hash, is_active, created_at, updated_at";

/// Number of profiles holding a role
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct RoleCount {
    pub role: String,
    pub count: i64,
}

/// Repository for profile data access
pub struct ProfileRepository {
    pool: PgPool,
}

impl ProfileRepository {
    /// Create a new ProfileRepository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a new profile
    pub async fn create(
        &self,
        new: &NewProfile,
        token_hash: &str,
    ) -> Result<Profile, RepositoryError> {
        let sql = format!(
            r#"
            INSERT INTO profiles (email, full_name, phone, role, token_hash)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            PROFILE_COLUMNS
        );
        let profile = sqlx::query_as::<_, Profile>(&sql)
            .bind(new.email.trim().to_lowercase())
            .bind(new.full_name.trim())
            .bind(new.phone.as_deref())
            .bind(new.role.as_str())
            .bind(token_hash)
            .fetch_one(&self.pool)
            .await?;
        Ok(profile)
    }

    /// Find a profile by UUID
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Profile>, RepositoryError> {
        let sql = format!("SELECT {} FROM profiles WHERE id = $1", PROFILE_COLUMNS);
        let profile = sqlx::query_as::<_, Profile>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(profile)
    }

    /// Find a profile by email (case-insensitive)
    pub async fn find_by_email(&self, email: &str) -> Result<Option<Profile>, RepositoryError> {
        let sql = format!("SELECT {} FROM profiles WHERE email = $1", PROFILE_COLUMNS);
        let profile = sqlx::query_as::<_, Profile>(&sql)
            .bind(email.trim().to_lowercase())
            .fetch_optional(&self.pool)
            .await?;
        Ok(profile)
    }

    /// Find the profile owning an access token hash
    pub async fn find_by_token_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<Profile>, RepositoryError> {
        let sql = format!("SELECT {} FROM profiles WHERE token_hash = $1", PROFILE_COLUMNS);
        let profile = sqlx::query_as::<_, Profile>(&sql)
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .await?;
        Ok(profile)
    }

    /// List profiles, optionally restricted to one role
    pub async fn list(&self, role: Option<Role>) -> Result<Vec<Profile>, RepositoryError> {
        let sql = format!(
            r#"
            SELECT {}
            FROM profiles
            WHERE ($1::TEXT IS NULL OR role = $1)
            ORDER BY created_at DESC
            "#,
            PROFILE_COLUMNS
        );
        let profiles = sqlx::query_as::<_, Profile>(&sql)
            .bind(role.map(|r| r.as_str()))
            .fetch_all(&self.pool)
            .await?;
        Ok(profiles)
    }

    /// IDs of every active profile holding a role
    pub async fn active_ids_by_role(&self, role: Role) -> Result<Vec<Uuid>, RepositoryError> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM profiles WHERE role = $1 AND is_active ORDER BY created_at",
        )
        .bind(role.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    /// Change a profile's role
    pub async fn update_role(&self, id: Uuid, role: Role) -> Result<Profile, RepositoryError> {
        let sql = format!(
            "UPDATE profiles SET role = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
            PROFILE_COLUMNS
        );
        let profile = sqlx::query_as::<_, Profile>(&sql)
            .bind(id)
            .bind(role.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(profile)
    }

    /// Activate or deactivate a profile
    pub async fn set_active(&self, id: Uuid, is_active: bool) -> Result<Profile, RepositoryError> {
        let sql = format!(
            "UPDATE profiles SET is_active = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
            PROFILE_COLUMNS
        );
        let profile = sqlx::query_as::<_, Profile>(&sql)
            .bind(id)
            .bind(is_active)
            .fetch_one(&self.pool)
            .await?;
        Ok(profile)
    }

    /// Replace the stored token hash
    pub async fn update_token_hash(
        &self,
        id: Uuid,
        token_hash: &str,
    ) -> Result<Profile, RepositoryError> {
        let sql = format!(
            "UPDATE profiles SET token_hash = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
            PROFILE_COLUMNS
        );
        let profile = sqlx::query_as::<_, Profile>(&sql)
            .bind(id)
            .bind(token_hash)
            .fetch_one(&self.pool)
            .await?;
        Ok(profile)
    }

    /// Profile counts grouped by role
    pub async fn count_by_role(&self) -> Result<Vec<RoleCount>, RepositoryError> {
        let counts = sqlx::query_as::<_, RoleCount>(
            "SELECT role, COUNT(*) AS count FROM profiles GROUP BY role ORDER BY role",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(counts)
    }

    /// Total number of profiles
    pub async fn count(&self) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM profiles")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
