use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Platform role assigned to every profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Agent,
    Underwriter,
    Admin,
    Investor,
}

impl Role {
    /// Convert from database string
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "agent" => Ok(Role::Agent),
            "underwriter" => Ok(Role::Underwriter),
            "admin" => Ok(Role::Admin),
            "investor" => Ok(Role::Investor),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }

    /// Convert to database string
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Agent => "agent",
            Role::Underwriter => "underwriter",
            Role::Admin => "admin",
            Role::Investor => "investor",
        }
    }

    pub fn all() -> [Role; 4] {
        [Role::Agent, Role::Underwriter, Role::Admin, Role::Investor]
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user account. Authentication is by bearer token; only its hash is stored.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Profile {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub role: String, // Stored as TEXT, use Role enum for type safety
    #[serde(skip_serializing, default)]
    pub token_hash: String,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Profile {
    /// Get role as an enum; unknown values fall back to the least privileged role
    pub fn role_enum(&self) -> Role {
        Role::from_str(&self.role).unwrap_or(Role::Investor)
    }

    pub fn is_admin(&self) -> bool {
        self.role_enum() == Role::Admin
    }
}

/// Input for creating a profile
#[derive(Debug, Clone, Deserialize)]
pub struct NewProfile {
    pub email: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub role: Role,
}

/// Returned once when a profile is created or its token is rotated
#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    pub profile: Profile,
    pub access_token: String,
}
