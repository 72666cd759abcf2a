use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Deal pipeline status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DealStatus {
    Submitted,
    Underwriting,
    Offer,
    Closed,
    Rejected,
}

impl DealStatus {
    /// Convert from database string
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "submitted" => Ok(DealStatus::Submitted),
            "underwriting" => Ok(DealStatus::Underwriting),
            "offer" => Ok(DealStatus::Offer),
            "closed" => Ok(DealStatus::Closed),
            "rejected" => Ok(DealStatus::Rejected),
            _ => Err(format!("Invalid status: {}", s)),
        }
    }

    /// Convert to database string
    pub fn as_str(&self) -> &'static str {
        match self {
            DealStatus::Submitted => "submitted",
            DealStatus::Underwriting => "underwriting",
            DealStatus::Offer => "offer",
            DealStatus::Closed => "closed",
            DealStatus::Rejected => "rejected",
        }
    }

    pub fn all() -> [DealStatus; 5] {
        [
            DealStatus::Submitted,
            DealStatus::Underwriting,
            DealStatus::Offer,
            DealStatus::Closed,
            DealStatus::Rejected,
        ]
    }

    /// Closed and rejected deals never move again
    pub fn is_terminal(&self) -> bool {
        matches!(self, DealStatus::Closed | DealStatus::Rejected)
    }

    /// submitted -> underwriting -> offer -> closed, with rejection from any open stage
    pub fn can_transition_to(&self, next: DealStatus) -> bool {
        matches!(
            (self, next),
            (DealStatus::Submitted, DealStatus::Underwriting)
                | (DealStatus::Underwriting, DealStatus::Offer)
                | (DealStatus::Offer, DealStatus::Closed)
                | (DealStatus::Submitted, DealStatus::Rejected)
                | (DealStatus::Underwriting, DealStatus::Rejected)
                | (DealStatus::Offer, DealStatus::Rejected)
        )
    }
}

impl std::fmt::Display for DealStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Deal model representing a property transaction
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Deal {
    pub id: Uuid,
    pub agent_id: Uuid,
    pub title: String,
    pub status: String, // Stored as TEXT, use DealStatus enum for type safety
    pub asking_price: Decimal,
    pub notes: Option<String>,
    pub assigned_underwriter_id: Option<Uuid>,
    pub rejection_reason: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Deal {
    /// Get status as an enum
    pub fn status_enum(&self) -> DealStatus {
        DealStatus::from_str(&self.status).unwrap_or(DealStatus::Submitted)
    }

    pub fn is_owned_by(&self, profile_id: Uuid) -> bool {
        self.agent_id == profile_id
    }

    pub fn is_assigned_to(&self, profile_id: Uuid) -> bool {
        self.assigned_underwriter_id == Some(profile_id)
    }
}

/// The single property attached to a deal
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Property {
    pub id: Uuid,
    pub deal_id: Uuid,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub property_type: String,
    pub bedrooms: Option<i32>,
    pub bathrooms: Option<Decimal>,
    pub square_feet: Option<i32>,
    pub year_built: Option<i32>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub estimated_arv: Option<Decimal>,
    pub estimated_repairs: Option<Decimal>,
    pub created_at: NaiveDateTime,
}

impl Property {
    /// Single-line address used for geocoding and comps lookups
    pub fn full_address(&self) -> String {
        format!("{}, {}, {} {}", self.address, self.city, self.state, self.zip)
    }
}

/// A deal together with its property
#[derive(Debug, Clone, Serialize)]
pub struct DealWithProperty {
    #[serde(flatten)]
    pub deal: Deal,
    pub property: Property,
}

/// Property fields supplied when submitting a deal
#[derive(Debug, Clone, Deserialize)]
pub struct NewProperty {
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    #[serde(default = "default_property_type")]
    pub property_type: String,
    pub bedrooms: Option<i32>,
    pub bathrooms: Option<Decimal>,
    pub square_feet: Option<i32>,
    pub year_built: Option<i32>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub estimated_arv: Option<Decimal>,
    pub estimated_repairs: Option<Decimal>,
}

fn default_property_type() -> String {
    "single_family".to_string()
}

/// Deal submission payload
#[derive(Debug, Clone, Deserialize)]
pub struct NewDeal {
    pub title: String,
    pub asking_price: Decimal,
    pub notes: Option<String>,
    pub property: NewProperty,
}

/// Editable deal fields; `None` leaves a field unchanged
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DealUpdate {
    pub title: Option<String>,
    pub asking_price: Option<Decimal>,
    pub notes: Option<String>,
    pub estimated_arv: Option<Decimal>,
    pub estimated_repairs: Option<Decimal>,
}

/// Filters accepted when listing deals
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DealFilter {
    pub status: Option<DealStatus>,
    pub agent_id: Option<Uuid>,
    pub assigned_underwriter_id: Option<Uuid>,
    /// Deals assigned to this underwriter plus the unassigned queue; set by the service
    #[serde(skip)]
    pub underwriter_scope: Option<Uuid>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}
