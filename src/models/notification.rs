use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Notification categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    DealSubmitted,
    DealAssigned,
    DealStatusChanged,
    UnderwritingCompleted,
    FundingRequested,
    FundingDecided,
    DocumentUploaded,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::DealSubmitted => "deal_submitted",
            NotificationKind::DealAssigned => "deal_assigned",
            NotificationKind::DealStatusChanged => "deal_status_changed",
            NotificationKind::UnderwritingCompleted => "underwriting_completed",
            NotificationKind::FundingRequested => "funding_requested",
            NotificationKind::FundingDecided => "funding_decided",
            NotificationKind::DocumentUploaded => "document_uploaded",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Notification {
    pub id: Uuid,
    pub recipient_id: Uuid,
    pub kind: String,
    pub title: String,
    pub body: String,
    pub deal_id: Option<Uuid>,
    pub read_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

impl Notification {
    pub fn is_read(&self) -> bool {
        self.read_at.is_some()
    }
}

/// A notification about to be created
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub recipient_id: Uuid,
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub deal_id: Option<Uuid>,
}
