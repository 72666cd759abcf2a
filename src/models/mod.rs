//! Domain models for the DealFlow backend.
//!
//! This module contains all database-backed models representing
//! the core entities of the deal management platform.

pub mod attachment;
pub mod audit_log;
pub mod deal;
pub mod formula;
pub mod funding;
pub mod notification;
pub mod profile;
pub mod underwriting;

// Re-export all models for convenient access
pub use attachment::Attachment;
pub use audit_log::{AuditLog, AuditLogFilter};
pub use deal::{Deal, DealFilter, DealStatus, DealUpdate, DealWithProperty, NewDeal, NewProperty, Property};
pub use formula::{CustomFormula, NewCustomFormula};
pub use funding::{FundingRequest, FundingStatus, FundingTotals};
pub use notification::{NewNotification, Notification, NotificationKind};
pub use profile::{IssuedToken, NewProfile, Profile, Role};
pub use underwriting::{Recommendation, UnderwritingRecord};
