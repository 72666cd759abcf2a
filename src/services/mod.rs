pub mod access;
pub mod attachment_service;
pub mod audit;
pub mod dashboard_service;
pub mod deal_service;
pub mod funding_service;
pub mod notification_service;
pub mod profile_service;
pub mod underwriting_service;

pub use attachment_service::{AttachmentService, Upload};
pub use audit::{AuditFileMirror, AuditLogEntry, AuditTrailService};
pub use dashboard_service::{Dashboard, DashboardService};
pub use deal_service::DealService;
pub use funding_service::{DealFunding, FundingDecision, FundingService, NewFundingRequest};
pub use notification_service::NotificationService;
pub use profile_service::ProfileService;
pub use underwriting_service::{
    CustomResult, EvaluateDealRequest, Evaluation, FormulaValidation, UnderwritingService,
};
