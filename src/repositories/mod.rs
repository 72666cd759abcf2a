pub mod attachment_repository;
pub mod audit_log_repository;
pub mod deal_repository;
pub mod formula_repository;
pub mod funding_repository;
pub mod notification_repository;
pub mod profile_repository;
pub mod underwriting_repository;

// Re-export all repositories for convenient access
pub use attachment_repository::AttachmentRepository;
pub use audit_log_repository::AuditLogRepository;
pub use deal_repository::{DealRepository, StatusCount};
pub use formula_repository::FormulaRepository;
pub use funding_repository::FundingRepository;
pub use notification_repository::NotificationRepository;
pub use profile_repository::{ProfileRepository, RoleCount};
pub use underwriting_repository::UnderwritingRepository;
