use crate::error::{AppError, AppResult};
use crate::models::{
    DealStatus, FundingRequest, FundingStatus, FundingTotals, NewNotification, NotificationKind,
    Profile, Role,
};
use crate::repositories::{DealRepository, FundingRepository, ProfileRepository};
use crate::services::{AuditTrailService, NotificationService};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Largest single funding request (one trillion)
const MAX_FUNDING_AMOUNT: i64 = 1_000_000_000_000;

#[derive(Debug, Clone, Deserialize)]
pub struct NewFundingRequest {
    pub amount: Decimal,
    pub message: Option<String>,
}

/// Admin decision on a pending request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FundingDecision {
    Approve,
    Reject,
}

impl FundingDecision {
    pub fn status(&self) -> FundingStatus {
        match self {
            FundingDecision::Approve => FundingStatus::Approved,
            FundingDecision::Reject => FundingStatus::Rejected,
        }
    }
}

/// Funding on one deal as seen by the caller
#[derive(Debug, Clone, Serialize)]
pub struct DealFunding {
    pub deal_id: Uuid,
    pub totals: FundingTotals,
    pub requests: Vec<FundingRequest>,
}

/// Service for investor funding requests
pub struct FundingService {
    funding_repo: Arc<FundingRepository>,
    deal_repo: Arc<DealRepository>,
    profile_repo: Arc<ProfileRepository>,
    audit: Arc<AuditTrailService>,
    notifications: Arc<NotificationService>,
}

impl FundingService {
    pub fn new(
        funding_repo: Arc<FundingRepository>,
        deal_repo: Arc<DealRepository>,
        profile_repo: Arc<ProfileRepository>,
        audit: Arc<AuditTrailService>,
        notifications: Arc<NotificationService>,
    ) -> Self {
        Self {
            funding_repo,
            deal_repo,
            profile_repo,
            audit,
            notifications,
        }
    }

    /// An investor offers to fund a deal that is open for offers
    pub async fn request(
        &self,
        actor: &Profile,
        deal_id: Uuid,
        new: &NewFundingRequest,
    ) -> AppResult<FundingRequest> {
        if actor.role_enum() != Role::Investor {
            return Err(AppError::Forbidden(
                "Only investors submit funding requests".to_string(),
            ));
        }
        validate_amount(new.amount)?;

        let deal = self
            .deal_repo
            .find_by_id(deal_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Deal {} not found", deal_id)))?;
        if deal.status_enum() != DealStatus::Offer {
            return Err(AppError::Conflict(format!(
                "Deal is {}; funding is only accepted for offers",
                deal.status
            )));
        }

        let message = new.message.as_deref().map(str::trim).filter(|m| !m.is_empty());
        let request = self
            .funding_repo
            .create(deal_id, actor.id, new.amount, message)
            .await?;

        info!(
            "Investor {} requested {} on deal {}",
            actor.id, request.amount, deal_id
        );
        self.audit
            .record_quietly(
                Some(actor.id),
                "funding_requested",
                "funding_request",
                Some(request.id),
                json!({ "deal_id": deal_id, "amount": request.amount.to_string() }),
            )
            .await;

        let mut recipients = self.profile_repo.active_ids_by_role(Role::Admin).await?;
        recipients.push(deal.agent_id);
        self.notifications
            .notify_many(
                &recipients,
                Some(actor.id),
                NotificationKind::FundingRequested,
                "Funding requested",
                &format!("{} offered {} for {}", actor.full_name, request.amount, deal.title),
                Some(deal_id),
            )
            .await;

        Ok(request)
    }

    /// Investors see their own requests, admins everything
    pub async fn list(
        &self,
        actor: &Profile,
        deal_id: Option<Uuid>,
        status: Option<FundingStatus>,
    ) -> AppResult<Vec<FundingRequest>> {
        let investor_id = match actor.role_enum() {
            Role::Admin => None,
            Role::Investor => Some(actor.id),
            _ => {
                return Err(AppError::Forbidden(
                    "Funding requests are visible to investors and admins".to_string(),
                ))
            }
        };
        Ok(self.funding_repo.list(deal_id, investor_id, status).await?)
    }

    /// Totals for a deal plus the caller's view of its requests
    pub async fn for_deal(&self, actor: &Profile, deal_id: Uuid) -> AppResult<DealFunding> {
        let deal = self
            .deal_repo
            .find_by_id(deal_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Deal {} not found", deal_id)))?;
        if actor.role_enum() == Role::Investor && deal.status_enum() != DealStatus::Offer {
            return Err(AppError::NotFound(format!("Deal {} not found", deal_id)));
        }

        let requests = self.list(actor, Some(deal_id), None).await?;
        let totals = self.funding_repo.totals_for_deal(deal_id).await?;
        Ok(DealFunding {
            deal_id,
            totals,
            requests,
        })
    }

    pub async fn decide(
        &self,
        actor: &Profile,
        id: Uuid,
        decision: FundingDecision,
    ) -> AppResult<FundingRequest> {
        if !actor.is_admin() {
            return Err(AppError::Forbidden(
                "Only admins decide funding requests".to_string(),
            ));
        }

        let decided = self.finish_pending(id, decision.status(), Some(actor.id)).await?;
        info!("Funding request {} {} by {}", id, decided.status, actor.id);
        self.audit
            .record_quietly(
                Some(actor.id),
                "funding_decided",
                "funding_request",
                Some(id),
                json!({ "status": decided.status, "amount": decided.amount.to_string() }),
            )
            .await;

        let notification = NewNotification {
            recipient_id: decided.investor_id,
            kind: NotificationKind::FundingDecided,
            title: "Funding request decided".to_string(),
            body: format!("Your request for {} was {}", decided.amount, decided.status),
            deal_id: Some(decided.deal_id),
        };
        if let Err(e) = self.notifications.notify(notification).await {
            warn!("Failed to notify investor {}: {}", decided.investor_id, e);
        }

        Ok(decided)
    }

    pub async fn withdraw(&self, actor: &Profile, id: Uuid) -> AppResult<FundingRequest> {
        let request = self
            .funding_repo
            .find_by_id(id)
            .await?
            .filter(|r| r.investor_id == actor.id)
            .ok_or_else(|| AppError::NotFound(format!("Funding request {} not found", id)))?;

        let withdrawn = self
            .finish_pending(request.id, FundingStatus::Withdrawn, None)
            .await?;
        self.audit
            .record_quietly(
                Some(actor.id),
                "funding_withdrawn",
                "funding_request",
                Some(id),
                json!({ "deal_id": withdrawn.deal_id }),
            )
            .await;
        Ok(withdrawn)
    }

    async fn finish_pending(
        &self,
        id: Uuid,
        status: FundingStatus,
        decided_by: Option<Uuid>,
    ) -> AppResult<FundingRequest> {
        if let Some(updated) = self
            .funding_repo
            .transition_pending(id, status, decided_by)
            .await?
        {
            return Ok(updated);
        }

        match self.funding_repo.find_by_id(id).await? {
            Some(current) => Err(AppError::Conflict(format!(
                "Funding request is already {}",
                current.status
            ))),
            None => Err(AppError::NotFound(format!("Funding request {} not found", id))),
        }
    }
}

fn validate_amount(amount: Decimal) -> AppResult<()> {
    if amount < Decimal::ZERO {
        return Err(AppError::Validation(
            "amount must not be negative".to_string(),
        ));
    }
    if amount > Decimal::from(MAX_FUNDING_AMOUNT) {
        return Err(AppError::Validation(format!(
            "amount exceeds the maximum of {}",
            MAX_FUNDING_AMOUNT
        )));
    }
    if amount.scale() > 2 && amount != amount.round_dp(2) {
        return Err(AppError::Validation(
            "amount has more than two decimal places".to_string(),
        ));
    }
    Ok(())
}
