use crate::error::AppResult;
use crate::models::{DealStatus, FundingTotals, Profile, Role};
use crate::repositories::{
    DealRepository, FundingRepository, NotificationRepository, ProfileRepository, StatusCount,
    UnderwritingRepository,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Role-specific summary shown on the landing page
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Dashboard {
    Agent {
        deals_by_status: BTreeMap<String, i64>,
        total_deals: i64,
        unread_notifications: i64,
    },
    Underwriter {
        queue_size: i64,
        assigned_by_status: BTreeMap<String, i64>,
        evaluations_recorded: i64,
        unread_notifications: i64,
    },
    Admin {
        deals_by_status: BTreeMap<String, i64>,
        profiles_by_role: BTreeMap<String, i64>,
        funding: FundingTotals,
        unread_notifications: i64,
    },
    Investor {
        open_offers: i64,
        funding: FundingTotals,
        unread_notifications: i64,
    },
}

pub struct DashboardService {
    deal_repo: Arc<DealRepository>,
    profile_repo: Arc<ProfileRepository>,
    record_repo: Arc<UnderwritingRepository>,
    funding_repo: Arc<FundingRepository>,
    notification_repo: Arc<NotificationRepository>,
}

impl DashboardService {
    pub fn new(
        deal_repo: Arc<DealRepository>,
        profile_repo: Arc<ProfileRepository>,
        record_repo: Arc<UnderwritingRepository>,
        funding_repo: Arc<FundingRepository>,
        notification_repo: Arc<NotificationRepository>,
    ) -> Self {
        Self {
            deal_repo,
            profile_repo,
            record_repo,
            funding_repo,
            notification_repo,
        }
    }

    pub async fn for_profile(&self, actor: &Profile) -> AppResult<Dashboard> {
        let unread_notifications = self.notification_repo.unread_count(actor.id).await?;

        let dashboard = match actor.role_enum() {
            Role::Agent => {
                let deals_by_status =
                    status_map(self.deal_repo.count_by_status(Some(actor.id), None).await?);
                Dashboard::Agent {
                    total_deals: deals_by_status.values().sum(),
                    deals_by_status,
                    unread_notifications,
                }
            }
            Role::Underwriter => Dashboard::Underwriter {
                queue_size: self.deal_repo.count_unassigned_queue().await?,
                assigned_by_status: status_map(
                    self.deal_repo.count_by_status(None, Some(actor.id)).await?,
                ),
                evaluations_recorded: self.record_repo.count_by_underwriter(actor.id).await?,
                unread_notifications,
            },
            Role::Admin => Dashboard::Admin {
                deals_by_status: status_map(self.deal_repo.count_by_status(None, None).await?),
                profiles_by_role: self
                    .profile_repo
                    .count_by_role()
                    .await?
                    .into_iter()
                    .map(|c| (c.role, c.count))
                    .collect(),
                funding: self.funding_repo.totals().await?,
                unread_notifications,
            },
            Role::Investor => {
                let all = status_map(self.deal_repo.count_by_status(None, None).await?);
                Dashboard::Investor {
                    open_offers: all.get(DealStatus::Offer.as_str()).copied().unwrap_or(0),
                    funding: self.funding_repo.totals_for_investor(actor.id).await?,
                    unread_notifications,
                }
            }
        };

        Ok(dashboard)
    }
}

/// Counts keyed by status, with every status present
pub fn status_map(counts: Vec<StatusCount>) -> BTreeMap<String, i64> {
    let mut map: BTreeMap<String, i64> = DealStatus::all()
        .iter()
        .map(|s| (s.as_str().to_string(), 0))
        .collect();
    for count in counts {
        map.insert(count.status, count.count);
    }
    map
}
