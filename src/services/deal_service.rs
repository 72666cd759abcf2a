use crate::error::{AppError, AppResult};
use crate::integrations::{DataSource, GeocodingClient};
use crate::models::{
    Deal, DealFilter, DealStatus, DealUpdate, DealWithProperty, NewDeal, NotificationKind,
    Profile, Role,
};
use crate::repositories::{AttachmentRepository, DealRepository, ProfileRepository};
use crate::services::access::{can_edit_deal, can_transition_deal, can_view_deal};
use crate::services::{AuditTrailService, NotificationService};
use crate::storage::ObjectStore;
use crate::websocket::WebSocketServer;
use rust_decimal::Decimal;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

const MAX_TITLE_LEN: usize = 200;

/// Service for the deal pipeline
pub struct DealService {
    deal_repo: Arc<DealRepository>,
    profile_repo: Arc<ProfileRepository>,
    attachment_repo: Arc<AttachmentRepository>,
    store: Arc<dyn ObjectStore>,
    audit: Arc<AuditTrailService>,
    notifications: Arc<NotificationService>,
    ws_server: Arc<WebSocketServer>,
    geocoding: Arc<GeocodingClient>,
}

impl DealService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        deal_repo: Arc<DealRepository>,
        profile_repo: Arc<ProfileRepository>,
        attachment_repo: Arc<AttachmentRepository>,
        store: Arc<dyn ObjectStore>,
        audit: Arc<AuditTrailService>,
        notifications: Arc<NotificationService>,
        ws_server: Arc<WebSocketServer>,
        geocoding: Arc<GeocodingClient>,
    ) -> Self {
        Self {
            deal_repo,
            profile_repo,
            attachment_repo,
            store,
            audit,
            notifications,
            ws_server,
            geocoding,
        }
    }

    /// Submit a new deal with its property
    pub async fn submit(&self, actor: &Profile, new: &NewDeal) -> AppResult<DealWithProperty> {
        if !matches!(actor.role_enum(), Role::Agent | Role::Admin) {
            return Err(AppError::Forbidden("Only agents submit deals".to_string()));
        }
        validate_new_deal(new)?;

        let mut created = self.deal_repo.create(actor.id, new).await?;
        info!("Deal {} submitted by {}", created.deal.id, actor.id);

        if created.property.latitude.is_none() || created.property.longitude.is_none() {
            let geocoded = self
                .geocoding
                .geocode(&created.property.full_address())
                .await;
            // mock coordinates are never persisted
            if geocoded.source == DataSource::Live {
                match self
                    .deal_repo
                    .update_coordinates(created.deal.id, geocoded.latitude, geocoded.longitude)
                    .await
                {
                    Ok(property) => created.property = property,
                    Err(e) => warn!("Failed to store coordinates for {}: {}", created.deal.id, e),
                }
            }
        }

        self.audit
            .record_quietly(
                Some(actor.id),
                "deal_submitted",
                "deal",
                Some(created.deal.id),
                json!({
                    "title": created.deal.title,
                    "asking_price": created.deal.asking_price.to_string(),
                    "address": created.property.full_address(),
                }),
            )
            .await;

        let mut recipients = self.profile_repo.active_ids_by_role(Role::Admin).await?;
        recipients.extend(self.profile_repo.active_ids_by_role(Role::Underwriter).await?);
        self.notifications
            .notify_many(
                &recipients,
                Some(actor.id),
                NotificationKind::DealSubmitted,
                "New deal submitted",
                &format!("{} is waiting for underwriting", created.deal.title),
                Some(created.deal.id),
            )
            .await;

        Ok(created)
    }

    /// Load a deal without visibility checks
    pub async fn find(&self, id: Uuid) -> AppResult<Deal> {
        self.deal_repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Deal {} not found", id)))
    }

    /// Load a deal the actor is allowed to see. Invisible deals read as missing.
    pub async fn find_visible(&self, actor: &Profile, id: Uuid) -> AppResult<Deal> {
        let deal = self.find(id).await?;
        if !can_view_deal(actor.id, actor.role_enum(), &deal) {
            return Err(AppError::NotFound(format!("Deal {} not found", id)));
        }
        Ok(deal)
    }

    pub async fn get(&self, actor: &Profile, id: Uuid) -> AppResult<DealWithProperty> {
        let deal = self.find_visible(actor, id).await?;
        let property = self
            .deal_repo
            .find_property(id)
            .await?
            .ok_or_else(|| AppError::Message(format!("Deal {} has no property", id)))?;
        Ok(DealWithProperty { deal, property })
    }

    /// List deals, narrowed to what the actor may see
    pub async fn list(&self, actor: &Profile, filter: DealFilter) -> AppResult<Vec<Deal>> {
        let filter = scope_filter(actor.id, actor.role_enum(), filter);
        Ok(self.deal_repo.list(&filter).await?)
    }

    pub async fn update(
        &self,
        actor: &Profile,
        id: Uuid,
        update: &DealUpdate,
    ) -> AppResult<DealWithProperty> {
        let deal = self.find_visible(actor, id).await?;
        if !can_edit_deal(actor.id, actor.role_enum(), &deal) {
            return Err(AppError::Forbidden(
                "Deal can only be edited by its agent while submitted".to_string(),
            ));
        }
        validate_update(update)?;

        let updated = self
            .deal_repo
            .update(id, deal.status_enum(), update)
            .await?
            .ok_or_else(|| {
                AppError::Conflict(format!("Deal {} changed status while being edited", id))
            })?;
        self.audit
            .record_quietly(
                Some(actor.id),
                "deal_updated",
                "deal",
                Some(id),
                serde_json::to_value(update_summary(update))?,
            )
            .await;
        Ok(updated)
    }

    /// Assign an underwriter. Admins pick anyone; underwriters may only take a deal themselves.
    pub async fn assign(
        &self,
        actor: &Profile,
        id: Uuid,
        underwriter_id: Option<Uuid>,
    ) -> AppResult<Deal> {
        let deal = self.find(id).await?;
        if deal.status_enum().is_terminal() {
            return Err(AppError::Conflict(format!(
                "Deal is {} and can no longer be assigned",
                deal.status
            )));
        }

        let assigned = match actor.role_enum() {
            Role::Admin => {
                let target_id = underwriter_id.ok_or_else(|| {
                    AppError::Validation("underwriter_id is required".to_string())
                })?;
                let target = self
                    .profile_repo
                    .find_by_id(target_id)
                    .await?
                    .ok_or_else(|| AppError::NotFound(format!("Profile {} not found", target_id)))?;
                if target.role_enum() != Role::Underwriter || !target.is_active {
                    return Err(AppError::Validation(format!(
                        "{} is not an active underwriter",
                        target.email
                    )));
                }
                self.deal_repo.assign_underwriter(id, target_id).await?
            }
            Role::Underwriter => {
                if underwriter_id.is_some_and(|target| target != actor.id) {
                    return Err(AppError::Forbidden(
                        "Underwriters can only assign deals to themselves".to_string(),
                    ));
                }
                self.deal_repo.claim(id, actor.id).await?.ok_or_else(|| {
                    AppError::Conflict("Deal is already assigned to another underwriter".to_string())
                })?
            }
            _ => {
                return Err(AppError::Forbidden(
                    "Only underwriters and admins assign deals".to_string(),
                ))
            }
        };

        let underwriter = assigned.assigned_underwriter_id;
        info!("Deal {} assigned to {:?}", id, underwriter);
        self.audit
            .record_quietly(
                Some(actor.id),
                "deal_assigned",
                "deal",
                Some(id),
                json!({
                    "from": deal.assigned_underwriter_id,
                    "to": underwriter,
                }),
            )
            .await;

        let mut recipients = vec![assigned.agent_id];
        recipients.extend(underwriter);
        self.notifications
            .notify_many(
                &recipients,
                Some(actor.id),
                NotificationKind::DealAssigned,
                "Deal assigned",
                &format!("{} has an underwriter", assigned.title),
                Some(id),
            )
            .await;

        Ok(assigned)
    }

    /// Move a deal along the pipeline
    pub async fn transition(
        &self,
        actor: &Profile,
        id: Uuid,
        to: DealStatus,
        reason: Option<&str>,
    ) -> AppResult<Deal> {
        let mut deal = self.find_visible(actor, id).await?;
        let from = deal.status_enum();
        let role = actor.role_enum();

        if !from.can_transition_to(to) {
            return Err(AppError::Conflict(format!(
                "Cannot move deal from {} to {}",
                from, to
            )));
        }
        if !can_transition_deal(actor.id, role, &deal, to) {
            return Err(AppError::Forbidden(format!(
                "Role '{}' may not move this deal from {} to {}",
                role, from, to
            )));
        }

        let reason = reason.map(str::trim).filter(|r| !r.is_empty());
        if to == DealStatus::Rejected && reason.is_none() {
            return Err(AppError::Validation(
                "A reason is required to reject a deal".to_string(),
            ));
        }

        // an underwriter starting on an unassigned deal takes it
        if role == Role::Underwriter && deal.assigned_underwriter_id.is_none() {
            deal = self.deal_repo.claim(id, actor.id).await?.ok_or_else(|| {
                AppError::Conflict("Deal was taken by another underwriter".to_string())
            })?;
        }

        let updated = self
            .deal_repo
            .update_status(id, from, to, reason)
            .await?
            .ok_or_else(|| AppError::Conflict("Deal status changed concurrently".to_string()))?;

        info!("Deal {} moved {} -> {} by {}", id, from, to, actor.id);
        self.audit
            .record_quietly(
                Some(actor.id),
                "deal_status_changed",
                "deal",
                Some(id),
                json!({ "from": from, "to": to, "reason": reason }),
            )
            .await;
        self.ws_server.publish_deal_status(id, from, to).await;

        let body = match reason {
            Some(reason) => format!("{} is now {} ({})", updated.title, to, reason),
            None => format!("{} is now {}", updated.title, to),
        };
        let mut recipients = vec![updated.agent_id];
        recipients.extend(updated.assigned_underwriter_id);
        self.notifications
            .notify_many(
                &recipients,
                Some(actor.id),
                NotificationKind::DealStatusChanged,
                "Deal status changed",
                &body,
                Some(id),
            )
            .await;

        if to == DealStatus::Offer {
            self.announce_offer(&updated).await;
        }

        Ok(updated)
    }

    /// Tell every active investor about a new offer. The transition has already committed.
    async fn announce_offer(&self, deal: &Deal) {
        let investors = match self.profile_repo.active_ids_by_role(Role::Investor).await {
            Ok(ids) => ids,
            Err(e) => {
                warn!("Could not load investors to announce deal {}: {}", deal.id, e);
                return;
            }
        };
        self.notifications
            .notify_many(
                &investors,
                None,
                NotificationKind::DealStatusChanged,
                "New offer available",
                &format!("{} is open for funding", deal.title),
                Some(deal.id),
            )
            .await;
    }

    /// Delete a deal with its property, records and stored documents
    pub async fn delete(&self, actor: &Profile, id: Uuid) -> AppResult<()> {
        let deal = self.find_visible(actor, id).await?;
        let allowed = actor.is_admin() || can_edit_deal(actor.id, actor.role_enum(), &deal);
        if !allowed {
            return Err(AppError::Forbidden(
                "Deal can only be deleted by an admin, or its agent while submitted".to_string(),
            ));
        }

        let keys = self.attachment_repo.storage_keys_for_deal(id).await?;
        if !self.deal_repo.delete(id).await? {
            return Err(AppError::NotFound(format!("Deal {} not found", id)));
        }

        for key in &keys {
            if let Err(e) = self.store.delete(key).await {
                warn!("Orphaned object {} after deleting deal {}: {}", key, id, e);
            }
        }
        debug!("Removed {} stored documents for deal {}", keys.len(), id);

        self.audit
            .record_quietly(
                Some(actor.id),
                "deal_deleted",
                "deal",
                Some(id),
                json!({ "title": deal.title, "status": deal.status }),
            )
            .await;
        Ok(())
    }
}

/// Force role-based limits onto a caller's filter
pub fn scope_filter(actor_id: Uuid, role: Role, mut filter: DealFilter) -> DealFilter {
    match role {
        Role::Admin => {}
        Role::Agent => filter.agent_id = Some(actor_id),
        Role::Underwriter => filter.underwriter_scope = Some(actor_id),
        Role::Investor => filter.status = Some(DealStatus::Offer),
    }
    filter
}

fn validate_new_deal(new: &NewDeal) -> AppResult<()> {
    let title = new.title.trim();
    if title.is_empty() || title.chars().count() > MAX_TITLE_LEN {
        return Err(AppError::Validation(format!(
            "title must be 1 to {} characters",
            MAX_TITLE_LEN
        )));
    }
    non_negative("asking_price", Some(new.asking_price))?;

    let p = &new.property;
    for (field, value) in [
        ("address", &p.address),
        ("city", &p.city),
        ("state", &p.state),
        ("zip", &p.zip),
    ] {
        if value.trim().is_empty() {
            return Err(AppError::Validation(format!("property.{} is required", field)));
        }
    }
    for (field, value) in [
        ("bedrooms", p.bedrooms),
        ("square_feet", p.square_feet),
    ] {
        if value.is_some_and(|v| v < 0) {
            return Err(AppError::Validation(format!(
                "property.{} must not be negative",
                field
            )));
        }
    }
    non_negative("property.bathrooms", p.bathrooms)?;
    non_negative("property.estimated_arv", p.estimated_arv)?;
    non_negative("property.estimated_repairs", p.estimated_repairs)?;

    if p.latitude.is_some_and(|lat| !(-90.0..=90.0).contains(&lat))
        || p.longitude.is_some_and(|lng| !(-180.0..=180.0).contains(&lng))
    {
        return Err(AppError::Validation("property coordinates out of range".to_string()));
    }
    Ok(())
}

fn validate_update(update: &DealUpdate) -> AppResult<()> {
    if let Some(title) = &update.title {
        let title = title.trim();
        if title.is_empty() || title.chars().count() > MAX_TITLE_LEN {
            return Err(AppError::Validation(format!(
                "title must be 1 to {} characters",
                MAX_TITLE_LEN
            )));
        }
    }
    non_negative("asking_price", update.asking_price)?;
    non_negative("estimated_arv", update.estimated_arv)?;
    non_negative("estimated_repairs", update.estimated_repairs)?;
    Ok(())
}

fn non_negative(field: &str, value: Option<Decimal>) -> AppResult<()> {
    match value {
        Some(v) if v < Decimal::ZERO => Err(AppError::Validation(format!(
            "{} must not be negative",
            field
        ))),
        _ => Ok(()),
    }
}

fn update_summary(update: &DealUpdate) -> Vec<&'static str> {
    let mut changed = Vec::new();
    if update.title.is_some() {
        changed.push("title");
    }
    if update.asking_price.is_some() {
        changed.push("asking_price");
    }
    if update.notes.is_some() {
        changed.push("notes");
    }
    if update.estimated_arv.is_some() {
        changed.push("estimated_arv");
    }
    if update.estimated_repairs.is_some() {
        changed.push("estimated_repairs");
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewProperty;

    fn new_deal() -> NewDeal {
        NewDeal {
            title: "12 Oak St flip".to_string(),
            asking_price: Decimal::from(180_000),
            notes: None,
            property: NewProperty {
                address: "12 Oak St".to_string(),
                city: "Austin".to_string(),
                state: "TX".to_string(),
                zip: "78701".to_string(),
                property_type: "single_family".to_string(),
                bedrooms: Some(3),
                bathrooms: Some(Decimal::new(15, 1)),
                square_feet: Some(1_450),
                year_built: Some(1978),
                latitude: None,
                longitude: None,
                estimated_arv: Some(Decimal::from(300_000)),
                estimated_repairs: Some(Decimal::from(20_000)),
            },
        }
    }

    #[test]
    fn test_validate_new_deal() {
        assert!(validate_new_deal(&new_deal()).is_ok());

        let mut d = new_deal();
        d.title = "   ".to_string();
        assert!(validate_new_deal(&d).is_err());

        let mut d = new_deal();
        d.asking_price = Decimal::from(-1);
        assert!(validate_new_deal(&d).is_err());

        let mut d = new_deal();
        d.property.zip = String::new();
        assert!(validate_new_deal(&d).is_err());

        let mut d = new_deal();
        d.property.bedrooms = Some(-2);
        assert!(validate_new_deal(&d).is_err());

        let mut d = new_deal();
        d.property.latitude = Some(123.0);
        assert!(validate_new_deal(&d).is_err());
    }

    #[test]
    fn test_validate_update() {
        assert!(validate_update(&DealUpdate::default()).is_ok());
        let update = DealUpdate {
            estimated_repairs: Some(Decimal::from(-5)),
            ..Default::default()
        };
        assert!(validate_update(&update).is_err());
        let update = DealUpdate {
            title: Some("".to_string()),
            ..Default::default()
        };
        assert!(validate_update(&update).is_err());
    }

    #[test]
    fn test_scope_filter() {
        let me = Uuid::new_v4();
        let requested = DealFilter {
            agent_id: Some(Uuid::new_v4()),
            status: Some(DealStatus::Submitted),
            ..Default::default()
        };

        let f = scope_filter(me, Role::Agent, requested.clone());
        assert_eq!(f.agent_id, Some(me));

        let f = scope_filter(me, Role::Investor, requested.clone());
        assert_eq!(f.status, Some(DealStatus::Offer));

        let f = scope_filter(me, Role::Underwriter, requested.clone());
        assert_eq!(f.underwriter_scope, Some(me));

        let f = scope_filter(me, Role::Admin, requested.clone());
        assert_eq!(f.agent_id, requested.agent_id);
        assert!(f.underwriter_scope.is_none());
    }

    #[test]
    fn test_update_summary() {
        let update = DealUpdate {
            title: Some("New".into()),
            notes: Some("n".into()),
            ..Default::default()
        };
        assert_eq!(update_summary(&update), vec!["title", "notes"]);
    }
}
