//! Who may see and act on a deal.

use crate::models::{Deal, DealStatus, Role};
use uuid::Uuid;

/// Visibility: admins see everything, agents their own deals, underwriters their
/// assignments plus the unassigned queue, investors only open offers.
pub fn can_view_deal(actor_id: Uuid, role: Role, deal: &Deal) -> bool {
    match role {
        Role::Admin => true,
        Role::Agent => deal.is_owned_by(actor_id),
        Role::Underwriter => {
            deal.is_assigned_to(actor_id)
                || (deal.assigned_underwriter_id.is_none()
                    && matches!(
                        deal.status_enum(),
                        DealStatus::Submitted | DealStatus::Underwriting
                    ))
        }
        Role::Investor => deal.status_enum() == DealStatus::Offer,
    }
}

/// Underwriting work (evaluations, e-signature) needs the assignment or admin rights
pub fn can_underwrite_deal(actor_id: Uuid, role: Role, deal: &Deal) -> bool {
    match role {
        Role::Admin => true,
        Role::Underwriter => deal.is_assigned_to(actor_id),
        _ => false,
    }
}

/// Agents may edit or delete their own deal until underwriting starts
pub fn can_edit_deal(actor_id: Uuid, role: Role, deal: &Deal) -> bool {
    match role {
        Role::Admin => !deal.status_enum().is_terminal(),
        Role::Agent => deal.is_owned_by(actor_id) && deal.status_enum() == DealStatus::Submitted,
        _ => false,
    }
}

/// Documents are read by the deal's agent, its assigned underwriter and admins.
/// Investors read the documents of open offers.
pub fn can_read_attachments(actor_id: Uuid, role: Role, deal: &Deal) -> bool {
    match role {
        Role::Admin => true,
        Role::Agent => deal.is_owned_by(actor_id),
        Role::Underwriter => deal.is_assigned_to(actor_id),
        Role::Investor => deal.status_enum() == DealStatus::Offer,
    }
}

/// Documents can be added by the deal's agent, its underwriter or an admin while it is open
pub fn can_upload_to_deal(actor_id: Uuid, role: Role, deal: &Deal) -> bool {
    if deal.status_enum().is_terminal() {
        return false;
    }
    match role {
        Role::Admin => true,
        Role::Agent => deal.is_owned_by(actor_id),
        Role::Underwriter => deal.is_assigned_to(actor_id),
        Role::Investor => false,
    }
}

/// Role side of a status change. Pipeline legality is checked separately.
pub fn can_transition_deal(actor_id: Uuid, role: Role, deal: &Deal, to: DealStatus) -> bool {
    let from = deal.status_enum();
    match role {
        Role::Admin => true,
        Role::Underwriter => match (from, to) {
            // picking up an unassigned deal is allowed; the service assigns it
            (DealStatus::Submitted, DealStatus::Underwriting) => {
                deal.assigned_underwriter_id.is_none() || deal.is_assigned_to(actor_id)
            }
            _ => deal.is_assigned_to(actor_id),
        },
        // an agent can only withdraw a deal nobody has started on
        Role::Agent => {
            deal.is_owned_by(actor_id)
                && from == DealStatus::Submitted
                && to == DealStatus::Rejected
        }
        Role::Investor => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn deal(agent_id: Uuid, underwriter: Option<Uuid>, status: DealStatus) -> Deal {
        let now = chrono::Utc::now().naive_utc();
        Deal {
            id: Uuid::new_v4(),
            agent_id,
            title: "12 Oak St".to_string(),
            status: status.as_str().to_string(),
            asking_price: Decimal::from(150_000),
            notes: None,
            assigned_underwriter_id: underwriter,
            rejection_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_view_rules() {
        let agent = Uuid::new_v4();
        let other = Uuid::new_v4();
        let uw = Uuid::new_v4();

        let d = deal(agent, None, DealStatus::Submitted);
        assert!(can_view_deal(agent, Role::Agent, &d));
        assert!(!can_view_deal(other, Role::Agent, &d));
        assert!(can_view_deal(uw, Role::Underwriter, &d));
        assert!(!can_view_deal(other, Role::Investor, &d));
        assert!(can_view_deal(other, Role::Admin, &d));

        let d = deal(agent, Some(uw), DealStatus::Underwriting);
        assert!(can_view_deal(uw, Role::Underwriter, &d));
        assert!(!can_view_deal(other, Role::Underwriter, &d));

        let d = deal(agent, Some(uw), DealStatus::Offer);
        assert!(can_view_deal(other, Role::Investor, &d));
    }

    #[test]
    fn test_edit_only_while_submitted() {
        let agent = Uuid::new_v4();
        assert!(can_edit_deal(agent, Role::Agent, &deal(agent, None, DealStatus::Submitted)));
        assert!(!can_edit_deal(agent, Role::Agent, &deal(agent, None, DealStatus::Underwriting)));
        assert!(!can_edit_deal(Uuid::new_v4(), Role::Agent, &deal(agent, None, DealStatus::Submitted)));
        assert!(!can_edit_deal(agent, Role::Admin, &deal(agent, None, DealStatus::Closed)));
    }

    #[test]
    fn test_transition_roles() {
        let agent = Uuid::new_v4();
        let uw = Uuid::new_v4();
        let other_uw = Uuid::new_v4();

        let unassigned = deal(agent, None, DealStatus::Submitted);
        assert!(can_transition_deal(uw, Role::Underwriter, &unassigned, DealStatus::Underwriting));
        assert!(can_transition_deal(agent, Role::Agent, &unassigned, DealStatus::Rejected));
        assert!(!can_transition_deal(agent, Role::Agent, &unassigned, DealStatus::Underwriting));

        let assigned = deal(agent, Some(uw), DealStatus::Underwriting);
        assert!(can_transition_deal(uw, Role::Underwriter, &assigned, DealStatus::Offer));
        assert!(!can_transition_deal(other_uw, Role::Underwriter, &assigned, DealStatus::Offer));
        assert!(!can_transition_deal(agent, Role::Agent, &assigned, DealStatus::Rejected));
        assert!(!can_transition_deal(Uuid::new_v4(), Role::Investor, &assigned, DealStatus::Offer));
    }

    #[test]
    fn test_upload_rules() {
        let agent = Uuid::new_v4();
        let uw = Uuid::new_v4();
        let d = deal(agent, Some(uw), DealStatus::Offer);
        assert!(can_upload_to_deal(agent, Role::Agent, &d));
        assert!(can_upload_to_deal(uw, Role::Underwriter, &d));
        assert!(!can_upload_to_deal(Uuid::new_v4(), Role::Investor, &d));
        assert!(!can_upload_to_deal(agent, Role::Agent, &deal(agent, Some(uw), DealStatus::Rejected)));
    }

    #[test]
    fn test_attachment_read_rules() {
        let agent = Uuid::new_v4();
        let uw = Uuid::new_v4();

        // the unassigned queue is visible to any underwriter, its documents are not
        let queued = deal(agent, None, DealStatus::Submitted);
        assert!(can_view_deal(uw, Role::Underwriter, &queued));
        assert!(!can_read_attachments(uw, Role::Underwriter, &queued));
        assert!(can_read_attachments(agent, Role::Agent, &queued));
        assert!(can_read_attachments(Uuid::new_v4(), Role::Admin, &queued));

        let assigned = deal(agent, Some(uw), DealStatus::Underwriting);
        assert!(can_read_attachments(uw, Role::Underwriter, &assigned));
        assert!(!can_read_attachments(Uuid::new_v4(), Role::Underwriter, &assigned));
        assert!(!can_read_attachments(Uuid::new_v4(), Role::Investor, &assigned));

        let offer = deal(agent, Some(uw), DealStatus::Offer);
        assert!(can_read_attachments(Uuid::new_v4(), Role::Investor, &offer));
        assert!(!can_read_attachments(Uuid::new_v4(), Role::Agent, &offer));
    }

    #[test]
    fn test_underwrite_requires_assignment() {
        let uw = Uuid::new_v4();
        let d = deal(Uuid::new_v4(), Some(uw), DealStatus::Underwriting);
        assert!(can_underwrite_deal(uw, Role::Underwriter, &d));
        assert!(!can_underwrite_deal(Uuid::new_v4(), Role::Underwriter, &d));
        assert!(can_underwrite_deal(Uuid::new_v4(), Role::Admin, &d));
    }
}
