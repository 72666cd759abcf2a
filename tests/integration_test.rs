mod helpers;

use dealflow_backend::error::AppError;
use dealflow_backend::models::*;
use dealflow_backend::services::*;
use dealflow_backend::websocket::{Channel, WsMessage};
use dealflow_backend::AppState;
use helpers::*;
use rust_decimal::Decimal;
use sqlx::PgPool;
use std::sync::Arc;

struct Cast {
    admin: Profile,
    agent: Profile,
    underwriter: Profile,
    investor: Profile,
}

async fn cast(state: &Arc<AppState>) -> Cast {
    let admin = state
        .profile_service
        .bootstrap_admin("admin@example.com")
        .await
        .expect("bootstrap failed")
        .expect("first admin should be created")
        .profile;

    let mut created = Vec::new();
    for (email, role) in [
        ("agent@example.com", Role::Agent),
        ("uw@example.com", Role::Underwriter),
        ("investor@example.com", Role::Investor),
    ] {
        let issued = state
            .profile_service
            .create(Some(admin.id), &new_profile(email, role))
            .await
            .expect("Failed to create profile");
        created.push(issued.profile);
    }
    let investor = created.pop().unwrap();
    let underwriter = created.pop().unwrap();
    let agent = created.pop().unwrap();

    Cast {
        admin,
        agent,
        underwriter,
        investor,
    }
}

/// Submitted → underwriting → offer → funded, with notifications and audit along the way
#[sqlx::test]
#[ignore = "requires a live Postgres DATABASE_URL"]
async fn test_deal_pipeline_flow(pool: PgPool) {
    let storage = tempfile::tempdir().unwrap();
    let state = test_state(pool, storage.path()).await;
    let cast = cast(&state).await;

    // Step 1: agent submits
    let submitted = state
        .deal_service
        .submit(&cast.agent, &sample_deal("Elm Street flip"))
        .await
        .expect("submit failed");
    let deal_id = submitted.deal.id;
    assert_eq!(submitted.deal.status_enum(), DealStatus::Submitted);

    let uw_inbox = state
        .notification_service
        .list(cast.underwriter.id, true, None)
        .await
        .unwrap();
    assert!(uw_inbox.iter().any(|n| n.kind == "deal_submitted"));

    // investors cannot see submitted deals
    let hidden = state.deal_service.get(&cast.investor, deal_id).await;
    assert!(matches!(hidden, Err(AppError::NotFound(_))));

    // Step 2: underwriter starts work, claiming the deal
    let mut feed = state.ws_server.feed();
    let watcher = uuid::Uuid::new_v4();
    state.ws_server.subscribe(watcher, Channel::Deal(deal_id)).await;

    let underwriting = state
        .deal_service
        .transition(&cast.underwriter, deal_id, DealStatus::Underwriting, None)
        .await
        .expect("transition failed");
    assert_eq!(underwriting.assigned_underwriter_id, Some(cast.underwriter.id));

    let envelope = feed.try_recv().expect("status change should be published");
    assert_eq!(envelope.channel, Channel::Deal(deal_id));
    assert!(matches!(
        envelope.message,
        WsMessage::DealStatusChanged {
            to: DealStatus::Underwriting,
            ..
        }
    ));

    // Step 3: evaluation with a custom formula
    state
        .underwriting_service
        .create_formula(
            &cast.underwriter,
            &NewCustomFormula {
                name: "spread".to_string(),
                expression: "arv - mao".to_string(),
                description: None,
            },
        )
        .await
        .expect("formula rejected");

    let record = state
        .underwriting_service
        .evaluate_deal(
            &cast.underwriter,
            deal_id,
            EvaluateDealRequest {
                inputs: worked_example_inputs(),
                recommendation: Recommendation::Approve,
                notes: Some("Comps support ARV".to_string()),
            },
        )
        .await
        .expect("evaluation failed");
    assert_eq!(record.max_allowable_offer, Decimal::from(206_000));
    let spread: Decimal = record.custom_results["spread"]["value"]
        .as_str()
        .expect("spread should be a decimal string")
        .parse()
        .unwrap();
    assert_eq!(spread, Decimal::from(94_000));

    let agent_records = state
        .underwriting_service
        .records(&cast.agent, deal_id)
        .await
        .unwrap();
    assert_eq!(agent_records.len(), 1);

    // Step 4: offer, then the investor can see and fund it
    state
        .deal_service
        .transition(&cast.underwriter, deal_id, DealStatus::Offer, None)
        .await
        .expect("offer failed");

    let offers = state
        .deal_service
        .list(&cast.investor, DealFilter::default())
        .await
        .unwrap();
    assert_eq!(offers.len(), 1);

    let request = state
        .funding_service
        .request(
            &cast.investor,
            deal_id,
            &NewFundingRequest {
                amount: Decimal::from(180_000),
                message: Some("Cash, 10 day close".to_string()),
            },
        )
        .await
        .expect("funding request failed");
    assert!(request.is_pending());

    let approved = state
        .funding_service
        .decide(&cast.admin, request.id, FundingDecision::Approve)
        .await
        .expect("decision failed");
    assert_eq!(approved.status_enum(), FundingStatus::Approved);

    let again = state
        .funding_service
        .decide(&cast.admin, request.id, FundingDecision::Reject)
        .await;
    assert!(matches!(again, Err(AppError::Conflict(_))));

    // Step 5: dashboards and audit trail reflect the flow
    match state.dashboard_service.for_profile(&cast.admin).await.unwrap() {
        Dashboard::Admin { funding, .. } => {
            assert_eq!(funding.approved_amount, Decimal::from(180_000));
        }
        other => panic!("unexpected dashboard {:?}", other),
    }
    match state.dashboard_service.for_profile(&cast.investor).await.unwrap() {
        Dashboard::Investor { open_offers, .. } => assert_eq!(open_offers, 1),
        other => panic!("unexpected dashboard {:?}", other),
    }

    let actions: Vec<String> = state
        .audit
        .list(&AuditLogFilter {
            entity_id: Some(deal_id),
            ..Default::default()
        })
        .await
        .unwrap()
        .into_iter()
        .map(|entry| entry.action)
        .collect();
    assert!(actions.contains(&"deal_submitted".to_string()));
    assert!(actions.contains(&"deal_status_changed".to_string()));
    assert!(actions.contains(&"underwriting_recorded".to_string()));

    let investor_inbox = state
        .notification_service
        .list(cast.investor.id, false, None)
        .await
        .unwrap();
    assert!(investor_inbox.iter().any(|n| n.kind == "funding_decided"));
}

#[sqlx::test]
#[ignore = "requires a live Postgres DATABASE_URL"]
async fn test_illegal_transitions_rejected(pool: PgPool) {
    let storage = tempfile::tempdir().unwrap();
    let state = test_state(pool, storage.path()).await;
    let cast = cast(&state).await;

    let deal_id = state
        .deal_service
        .submit(&cast.agent, &sample_deal("Skip ahead"))
        .await
        .unwrap()
        .deal
        .id;

    let skip = state
        .deal_service
        .transition(&cast.admin, deal_id, DealStatus::Closed, None)
        .await;
    assert!(matches!(skip, Err(AppError::Conflict(_))));

    let agent_forward = state
        .deal_service
        .transition(&cast.agent, deal_id, DealStatus::Underwriting, None)
        .await;
    assert!(matches!(agent_forward, Err(AppError::Forbidden(_))));

    let no_reason = state
        .deal_service
        .transition(&cast.agent, deal_id, DealStatus::Rejected, Some("  "))
        .await;
    assert!(matches!(no_reason, Err(AppError::Validation(_))));

    // an agent may withdraw their own submitted deal
    let withdrawn = state
        .deal_service
        .transition(&cast.agent, deal_id, DealStatus::Rejected, Some("Seller backed out"))
        .await
        .unwrap();
    assert_eq!(withdrawn.status_enum(), DealStatus::Rejected);

    let terminal = state
        .deal_service
        .transition(&cast.admin, deal_id, DealStatus::Underwriting, None)
        .await;
    assert!(matches!(terminal, Err(AppError::Conflict(_))));
}

#[sqlx::test]
#[ignore = "requires a live Postgres DATABASE_URL"]
async fn test_offer_stands_when_investor_lookup_fails(pool: PgPool) {
    let storage = tempfile::tempdir().unwrap();
    let state = test_state(pool.clone(), storage.path()).await;
    let cast = cast(&state).await;

    let deal_id = state
        .deal_service
        .submit(&cast.agent, &sample_deal("Announced"))
        .await
        .unwrap()
        .deal
        .id;
    state
        .deal_service
        .transition(&cast.admin, deal_id, DealStatus::Underwriting, None)
        .await
        .unwrap();

    // break the investor query after the status tables are known to work
    sqlx::query("ALTER TABLE profiles RENAME COLUMN is_active TO is_active_moved")
        .execute(&pool)
        .await
        .unwrap();

    let offered = state
        .deal_service
        .transition(&cast.admin, deal_id, DealStatus::Offer, None)
        .await
        .expect("committed transition must not report failure");
    assert_eq!(offered.status_enum(), DealStatus::Offer);
    assert_eq!(
        state.deal_service.find(deal_id).await.unwrap().status_enum(),
        DealStatus::Offer
    );
}

#[sqlx::test]
#[ignore = "requires a live Postgres DATABASE_URL"]
async fn test_funding_requires_offer(pool: PgPool) {
    let storage = tempfile::tempdir().unwrap();
    let state = test_state(pool, storage.path()).await;
    let cast = cast(&state).await;

    let deal_id = state
        .deal_service
        .submit(&cast.agent, &sample_deal("Too early"))
        .await
        .unwrap()
        .deal
        .id;

    let early = state
        .funding_service
        .request(
            &cast.investor,
            deal_id,
            &NewFundingRequest {
                amount: Decimal::from(1_000),
                message: None,
            },
        )
        .await;
    assert!(matches!(early, Err(AppError::Conflict(_))));

    let negative = state
        .funding_service
        .request(
            &cast.investor,
            deal_id,
            &NewFundingRequest {
                amount: Decimal::from(-5),
                message: None,
            },
        )
        .await;
    assert!(matches!(negative, Err(AppError::Validation(_))));

    let by_agent = state
        .funding_service
        .request(
            &cast.agent,
            deal_id,
            &NewFundingRequest {
                amount: Decimal::from(1_000),
                message: None,
            },
        )
        .await;
    assert!(matches!(by_agent, Err(AppError::Forbidden(_))));
}

#[sqlx::test]
#[ignore = "requires a live Postgres DATABASE_URL"]
async fn test_attachment_upload_download_delete(pool: PgPool) {
    let storage = tempfile::tempdir().unwrap();
    let state = test_state(pool, storage.path()).await;
    let cast = cast(&state).await;

    let deal_id = state
        .deal_service
        .submit(&cast.agent, &sample_deal("Paperwork"))
        .await
        .unwrap()
        .deal
        .id;

    let attachment = state
        .attachment_service
        .upload(
            &cast.agent,
            deal_id,
            Upload {
                file_name: "../inspection report.pdf".to_string(),
                content_type: Some("application/pdf".to_string()),
                bytes: b"%PDF-1.4 test".to_vec(),
            },
        )
        .await
        .expect("upload failed");
    assert!(!attachment.file_name.contains('/'));
    assert_eq!(attachment.content_type, "application/pdf");
    assert_eq!(attachment.size_bytes, 13);

    let (meta, bytes) = state
        .attachment_service
        .download(&cast.admin, attachment.id)
        .await
        .unwrap();
    assert_eq!(meta.id, attachment.id);
    assert_eq!(bytes, b"%PDF-1.4 test");

    // investors only see documents on offers
    let hidden = state
        .attachment_service
        .download(&cast.investor, attachment.id)
        .await;
    assert!(matches!(hidden, Err(AppError::NotFound(_))));

    // an underwriter sees the queued deal but not its documents until assigned
    let queued = state
        .attachment_service
        .list(&cast.underwriter, deal_id)
        .await;
    assert!(matches!(queued, Err(AppError::Forbidden(_))));
    let unassigned_download = state
        .attachment_service
        .download(&cast.underwriter, attachment.id)
        .await;
    assert!(matches!(unassigned_download, Err(AppError::Forbidden(_))));

    let too_big = state
        .attachment_service
        .upload(
            &cast.agent,
            deal_id,
            Upload {
                file_name: "big.bin".to_string(),
                content_type: None,
                bytes: vec![0u8; 2048],
            },
        )
        .await;
    assert!(matches!(too_big, Err(AppError::Validation(_))));

    state
        .attachment_service
        .delete(&cast.agent, attachment.id)
        .await
        .unwrap();
    assert!(state
        .attachment_service
        .list(&cast.agent, deal_id)
        .await
        .unwrap()
        .is_empty());
}

#[sqlx::test]
#[ignore = "requires a live Postgres DATABASE_URL"]
async fn test_token_lifecycle(pool: PgPool) {
    let storage = tempfile::tempdir().unwrap();
    let state = test_state(pool, storage.path()).await;
    let admin = state
        .profile_service
        .bootstrap_admin("admin@example.com")
        .await
        .unwrap()
        .unwrap();

    // bootstrap runs once
    assert!(state
        .profile_service
        .bootstrap_admin("other@example.com")
        .await
        .unwrap()
        .is_none());

    let issued = state
        .profile_service
        .create(
            Some(admin.profile.id),
            &new_profile("agent@example.com", Role::Agent),
        )
        .await
        .unwrap();
    let me = state
        .profile_service
        .authenticate(&issued.access_token)
        .await
        .unwrap();
    assert_eq!(me.id, issued.profile.id);

    let rotated = state
        .profile_service
        .rotate_token(admin.profile.id, issued.profile.id)
        .await
        .unwrap();
    assert_ne!(rotated.access_token, issued.access_token);
    assert!(matches!(
        state.profile_service.authenticate(&issued.access_token).await,
        Err(AppError::Unauthorized(_))
    ));

    state
        .profile_service
        .set_active(admin.profile.id, issued.profile.id, false)
        .await
        .unwrap();
    assert!(matches!(
        state.profile_service.authenticate(&rotated.access_token).await,
        Err(AppError::Unauthorized(_))
    ));

    // admins cannot lock themselves out
    let self_demote = state
        .profile_service
        .update_role(admin.profile.id, admin.profile.id, Role::Agent)
        .await;
    assert!(self_demote.is_err());
}

#[sqlx::test]
#[ignore = "requires a live Postgres DATABASE_URL"]
async fn test_notifications_pushed_to_subscribers(pool: PgPool) {
    let storage = tempfile::tempdir().unwrap();
    let state = test_state(pool, storage.path()).await;
    let cast = cast(&state).await;

    let client = uuid::Uuid::new_v4();
    state
        .ws_server
        .subscribe(client, Channel::User(cast.agent.id))
        .await;
    let mut feed = state.ws_server.feed();

    let notification = state
        .notification_service
        .notify(NewNotification {
            recipient_id: cast.agent.id,
            kind: NotificationKind::DealAssigned,
            title: "Deal assigned".to_string(),
            body: "Elm Street has an underwriter".to_string(),
            deal_id: None,
        })
        .await
        .unwrap();

    let envelope = feed.try_recv().expect("notification should be pushed");
    assert_eq!(envelope.channel, Channel::User(cast.agent.id));
    match envelope.message {
        WsMessage::Notification { notification: pushed } => {
            assert_eq!(pushed.id, notification.id)
        }
        other => panic!("unexpected message {:?}", other),
    }

    assert_eq!(
        state
            .notification_service
            .unread_count(cast.agent.id)
            .await
            .unwrap(),
        1
    );
    let other = state
        .notification_service
        .mark_read(notification.id, cast.investor.id)
        .await;
    assert!(matches!(other, Err(AppError::NotFound(_))));
}
