use crate::error::{AppError, AppResult};
use crate::integrations::{NotificationDispatcher, OutboundMessage};
use crate::models::{NewNotification, Notification, NotificationKind};
use crate::repositories::{NotificationRepository, ProfileRepository};
use crate::websocket::WebSocketServer;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

const DEFAULT_LIST_LIMIT: i64 = 50;
const MAX_LIST_LIMIT: i64 = 200;

/// In-app notifications with realtime push and optional email/SMS delivery
pub struct NotificationService {
    notification_repo: Arc<NotificationRepository>,
    profile_repo: Arc<ProfileRepository>,
    ws_server: Arc<WebSocketServer>,
    dispatcher: NotificationDispatcher,
}

impl NotificationService {
    pub fn new(
        notification_repo: Arc<NotificationRepository>,
        profile_repo: Arc<ProfileRepository>,
        ws_server: Arc<WebSocketServer>,
        dispatcher: NotificationDispatcher,
    ) -> Self {
        Self {
            notification_repo,
            profile_repo,
            ws_server,
            dispatcher,
        }
    }

    /// Persist, push to the recipient's feed, then hand off to the delivery webhook
    pub async fn notify(&self, new: NewNotification) -> AppResult<Notification> {
        let notification = self.notification_repo.create(&new).await?;

        let pushed = self.ws_server.publish_notification(&notification).await;
        debug!(
            "Notification {} ({}) pushed to {} live clients",
            notification.id, notification.kind, pushed
        );

        if self.dispatcher.is_enabled() {
            let dispatcher = self.dispatcher.clone();
            let profile_repo = self.profile_repo.clone();
            let notification = notification.clone();
            tokio::spawn(async move {
                deliver(dispatcher, profile_repo, notification).await;
            });
        }

        Ok(notification)
    }

    /// Notify several recipients, skipping duplicates and `skip`. Failures are logged.
    pub async fn notify_many(
        &self,
        recipients: &[Uuid],
        skip: Option<Uuid>,
        kind: NotificationKind,
        title: &str,
        body: &str,
        deal_id: Option<Uuid>,
    ) -> usize {
        let mut seen: Vec<Uuid> = Vec::with_capacity(recipients.len());
        for &recipient_id in recipients {
            if Some(recipient_id) == skip || seen.contains(&recipient_id) {
                continue;
            }
            seen.push(recipient_id);

            let new = NewNotification {
                recipient_id,
                kind,
                title: title.to_string(),
                body: body.to_string(),
                deal_id,
            };
            if let Err(e) = self.notify(new).await {
                warn!("Failed to notify {}: {}", recipient_id, e);
            }
        }
        seen.len()
    }

    pub async fn list(
        &self,
        recipient_id: Uuid,
        unread_only: bool,
        limit: Option<i64>,
    ) -> AppResult<Vec<Notification>> {
        let limit = limit
            .unwrap_or(DEFAULT_LIST_LIMIT)
            .clamp(1, MAX_LIST_LIMIT);
        Ok(self
            .notification_repo
            .list(recipient_id, unread_only, limit)
            .await?)
    }

    pub async fn unread_count(&self, recipient_id: Uuid) -> AppResult<i64> {
        Ok(self.notification_repo.unread_count(recipient_id).await?)
    }

    pub async fn mark_read(&self, id: Uuid, recipient_id: Uuid) -> AppResult<Notification> {
        self.notification_repo
            .mark_read(id, recipient_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Notification {} not found", id)))
    }

    pub async fn mark_all_read(&self, recipient_id: Uuid) -> AppResult<u64> {
        Ok(self.notification_repo.mark_all_read(recipient_id).await?)
    }
}

async fn deliver(
    dispatcher: NotificationDispatcher,
    profile_repo: Arc<ProfileRepository>,
    notification: Notification,
) {
    let profile = match profile_repo.find_by_id(notification.recipient_id).await {
        Ok(Some(profile)) => profile,
        Ok(None) => return,
        Err(e) => {
            warn!("Could not load recipient {}: {}", notification.recipient_id, e);
            return;
        }
    };

    dispatcher
        .dispatch(&OutboundMessage::email(
            &profile.email,
            &notification.title,
            &notification.body,
        ))
        .await;

    if let Some(phone) = profile.phone.as_deref().filter(|p| !p.trim().is_empty()) {
        dispatcher
            .dispatch(&OutboundMessage::sms(phone, &notification.title, &notification.body))
            .await;
    }
}
