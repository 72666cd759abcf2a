use crate::error::{AppError, AppResult};
use crate::models::{Attachment, Deal, NotificationKind, Profile};
use crate::repositories::{AttachmentRepository, DealRepository};
use crate::services::access::{can_read_attachments, can_upload_to_deal, can_view_deal};
use crate::services::{AuditTrailService, NotificationService};
use crate::storage::{sanitize_file_name, ObjectStore};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// An upload as received from the client
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Service for deal documents
pub struct AttachmentService {
    attachment_repo: Arc<AttachmentRepository>,
    deal_repo: Arc<DealRepository>,
    store: Arc<dyn ObjectStore>,
    audit: Arc<AuditTrailService>,
    notifications: Arc<NotificationService>,
    max_upload_bytes: usize,
}

impl AttachmentService {
    pub fn new(
        attachment_repo: Arc<AttachmentRepository>,
        deal_repo: Arc<DealRepository>,
        store: Arc<dyn ObjectStore>,
        audit: Arc<AuditTrailService>,
        notifications: Arc<NotificationService>,
        max_upload_bytes: usize,
    ) -> Self {
        Self {
            attachment_repo,
            deal_repo,
            store,
            audit,
            notifications,
            max_upload_bytes,
        }
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_bytes
    }

    /// The deal, when the actor may read its documents. Deals the actor cannot see are 404.
    async fn readable_deal(&self, actor: &Profile, deal_id: Uuid) -> AppResult<Deal> {
        let deal = self
            .deal_repo
            .find_by_id(deal_id)
            .await?
            .filter(|d| can_view_deal(actor.id, actor.role_enum(), d))
            .ok_or_else(|| AppError::NotFound(format!("Deal {} not found", deal_id)))?;

        if !can_read_attachments(actor.id, actor.role_enum(), &deal) {
            return Err(AppError::Forbidden(
                "Documents are limited to the deal's agent and assigned underwriter".to_string(),
            ));
        }
        Ok(deal)
    }

    /// Store the bytes, then record the metadata. The object is removed if the insert fails.
    pub async fn upload(
        &self,
        actor: &Profile,
        deal_id: Uuid,
        upload: Upload,
    ) -> AppResult<Attachment> {
        let deal = self.readable_deal(actor, deal_id).await?;
        if !can_upload_to_deal(actor.id, actor.role_enum(), &deal) {
            return Err(AppError::Forbidden(
                "You cannot add documents to this deal".to_string(),
            ));
        }
        check_size(upload.bytes.len(), self.max_upload_bytes)?;

        let file_name = sanitize_file_name(&upload.file_name);
        let content_type = normalize_content_type(upload.content_type.as_deref());
        let key = storage_key(deal_id, Uuid::new_v4(), &file_name);

        self.store.put(&key, &upload.bytes).await?;

        let attachment = match self
            .attachment_repo
            .create(
                deal_id,
                actor.id,
                &file_name,
                &content_type,
                upload.bytes.len() as i64,
                &key,
            )
            .await
        {
            Ok(attachment) => attachment,
            Err(e) => {
                if let Err(cleanup) = self.store.delete(&key).await {
                    warn!("Failed to remove orphaned object {}: {}", key, cleanup);
                }
                return Err(e.into());
            }
        };

        info!(
            "Stored {} ({} bytes) on deal {}",
            attachment.file_name, attachment.size_bytes, deal_id
        );
        self.audit
            .record_quietly(
                Some(actor.id),
                "document_uploaded",
                "attachment",
                Some(attachment.id),
                json!({
                    "deal_id": deal_id,
                    "file_name": attachment.file_name,
                    "size_bytes": attachment.size_bytes,
                }),
            )
            .await;

        let mut recipients = vec![deal.agent_id];
        recipients.extend(deal.assigned_underwriter_id);
        self.notifications
            .notify_many(
                &recipients,
                Some(actor.id),
                NotificationKind::DocumentUploaded,
                "Document uploaded",
                &format!("{} was added to {}", attachment.file_name, deal.title),
                Some(deal_id),
            )
            .await;

        Ok(attachment)
    }

    pub async fn list(&self, actor: &Profile, deal_id: Uuid) -> AppResult<Vec<Attachment>> {
        self.readable_deal(actor, deal_id).await?;
        Ok(self.attachment_repo.list_by_deal(deal_id).await?)
    }

    /// Metadata and bytes of one document
    pub async fn download(&self, actor: &Profile, id: Uuid) -> AppResult<(Attachment, Vec<u8>)> {
        let attachment = self.find(id).await?;
        self.readable_deal(actor, attachment.deal_id).await?;
        let bytes = self.store.get(&attachment.storage_key).await?;
        Ok((attachment, bytes))
    }

    /// Uploaders and admins can remove a document
    pub async fn delete(&self, actor: &Profile, id: Uuid) -> AppResult<()> {
        let attachment = self.find(id).await?;
        let deal = self.readable_deal(actor, attachment.deal_id).await?;
        if !(actor.is_admin() || attachment.uploaded_by == actor.id) {
            return Err(AppError::Forbidden(
                "Only the uploader or an admin can delete a document".to_string(),
            ));
        }

        self.attachment_repo.delete(id).await?;
        if let Err(e) = self.store.delete(&attachment.storage_key).await {
            warn!("Failed to remove object {}: {}", attachment.storage_key, e);
        }

        self.audit
            .record_quietly(
                Some(actor.id),
                "document_deleted",
                "attachment",
                Some(id),
                json!({ "deal_id": deal.id, "file_name": attachment.file_name }),
            )
            .await;
        Ok(())
    }

    async fn find(&self, id: Uuid) -> AppResult<Attachment> {
        self.attachment_repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Attachment {} not found", id)))
    }
}

fn check_size(size: usize, max: usize) -> AppResult<()> {
    if size == 0 {
        return Err(AppError::Validation("file is empty".to_string()));
    }
    if size > max {
        return Err(AppError::Validation(format!(
            "file is {} bytes; the limit is {}",
            size, max
        )));
    }
    Ok(())
}

fn normalize_content_type(raw: Option<&str>) -> String {
    raw.map(|ct| ct.split(';').next().unwrap_or(ct).trim().to_lowercase())
        .filter(|ct| ct.contains('/') && !ct.contains(char::is_whitespace))
        .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string())
}

fn storage_key(deal_id: Uuid, attachment_key: Uuid, file_name: &str) -> String {
    format!("deals/{}/{}-{}", deal_id, attachment_key.simple(), file_name)
}
