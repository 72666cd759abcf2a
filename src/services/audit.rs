use crate::error::{AppError, AppResult};
use crate::models::{AuditLog, AuditLogFilter};
use crate::repositories::AuditLogRepository;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

/// Audit log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub timestamp: i64,
    pub action: String, // "deal_submitted", "deal_status_changed", "funding_decided", ...
    pub entity_type: String,
    pub entity_id: Option<Uuid>,
    pub actor_id: Option<Uuid>,
    pub details: serde_json::Value,
}

impl From<&AuditLog> for AuditLogEntry {
    fn from(log: &AuditLog) -> Self {
        Self {
            timestamp: log.created_at.and_utc().timestamp(),
            action: log.action.clone(),
            entity_type: log.entity_type.clone(),
            entity_id: log.entity_id,
            actor_id: log.actor_id,
            details: log.details.clone(),
        }
    }
}

struct DailyFile {
    date: NaiveDate,
    file: File,
}

/// Appends audit entries as JSON lines to `audit_YYYY-MM-DD.log`, one file per day
pub struct AuditFileMirror {
    log_directory: PathBuf,
    current: Mutex<Option<DailyFile>>,
}

impl AuditFileMirror {
    pub fn new(log_directory: PathBuf) -> AppResult<Self> {
        std::fs::create_dir_all(&log_directory)
            .map_err(|e| AppError::Message(format!("Failed to create log directory: {}", e)))?;

        info!("Audit file mirror initialized: {:?}", log_directory);

        Ok(Self {
            log_directory,
            current: Mutex::new(None),
        })
    }

    pub fn file_for(&self, date: NaiveDate) -> PathBuf {
        self.log_directory
            .join(format!("audit_{}.log", date.format("%Y-%m-%d")))
    }

    pub fn directory(&self) -> &Path {
        &self.log_directory
    }

    pub async fn append(&self, entry: &AuditLogEntry) -> AppResult<()> {
        let json = serde_json::to_string(entry)?;
        let today = chrono::Utc::now().date_naive();

        let mut current = self.current.lock().await;
        let rotate = current.as_ref().map(|d| d.date != today).unwrap_or(true);
        if rotate {
            let path = self.file_for(today);
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(|e| AppError::Message(format!("Failed to open audit log file: {}", e)))?;
            *current = Some(DailyFile { date: today, file });
        }

        if let Some(daily) = current.as_mut() {
            writeln!(daily.file, "{}", json)
                .map_err(|e| AppError::Message(format!("Failed to write audit log: {}", e)))?;
            daily
                .file
                .flush()
                .map_err(|e| AppError::Message(format!("Failed to flush audit log: {}", e)))?;
        }

        Ok(())
    }
}

/// Audit trail service for logging all important actions
pub struct AuditTrailService {
    repo: Arc<AuditLogRepository>,
    mirror: Option<AuditFileMirror>,
}

impl AuditTrailService {
    pub fn new(repo: Arc<AuditLogRepository>, mirror: Option<AuditFileMirror>) -> Self {
        Self { repo, mirror }
    }

    /// Persist an entry, then mirror it to the daily file. A mirror failure is only logged.
    pub async fn record(
        &self,
        actor_id: Option<Uuid>,
        action: &str,
        entity_type: &str,
        entity_id: Option<Uuid>,
        details: serde_json::Value,
    ) -> AppResult<AuditLog> {
        let log = self
            .repo
            .insert(actor_id, action, entity_type, entity_id, &details)
            .await?;

        if let Some(mirror) = &self.mirror {
            if let Err(e) = mirror.append(&AuditLogEntry::from(&log)).await {
                warn!("Audit mirror write failed for {}: {}", log.id, e);
            }
        }

        Ok(log)
    }

    /// Record without failing the caller's operation
    pub async fn record_quietly(
        &self,
        actor_id: Option<Uuid>,
        action: &str,
        entity_type: &str,
        entity_id: Option<Uuid>,
        details: serde_json::Value,
    ) {
        if let Err(e) = self
            .record(actor_id, action, entity_type, entity_id, details)
            .await
        {
            warn!("Failed to record audit entry '{}': {}", action, e);
        }
    }

    pub async fn list(&self, filter: &AuditLogFilter) -> AppResult<Vec<AuditLog>> {
        Ok(self.repo.list(filter).await?)
    }
}
