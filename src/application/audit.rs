use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::application::app_error::AppResult;
use crate::domain::entities::{AuditAction, AuditLogEntry, RequestContext};
use crate::infra::config::SettingsHandle;

#[async_trait]
pub trait AuditLogRepo: Send + Sync {
    async fn insert_entry(&self, entry: &AuditLogEntry) -> AppResult<()>;

    /// Most recent first. Display ordering only; nothing relies on it.
    async fn list_recent(&self, limit: i64) -> AppResult<Vec<AuditLogEntry>>;
}

/// Fire-and-forget audit recorder.
///
/// This is the single point where audit persistence failures are swallowed:
/// a broken audit store must never change the outcome of an authentication
/// or lifecycle operation.
#[derive(Clone)]
pub struct AuditSink {
    repo: Arc<dyn AuditLogRepo>,
    settings: SettingsHandle,
}

impl AuditSink {
    pub fn new(repo: Arc<dyn AuditLogRepo>, settings: SettingsHandle) -> Self {
        Self { repo, settings }
    }

    pub async fn record(
        &self,
        action: AuditAction,
        token_id: Option<Uuid>,
        context: Option<&RequestContext>,
        status_code: u16,
        extra: Option<serde_json::Value>,
    ) {
        if !self.settings.snapshot().enable_audit_log {
            return;
        }

        let entry = AuditLogEntry::new(
            action,
            token_id,
            context,
            status_code,
            extra.unwrap_or_else(|| serde_json::json!({})),
        );

        if let Err(err) = self.repo.insert_entry(&entry).await {
            tracing::error!(error = ?err, action = %action, "failed to write audit log entry");
        }
    }
}
