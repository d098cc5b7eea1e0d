use chrono::{DateTime, Utc};
use strum::{Display, EnumString};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum AuditAction {
    AuthSuccess,
    AuthFailed,
    Revoked,
    Rotated,
}

/// Request-level metadata captured alongside an audit entry. All fields are
/// optional at the transport boundary; a missing context yields empty
/// path/method and null ip/user-agent on the persisted entry.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub path: String,
    pub method: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// Write-once audit record. Never mutated or deleted by this crate;
/// ordering (most recent first) is for display only.
#[derive(Debug, Clone)]
pub struct AuditLogEntry {
    pub id: Uuid,
    /// Back-reference to the token, when one was resolved. Failed lookups
    /// produce entries with no token.
    pub token_id: Option<Uuid>,
    pub action: AuditAction,
    pub path: String,
    pub method: String,
    pub status_code: u16,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    /// Free-form structured payload: outcome code, actor id, purge flag.
    pub extra: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl AuditLogEntry {
    pub fn new(
        action: AuditAction,
        token_id: Option<Uuid>,
        context: Option<&RequestContext>,
        status_code: u16,
        extra: serde_json::Value,
    ) -> Self {
        let context = context.cloned().unwrap_or_default();
        Self {
            id: Uuid::new_v4(),
            token_id,
            action,
            path: context.path,
            method: context.method,
            status_code,
            ip_address: context.ip_address,
            user_agent: context.user_agent,
            extra,
            created_at: Utc::now(),
        }
    }
}
