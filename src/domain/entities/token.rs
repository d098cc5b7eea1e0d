use chrono::{DateTime, Utc};
use strum::{Display, EnumString};
use uuid::Uuid;

/// Maximum accepted length for a token name.
pub const NAME_MAX_LEN: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum TokenType {
    User,
    System,
}

/// A bearer credential record.
///
/// Only the hash of the secret (`key`) is ever stored; `prefix` is the
/// public routing half used for lookup and `hint` is a short display
/// fragment that cannot be reversed into either.
#[derive(Debug, Clone)]
pub struct Token {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub token_type: TokenType,
    /// External principal that created the token, if any.
    pub created_by: Option<String>,
    /// External principal the token acts on behalf of, if any.
    pub owner: Option<String>,
    pub scopes: Vec<String>,
    /// Hashed secret, `<algorithm>$<iterations>$<salt>$<digest-hex>`. Unique.
    pub key: String,
    /// Public routing identifier, `<namespace>_<identifier>`. Unique, indexed.
    pub prefix: String,
    pub hint: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub revoked: bool,
    pub purged: bool,
}

impl Token {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| now > at)
    }

    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        !self.revoked && !self.purged && !self.is_expired(now)
    }

    /// Canonical check used by the authentication pipeline. Custom store
    /// implementations must preserve this semantic.
    pub fn can_authenticate(&self, now: DateTime<Utc>) -> bool {
        self.is_active(now)
    }

    /// Stamp the last-used timestamp. Only the authentication engine calls
    /// this; rotation is the only path that clears it again.
    pub fn mark_used(&mut self, now: DateTime<Utc>) {
        self.last_used_at = Some(now);
    }
}
