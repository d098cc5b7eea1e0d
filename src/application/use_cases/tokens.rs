use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use uuid::Uuid;

use crate::application::app_error::{AppError, AppResult};
use crate::application::audit::AuditSink;
use crate::domain::entities::{AuditAction, NAME_MAX_LEN, RequestContext, Token, TokenType};
use crate::infra::codec::{build_public_token, generate_raw_secret};
use crate::infra::config::{Settings, SettingsHandle};
use crate::infra::hashers::get_hasher;

/// Attempts at minting an unused prefix before giving up. Collisions are
/// astronomically rare; the cap only guards against pathological randomness
/// failures.
const PREFIX_ATTEMPTS: usize = 5;
const PREFIX_IDENTIFIER_LEN: usize = 8;

// ============================================================================
// Repository Traits
// ============================================================================

/// Durable store of token rows. Embedding applications supply any
/// conforming implementation; [`crate::adapters::persistence`] ships the
/// Postgres one.
#[async_trait]
pub trait TokenRepo: Send + Sync {
    /// Open a transaction. Every mutation of an existing row goes through
    /// one: the `*_for_update` reads take an exclusive row lock that
    /// `commit` releases. Dropping the transaction rolls it back.
    async fn begin(&self) -> AppResult<Box<dyn TokenTx>>;

    async fn prefix_exists(&self, prefix: &str) -> AppResult<bool>;

    async fn insert(&self, token: &Token) -> AppResult<()>;
}

/// One exclusive unit of work against the token store. At most one
/// in-flight mutator per row; concurrent work on other rows must not block
/// under a store with row-level locking.
#[async_trait]
pub trait TokenTx: Send {
    async fn find_by_prefix_for_update(&mut self, prefix: &str) -> AppResult<Option<Token>>;

    async fn find_by_id_for_update(&mut self, id: Uuid) -> AppResult<Option<Token>>;

    async fn save(&mut self, token: &Token) -> AppResult<()>;

    async fn commit(self: Box<Self>) -> AppResult<()>;
}

// ============================================================================
// Use Cases
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct CreateTokenParams {
    pub name: String,
    pub description: String,
    pub token_type: Option<TokenType>,
    pub created_by: Option<String>,
    pub owner: Option<String>,
    /// None applies the configured default scopes; an explicit empty list
    /// creates a token with no scopes.
    pub scopes: Option<Vec<String>>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Token lifecycle operations: create, rotate, revoke. Each mutation of an
/// existing row runs under the same row-lock protocol as authentication.
#[derive(Clone)]
pub struct TokenUseCases {
    repo: Arc<dyn TokenRepo>,
    audit: AuditSink,
    settings: SettingsHandle,
}

impl TokenUseCases {
    pub fn new(repo: Arc<dyn TokenRepo>, audit: AuditSink, settings: SettingsHandle) -> Self {
        Self {
            repo,
            audit,
            settings,
        }
    }

    /// Create and persist a new token. Returns the record and the raw
    /// public token string; this is the only point where the secret-bearing
    /// string exists, it cannot be recovered later.
    pub async fn create(&self, params: CreateTokenParams) -> AppResult<(Token, String)> {
        let settings = self.settings.snapshot();

        if params.name.is_empty() {
            return Err(AppError::Validation("token name must not be empty".into()));
        }
        if params.name.chars().count() > NAME_MAX_LEN {
            return Err(AppError::Validation(format!(
                "token name exceeds {NAME_MAX_LEN} characters"
            )));
        }
        let scopes = resolve_scopes(params.scopes, &settings)?;

        let secret = generate_raw_secret(settings.secret_length);
        let identifier = self.generate_unique_identifier(&settings).await?;
        let public = build_public_token(
            &settings.token_prefix,
            &identifier,
            &secret,
            settings.checksum_digits,
            settings.hint_length,
        );

        let hasher = get_hasher(&settings)?;
        let now = Utc::now();
        let expires_at = params.expires_at.or_else(|| {
            settings
                .default_expiry_days
                .map(|days| now + Duration::days(days))
        });

        let token = Token {
            id: Uuid::new_v4(),
            name: params.name,
            description: params.description,
            token_type: params.token_type.unwrap_or(TokenType::User),
            created_by: params.created_by,
            owner: params.owner,
            scopes,
            key: hasher.hash(&secret),
            prefix: public.full_prefix.clone(),
            hint: public.hint.clone(),
            created_at: now,
            expires_at,
            last_used_at: None,
            revoked: false,
            purged: false,
        };

        self.repo.insert(&token).await?;
        Ok((token, public.token))
    }

    /// Swap the secret of a live token. The routing prefix is unchanged so
    /// the token identity survives; the old raw string stops verifying the
    /// moment the new key is committed and `last_used_at` resets to "never".
    pub async fn rotate(
        &self,
        id: Uuid,
        actor: Option<&str>,
        context: Option<&RequestContext>,
    ) -> AppResult<String> {
        let settings = self.settings.snapshot();

        let mut tx = self.repo.begin().await?;
        let mut token = tx
            .find_by_id_for_update(id)
            .await?
            .ok_or(AppError::NotFound)?;

        if token.revoked || token.purged {
            return Err(AppError::Validation(
                "cannot rotate a revoked or purged token".into(),
            ));
        }

        let Some((namespace, identifier)) = token.prefix.rsplit_once('_') else {
            return Err(AppError::Internal(format!(
                "token {id} has a malformed prefix"
            )));
        };

        let secret = generate_raw_secret(settings.secret_length);
        let public = build_public_token(
            namespace,
            identifier,
            &secret,
            settings.checksum_digits,
            settings.hint_length,
        );

        let hasher = get_hasher(&settings)?;
        token.key = hasher.hash(&secret);
        token.hint = public.hint.clone();
        token.last_used_at = None;

        tx.save(&token).await?;
        tx.commit().await?;

        self.audit
            .record(
                AuditAction::Rotated,
                Some(token.id),
                context,
                200,
                Some(json!({ "actor_id": actor })),
            )
            .await;

        Ok(public.token)
    }

    /// Idempotently revoke a token; `purge` additionally sets the purged
    /// flag. Exactly one audit entry per actual state transition, so
    /// re-revoking an already-revoked token writes nothing.
    pub async fn revoke(
        &self,
        id: Uuid,
        purge: bool,
        actor: Option<&str>,
        context: Option<&RequestContext>,
    ) -> AppResult<()> {
        let mut tx = self.repo.begin().await?;
        let mut token = tx
            .find_by_id_for_update(id)
            .await?
            .ok_or(AppError::NotFound)?;

        let mut changed = false;
        if !token.revoked {
            token.revoked = true;
            changed = true;
        }
        if purge && !token.purged {
            // purged implies revoked; the flag above is already set.
            token.purged = true;
            changed = true;
        }

        if !changed {
            return Ok(());
        }

        tx.save(&token).await?;
        tx.commit().await?;

        self.audit
            .record(
                AuditAction::Revoked,
                Some(token.id),
                context,
                200,
                Some(json!({ "actor_id": actor, "purge": purge })),
            )
            .await;

        Ok(())
    }

    async fn generate_unique_identifier(&self, settings: &Settings) -> AppResult<String> {
        for _ in 0..PREFIX_ATTEMPTS {
            let identifier = generate_raw_secret(PREFIX_IDENTIFIER_LEN);
            let prefix = format!("{}_{}", settings.token_prefix, identifier);
            if !self.repo.prefix_exists(&prefix).await? {
                return Ok(identifier);
            }
        }
        Err(AppError::PrefixExhausted)
    }
}

fn resolve_scopes(requested: Option<Vec<String>>, settings: &Settings) -> AppResult<Vec<String>> {
    match requested {
        None => Ok(settings.default_scopes.clone()),
        Some(scopes) => {
            for scope in &scopes {
                if !settings.available_scopes.contains(scope) {
                    return Err(AppError::Validation(format!(
                        "scope {scope:?} is not allowed"
                    )));
                }
            }
            Ok(scopes)
        }
    }
}
