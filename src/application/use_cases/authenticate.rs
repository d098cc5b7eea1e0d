use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use crate::application::app_error::{AppError, AppResult};
use crate::application::audit::AuditSink;
use crate::application::use_cases::tokens::TokenRepo;
use crate::domain::entities::{AuditAction, RequestContext, Token};
use crate::infra::codec::parse_public_token;
use crate::infra::config::SettingsHandle;
use crate::infra::hashers::get_hasher;

/// The authentication engine: one terminal outcome per call, no retries.
///
/// Malformed input, checksum mismatch, unknown prefix and wrong secret all
/// collapse into [`AppError::InvalidToken`] so a caller cannot probe which
/// stage failed; revocation and expiry are the only distinguishable states.
#[derive(Clone)]
pub struct AuthUseCases {
    repo: Arc<dyn TokenRepo>,
    audit: AuditSink,
    settings: SettingsHandle,
}

impl AuthUseCases {
    pub fn new(repo: Arc<dyn TokenRepo>, audit: AuditSink, settings: SettingsHandle) -> Self {
        Self {
            repo,
            audit,
            settings,
        }
    }

    /// Validate a raw public token string and stamp its last-used time.
    ///
    /// Returns the token record, including its scope set, for an external
    /// authorization layer to inspect. Store-level failures (`Database`,
    /// `LockTimeout`) propagate as-is; `LockTimeout` is transient and the
    /// whole call is safe to retry.
    pub async fn authenticate(
        &self,
        raw: &str,
        context: Option<&RequestContext>,
    ) -> AppResult<Token> {
        let settings = self.settings.snapshot();

        if raw.is_empty() {
            return self.fail(AppError::InvalidToken, None, context).await;
        }

        let (prefix, secret) = match parse_public_token(raw, settings.checksum_digits) {
            Ok(parts) => parts,
            Err(diag) => {
                // Diagnostics stay internal; the caller sees InvalidToken.
                tracing::debug!(%diag, "token parse failed");
                return self.fail(AppError::InvalidToken, None, context).await;
            }
        };

        let mut tx = self.repo.begin().await?;
        let Some(mut token) = tx.find_by_prefix_for_update(&prefix).await? else {
            drop(tx);
            // Unknown prefix is indistinguishable from a malformed token.
            return self.fail(AppError::InvalidToken, None, context).await;
        };

        let now = Utc::now();
        if token.revoked || token.purged {
            drop(tx);
            return self
                .fail(AppError::RevokedToken, Some(token.id), context)
                .await;
        }
        if token.is_expired(now) {
            drop(tx);
            return self
                .fail(AppError::ExpiredToken, Some(token.id), context)
                .await;
        }

        // Resolved only past the state checks: revoked and expired tokens
        // never reach the hasher.
        let hasher = get_hasher(&settings)?;
        if !hasher.verify(&secret, &token.key) {
            drop(tx);
            return self
                .fail(AppError::InvalidToken, Some(token.id), context)
                .await;
        }

        token.mark_used(now);
        tx.save(&token).await?;
        tx.commit().await?;

        self.audit
            .record(AuditAction::AuthSuccess, Some(token.id), context, 200, None)
            .await;

        Ok(token)
    }

    /// Terminal failure: emit one `auth_failed` entry (after the row lock
    /// is released) and surface the outcome.
    async fn fail(
        &self,
        err: AppError,
        token_id: Option<Uuid>,
        context: Option<&RequestContext>,
    ) -> AppResult<Token> {
        self.audit
            .record(
                AuditAction::AuthFailed,
                token_id,
                context,
                401,
                Some(json!({ "code": err.code().as_str() })),
            )
            .await;
        Err(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::audit::AuditLogRepo;
    use crate::application::use_cases::tokens::CreateTokenParams;
    use crate::test_utils::mocks::test_env;
    use chrono::Duration;
    use serde_json::json;

    fn params(name: &str) -> CreateTokenParams {
        CreateTokenParams {
            name: name.into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn fresh_token_authenticates_and_stamps_last_used() {
        let (store, tokens, auth, _settings) = test_env(json!({}));
        let (created, raw) = tokens.create(params("ci-bot")).await.unwrap();
        assert!(created.last_used_at.is_none());

        let authed = auth.authenticate(&raw, None).await.unwrap();
        assert_eq!(authed.id, created.id);
        assert_eq!(authed.scopes, created.scopes);
        assert!(authed.last_used_at.is_some());
        assert!(store.get(created.id).unwrap().last_used_at.is_some());

        let success = store
            .list_recent(10)
            .await
            .unwrap()
            .into_iter()
            .filter(|e| e.action == AuditAction::AuthSuccess)
            .count();
        assert_eq!(success, 1);
    }

    #[tokio::test]
    async fn empty_and_garbage_input_are_invalid() {
        let (store, _tokens, auth, _settings) = test_env(json!({}));

        let err = auth.authenticate("", None).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidToken));

        let err = auth.authenticate("garbage", None).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidToken));

        // Neither attempt reached the store.
        assert_eq!(store.find_calls(), 0);
    }

    #[tokio::test]
    async fn tampered_checksum_fails_without_store_lookup() {
        let (store, tokens, auth, _settings) = test_env(json!({}));
        let (_created, raw) = tokens.create(params("ci-bot")).await.unwrap();

        let mut bytes = raw.clone().into_bytes();
        // Flip a character inside the secret half of the body.
        let colon = raw.find(':').unwrap();
        bytes[colon + 2] = if bytes[colon + 2] == b'a' { b'b' } else { b'a' };
        let tampered = String::from_utf8(bytes).unwrap();

        let before = store.find_calls();
        let err = auth.authenticate(&tampered, None).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidToken));
        assert_eq!(store.find_calls(), before);
    }

    #[tokio::test]
    async fn unknown_prefix_is_indistinguishable_from_malformed() {
        let (_store, tokens, auth, _settings) = test_env(json!({}));
        let (created, raw) = tokens.create(params("ci-bot")).await.unwrap();

        // A structurally valid token for a prefix that is not stored.
        let foreign = crate::infra::codec::build_public_token(
            "tg",
            "zzzzzzzz",
            "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA",
            6,
            3,
        );
        assert_ne!(foreign.full_prefix, created.prefix);

        let err = auth.authenticate(&foreign.token, None).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidToken));

        // Wrong secret against a known prefix: same outcome.
        let (_p, secret) = crate::infra::codec::parse_public_token(&raw, 6).unwrap();
        let wrong = crate::infra::codec::build_public_token(
            "tg",
            created.prefix.rsplit_once('_').unwrap().1,
            &secret.chars().rev().collect::<String>(),
            6,
            3,
        );
        let err = auth.authenticate(&wrong.token, None).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidToken));
    }

    #[tokio::test]
    async fn revoked_token_yields_revoked_outcome() {
        let (_store, tokens, auth, _settings) = test_env(json!({}));
        let (created, raw) = tokens.create(params("ci-bot")).await.unwrap();

        auth.authenticate(&raw, None).await.unwrap();
        tokens.revoke(created.id, false, None, None).await.unwrap();

        let err = auth.authenticate(&raw, None).await.unwrap_err();
        assert!(matches!(err, AppError::RevokedToken));
    }

    #[tokio::test]
    async fn expired_token_fails_before_the_hasher_runs() {
        let (store, tokens, auth, settings) = test_env(json!({}));
        let mut p = params("stale");
        p.expires_at = Some(Utc::now() - Duration::days(1));
        let (_created, raw) = tokens.create(p).await.unwrap();

        // Break the hasher registry: if the engine touched the hasher the
        // outcome would be a config failure, not ExpiredToken.
        settings
            .reload(&json!({"hash_backend": "no-such-backend"}))
            .unwrap();
        store.clear_audit();

        let err = auth.authenticate(&raw, None).await.unwrap_err();
        assert!(matches!(err, AppError::ExpiredToken));

        let failed: Vec<_> = store
            .list_recent(10)
            .await
            .unwrap()
            .into_iter()
            .filter(|e| e.action == AuditAction::AuthFailed)
            .collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].extra["code"], "EXPIRED_TOKEN");
    }

    #[tokio::test]
    async fn rotation_invalidates_the_old_raw_string() {
        let (_store, tokens, auth, _settings) = test_env(json!({}));
        let (created, old_raw) = tokens.create(params("rotate-me")).await.unwrap();

        let new_raw = tokens.rotate(created.id, None, None).await.unwrap();

        let err = auth.authenticate(&old_raw, None).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidToken));

        let authed = auth.authenticate(&new_raw, None).await.unwrap();
        assert_eq!(authed.id, created.id);
    }

    #[tokio::test]
    async fn failed_attempts_carry_outcome_codes_in_audit() {
        let (store, tokens, auth, _settings) = test_env(json!({}));
        let (created, raw) = tokens.create(params("ci-bot")).await.unwrap();
        tokens.revoke(created.id, false, None, None).await.unwrap();
        store.clear_audit();

        let _ = auth.authenticate(&raw, None).await;
        let _ = auth.authenticate("junk", None).await;

        let entries = store.list_recent(10).await.unwrap();
        let codes: Vec<_> = entries
            .iter()
            .filter(|e| e.action == AuditAction::AuthFailed)
            .map(|e| e.extra["code"].as_str().unwrap().to_string())
            .collect();
        assert!(codes.contains(&"REVOKED_TOKEN".to_string()));
        assert!(codes.contains(&"INVALID_TOKEN".to_string()));
        // The revoked attempt resolved a row, so its entry references it.
        let revoked_entry = entries
            .iter()
            .find(|e| e.extra["code"] == "REVOKED_TOKEN")
            .unwrap();
        assert_eq!(revoked_entry.token_id, Some(created.id));
    }

    #[tokio::test]
    async fn ci_bot_full_lifecycle_scenario() {
        // create under a 90-day default -> authenticate -> rotate -> revoke
        let (store, tokens, auth, _settings) = test_env(json!({"default_expiry_days": 90}));

        let (created, raw) = tokens.create(params("ci-bot")).await.unwrap();
        let expected = Utc::now() + Duration::days(90);
        let delta = (created.expires_at.unwrap() - expected).num_seconds().abs();
        assert!(delta <= 5);

        let authed = auth.authenticate(&raw, None).await.unwrap();
        assert!(authed.last_used_at.is_some());

        let new_raw = tokens.rotate(created.id, None, None).await.unwrap();
        assert_ne!(new_raw, raw);
        assert!(matches!(
            auth.authenticate(&raw, None).await.unwrap_err(),
            AppError::InvalidToken
        ));
        // rotation resets usage
        assert!(store.get(created.id).unwrap().last_used_at.is_none());

        tokens.revoke(created.id, false, None, None).await.unwrap();
        assert!(matches!(
            auth.authenticate(&new_raw, None).await.unwrap_err(),
            AppError::RevokedToken
        ));
    }

    #[tokio::test]
    async fn broken_audit_store_does_not_fail_authentication() {
        let (store, tokens, auth, _settings) = test_env(json!({}));
        let (_created, raw) = tokens.create(params("ci-bot")).await.unwrap();
        store.set_fail_audit(true);

        let authed = auth.authenticate(&raw, None).await;
        assert!(authed.is_ok());
    }
}
