//! In-memory mock implementations of the store traits.
//!
//! The token map sits behind a single async mutex, so every transaction
//! serializes against every other one. That is exactly the degraded
//! table-level-locking mode described for stores without row locks; it is
//! fine for tests and useless as a throughput reference.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::application::app_error::{AppError, AppResult};
use crate::application::audit::{AuditLogRepo, AuditSink};
use crate::application::use_cases::authenticate::AuthUseCases;
use crate::application::use_cases::tokens::{TokenRepo, TokenTx, TokenUseCases};
use crate::domain::entities::{AuditLogEntry, Token};
use crate::infra::config::SettingsHandle;

#[derive(Default)]
pub struct InMemoryStore {
    tokens: Arc<AsyncMutex<HashMap<Uuid, Token>>>,
    audit: Mutex<Vec<AuditLogEntry>>,
    find_calls: Arc<AtomicUsize>,
    fail_audit: AtomicBool,
    all_prefixes_taken: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Direct read of a stored row, bypassing the transaction protocol.
    pub fn get(&self, id: Uuid) -> Option<Token> {
        self.tokens
            .try_lock()
            .expect("token map locked by an open transaction")
            .get(&id)
            .cloned()
    }

    /// Number of `find_by_*_for_update` calls made so far.
    pub fn find_calls(&self) -> usize {
        self.find_calls.load(Ordering::SeqCst)
    }

    /// Make every audit insert fail, to exercise sink failure isolation.
    pub fn set_fail_audit(&self, fail: bool) {
        self.fail_audit.store(fail, Ordering::SeqCst);
    }

    /// Make every prefix look taken, to exercise prefix exhaustion.
    pub fn set_all_prefixes_taken(&self, taken: bool) {
        self.all_prefixes_taken.store(taken, Ordering::SeqCst);
    }

    pub fn clear_audit(&self) {
        self.audit.lock().unwrap().clear();
    }
}

struct InMemoryTx {
    guard: OwnedMutexGuard<HashMap<Uuid, Token>>,
    pending: Vec<Token>,
    find_calls: Arc<AtomicUsize>,
}

#[async_trait]
impl TokenRepo for InMemoryStore {
    async fn begin(&self) -> AppResult<Box<dyn TokenTx>> {
        let guard = self.tokens.clone().lock_owned().await;
        Ok(Box::new(InMemoryTx {
            guard,
            pending: Vec::new(),
            find_calls: self.find_calls.clone(),
        }))
    }

    async fn prefix_exists(&self, prefix: &str) -> AppResult<bool> {
        if self.all_prefixes_taken.load(Ordering::SeqCst) {
            return Ok(true);
        }
        let tokens = self.tokens.lock().await;
        Ok(tokens.values().any(|t| t.prefix == prefix))
    }

    async fn insert(&self, token: &Token) -> AppResult<()> {
        let mut tokens = self.tokens.lock().await;
        if tokens
            .values()
            .any(|t| t.prefix == token.prefix || t.key == token.key)
        {
            return Err(AppError::Database(
                "unique constraint violation on tokens".into(),
            ));
        }
        tokens.insert(token.id, token.clone());
        Ok(())
    }
}

#[async_trait]
impl TokenTx for InMemoryTx {
    async fn find_by_prefix_for_update(&mut self, prefix: &str) -> AppResult<Option<Token>> {
        self.find_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.guard.values().find(|t| t.prefix == prefix).cloned())
    }

    async fn find_by_id_for_update(&mut self, id: Uuid) -> AppResult<Option<Token>> {
        self.find_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.guard.get(&id).cloned())
    }

    async fn save(&mut self, token: &Token) -> AppResult<()> {
        self.pending.push(token.clone());
        Ok(())
    }

    async fn commit(mut self: Box<Self>) -> AppResult<()> {
        // Writes apply on commit only; a dropped transaction discards them.
        for token in self.pending.drain(..) {
            self.guard.insert(token.id, token);
        }
        Ok(())
    }
}

#[async_trait]
impl AuditLogRepo for InMemoryStore {
    async fn insert_entry(&self, entry: &AuditLogEntry) -> AppResult<()> {
        if self.fail_audit.load(Ordering::SeqCst) {
            return Err(AppError::Database("audit store unavailable".into()));
        }
        self.audit.lock().unwrap().push(entry.clone());
        Ok(())
    }

    async fn list_recent(&self, limit: i64) -> AppResult<Vec<AuditLogEntry>> {
        let mut entries = self.audit.lock().unwrap().clone();
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        entries.truncate(limit as usize);
        Ok(entries)
    }
}

/// Store + lifecycle manager wired over in-memory repos.
pub fn test_lifecycle(overrides: Value) -> (Arc<InMemoryStore>, TokenUseCases) {
    let settings = SettingsHandle::from_overrides(&overrides).expect("test settings");
    let store = Arc::new(InMemoryStore::new());
    let sink = AuditSink::new(store.clone(), settings.clone());
    let tokens = TokenUseCases::new(store.clone(), sink, settings);
    (store, tokens)
}

/// Full engine wiring: store, lifecycle manager, authentication engine and
/// the live settings handle (for reload tests).
pub fn test_env(
    overrides: Value,
) -> (
    Arc<InMemoryStore>,
    TokenUseCases,
    AuthUseCases,
    SettingsHandle,
) {
    let settings = SettingsHandle::from_overrides(&overrides).expect("test settings");
    let store = Arc::new(InMemoryStore::new());
    let sink = AuditSink::new(store.clone(), settings.clone());
    let tokens = TokenUseCases::new(store.clone(), sink.clone(), settings.clone());
    let auth = AuthUseCases::new(store.clone(), sink, settings.clone());
    (store, tokens, auth, settings)
}
