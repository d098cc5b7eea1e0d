use std::sync::{Arc, RwLock};

use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    /// An override document referenced a key this crate does not recognize.
    /// Failing fast here protects against silently ignored misconfiguration.
    #[error("Unknown setting: {0:?}")]
    UnknownSetting(String),

    #[error("Invalid value for setting {key:?}: {reason}")]
    Invalid { key: &'static str, reason: String },

    #[error("Malformed settings document: {0}")]
    Malformed(String),
}

/// Process-wide settings. Defaults are overlaid by an externally supplied
/// JSON object; see [`SettingsHandle::reload`].
#[derive(Debug, Clone)]
pub struct Settings {
    /// Hasher registry key, e.g. "pbkdf2_sha256" or "pbkdf2_sha512".
    pub hash_backend: String,
    pub hash_iterations: u32,
    /// Random salt length in bytes (hex-encoded in the stored digest).
    pub salt_length: usize,
    /// Default token lifetime in days. None = never expires.
    pub default_expiry_days: Option<i64>,
    /// Scope ids that may be attached to a token.
    pub available_scopes: Vec<String>,
    /// Scopes applied when a create request names none.
    pub default_scopes: Vec<String>,
    /// Header the raw token is read from at the transport boundary.
    pub header_name: String,
    pub allow_query_param: bool,
    pub query_param_name: String,
    pub enable_audit_log: bool,
    /// Namespace tag, the part before the first underscore of every prefix.
    pub token_prefix: String,
    pub secret_length: usize,
    pub checksum_digits: u32,
    pub hint_length: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            hash_backend: "pbkdf2_sha256".into(),
            hash_iterations: 100_000,
            salt_length: 16,
            default_expiry_days: Some(7),
            available_scopes: vec![
                "read".into(),
                "write".into(),
                "admin".into(),
                "audit".into(),
            ],
            default_scopes: vec!["read".into()],
            header_name: "x-tokengate-token".into(),
            allow_query_param: false,
            query_param_name: "tokengate_token".into(),
            enable_audit_log: true,
            token_prefix: "tg".into(),
            secret_length: 32,
            checksum_digits: 6,
            hint_length: 3,
        }
    }
}

/// Recognized override keys. Requests for anything else fail fast.
const KNOWN_KEYS: &[&str] = &[
    "hash_backend",
    "hash_iterations",
    "salt_length",
    "default_expiry_days",
    "available_scopes",
    "default_scopes",
    "header_name",
    "allow_query_param",
    "query_param_name",
    "enable_audit_log",
    "token_prefix",
    "secret_length",
    "checksum_digits",
    "hint_length",
];

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct SettingsOverride {
    hash_backend: Option<String>,
    hash_iterations: Option<u32>,
    salt_length: Option<usize>,
    // Double Option: absent = keep default, null = never expire.
    #[serde(default, with = "double_option")]
    default_expiry_days: Option<Option<i64>>,
    available_scopes: Option<Vec<String>>,
    default_scopes: Option<Vec<String>>,
    header_name: Option<String>,
    allow_query_param: Option<bool>,
    query_param_name: Option<String>,
    enable_audit_log: Option<bool>,
    token_prefix: Option<String>,
    secret_length: Option<usize>,
    checksum_digits: Option<u32>,
    hint_length: Option<usize>,
}

mod double_option {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, T, D>(de: D) -> Result<Option<Option<T>>, D::Error>
    where
        T: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        Option::<T>::deserialize(de).map(Some)
    }
}

impl Settings {
    /// Overlay a JSON object of overrides onto the defaults.
    pub fn from_overrides(overrides: &serde_json::Value) -> Result<Self, ConfigError> {
        let map = overrides
            .as_object()
            .ok_or_else(|| ConfigError::Malformed("expected a JSON object".into()))?;

        // Explicit key check so the error names the offending setting.
        for key in map.keys() {
            if !KNOWN_KEYS.contains(&key.as_str()) {
                return Err(ConfigError::UnknownSetting(key.clone()));
            }
        }

        let ov: SettingsOverride = serde_json::from_value(overrides.clone())
            .map_err(|e| ConfigError::Malformed(e.to_string()))?;

        let mut settings = Settings::default();
        if let Some(v) = ov.hash_backend {
            settings.hash_backend = v;
        }
        if let Some(v) = ov.hash_iterations {
            settings.hash_iterations = v;
        }
        if let Some(v) = ov.salt_length {
            settings.salt_length = v;
        }
        if let Some(v) = ov.default_expiry_days {
            settings.default_expiry_days = v;
        }
        if let Some(v) = ov.available_scopes {
            settings.available_scopes = v;
        }
        if let Some(v) = ov.default_scopes {
            settings.default_scopes = v;
        }
        if let Some(v) = ov.header_name {
            settings.header_name = v;
        }
        if let Some(v) = ov.allow_query_param {
            settings.allow_query_param = v;
        }
        if let Some(v) = ov.query_param_name {
            settings.query_param_name = v;
        }
        if let Some(v) = ov.enable_audit_log {
            settings.enable_audit_log = v;
        }
        if let Some(v) = ov.token_prefix {
            settings.token_prefix = v;
        }
        if let Some(v) = ov.secret_length {
            settings.secret_length = v;
        }
        if let Some(v) = ov.checksum_digits {
            settings.checksum_digits = v;
        }
        if let Some(v) = ov.hint_length {
            settings.hint_length = v;
        }

        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.hash_iterations == 0 {
            return Err(ConfigError::Invalid {
                key: "hash_iterations",
                reason: "must be at least 1".into(),
            });
        }
        if self.salt_length == 0 {
            return Err(ConfigError::Invalid {
                key: "salt_length",
                reason: "must be at least 1 byte".into(),
            });
        }
        if !(1..=9).contains(&self.checksum_digits) {
            return Err(ConfigError::Invalid {
                key: "checksum_digits",
                reason: "must be between 1 and 9".into(),
            });
        }
        if self.hint_length < 2 {
            return Err(ConfigError::Invalid {
                key: "hint_length",
                reason: "must be at least 2".into(),
            });
        }
        if self.secret_length < 16 {
            return Err(ConfigError::Invalid {
                key: "secret_length",
                reason: "must be at least 16 characters".into(),
            });
        }
        if self.token_prefix.is_empty() || self.token_prefix.contains(['_', ':']) {
            return Err(ConfigError::Invalid {
                key: "token_prefix",
                reason: "must be non-empty and free of '_' and ':'".into(),
            });
        }
        for scope in &self.default_scopes {
            if !self.available_scopes.contains(scope) {
                return Err(ConfigError::Invalid {
                    key: "default_scopes",
                    reason: format!("scope {scope:?} is not in available_scopes"),
                });
            }
        }
        Ok(())
    }
}

/// Shared handle over the live settings. Reads take a cheap clone; reloads
/// are serialized against readers by the inner lock.
#[derive(Clone)]
pub struct SettingsHandle {
    inner: Arc<RwLock<Settings>>,
}

impl Default for SettingsHandle {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

impl SettingsHandle {
    pub fn new(settings: Settings) -> Self {
        Self {
            inner: Arc::new(RwLock::new(settings)),
        }
    }

    pub fn from_overrides(overrides: &serde_json::Value) -> Result<Self, ConfigError> {
        Ok(Self::new(Settings::from_overrides(overrides)?))
    }

    /// Snapshot of the current settings. Each operation works against one
    /// snapshot so a concurrent reload cannot change parameters mid-flight.
    pub fn snapshot(&self) -> Settings {
        self.inner.read().expect("settings lock poisoned").clone()
    }

    /// Replace the live settings with defaults overlaid by `overrides`.
    /// The previous settings stay in effect if the document is rejected.
    pub fn reload(&self, overrides: &serde_json::Value) -> Result<(), ConfigError> {
        let next = Settings::from_overrides(overrides)?;
        *self.inner.write().expect("settings lock poisoned") = next;
        Ok(())
    }
}
