pub mod pbkdf2;

use std::sync::Arc;

use crate::application::app_error::{AppError, AppResult};
use crate::infra::config::{ConfigError, Settings};

pub use pbkdf2::{Pbkdf2Digest, Pbkdf2Hasher};

/// One-way transformation of a token secret into a storable digest, plus
/// constant-time verification against it.
pub trait TokenHasher: Send + Sync {
    fn hash(&self, secret: &str) -> String;
    fn verify(&self, secret: &str, stored: &str) -> bool;
}

/// Resolve the configured hasher backend. The registry is keyed by the
/// `hash_backend` setting so algorithms can be swapped without touching
/// call sites.
pub fn get_hasher(settings: &Settings) -> AppResult<Arc<dyn TokenHasher>> {
    let hasher: Arc<dyn TokenHasher> = match settings.hash_backend.as_str() {
        "pbkdf2_sha256" => Arc::new(Pbkdf2Hasher::new(
            Pbkdf2Digest::Sha256,
            settings.hash_iterations,
            settings.salt_length,
        )),
        "pbkdf2_sha512" => Arc::new(Pbkdf2Hasher::new(
            Pbkdf2Digest::Sha512,
            settings.hash_iterations,
            settings.salt_length,
        )),
        other => {
            return Err(AppError::Config(ConfigError::Invalid {
                key: "hash_backend",
                reason: format!("unknown backend {other:?}"),
            }));
        }
    };
    Ok(hasher)
}
