//! tokengate: issuance, verification, rotation, revocation and audit of
//! bearer API tokens.
//!
//! The public wire form is `<namespace>_<identifier>:<secret><checksum>`;
//! only a one-way hash of the secret is stored, lookup routes through the
//! non-secret prefix, and a CRC checksum makes tampering detectable before
//! any store round trip. Persistence sits behind [`TokenRepo`] /
//! [`AuditLogRepo`]; a Postgres implementation ships in
//! [`adapters::persistence`].

pub mod adapters;
pub mod application;
pub mod domain;
pub mod infra;

#[cfg(test)]
pub mod test_utils;

// Re-exports for shorter use statements.
pub use application::app_error::{AppError, AppResult, ErrorCode};
pub use application::audit::{AuditLogRepo, AuditSink};
pub use application::use_cases::authenticate::AuthUseCases;
pub use application::use_cases::tokens::{CreateTokenParams, TokenRepo, TokenTx, TokenUseCases};
pub use domain::entities::{
    AuditAction, AuditLogEntry, NAME_MAX_LEN, RequestContext, Token, TokenType,
};
pub use infra::codec::PublicToken;
pub use infra::config::{ConfigError, Settings, SettingsHandle};
