pub mod audit;
pub mod token;

pub use audit::{AuditAction, AuditLogEntry, RequestContext};
pub use token::{NAME_MAX_LEN, Token, TokenType};
