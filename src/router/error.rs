use thiserror::Error;

/// Errors raised while resolving a tenant identifier to a live connection.
///
/// The taxonomy is deliberately flat: each variant maps to a different caller
/// remedy (client error vs. tenant misconfiguration vs. infrastructure fault).
/// The enum is `Clone` because concurrent callers joined on a single in-flight
/// establishment all receive the same failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RouterError {
    #[error("Missing institute identifier")]
    MissingIdentifier,

    #[error("Institute not found: {0}")]
    TenantNotFound(String),

    #[error("Institute registry unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Institute {0} has no usable connection template")]
    MissingConnectionTemplate(String),

    #[error("Database {db_name} unreachable: {reason}")]
    ConnectionUnreachable { db_name: String, reason: String },

    #[error("Database {0} is empty or uninitialized")]
    DatabaseEmptyOrUninitialized(String),
}
