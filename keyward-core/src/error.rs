//! Error types for credential lifecycle operations.
//!
//! Every failure surfaced to the host is a [`DatabaseError`]. Driver failures
//! are captured as text at the point they are wrapped so that the
//! [`ErrorSanitizer`](crate::sanitize::ErrorSanitizer) can scrub secret values
//! out of every message field before the error leaves the plugin.

use thiserror::Error;

use crate::sanitize::SecretValues;

/// Result type for credential lifecycle operations.
pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// Boxed error returned by connection drivers.
pub type DriverError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can occur while issuing, rotating or revoking credentials.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DatabaseError {
    /// Malformed or missing connection configuration.
    #[error("invalid connection configuration: {0}")]
    Config(String),

    /// A connection was requested before Initialize succeeded.
    #[error("connection producer not initialized")]
    NotInitialized,

    /// The administrative connection could not be opened or probed.
    #[error("connectivity error: {0}")]
    Connectivity(String),

    /// NewUser was called without creation statements.
    #[error("no creation statements provided")]
    NoCreationStatements,

    /// UpdateUser carried neither a password nor an expiration change.
    #[error("no changes requested")]
    NoChanges,

    /// A statement fragment failed to execute.
    #[error("failed to execute statement {statement:?}: {message}")]
    Execution {
        /// The fragment that failed, after placeholder substitution.
        statement: String,
        /// The driver's error text.
        message: String,
    },

    /// Revocation statements failed.
    #[error("failed to delete user {username:?}: {source}")]
    Revocation {
        /// The user being revoked.
        username: String,
        /// The underlying failure.
        #[source]
        source: Box<DatabaseError>,
    },

    /// The username template could not be parsed.
    #[error("failed to parse username template: {0}")]
    UsernameTemplate(String),

    /// The plugin instance was closed.
    #[error("database plugin is closed")]
    Closed,
}

impl DatabaseError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a connectivity error.
    pub fn connectivity(msg: impl Into<String>) -> Self {
        Self::Connectivity(msg.into())
    }

    /// Create an execution error for a failed fragment.
    pub fn execution(statement: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::Execution {
            statement: statement.into(),
            message: err.to_string(),
        }
    }

    /// Wrap a failure as a revocation error for `username`.
    pub fn revocation(username: impl Into<String>, source: DatabaseError) -> Self {
        Self::Revocation {
            username: username.into(),
            source: Box::new(source),
        }
    }

    /// Create a username template error.
    pub fn username_template(msg: impl Into<String>) -> Self {
        Self::UsernameTemplate(msg.into())
    }

    /// Check if this is an execution failure, directly or under a revocation.
    pub fn is_execution(&self) -> bool {
        match self {
            Self::Execution { .. } => true,
            Self::Revocation { source, .. } => source.is_execution(),
            _ => false,
        }
    }

    /// Rewrite every message field, replacing each secret with its mask.
    pub fn redact(self, secrets: &SecretValues) -> Self {
        match self {
            Self::Config(msg) => Self::Config(secrets.scrub(&msg)),
            Self::Connectivity(msg) => Self::Connectivity(secrets.scrub(&msg)),
            Self::Execution { statement, message } => Self::Execution {
                statement: secrets.scrub(&statement),
                message: secrets.scrub(&message),
            },
            Self::Revocation { username, source } => Self::Revocation {
                username: secrets.scrub(&username),
                source: Box::new(source.redact(secrets)),
            },
            Self::UsernameTemplate(msg) => Self::UsernameTemplate(secrets.scrub(&msg)),
            other => other,
        }
    }
}
