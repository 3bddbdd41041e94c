//! Unified error type for the queue service.
//!
//! Storage errors are classified on conversion: SQLite busy/locked conditions and
//! pool acquisition timeouts become [`Error::StorageContention`], which callers treat
//! as retryable. Everything else from the store is an opaque [`Error::Database`].

use sea_orm::{DbErr, RuntimeErr};
use thiserror::Error;

/// All failures the service can produce.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration could not be read, parsed, or is incomplete
    #[error("Configuration error: {message}")]
    Config {
        /// What went wrong
        message: String,
    },

    /// Non-retryable storage failure
    #[error("Database error: {0}")]
    Database(DbErr),

    /// The store could not grant a lock in time; the whole unit of work was rolled back
    #[error("Storage contention: {message}")]
    StorageContention {
        /// Underlying storage message, for logs only
        message: String,
    },

    /// I/O failure outside the store (config file, listener)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Party size is missing, non-numeric, or not positive
    #[error("Invalid party size: {value}")]
    InvalidPartySize {
        /// The rejected input as received
        value: String,
    },

    /// Status string is outside `waiting | called | seated | cancelled`
    #[error("Invalid status: {value}")]
    InvalidStatus {
        /// The rejected input as received
        value: String,
    },

    /// The requested status change is not in the transition table
    #[error("Illegal status transition from {from} to {to}")]
    IllegalTransition {
        /// Stored status
        from: String,
        /// Requested status
        to: String,
    },

    /// No ticket with this id
    #[error("Ticket not found: {id}")]
    TicketNotFound {
        /// Ticket id that was looked up
        id: i64,
    },

    /// Setting key outside the allow-list
    #[error("Unknown setting: {key}")]
    UnknownSetting {
        /// The rejected key
        key: String,
    },

    /// Path or body could not be read
    #[error("Invalid request: {message}")]
    InvalidRequest {
        /// Extractor message
        message: String,
    },

    /// Mutating call without an authenticated session
    #[error("Not authenticated")]
    Unauthorized,

    /// Anti-forgery token missing or not matching the session's token
    #[error("Anti-forgery token mismatch")]
    Forbidden,

    /// Username or password did not match
    #[error("Invalid username or password")]
    InvalidCredentials,

    /// Too many consecutive failed logins in this session
    #[error("Too many failed login attempts")]
    LockedOut,

    /// Hashing or parsing a password hash failed
    #[error("Password hash error: {message}")]
    PasswordHash {
        /// Hasher message
        message: String,
    },
}

impl Error {
    /// Whether the caller may retry the same action and expect it to succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::StorageContention { .. })
    }
}

impl From<DbErr> for Error {
    fn from(err: DbErr) -> Self {
        if is_contention(&err) {
            Self::StorageContention {
                message: err.to_string(),
            }
        } else {
            Self::Database(err)
        }
    }
}

impl From<argon2::password_hash::Error> for Error {
    fn from(err: argon2::password_hash::Error) -> Self {
        Self::PasswordHash {
            message: err.to_string(),
        }
    }
}

fn is_contention(err: &DbErr) -> bool {
    match err {
        DbErr::ConnectionAcquire(_) => true,
        DbErr::Conn(RuntimeErr::SqlxError(sqlx_err))
        | DbErr::Exec(RuntimeErr::SqlxError(sqlx_err))
        | DbErr::Query(RuntimeErr::SqlxError(sqlx_err)) => {
            let sqlx_err: &sea_orm::sqlx::Error = sqlx_err;
            match sqlx_err {
                sea_orm::sqlx::Error::PoolTimedOut => true,
                sea_orm::sqlx::Error::Database(db_err) => db_err
                    .code()
                    .and_then(|code| code.parse::<i32>().ok())
                    .is_some_and(is_busy_code),
                _ => false,
            }
        }
        _ => false,
    }
}

// SQLITE_BUSY (5) and SQLITE_LOCKED (6), including their extended forms.
const fn is_busy_code(code: i32) -> bool {
    matches!(code & 0xff, 5 | 6)
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_busy_codes_include_extended_variants() {
        assert!(is_busy_code(5));
        assert!(is_busy_code(6));
        assert!(is_busy_code(517)); // SQLITE_BUSY_SNAPSHOT
        assert!(is_busy_code(262)); // SQLITE_LOCKED_SHAREDCACHE
        assert!(!is_busy_code(19)); // SQLITE_CONSTRAINT
        assert!(!is_busy_code(2067)); // SQLITE_CONSTRAINT_UNIQUE
    }

    #[test]
    fn test_plain_db_errors_are_not_retryable() {
        let err = Error::from(DbErr::Custom("boom".to_string()));
        assert!(matches!(err, Error::Database(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_acquire_timeout_is_contention() {
        let err = Error::from(DbErr::ConnectionAcquire(sea_orm::ConnAcquireErr::Timeout));
        assert!(err.is_retryable());
    }
}
