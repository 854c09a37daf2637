//! Pool and driver error types.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Category of a failure reported by a database driver.
///
/// The category decides whether the connection that produced the error may
/// go back into its pool. Statement-level categories leave the session
/// intact; everything else makes the session suspect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Constraint violation (duplicate key, foreign key, NOT NULL).
    Integrity,
    /// The server or driver does not support the requested operation.
    NotSupported,
    /// Malformed statement, unknown table or column, wrong parameter count.
    Programming,
    /// Bad data for the target column (truncation, out of range).
    Data,
    /// Transport or server-side operational failure.
    Operational,
    /// Internal driver or server state error.
    Internal,
    /// Misuse of the driver interface.
    Interface,
}

impl ErrorKind {
    /// Check if a connection may be recycled after an error of this kind.
    #[must_use]
    pub fn is_reusable(self) -> bool {
        matches!(self, Self::Integrity | Self::NotSupported | Self::Programming)
    }

    /// Short lowercase name of the category.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Integrity => "integrity",
            Self::NotSupported => "not supported",
            Self::Programming => "programming",
            Self::Data => "data",
            Self::Operational => "operational",
            Self::Internal => "internal",
            Self::Interface => "interface",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error reported by a database driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverError {
    kind: ErrorKind,
    code: Option<u16>,
    message: String,
}

impl DriverError {
    /// Create a driver error without a server error code.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: None,
            message: message.into(),
        }
    }

    /// Attach the server error code.
    #[must_use]
    pub fn with_code(mut self, code: u16) -> Self {
        self.code = Some(code);
        self
    }

    /// Get the error category.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Get the server error code, if the server produced this error.
    #[must_use]
    pub fn code(&self) -> Option<u16> {
        self.code
    }

    /// Get the driver-native message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Check if the connection that produced this error may be recycled.
    #[must_use]
    pub fn is_reusable(&self) -> bool {
        self.kind.is_reusable()
    }
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "{} error {}: {}", self.kind, code, self.message),
            None => write!(f, "{} error: {}", self.kind, self.message),
        }
    }
}

impl std::error::Error for DriverError {}

/// Errors returned by pool, registry and client operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// No idle connection became available within the acquisition budget.
    #[error("can't get connection from pool({pool}) within {timeout:?}*{attempts}")]
    PoolExhausted {
        /// Name of the exhausted pool.
        pool: String,
        /// Wait per attempt.
        timeout: Duration,
        /// Attempts made, including the first one.
        attempts: u32,
    },

    /// No pool is registered under the requested name.
    #[error("can not find the pool named {0}")]
    PoolNotFound(String),

    /// The pool cannot be registered.
    #[error("invalid pool registration: {0}")]
    InvalidRegistration(String),

    /// A new connection could not be established.
    #[error("failed to create connection for pool({pool}): {source}")]
    Connect {
        /// Pool the connection was created for.
        pool: String,
        /// Driver failure.
        #[source]
        source: DriverError,
    },

    /// A statement failed.
    #[error(transparent)]
    Statement(#[from] DriverError),

    /// The client has already released its connection.
    #[error("connection already closed")]
    Closed,

    /// Pool configuration error.
    #[error("pool configuration error: {0}")]
    Configuration(String),
}

impl Error {
    /// Total time spent waiting before a [`Error::PoolExhausted`] failure.
    #[must_use]
    pub fn wait_budget(&self) -> Option<Duration> {
        match self {
            Self::PoolExhausted {
                timeout, attempts, ..
            } => Some(*timeout * *attempts),
            _ => None,
        }
    }

    /// Get the driver error behind a statement or connect failure.
    #[must_use]
    pub fn driver_error(&self) -> Option<&DriverError> {
        match self {
            Self::Statement(e) | Self::Connect { source: e, .. } => Some(e),
            _ => None,
        }
    }

    /// Check if the connection involved in this error may be recycled.
    ///
    /// Errors that never touched a connection count as reusable.
    #[must_use]
    pub fn is_reusable(&self) -> bool {
        match self {
            Self::Statement(e) => e.is_reusable(),
            Self::Connect { .. } => false,
            _ => true,
        }
    }
}

/// Result type for pool and client operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_reusable_kinds() {
        assert!(ErrorKind::Integrity.is_reusable());
        assert!(ErrorKind::NotSupported.is_reusable());
        assert!(ErrorKind::Programming.is_reusable());
        assert!(!ErrorKind::Data.is_reusable());
        assert!(!ErrorKind::Operational.is_reusable());
        assert!(!ErrorKind::Internal.is_reusable());
        assert!(!ErrorKind::Interface.is_reusable());
    }

    #[test]
    fn test_driver_error_display() {
        let err = DriverError::new(ErrorKind::Integrity, "Duplicate entry '1'").with_code(1062);
        assert_eq!(err.to_string(), "integrity error 1062: Duplicate entry '1'");

        let err = DriverError::new(ErrorKind::Operational, "broken pipe");
        assert_eq!(err.to_string(), "operational error: broken pipe");
        assert_eq!(err.code(), None);
    }

    #[test]
    fn test_pool_exhausted_message_names_budget() {
        let err = Error::PoolExhausted {
            pool: "reports".into(),
            timeout: Duration::from_secs(1),
            attempts: 3,
        };
        assert_eq!(
            err.to_string(),
            "can't get connection from pool(reports) within 1s*3"
        );
        assert_eq!(err.wait_budget(), Some(Duration::from_secs(3)));
    }

    #[test]
    fn test_statement_error_reusability() {
        let err: Error = DriverError::new(ErrorKind::Programming, "syntax").into();
        assert!(err.is_reusable());

        let err: Error = DriverError::new(ErrorKind::Operational, "gone away").into();
        assert!(!err.is_reusable());
        assert_eq!(
            err.driver_error().map(DriverError::kind),
            Some(ErrorKind::Operational)
        );
    }
}
