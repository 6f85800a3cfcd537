use std::fmt;

/// Error kind for store errors.
///
/// `Timeout`, `Refused`, `Auth` and `Connection` are failures to reach or keep
/// a session; `Query` is a failed statement or commit on a live session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Timeout,
    Refused,
    Auth,
    Connection,
    Query,
}

/// Store error, returned by every `ConnectionFactory` / `Connection` method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreError {
    pub kind: ErrorKind,
    pub message: String,
}

impl StoreError {
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Timeout, message: msg.into() }
    }

    pub fn refused(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Refused, message: msg.into() }
    }

    pub fn auth(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Auth, message: msg.into() }
    }

    pub fn connection(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Connection, message: msg.into() }
    }

    pub fn query(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Query, message: msg.into() }
    }

    /// True for every kind that means "no usable session".
    pub fn is_connection(&self) -> bool {
        !matches!(self.kind, ErrorKind::Query)
    }

    /// Add context to the error, preserving the original ErrorKind.
    ///
    /// Produces: `"context: original message"`.
    pub fn with_context(self, ctx: impl fmt::Display) -> Self {
        Self {
            kind: self.kind,
            message: format!("{ctx}: {}", self.message),
        }
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl std::error::Error for StoreError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_keeps_kind() {
        let e = StoreError::refused("connection refused").with_context("writer_0");
        assert_eq!(e.kind, ErrorKind::Refused);
        assert_eq!(e.message, "writer_0: connection refused");
        assert_eq!(e.to_string(), "Refused: writer_0: connection refused");
    }

    #[test]
    fn query_is_not_a_connection_error() {
        assert!(!StoreError::query("syntax error").is_connection());
        assert!(StoreError::timeout("10s").is_connection());
        assert!(StoreError::auth("bad password").is_connection());
    }
}
