//! Collaborator error types

use std::time::Duration;
use thiserror::Error;

/// Failure reported by a platform, persistence, or audit collaborator
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct CollaboratorError {
    pub kind: ErrorKind,
    pub message: String,
    pub retry_after: Option<Duration>,
}

impl CollaboratorError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            retry_after: None,
        }
    }

    #[must_use]
    pub fn with_retry_after(mut self, duration: Duration) -> Self {
        self.retry_after = Some(duration);
        self
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Network, message)
    }

    pub fn rate_limit(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RateLimit, message)
    }

    pub fn permission(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Permission, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn expired(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Expired, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unknown, message)
    }
}

/// Error classification used for logging and user-facing replies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Connection reset, timeout talking to the platform
    Network,
    /// Platform throttled the request
    RateLimit,
    /// Missing platform permission (403)
    Permission,
    /// Target vanished between plan and execution
    NotFound,
    /// The platform's response window for this interaction has lapsed
    Expired,
    Unknown,
}

impl ErrorKind {
    /// Terminal errors end the current step; no reply can be delivered anymore.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Expired)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::RateLimit => "rate_limit",
            Self::Permission => "permission",
            Self::NotFound => "not_found",
            Self::Expired => "expired",
            Self::Unknown => "unknown",
        }
    }
}
