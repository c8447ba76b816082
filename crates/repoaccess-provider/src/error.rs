//! Provider error types.

use repoaccess_core::{AuthError, CommandError, Interrupt, ProviderKind, Transient};
use std::time::Duration;
use thiserror::Error;

/// Errors from provider API calls.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// Missing, malformed or rejected credentials.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Repository or endpoint does not exist (or is hidden from the caller).
    #[error("not found: {url}")]
    NotFound {
        /// Requested URL or remote.
        url: String,
    },

    /// Rate limited by the provider.
    #[error("rate limited by {url}")]
    RateLimited {
        /// Requested URL.
        url: String,
        /// Seconds to wait, from `Retry-After`.
        retry_after: Option<u64>,
    },

    /// Provider answered with a 5xx status.
    #[error("server error {status} from {url}")]
    Server {
        /// Requested URL.
        url: String,
        /// HTTP status.
        status: u16,
    },

    /// Single request timed out.
    #[error("request to {url} timed out")]
    Timeout {
        /// Requested URL.
        url: String,
    },

    /// Connection-level failure.
    #[error("network error for {url}: {message}")]
    Network {
        /// Requested URL.
        url: String,
        /// Error message.
        message: String,
    },

    /// Unexpected client error status.
    #[error("request to {url} failed with {status}")]
    Status {
        /// Requested URL.
        url: String,
        /// HTTP status.
        status: u16,
    },

    /// Response body could not be decoded.
    #[error("failed to parse response from {url}: {message}")]
    Parse {
        /// Requested URL.
        url: String,
        /// Error message.
        message: String,
    },

    /// URL could not be built.
    #[error("invalid url {url}: {message}")]
    InvalidUrl {
        /// The offending URL.
        url: String,
        /// Error message.
        message: String,
    },

    /// Client could not be configured.
    #[error("invalid provider configuration: {message}")]
    InvalidConfig {
        /// Error message.
        message: String,
    },

    /// Operation not offered by this provider.
    #[error("{provider} does not support {operation}")]
    Unsupported {
        /// Provider.
        provider: ProviderKind,
        /// Operation name.
        operation: &'static str,
    },

    /// `git ls-remote` failed for a generic remote.
    #[error("git failed: {message}")]
    Git {
        /// Error message.
        message: String,
        /// Whether another attempt may succeed.
        transient: bool,
    },

    /// Cancelled or timed out.
    #[error(transparent)]
    Interrupted(#[from] Interrupt),
}

impl ProviderError {
    /// Create an invalid URL error.
    #[must_use]
    pub fn invalid_url(url: impl Into<String>, message: impl ToString) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            message: message.to_string(),
        }
    }

    /// Create a parse error.
    #[must_use]
    pub fn parse(url: impl Into<String>, message: impl ToString) -> Self {
        Self::Parse {
            url: url.into(),
            message: message.to_string(),
        }
    }

    /// Check if this is an authentication error.
    #[must_use]
    pub const fn is_auth_error(&self) -> bool {
        matches!(self, Self::Auth(_))
    }

    /// Check if this is a not found error.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Interrupt carried by this error, if any.
    #[must_use]
    pub const fn interrupt(&self) -> Option<Interrupt> {
        match self {
            Self::Interrupted(i) => Some(*i),
            _ => None,
        }
    }
}

impl Transient for ProviderError {
    fn is_transient(&self) -> bool {
        match self {
            Self::RateLimited { .. }
            | Self::Server { .. }
            | Self::Timeout { .. }
            | Self::Network { .. } => true,
            Self::Git { transient, .. } => *transient,
            _ => false,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited {
                retry_after: Some(secs),
                ..
            } => Some(Duration::from_secs(*secs)),
            _ => None,
        }
    }
}

impl From<CommandError> for ProviderError {
    fn from(err: CommandError) -> Self {
        match err {
            CommandError::Interrupted(i) => Self::Interrupted(i),
            other => Self::Git {
                message: other.to_string(),
                transient: false,
            },
        }
    }
}

/// Result type for provider operations.
pub type Result<T> = std::result::Result<T, ProviderError>;
