//! Errors surfaced by [`RepoAccess`](crate::RepoAccess).
//!
//! Every error names the repository it concerns (redacted) and the operation
//! that was running, so callers can log it as-is.

use repoaccess_core::{
    AuthError, ConfigError, Interrupt, ReferenceError, RepositoryReference, Transient,
};
use repoaccess_provider::ProviderError;
use repoaccess_vcs::{CloneError, InspectionError, WorkspaceError};
use std::fmt;
use thiserror::Error;

/// Step of a checkout session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Building the access layer from configuration.
    Configure,
    /// Parsing a repository reference.
    ParseReference,
    /// Turning a credential into auth material.
    ResolveCredential,
    /// Looking up the provider's default branch.
    DefaultBranch,
    /// Creating the workspace directory.
    Allocate,
    /// Cloning into the workspace.
    Clone,
    /// Fetching into an existing checkout.
    Fetch,
    /// Reading a checkout.
    Inspect,
    /// Releasing a workspace.
    Release,
    /// Removing stale workspaces.
    Sweep,
    /// A provider API call.
    Provider(&'static str),
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configure => f.write_str("configure"),
            Self::ParseReference => f.write_str("parse reference"),
            Self::ResolveCredential => f.write_str("resolve credential"),
            Self::DefaultBranch => f.write_str("default branch lookup"),
            Self::Allocate => f.write_str("allocate workspace"),
            Self::Clone => f.write_str("clone"),
            Self::Fetch => f.write_str("fetch"),
            Self::Inspect => f.write_str("inspect"),
            Self::Release => f.write_str("release"),
            Self::Sweep => f.write_str("sweep"),
            Self::Provider(call) => write!(f, "provider {call}"),
        }
    }
}

/// What went wrong.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AccessErrorKind {
    /// Credential missing, malformed, unsupported or rejected.
    #[error(transparent)]
    Auth(AuthError),

    /// Repository or ref does not exist, or is hidden from the credential.
    #[error("not found: {what}")]
    NotFound {
        /// What was looked for.
        what: String,
    },

    /// Clone or fetch failed.
    #[error(transparent)]
    Clone(CloneError),

    /// Workspace lifecycle failure.
    #[error(transparent)]
    Workspace(WorkspaceError),

    /// Inspection failed.
    #[error(transparent)]
    Inspection(InspectionError),

    /// Provider API failure other than auth or not-found.
    #[error(transparent)]
    Provider(ProviderError),

    /// Reference cannot be used.
    #[error(transparent)]
    InvalidReference(ReferenceError),

    /// Configuration rejected.
    #[error(transparent)]
    Config(ConfigError),

    /// Deadline passed.
    #[error("operation timed out")]
    TimedOut,

    /// Cancelled by the caller.
    #[error("operation cancelled")]
    Cancelled,
}

impl From<Interrupt> for AccessErrorKind {
    fn from(interrupt: Interrupt) -> Self {
        match interrupt {
            Interrupt::Cancelled => Self::Cancelled,
            Interrupt::TimedOut => Self::TimedOut,
        }
    }
}

impl From<AuthError> for AccessErrorKind {
    fn from(err: AuthError) -> Self {
        Self::Auth(err)
    }
}

impl From<ReferenceError> for AccessErrorKind {
    fn from(err: ReferenceError) -> Self {
        Self::InvalidReference(err)
    }
}

impl From<ConfigError> for AccessErrorKind {
    fn from(err: ConfigError) -> Self {
        Self::Config(err)
    }
}

impl From<WorkspaceError> for AccessErrorKind {
    fn from(err: WorkspaceError) -> Self {
        Self::Workspace(err)
    }
}

impl From<ProviderError> for AccessErrorKind {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Auth(auth) => Self::Auth(auth),
            ProviderError::NotFound { url } => Self::NotFound { what: url },
            ProviderError::Interrupted(interrupt) => interrupt.into(),
            other => Self::Provider(other),
        }
    }
}

impl From<CloneError> for AccessErrorKind {
    fn from(err: CloneError) -> Self {
        match err {
            CloneError::AuthRejected { url, message } => Self::Auth(AuthError::rejected(url, message)),
            CloneError::NotFound { url } => Self::NotFound { what: url },
            CloneError::Workspace(workspace) => Self::Workspace(workspace),
            CloneError::Cancelled => Self::Cancelled,
            CloneError::TimedOut => Self::TimedOut,
            other => Self::Clone(other),
        }
    }
}

impl From<InspectionError> for AccessErrorKind {
    fn from(err: InspectionError) -> Self {
        match err {
            InspectionError::Interrupted(interrupt) => interrupt.into(),
            other => Self::Inspection(other),
        }
    }
}

/// Error from a [`RepoAccess`](crate::RepoAccess) operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{operation} failed{}: {kind}", for_reference(.reference))]
pub struct AccessError {
    reference: Option<String>,
    operation: Operation,
    kind: AccessErrorKind,
}

fn for_reference(reference: &Option<String>) -> String {
    reference
        .as_deref()
        .map(|r| format!(" for {r}"))
        .unwrap_or_default()
}

impl AccessError {
    /// Error concerning `reference`.
    #[must_use]
    pub fn new(
        reference: &RepositoryReference,
        operation: Operation,
        kind: impl Into<AccessErrorKind>,
    ) -> Self {
        Self {
            reference: Some(reference.to_string()),
            operation,
            kind: kind.into(),
        }
    }

    /// Error not tied to one repository.
    #[must_use]
    pub fn global(operation: Operation, kind: impl Into<AccessErrorKind>) -> Self {
        Self {
            reference: None,
            operation,
            kind: kind.into(),
        }
    }

    /// Redacted repository reference.
    #[must_use]
    pub fn reference(&self) -> Option<&str> {
        self.reference.as_deref()
    }

    /// Operation that failed.
    #[must_use]
    pub const fn operation(&self) -> Operation {
        self.operation
    }

    /// Failure kind.
    #[must_use]
    pub const fn kind(&self) -> &AccessErrorKind {
        &self.kind
    }

    /// Check if this is an authentication error.
    #[must_use]
    pub const fn is_auth_error(&self) -> bool {
        matches!(self.kind, AccessErrorKind::Auth(_))
    }

    /// Check if this is a not found error.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self.kind, AccessErrorKind::NotFound { .. })
    }

    /// Whether the operation was cancelled or timed out.
    #[must_use]
    pub const fn interrupt(&self) -> Option<Interrupt> {
        match self.kind {
            AccessErrorKind::Cancelled => Some(Interrupt::Cancelled),
            AccessErrorKind::TimedOut => Some(Interrupt::TimedOut),
            _ => None,
        }
    }

    /// Hint for fixing the problem, where one exists.
    #[must_use]
    pub const fn suggestion(&self) -> Option<&'static str> {
        match &self.kind {
            AccessErrorKind::Auth(AuthError::MissingCredential { .. }) => {
                Some("supply a token or SSH key for hosted repositories")
            }
            AccessErrorKind::Auth(AuthError::Rejected { .. }) => {
                Some("check that the token is valid and grants read access")
            }
            AccessErrorKind::Inspection(InspectionError::RefNotAvailable { .. }) => {
                Some("check out with full history or fetch the ref first")
            }
            AccessErrorKind::Clone(CloneError::TransferFailed { .. }) => {
                Some("the remote was unreachable; retry later")
            }
            _ => None,
        }
    }
}

impl Transient for AccessError {
    fn is_transient(&self) -> bool {
        match &self.kind {
            AccessErrorKind::Clone(err) => err.is_transient(),
            AccessErrorKind::Provider(err) => err.is_transient(),
            _ => false,
        }
    }
}

/// Result type for access operations.
pub type Result<T> = std::result::Result<T, AccessError>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use repoaccess_core::ProviderKind;

    fn reference() -> RepositoryReference {
        RepositoryReference::hosted(ProviderKind::GitHub, "octo", "hello").unwrap()
    }

    #[test]
    fn test_display_names_reference_and_operation() {
        let err = AccessError::new(&reference(), Operation::Clone, CloneError::TimedOut);
        assert_eq!(err.kind(), &AccessErrorKind::TimedOut);
        assert_eq!(err.interrupt(), Some(Interrupt::TimedOut));
        let message = err.to_string();
        assert!(message.starts_with("clone failed for "), "{message}");
        assert!(message.ends_with("operation timed out"), "{message}");

        let global = AccessError::global(
            Operation::Configure,
            ConfigError::Invalid {
                message: "bad".into(),
            },
        );
        assert_eq!(global.reference(), None);
        assert!(global.to_string().starts_with("configure failed: "));
    }

    #[test]
    fn test_clone_errors_are_normalized() {
        let rejected = AccessError::new(
            &reference(),
            Operation::Clone,
            CloneError::AuthRejected {
                url: "https://github.com/octo/hello.git".into(),
                message: "Authentication failed".into(),
            },
        );
        assert!(rejected.is_auth_error());
        assert!(rejected.suggestion().is_some());

        let missing = AccessError::new(
            &reference(),
            Operation::Clone,
            CloneError::NotFound {
                url: "https://github.com/octo/hello.git".into(),
            },
        );
        assert!(missing.is_not_found());

        let transient = AccessError::new(
            &reference(),
            Operation::Clone,
            CloneError::TransferFailed {
                url: "u".into(),
                attempts: 3,
                message: "early EOF".into(),
            },
        );
        assert!(transient.is_transient());
    }

    #[test]
    fn test_provider_errors_are_normalized() {
        let interrupted = AccessError::new(
            &reference(),
            Operation::Provider("branches"),
            ProviderError::Interrupted(Interrupt::Cancelled),
        );
        assert_eq!(interrupted.interrupt(), Some(Interrupt::Cancelled));
        assert_eq!(interrupted.operation().to_string(), "provider branches");

        let server = AccessError::new(
            &reference(),
            Operation::DefaultBranch,
            ProviderError::Server {
                url: "u".into(),
                status: 503,
            },
        );
        assert!(server.is_transient());
        assert!(!server.is_auth_error());
    }
}
