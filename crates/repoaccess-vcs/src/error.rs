//! Workspace, clone and inspection errors.

use crate::workspace::WorkspaceState;
use repoaccess_core::{CommandError, Interrupt, Transient};
use std::path::PathBuf;
use thiserror::Error;

/// Whether retrying can help.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// A later attempt may succeed.
    Transient,
    /// Retrying cannot help.
    Permanent,
}

/// Workspace lifecycle errors. Never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkspaceError {
    /// Directory could not be created.
    #[error("failed to allocate workspace under {root}: {message}")]
    AllocationFailed {
        /// Workspace root.
        root: PathBuf,
        /// Error message.
        message: String,
    },

    /// Directory could not be emptied for a retry.
    #[error("failed to reset workspace {path}: {message}")]
    ResetFailed {
        /// Workspace path.
        path: PathBuf,
        /// Error message.
        message: String,
    },

    /// Directory could not be removed.
    #[error("failed to remove workspace {path}: {message}")]
    RemoveFailed {
        /// Workspace path.
        path: PathBuf,
        /// Error message.
        message: String,
    },

    /// Operation not allowed in the workspace's current state.
    #[error("workspace {id} is {state}, expected {expected}")]
    InvalidState {
        /// Workspace id.
        id: String,
        /// Current state.
        state: WorkspaceState,
        /// Required state.
        expected: WorkspaceState,
    },
}

/// Clone and fetch errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CloneError {
    /// Remote repository does not exist or is hidden.
    #[error("repository not found: {url}")]
    NotFound {
        /// Redacted remote URL.
        url: String,
    },

    /// Requested branch, tag or commit does not exist on the remote.
    #[error("ref '{git_ref}' not found in {url}")]
    RefNotFound {
        /// Requested ref.
        git_ref: String,
        /// Redacted remote URL.
        url: String,
    },

    /// Remote rejected the credentials.
    #[error("authentication rejected by {url}: {message}")]
    AuthRejected {
        /// Redacted remote URL.
        url: String,
        /// git's explanation.
        message: String,
    },

    /// Transfer failed for a reason worth retrying.
    #[error("transfer from {url} failed after {attempts} attempt(s): {message}")]
    TransferFailed {
        /// Redacted remote URL.
        url: String,
        /// Attempts made.
        attempts: u32,
        /// Last error message.
        message: String,
    },

    /// Anything else git reported.
    #[error("git failed: {message}")]
    Failed {
        /// Error message.
        message: String,
    },

    /// Workspace could not be prepared.
    #[error(transparent)]
    Workspace(#[from] WorkspaceError),

    /// Cancelled by the caller.
    #[error("clone cancelled")]
    Cancelled,

    /// Deadline passed.
    #[error("clone timed out")]
    TimedOut,
}

impl CloneError {
    /// Transient or permanent.
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::TransferFailed { .. } => ErrorClass::Transient,
            _ => ErrorClass::Permanent,
        }
    }

    /// Interrupt carried by this error, if any.
    #[must_use]
    pub const fn interrupt(&self) -> Option<Interrupt> {
        match self {
            Self::Cancelled => Some(Interrupt::Cancelled),
            Self::TimedOut => Some(Interrupt::TimedOut),
            _ => None,
        }
    }

    /// Create a generic failure.
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }
}

impl Transient for CloneError {
    fn is_transient(&self) -> bool {
        self.class() == ErrorClass::Transient
    }
}

impl From<Interrupt> for CloneError {
    fn from(interrupt: Interrupt) -> Self {
        match interrupt {
            Interrupt::Cancelled => Self::Cancelled,
            Interrupt::TimedOut => Self::TimedOut,
        }
    }
}

/// Errors from read-only repository inspection.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InspectionError {
    /// Workspace has not been populated.
    #[error("workspace {id} is {state}, not ready for inspection")]
    WorkspaceNotReady {
        /// Workspace id.
        id: String,
        /// Current state.
        state: WorkspaceState,
    },

    /// Ref does not exist.
    #[error("ref '{git_ref}' not found")]
    RefNotFound {
        /// The ref.
        git_ref: String,
    },

    /// Ref exists upstream but lies outside the shallow clone.
    #[error("ref '{git_ref}' is not available in this shallow clone; check out with full history")]
    RefNotAvailable {
        /// The ref.
        git_ref: String,
    },

    /// Invalid path filter.
    #[error("invalid filter '{pattern}': {message}")]
    InvalidFilter {
        /// Offending pattern.
        pattern: String,
        /// Error message.
        message: String,
    },

    /// Reading the working tree or running git failed.
    #[error("failed to read {path}: {message}")]
    ReadFailed {
        /// Path or command involved.
        path: String,
        /// Error message.
        message: String,
    },

    /// Cancelled or timed out.
    #[error(transparent)]
    Interrupted(#[from] Interrupt),
}

impl InspectionError {
    /// Create a read failure.
    #[must_use]
    pub fn read_failed(path: impl Into<String>, message: impl ToString) -> Self {
        Self::ReadFailed {
            path: path.into(),
            message: message.to_string(),
        }
    }
}

impl From<CommandError> for InspectionError {
    fn from(err: CommandError) -> Self {
        match err {
            CommandError::Interrupted(interrupt) => Self::Interrupted(interrupt),
            CommandError::Failed {
                command, stderr, ..
            } => Self::read_failed(command, stderr),
            other => Self::read_failed("git", other),
        }
    }
}

/// Result type for clone operations.
pub type Result<T> = std::result::Result<T, CloneError>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_clone_error_class() {
        let transfer = CloneError::TransferFailed {
            url: "https://example.com/r.git".into(),
            attempts: 3,
            message: "early EOF".into(),
        };
        assert_eq!(transfer.class(), ErrorClass::Transient);
        assert!(transfer.is_transient());

        for permanent in [
            CloneError::NotFound { url: "u".into() },
            CloneError::AuthRejected {
                url: "u".into(),
                message: "403".into(),
            },
            CloneError::Cancelled,
            CloneError::TimedOut,
        ] {
            assert_eq!(permanent.class(), ErrorClass::Permanent);
        }
    }

    #[test]
    fn test_interrupt_round_trip() {
        assert_eq!(CloneError::from(Interrupt::TimedOut), CloneError::TimedOut);
        assert_eq!(CloneError::Cancelled.interrupt(), Some(Interrupt::Cancelled));
        assert_eq!(CloneError::failed("x").interrupt(), None);
    }

    #[test]
    fn test_inspection_error_from_command() {
        let err: InspectionError = CommandError::Interrupted(Interrupt::Cancelled).into();
        assert_eq!(err, InspectionError::Interrupted(Interrupt::Cancelled));
    }
}
