//! Error types shared by every repoaccess crate.

use crate::reference::ProviderKind;
use std::path::PathBuf;
use thiserror::Error;

/// Credential problems, detected locally or reported by a provider.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// The reference requires a credential but none was supplied.
    #[error("{provider} requires a credential but none was supplied")]
    MissingCredential {
        /// Provider of the reference.
        provider: ProviderKind,
    },

    /// The credential is present but unusable.
    #[error("malformed credential: {reason}")]
    MalformedCredential {
        /// Why the credential was rejected.
        reason: String,
    },

    /// The credential kind cannot be used with this reference.
    #[error("{kind} credentials cannot be used with {target}")]
    UnsupportedProviderForCredentialKind {
        /// Credential kind (`token`, `ssh-key`).
        kind: &'static str,
        /// What the credential was offered to.
        target: String,
    },

    /// The provider or git transport rejected the credential.
    #[error("credential rejected by {target}: {reason}")]
    Rejected {
        /// Endpoint or remote that rejected the credential.
        target: String,
        /// Rejection detail (status code or transport message).
        reason: String,
    },
}

impl AuthError {
    /// Create a malformed credential error.
    #[must_use]
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedCredential {
            reason: reason.into(),
        }
    }

    /// Create a rejection error.
    #[must_use]
    pub fn rejected(target: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Rejected {
            target: target.into(),
            reason: reason.into(),
        }
    }

    /// Check if the error was raised before any network call.
    #[must_use]
    pub const fn is_local(&self) -> bool {
        !matches!(self, Self::Rejected { .. })
    }
}

/// A repository reference that cannot be used as a clone source.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReferenceError {
    /// The remote string matches no supported format.
    #[error("unrecognized git remote format: {remote}")]
    UnrecognizedRemote {
        /// The offending remote string.
        remote: String,
    },

    /// The remote has a host but no namespace/repository path.
    #[error("missing namespace/repo in remote: {remote}")]
    MissingPath {
        /// The offending remote string.
        remote: String,
    },

    /// A hosted reference component is empty or unsafe.
    #[error("invalid {field} '{value}': {reason}")]
    InvalidComponent {
        /// Field name (`namespace`, `name`, `host`).
        field: &'static str,
        /// Supplied value.
        value: String,
        /// Why it was rejected.
        reason: &'static str,
    },
}

/// Invalid configuration values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment variable holds an unparsable value.
    #[error("invalid value for {var}: {value}")]
    InvalidEnv {
        /// Variable name.
        var: &'static str,
        /// Raw value.
        value: String,
    },

    /// A configuration field is out of range.
    #[error("invalid configuration: {message}")]
    Invalid {
        /// Error message.
        message: String,
    },
}

/// Why a guarded operation stopped before finishing.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Interrupt {
    /// The caller cancelled the operation.
    #[error("operation cancelled")]
    Cancelled,
    /// The operation's deadline elapsed.
    #[error("operation timed out")]
    TimedOut,
}

/// Failure running the `git` toolchain.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// The process could not be started.
    #[error("failed to run '{command}': {message}")]
    Spawn {
        /// Command line (without secrets).
        command: String,
        /// Error message.
        message: String,
    },

    /// The process exited unsuccessfully.
    #[error("'{command}' exited with {exit_code:?}: {stderr}")]
    Failed {
        /// Command line (without secrets).
        command: String,
        /// Exit code if the process was not killed by a signal.
        exit_code: Option<i32>,
        /// Captured standard error.
        stderr: String,
    },

    /// The process was stopped by cancellation or deadline.
    #[error(transparent)]
    Interrupted(#[from] Interrupt),

    /// Working directory is missing.
    #[error("working directory does not exist: {}", path.display())]
    MissingDirectory {
        /// The directory.
        path: PathBuf,
    },
}

impl CommandError {
    /// Captured stderr, empty for non-exit failures.
    #[must_use]
    pub fn stderr(&self) -> &str {
        match self {
            Self::Failed { stderr, .. } => stderr,
            _ => "",
        }
    }
}
