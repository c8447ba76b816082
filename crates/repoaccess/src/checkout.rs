//! Checkout sessions.

use crate::error::{AccessError, Operation};
use repoaccess_core::{CloneUrl, RepositoryReference, ResolvedAuth};
use repoaccess_vcs::{CloneDepth, CloneResult, Inspector, ReleasePolicy, Workspace};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Options for one checkout.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckoutOptions {
    /// Branch, tag or commit. `None` uses the provider's default branch.
    pub git_ref: Option<String>,
    /// History depth; `None` uses the configured default.
    pub depth: Option<CloneDepth>,
    /// What happens to the workspace on release.
    pub policy: ReleasePolicy,
    /// Deadline for the whole checkout, on top of the caller's control.
    pub timeout: Option<Duration>,
}

impl CheckoutOptions {
    /// Default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Check out a specific ref.
    #[must_use]
    pub fn git_ref(mut self, git_ref: impl Into<String>) -> Self {
        self.git_ref = Some(git_ref.into());
        self
    }

    /// Set the history depth.
    #[must_use]
    pub const fn depth(mut self, depth: CloneDepth) -> Self {
        self.depth = Some(depth);
        self
    }

    /// Clone complete history.
    #[must_use]
    pub const fn full_history(self) -> Self {
        self.depth(CloneDepth::Full)
    }

    /// Set the release policy.
    #[must_use]
    pub const fn policy(mut self, policy: ReleasePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Bound the checkout's duration.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// A populated workspace and what it took to get there.
///
/// Release it with [`RepoAccess::release`](crate::RepoAccess::release); a
/// checkout dropped unreleased deletes its directory.
#[derive(Debug)]
pub struct Checkout {
    pub(crate) workspace: Workspace,
    pub(crate) result: CloneResult,
    pub(crate) url: CloneUrl,
    pub(crate) auth: ResolvedAuth,
    pub(crate) policy: ReleasePolicy,
    pub(crate) git: PathBuf,
}

impl Checkout {
    /// Repository checked out.
    #[must_use]
    pub const fn reference(&self) -> &RepositoryReference {
        self.workspace.reference()
    }

    /// Underlying workspace.
    #[must_use]
    pub const fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Working tree directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.workspace.path()
    }

    /// Outcome of the latest clone or fetch.
    #[must_use]
    pub const fn result(&self) -> &CloneResult {
        &self.result
    }

    /// Release policy chosen at checkout.
    #[must_use]
    pub const fn policy(&self) -> ReleasePolicy {
        self.policy
    }

    /// Read-only inspector for this checkout.
    ///
    /// # Errors
    /// Returns error if the checkout has been released.
    pub fn inspector(&self) -> Result<Inspector<'_>, AccessError> {
        Inspector::new(&self.git, &self.workspace)
            .map_err(|e| AccessError::new(self.reference(), Operation::Inspect, e))
    }
}
