//! On-disk workspaces for checkouts.
//!
//! A [`Workspace`] is a private directory under the manager's root, named
//! `{prefix}{unix_seconds}-{uuid}-{slug}`. It is created with an atomic
//! create-or-fail `mkdir` (mode `0700` on Unix), owned by exactly one session
//! and removed on [`Workspace::release`] according to a [`ReleasePolicy`], or
//! on drop if never released.

use crate::error::WorkspaceError;
use chrono::{DateTime, Utc};
use repoaccess_core::RepositoryReference;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Directory name prefix that marks a workspace.
pub const WORKSPACE_PREFIX: &str = "repoaccess-";

/// Name collisions tolerated before allocation gives up.
const MAX_ALLOCATION_TRIES: usize = 8;

/// Lifecycle state of a workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkspaceState {
    /// Directory exists and is empty.
    Allocated,
    /// A clone is running.
    Populating,
    /// Clone finished; safe to inspect.
    Ready,
    /// Clone failed.
    Failed,
    /// Released; the handle is inert.
    Released,
}

impl WorkspaceState {
    /// Lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Allocated => "allocated",
            Self::Populating => "populating",
            Self::Ready => "ready",
            Self::Failed => "failed",
            Self::Released => "released",
        }
    }
}

impl fmt::Display for WorkspaceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to do with the directory on release.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReleasePolicy {
    /// Always delete.
    #[default]
    DeleteAlways,
    /// Delete unless the clone failed; failed workspaces stay for debugging.
    DeleteOnSuccess,
    /// Never delete; the caller owns the directory afterwards.
    KeepForInspection,
}

/// Result of a release call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// Directory removed.
    Deleted,
    /// Directory left on disk.
    Kept,
    /// Already released earlier; nothing done.
    AlreadyReleased,
}

/// A checkout directory owned by one session.
pub struct Workspace {
    id: String,
    path: PathBuf,
    reference: RepositoryReference,
    state: WorkspaceState,
    created_at: DateTime<Utc>,
}

impl fmt::Debug for Workspace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Workspace")
            .field("id", &self.id)
            .field("path", &self.path)
            .field("reference", &self.reference.to_string())
            .field("state", &self.state)
            .finish()
    }
}

impl Workspace {
    /// Unique id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Directory of the working tree.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Repository this workspace was allocated for.
    #[must_use]
    pub const fn reference(&self) -> &RepositoryReference {
        &self.reference
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> WorkspaceState {
        self.state
    }

    /// Allocation time.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Whether the workspace can be inspected.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.state == WorkspaceState::Ready
    }

    pub(crate) fn set_state(&mut self, state: WorkspaceState) {
        debug!(workspace = %self.id, from = %self.state, to = %state, "workspace state");
        self.state = state;
    }

    pub(crate) fn expect_state(&self, expected: WorkspaceState) -> Result<(), WorkspaceError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(WorkspaceError::InvalidState {
                id: self.id.clone(),
                state: self.state,
                expected,
            })
        }
    }

    /// Release the workspace. Idempotent: later calls return
    /// [`ReleaseOutcome::AlreadyReleased`].
    ///
    /// # Errors
    /// Returns `WorkspaceError::RemoveFailed` if deletion fails; the workspace
    /// then stays unreleased and deletion is retried on drop.
    pub async fn release(&mut self, policy: ReleasePolicy) -> Result<ReleaseOutcome, WorkspaceError> {
        if self.state == WorkspaceState::Released {
            return Ok(ReleaseOutcome::AlreadyReleased);
        }

        let delete = match policy {
            ReleasePolicy::DeleteAlways => true,
            ReleasePolicy::DeleteOnSuccess => self.state != WorkspaceState::Failed,
            ReleasePolicy::KeepForInspection => false,
        };

        let outcome = if delete {
            match tokio::fs::remove_dir_all(&self.path).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(WorkspaceError::RemoveFailed {
                        path: self.path.clone(),
                        message: e.to_string(),
                    });
                }
            }
            ReleaseOutcome::Deleted
        } else {
            ReleaseOutcome::Kept
        };

        info!(
            workspace = %self.id,
            reference = %self.reference,
            state = %self.state,
            ?policy,
            ?outcome,
            "workspace released"
        );
        self.state = WorkspaceState::Released;
        Ok(outcome)
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if self.state == WorkspaceState::Released {
            return;
        }
        let id = std::mem::take(&mut self.id);
        let path = std::mem::take(&mut self.path);
        // Inside a runtime the removal must not block a worker thread.
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(move || remove_abandoned(&id, &path));
            }
            Err(_) => remove_abandoned(&id, &path),
        }
    }
}

fn remove_abandoned(id: &str, path: &Path) {
    match std::fs::remove_dir_all(path) {
        Ok(()) => debug!(workspace = %id, "unreleased workspace removed on drop"),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!(
            workspace = %id,
            path = %path.display(),
            error = %e,
            "failed to remove unreleased workspace"
        ),
    }
}

/// Allocates workspaces under one root directory.
#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    root: PathBuf,
    prefix: String,
}

impl WorkspaceManager {
    /// Manager for `root`, using [`WORKSPACE_PREFIX`].
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            prefix: WORKSPACE_PREFIX.to_string(),
        }
    }

    /// Use a different directory name prefix.
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Allocate a fresh, empty workspace for `reference`.
    ///
    /// # Errors
    /// Returns `WorkspaceError::AllocationFailed` if the root cannot be
    /// created or no unique directory could be made.
    pub async fn allocate(&self, reference: &RepositoryReference) -> Result<Workspace, WorkspaceError> {
        let fail = |message: String| WorkspaceError::AllocationFailed {
            root: self.root.clone(),
            message,
        };

        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| fail(e.to_string()))?;

        let slug = reference.slug();
        for _ in 0..MAX_ALLOCATION_TRIES {
            let created_at = Utc::now();
            let id = Uuid::new_v4().simple().to_string();
            let name = format!("{}{}-{id}-{slug}", self.prefix, created_at.timestamp());
            let path = self.root.join(name);

            match create_private_dir(&path).await {
                Ok(()) => {
                    debug!(workspace = %id, path = %path.display(), reference = %reference, "workspace allocated");
                    return Ok(Workspace {
                        id,
                        path,
                        reference: reference.clone(),
                        state: WorkspaceState::Allocated,
                        created_at,
                    });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    debug!(path = %path.display(), "workspace name collision, drawing a new one");
                }
                Err(e) => return Err(fail(e.to_string())),
            }
        }

        Err(fail(format!(
            "no unique directory name after {MAX_ALLOCATION_TRIES} attempts"
        )))
    }

    /// Release `workspace` under `policy`.
    ///
    /// # Errors
    /// See [`Workspace::release`].
    pub async fn release(
        &self,
        workspace: &mut Workspace,
        policy: ReleasePolicy,
    ) -> Result<ReleaseOutcome, WorkspaceError> {
        workspace.release(policy).await
    }

    /// Empty the workspace directory in place so a clone can be retried.
    ///
    /// # Errors
    /// Returns `WorkspaceError::ResetFailed` if entries cannot be removed, or
    /// `InvalidState` for a released workspace.
    pub async fn reset(&self, workspace: &mut Workspace) -> Result<(), WorkspaceError> {
        if workspace.state == WorkspaceState::Released {
            return Err(WorkspaceError::InvalidState {
                id: workspace.id.clone(),
                state: workspace.state,
                expected: WorkspaceState::Failed,
            });
        }
        clear_dir(&workspace.path).await?;
        workspace.set_state(WorkspaceState::Allocated);
        Ok(())
    }

    /// Remove workspace directories under the root older than `max_age`.
    ///
    /// Age comes from the timestamp in the directory name. Entries without
    /// this manager's prefix are never touched. Returns the removed paths.
    ///
    /// # Errors
    /// Returns error if the root exists but cannot be listed.
    pub async fn sweep_stale(&self, max_age: Duration) -> Result<Vec<PathBuf>, WorkspaceError> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(WorkspaceError::RemoveFailed {
                    path: self.root.clone(),
                    message: e.to_string(),
                });
            }
        };

        let now = Utc::now().timestamp();
        let max_age = i64::try_from(max_age.as_secs()).unwrap_or(i64::MAX);
        let mut removed = Vec::new();

        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    warn!(root = %self.root.display(), error = %e, "stale sweep stopped early");
                    break;
                }
            };
            let name = entry.file_name();
            let Some(created) = name.to_str().and_then(|n| self.created_from_name(n)) else {
                continue;
            };
            if now.saturating_sub(created) <= max_age {
                continue;
            }
            if !entry.file_type().await.is_ok_and(|t| t.is_dir()) {
                continue;
            }

            let path = entry.path();
            match tokio::fs::remove_dir_all(&path).await {
                Ok(()) => {
                    debug!(path = %path.display(), "stale workspace removed");
                    removed.push(path);
                }
                Err(e) => warn!(path = %path.display(), error = %e, "failed to remove stale workspace"),
            }
        }

        if !removed.is_empty() {
            info!(count = removed.len(), root = %self.root.display(), "stale workspaces swept");
        }
        Ok(removed)
    }

    /// Creation timestamp encoded in a workspace directory name.
    fn created_from_name(&self, name: &str) -> Option<i64> {
        name.strip_prefix(&self.prefix)?
            .split('-')
            .next()?
            .parse()
            .ok()
    }
}

async fn create_private_dir(path: &Path) -> std::io::Result<()> {
    #[cfg_attr(not(unix), allow(unused_mut))]
    let mut builder = tokio::fs::DirBuilder::new();
    #[cfg(unix)]
    builder.mode(0o700);
    builder.create(path).await
}

/// Remove everything inside `path`, recreating it if it vanished.
pub(crate) async fn clear_dir(path: &Path) -> Result<(), WorkspaceError> {
    let fail = |e: std::io::Error| WorkspaceError::ResetFailed {
        path: path.to_path_buf(),
        message: e.to_string(),
    };

    let mut entries = match tokio::fs::read_dir(path).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return create_private_dir(path).await.map_err(fail);
        }
        Err(e) => return Err(fail(e)),
    };

    while let Some(entry) = entries.next_entry().await.map_err(fail)? {
        let child = entry.path();
        let is_dir = entry.file_type().await.map_err(fail)?.is_dir();
        if is_dir {
            tokio::fs::remove_dir_all(&child).await.map_err(fail)?;
        } else {
            tokio::fs::remove_file(&child).await.map_err(fail)?;
        }
    }
    Ok(())
}
