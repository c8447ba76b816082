//! Workspaces, clone/fetch and read-only inspection for repoaccess.
//!
//! - **Workspaces**: private per-session directories with explicit release
//!   policies and a stale sweep
//! - **Clone/Fetch**: shallow by default, retried with backoff, credentials
//!   never persisted in `.git/config`
//! - **Inspection**: lazy file trees, rename-aware diffs, `HEAD` and refs
//!
//! # Quick Start
//!
//! ```no_run
//! use repoaccess_core::{CloneUrl, Control, ResolvedAuth, RepositoryReference, RetryPolicy};
//! use repoaccess_vcs::{CloneEngine, CloneRequest, Inspector, ReleasePolicy, WorkspaceManager};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let reference = RepositoryReference::generic("/srv/git/app.git")?;
//! let manager = WorkspaceManager::new(std::env::temp_dir());
//! let engine = CloneEngine::new("git", RetryPolicy::default());
//! let control = Control::new();
//!
//! let mut workspace = manager.allocate(&reference).await?;
//! let url = CloneUrl::plain("/srv/git/app.git");
//! let cloned = engine
//!     .populate(&mut workspace, &url, &ResolvedAuth::Anonymous, &CloneRequest::new(), &control)
//!     .await?;
//! println!("{} at {}", cloned.resolved_ref, cloned.commit);
//!
//! let head = Inspector::new(engine.git(), &workspace)?
//!     .current_head(&control)
//!     .await?;
//! assert_eq!(head.commit, cloned.commit);
//!
//! workspace.release(ReleasePolicy::DeleteAlways).await?;
//! # Ok(())
//! # }
//! ```

pub mod engine;
pub mod error;
pub mod inspector;
pub mod tree;
pub mod workspace;

pub use engine::{CloneDepth, CloneEngine, CloneRequest, CloneResult, is_commit_id};
pub use error::{CloneError, ErrorClass, InspectionError, WorkspaceError};
pub use inspector::{ChangeKind, DiffEntry, DiffResult, Head, Inspector, LineStats, Refs};
pub use tree::{EntryKind, FileTree, FileTreeEntry, FileTreeIter, PathFilter, is_source_file};
pub use workspace::{
    ReleaseOutcome, ReleasePolicy, Workspace, WorkspaceManager, WorkspaceState, WORKSPACE_PREFIX,
};
