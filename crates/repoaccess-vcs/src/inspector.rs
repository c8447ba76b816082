//! Read-only inspection of a populated workspace.

use crate::engine::{ADVERTISED_REFS_FILE, is_commit_id};
use crate::error::InspectionError;
use crate::tree::{CONTROL_DIR, FileTree, PathFilter};
use crate::workspace::{Workspace, WorkspaceState};
use repoaccess_core::{CommandError, Control, GitCommand};
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, trace};

type Result<T> = std::result::Result<T, InspectionError>;

/// How a path changed between two commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    /// Present only in the newer commit.
    Added,
    /// Content or type changed.
    Modified,
    /// Present only in the older commit.
    Deleted,
    /// Moved, possibly with edits.
    Renamed,
}

/// Added and deleted line counts. Absent for binary files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LineStats {
    /// Lines added.
    pub added: u64,
    /// Lines deleted.
    pub deleted: u64,
}

/// One changed path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffEntry {
    /// Path in the newer commit (the older one for deletions).
    pub path: String,
    /// Kind of change.
    pub change: ChangeKind,
    /// Source path of a rename or copy.
    pub old_path: Option<String>,
    /// Line counts, `None` for binary content.
    pub stats: Option<LineStats>,
}

/// Changes between two commits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffResult {
    /// Resolved id of the older side.
    pub from: String,
    /// Resolved id of the newer side.
    pub to: String,
    /// Changed paths in git's order.
    pub entries: Vec<DiffEntry>,
}

impl DiffResult {
    /// Whether nothing changed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry for `path`, if changed.
    #[must_use]
    pub fn entry(&self, path: &str) -> Option<&DiffEntry> {
        self.entries.iter().find(|e| e.path == path)
    }
}

/// Checked-out `HEAD`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Head {
    /// Branch name, `None` when detached.
    pub branch: Option<String>,
    /// Commit id.
    pub commit: String,
}

impl Head {
    /// Whether `HEAD` points at a commit rather than a branch.
    #[must_use]
    pub const fn is_detached(&self) -> bool {
        self.branch.is_none()
    }
}

/// Branches and tags known to the workspace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Refs {
    /// Local and `origin` branches, deduplicated and sorted.
    pub branches: Vec<String>,
    /// Tags, sorted.
    pub tags: Vec<String>,
}

/// Inspector bound to one `Ready` workspace.
///
/// Holds a shared borrow, so the workspace cannot be fetched into or
/// released while an inspector is alive.
#[derive(Debug, Clone, Copy)]
pub struct Inspector<'a> {
    git: &'a Path,
    workspace: &'a Workspace,
}

impl<'a> Inspector<'a> {
    /// Inspect `workspace` with the given git executable.
    ///
    /// # Errors
    /// Returns `InspectionError::WorkspaceNotReady` unless the workspace is `Ready`.
    pub fn new(git: &'a Path, workspace: &'a Workspace) -> Result<Self> {
        if workspace.state() != WorkspaceState::Ready {
            return Err(InspectionError::WorkspaceNotReady {
                id: workspace.id().to_string(),
                state: workspace.state(),
            });
        }
        Ok(Self { git, workspace })
    }

    /// The inspected workspace.
    #[must_use]
    pub const fn workspace(&self) -> &'a Workspace {
        self.workspace
    }

    /// Lazy view of the working tree, `.git` excluded.
    #[must_use]
    pub fn list_file_tree(&self, filter: PathFilter) -> FileTree {
        FileTree::new(self.workspace.path(), filter)
    }

    /// Changes from `from` to `to`, with rename detection.
    ///
    /// # Errors
    /// Returns `RefNotAvailable` for a ref that likely lies beyond a shallow
    /// clone's history, `RefNotFound` for any other unresolvable ref, or
    /// `ReadFailed` if git fails.
    pub async fn diff(&self, from: &str, to: &str, control: &Control) -> Result<DiffResult> {
        let from_id = self.resolve(from, control).await?;
        let to_id = self.resolve(to, control).await?;

        let status = self
            .command(&["diff", "--no-color", "--no-ext-diff", "-M", "--name-status", "-z", &from_id, &to_id])
            .output(control)
            .await?;
        let numstat = self
            .command(&["diff", "--no-color", "--no-ext-diff", "-M", "--numstat", "-z", &from_id, &to_id])
            .output(control)
            .await?;

        let stats = parse_numstat(&numstat);
        let entries = parse_name_status(&status)?
            .into_iter()
            .map(|mut entry| {
                entry.stats = stats.get(&entry.path).copied().flatten();
                entry
            })
            .collect::<Vec<_>>();

        debug!(
            workspace = %self.workspace.id(),
            from = %from_id,
            to = %to_id,
            changes = entries.len(),
            "diff computed"
        );
        Ok(DiffResult {
            from: from_id,
            to: to_id,
            entries,
        })
    }

    /// Current branch and commit.
    ///
    /// # Errors
    /// Returns `ReadFailed` if `HEAD` cannot be read.
    pub async fn current_head(&self, control: &Control) -> Result<Head> {
        let commit = self.command(&["rev-parse", "HEAD"]).output(control).await?;
        let branch = match self
            .command(&["symbolic-ref", "--short", "-q", "HEAD"])
            .output(control)
            .await
        {
            Ok(out) => Some(out.trim().to_string()).filter(|b| !b.is_empty()),
            Err(CommandError::Failed { .. }) => None,
            Err(e) => return Err(e.into()),
        };
        Ok(Head {
            branch,
            commit: commit.trim().to_string(),
        })
    }

    /// Branches and tags.
    ///
    /// # Errors
    /// Returns `ReadFailed` if git fails.
    pub async fn list_refs(&self, control: &Control) -> Result<Refs> {
        let out = self
            .command(&[
                "for-each-ref",
                "--format=%(refname)",
                "refs/heads",
                "refs/remotes/origin",
                "refs/tags",
            ])
            .output(control)
            .await?;
        Ok(parse_refs(&out))
    }

    fn command(&self, args: &[&str]) -> GitCommand {
        GitCommand::new(self.git)
            .current_dir(self.workspace.path())
            .args(args)
    }

    async fn resolve(&self, git_ref: &str, control: &Control) -> Result<String> {
        if git_ref.is_empty() || git_ref.starts_with('-') {
            return Err(InspectionError::RefNotFound {
                git_ref: git_ref.to_string(),
            });
        }
        match self.try_resolve(git_ref, control).await? {
            Some(id) => Ok(id),
            None => Err(self.missing(git_ref, control).await?),
        }
    }

    async fn try_resolve(&self, git_ref: &str, control: &Control) -> Result<Option<String>> {
        let revision = format!("{git_ref}^{{commit}}");
        match self
            .command(&["rev-parse", "--verify", "--quiet", &revision])
            .output(control)
            .await
        {
            Ok(out) => Ok(Some(out.trim().to_string())),
            Err(CommandError::Failed { .. }) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Tell a ref cut off by the shallow boundary from one that does not exist.
    async fn missing(&self, git_ref: &str, control: &Control) -> Result<InspectionError> {
        let control_dir = self.workspace.path().join(CONTROL_DIR);
        let not_found = InspectionError::RefNotFound {
            git_ref: git_ref.to_string(),
        };
        if !control_dir.join("shallow").exists() {
            return Ok(not_found);
        }

        let advertised = tokio::fs::read_to_string(control_dir.join(ADVERTISED_REFS_FILE))
            .await
            .unwrap_or_default();
        let beyond_boundary = if is_commit_id(git_ref) || is_advertised(&advertised, git_ref) {
            true
        } else if let Some(base) = relative_base(git_ref) {
            is_advertised(&advertised, base) || self.try_resolve(base, control).await?.is_some()
        } else {
            false
        };

        trace!(git_ref, beyond_boundary, "unresolved ref in shallow workspace");
        Ok(if beyond_boundary {
            InspectionError::RefNotAvailable {
                git_ref: git_ref.to_string(),
            }
        } else {
            not_found
        })
    }
}

fn is_advertised(advertised: &str, git_ref: &str) -> bool {
    let branch = git_ref.strip_prefix("origin/").unwrap_or(git_ref);
    advertised.lines().any(|name| {
        name == git_ref
            || name.strip_prefix("refs/heads/") == Some(branch)
            || name.strip_prefix("refs/tags/") == Some(git_ref)
    })
}

/// `main~3` → `main`, `v1^2` → `v1`.
fn relative_base(git_ref: &str) -> Option<&str> {
    let at = git_ref.find(['~', '^'])?;
    let base = &git_ref[..at];
    (!base.is_empty()).then_some(base)
}

fn parse_name_status(out: &str) -> Result<Vec<DiffEntry>> {
    let mut fields = out.split('\0').filter(|f| !f.is_empty());
    let mut entries = Vec::new();
    let truncated = || InspectionError::read_failed("git diff --name-status", "truncated output");

    while let Some(status) = fields.next() {
        let entry = match status.as_bytes().first() {
            Some(b'R' | b'C') => {
                let old = fields.next().ok_or_else(truncated)?;
                let new = fields.next().ok_or_else(truncated)?;
                DiffEntry {
                    path: new.to_string(),
                    change: if status.starts_with('R') {
                        ChangeKind::Renamed
                    } else {
                        ChangeKind::Added
                    },
                    old_path: Some(old.to_string()),
                    stats: None,
                }
            }
            Some(code) => {
                let path = fields.next().ok_or_else(truncated)?;
                let change = match code {
                    b'A' => ChangeKind::Added,
                    b'D' => ChangeKind::Deleted,
                    _ => ChangeKind::Modified,
                };
                DiffEntry {
                    path: path.to_string(),
                    change,
                    old_path: None,
                    stats: None,
                }
            }
            None => continue,
        };
        entries.push(entry);
    }
    Ok(entries)
}

/// Per-path line counts keyed by the newer path; binary files map to `None`.
fn parse_numstat(out: &str) -> HashMap<String, Option<LineStats>> {
    let mut fields = out.split('\0');
    let mut stats = HashMap::new();

    while let Some(record) = fields.next() {
        if record.is_empty() {
            continue;
        }
        let mut parts = record.splitn(3, '\t');
        let (Some(added), Some(deleted), Some(path)) = (parts.next(), parts.next(), parts.next()) else {
            continue;
        };
        // Renames put both paths in the following fields.
        let path = if path.is_empty() {
            let _old = fields.next();
            match fields.next() {
                Some(new) => new,
                None => break,
            }
        } else {
            path
        };
        let counts = match (added.parse(), deleted.parse()) {
            (Ok(added), Ok(deleted)) => Some(LineStats { added, deleted }),
            _ => None,
        };
        stats.insert(path.to_string(), counts);
    }
    stats
}

fn parse_refs(out: &str) -> Refs {
    let mut refs = Refs::default();
    for name in out.lines().map(str::trim) {
        if let Some(tag) = name.strip_prefix("refs/tags/") {
            refs.tags.push(tag.to_string());
        } else if let Some(branch) = name.strip_prefix("refs/heads/") {
            refs.branches.push(branch.to_string());
        } else if let Some(branch) = name.strip_prefix("refs/remotes/origin/")
            && branch != "HEAD"
        {
            refs.branches.push(branch.to_string());
        }
    }
    refs.branches.sort();
    refs.branches.dedup();
    refs.tags.sort();
    refs.tags.dedup();
    refs
}
