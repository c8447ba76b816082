//! Inspection of populated workspaces.

use assert_matches::assert_matches;
use pretty_assertions::assert_eq;
use repoaccess_core::{CloneUrl, Control, RepositoryReference, ResolvedAuth, RetryPolicy};
use repoaccess_test_utils::git_utils::{TempGitRepo, git_available};
use repoaccess_vcs::{
    ChangeKind, CloneEngine, CloneRequest, EntryKind, InspectionError, Inspector, LineStats,
    PathFilter, Workspace, WorkspaceManager, WorkspaceState,
};
use std::path::Path;
use tempfile::TempDir;

const GIT: &str = "git";

async fn checkout(root: &TempDir, remote: &TempGitRepo, request: CloneRequest) -> Workspace {
    let reference = RepositoryReference::generic(remote.path().to_string_lossy()).unwrap();
    let mut workspace = WorkspaceManager::new(root.path())
        .allocate(&reference)
        .await
        .unwrap();
    CloneEngine::new(GIT, RetryPolicy::no_retry())
        .populate(
            &mut workspace,
            &CloneUrl::plain(remote.path().to_string_lossy()),
            &ResolvedAuth::Anonymous,
            &request,
            &Control::new(),
        )
        .await
        .unwrap();
    workspace
}

fn inspector(workspace: &Workspace) -> Inspector<'_> {
    Inspector::new(Path::new(GIT), workspace).unwrap()
}

// ========== Diff ==========

#[tokio::test]
async fn test_diff_between_tags() {
    if !git_available().await {
        return;
    }
    let (repo, commits) = TempGitRepo::with_history(3).await.unwrap();
    let remote = repo.bare_clone().await.unwrap();
    let root = TempDir::new().unwrap();
    let workspace = checkout(&root, &remote, CloneRequest::new().full_history()).await;

    let diff = inspector(&workspace)
        .diff("v1", "v3", &Control::new())
        .await
        .unwrap();

    assert_eq!(diff.from, commits[0]);
    assert_eq!(diff.to, commits[2]);
    let changes: Vec<_> = diff.entries.iter().map(|e| (e.path.as_str(), e.change)).collect();
    assert_eq!(
        changes,
        vec![
            ("CHANGELOG.md", ChangeKind::Modified),
            ("src/v2.rs", ChangeKind::Added),
            ("src/v3.rs", ChangeKind::Added),
        ]
    );
    assert_eq!(
        diff.entry("CHANGELOG.md").unwrap().stats,
        Some(LineStats { added: 1, deleted: 1 })
    );
}

#[tokio::test]
async fn test_diff_is_inverse_when_swapped() {
    if !git_available().await {
        return;
    }
    let (repo, _) = TempGitRepo::with_history(3).await.unwrap();
    let remote = repo.bare_clone().await.unwrap();
    let root = TempDir::new().unwrap();
    let workspace = checkout(&root, &remote, CloneRequest::new().full_history()).await;
    let inspector = inspector(&workspace);
    let control = Control::new();

    let forward = inspector.diff("v1", "v3", &control).await.unwrap();
    let backward = inspector.diff("v3", "v1", &control).await.unwrap();

    assert_eq!(forward.entries.len(), backward.entries.len());
    for entry in &forward.entries {
        let inverse = backward.entry(&entry.path).unwrap();
        let expected = match entry.change {
            ChangeKind::Added => ChangeKind::Deleted,
            ChangeKind::Deleted => ChangeKind::Added,
            other => other,
        };
        assert_eq!(inverse.change, expected, "{}", entry.path);
    }
}

#[tokio::test]
async fn test_diff_detects_renames() {
    if !git_available().await {
        return;
    }
    let body = "fn main() {\n    println!(\"hello\");\n}\n".repeat(8);
    let repo = TempGitRepo::with_content(&[("src/old.rs", &body)]).await.unwrap();
    repo.create_tag("before").await.unwrap();
    repo.rename_file("src/old.rs", "src/new.rs").await.unwrap();
    repo.commit_all("rename").await.unwrap();
    let remote = repo.bare_clone().await.unwrap();
    let root = TempDir::new().unwrap();
    let workspace = checkout(&root, &remote, CloneRequest::new().full_history()).await;

    let diff = inspector(&workspace)
        .diff("before", "HEAD", &Control::new())
        .await
        .unwrap();

    assert_eq!(diff.entries.len(), 1);
    let entry = &diff.entries[0];
    assert_eq!(entry.change, ChangeKind::Renamed);
    assert_eq!(entry.path, "src/new.rs");
    assert_eq!(entry.old_path.as_deref(), Some("src/old.rs"));
}

#[tokio::test]
async fn test_shallow_workspace_reports_ref_not_available() {
    if !git_available().await {
        return;
    }
    let (repo, commits) = TempGitRepo::with_history(3).await.unwrap();
    let remote = repo.bare_clone().await.unwrap();
    let root = TempDir::new().unwrap();
    let workspace = checkout(&root, &remote, CloneRequest::new()).await;
    let inspector = inspector(&workspace);
    let control = Control::new();

    // Tag advertised by the remote but older than the shallow boundary.
    assert_matches!(
        inspector.diff("v1", "HEAD", &control).await,
        Err(InspectionError::RefNotAvailable { ref git_ref }) if git_ref == "v1"
    );
    // Relative revision on a resolvable base.
    assert_matches!(
        inspector.diff("HEAD~2", "HEAD", &control).await,
        Err(InspectionError::RefNotAvailable { .. })
    );
    // Object id outside the checkout.
    assert_matches!(
        inspector.diff(&commits[0], "HEAD", &control).await,
        Err(InspectionError::RefNotAvailable { .. })
    );
    assert_matches!(
        inspector.diff("never-existed", "HEAD", &control).await,
        Err(InspectionError::RefNotFound { .. })
    );
}

#[tokio::test]
async fn test_full_workspace_reports_ref_not_found() {
    if !git_available().await {
        return;
    }
    let (repo, _) = TempGitRepo::with_history(2).await.unwrap();
    let remote = repo.bare_clone().await.unwrap();
    let root = TempDir::new().unwrap();
    let workspace = checkout(&root, &remote, CloneRequest::new().full_history()).await;

    assert_matches!(
        inspector(&workspace).diff("v9", "HEAD", &Control::new()).await,
        Err(InspectionError::RefNotFound { .. })
    );
}

// ========== Head and refs ==========

#[tokio::test]
async fn test_list_refs_and_head() {
    if !git_available().await {
        return;
    }
    let (repo, commits) = TempGitRepo::with_history(2).await.unwrap();
    repo.create_branch("feature").await.unwrap();
    let remote = repo.bare_clone().await.unwrap();
    let root = TempDir::new().unwrap();
    let workspace = checkout(&root, &remote, CloneRequest::new().full_history()).await;
    let inspector = inspector(&workspace);
    let control = Control::new();

    let refs = inspector.list_refs(&control).await.unwrap();
    assert_eq!(refs.branches, vec!["feature", "main"]);
    assert_eq!(refs.tags, vec!["v1", "v2"]);

    let head = inspector.current_head(&control).await.unwrap();
    assert_eq!(head.branch.as_deref(), Some("main"));
    assert_eq!(&head.commit, commits.last().unwrap());
}

// ========== File tree ==========

#[tokio::test]
async fn test_file_tree_skips_control_directory() {
    if !git_available().await {
        return;
    }
    let repo = TempGitRepo::with_content(&[
        ("README.md", "# demo\n"),
        ("src/main.rs", "fn main() {}\n"),
        ("assets/logo.png", "png"),
    ])
    .await
    .unwrap();
    let remote = repo.bare_clone().await.unwrap();
    let root = TempDir::new().unwrap();
    let workspace = checkout(&root, &remote, CloneRequest::new()).await;
    let inspector = inspector(&workspace);

    let tree = inspector.list_file_tree(PathFilter::All);
    let all = tree.entries().unwrap();
    assert!(all.iter().all(|e| !e.path.starts_with(".git")));
    assert!(all.iter().any(|e| e.path == Path::new("assets") && e.kind == EntryKind::Directory));
    // A second walk sees the same entries.
    assert_eq!(tree.entries().unwrap(), all);

    let sources: Vec<_> = inspector
        .list_file_tree(PathFilter::SourceFiles)
        .iter()
        .map(|e| e.unwrap().path)
        .collect();
    assert_eq!(sources, vec![Path::new("README.md"), Path::new("src/main.rs")]);
}

#[tokio::test]
async fn test_inspector_requires_ready_workspace() {
    let root = TempDir::new().unwrap();
    let reference = RepositoryReference::generic("/srv/git/app.git").unwrap();
    let workspace = WorkspaceManager::new(root.path())
        .allocate(&reference)
        .await
        .unwrap();

    assert_matches!(
        Inspector::new(Path::new(GIT), &workspace),
        Err(InspectionError::WorkspaceNotReady {
            state: WorkspaceState::Allocated,
            ..
        })
    );
}
