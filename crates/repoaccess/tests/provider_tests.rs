//! Provider calls through `RepoAccess` against mock APIs.

use assert_matches::assert_matches;
use pretty_assertions::assert_eq;
use repoaccess::{
    AccessConfig, AccessErrorKind, Control, Credential, Operation, ProviderKind, RepoAccess,
    RepositoryReference,
};
use repoaccess_provider::ProviderError;
use repoaccess_test_utils::fixtures::Fixtures;
use repoaccess_test_utils::mock_server::{MockGitHub, MockGitLab};
use serde_json::Value;
use tempfile::TempDir;

async fn access(root: &TempDir, github: Option<&MockGitHub>, gitlab: Option<&MockGitLab>) -> RepoAccess {
    RepoAccess::open(AccessConfig {
        workspace_dir: root.path().to_path_buf(),
        github_api_url: github.map(MockGitHub::api_url),
        gitlab_api_url: gitlab.map(MockGitLab::api_url),
        retry_base_delay_ms: 1,
        retry_max_delay_ms: 5,
        sweep_on_startup: false,
        ..AccessConfig::default()
    })
    .await
    .unwrap()
}

fn octo() -> RepositoryReference {
    RepositoryReference::hosted(ProviderKind::GitHub, "octo", "hello").unwrap()
}

// ========== GitHub ==========

#[tokio::test]
async fn test_github_branches_and_default_branch() {
    let mock = MockGitHub::start().await;
    mock.repository_for_token("octo", "hello", "trunk", "ghp_valid")
        .await;
    mock.branches("octo", "hello", &["trunk", "release"]).await;
    let root = TempDir::new().unwrap();
    let access = access(&root, Some(&mock), None).await;
    let credential = Credential::token("ghp_valid");
    let control = Control::new();

    let branches = access
        .provider_branches(&octo(), &credential, &control)
        .await
        .unwrap();
    assert_eq!(branches, vec!["trunk", "release"]);

    let default = access
        .provider_default_branch(&octo(), &credential, &control)
        .await
        .unwrap();
    assert_eq!(default, "trunk");
    assert_eq!(access.http_stats().request_count(), 2);
}

#[tokio::test]
async fn test_github_repository_metadata_and_user() {
    let mock = MockGitHub::start().await;
    mock.repository("octo", "hello", "main").await;
    mock.user("octocat").await;
    let root = TempDir::new().unwrap();
    let access = access(&root, Some(&mock), None).await;
    let credential = Credential::token("ghp_valid");
    let control = Control::new();

    let repository = access
        .provider_repository(&octo(), &credential, &control)
        .await
        .unwrap();
    assert_eq!(repository.relative_path, "octo/hello");
    assert_eq!(repository.size_bytes, 108 * 1024);

    let user = access
        .provider_user(&octo(), &credential, &control)
        .await
        .unwrap();
    assert_eq!(user.username.as_deref(), Some("octocat"));
}

#[tokio::test]
async fn test_github_user_repositories_page() {
    let mock = MockGitHub::start().await;
    let repositories = Value::Array(vec![
        Fixtures::github_repository("octocat", "one", "main"),
        Fixtures::github_repository("octocat", "two", "main"),
    ]);
    let link = format!(
        "<{}user/repos?page=2&per_page=2>; rel=\"next\", <{}user/repos?page=3&per_page=2>; rel=\"last\"",
        mock.api_url(),
        mock.api_url()
    );
    mock.user_repos_page(1, repositories, Some(&link)).await;
    let root = TempDir::new().unwrap();
    let access = access(&root, Some(&mock), None).await;

    let page = access
        .provider_user_repositories(&octo(), &Credential::token("ghp_valid"), 1, 2, &Control::new())
        .await
        .unwrap();

    assert_eq!(page.repositories.len(), 2);
    assert_eq!(page.pagination.current_page, 1);
    assert_eq!(page.pagination.next_page, Some(2));
}

#[tokio::test]
async fn test_github_missing_repository_is_not_found() {
    let mock = MockGitHub::start().await;
    mock.status("/repos/octo/hello", 404).await;
    let root = TempDir::new().unwrap();
    let access = access(&root, Some(&mock), None).await;

    let err = access
        .provider_repository(&octo(), &Credential::token("ghp_valid"), &Control::new())
        .await
        .unwrap_err();

    assert!(err.is_not_found(), "{err}");
    assert_eq!(err.operation(), Operation::Provider("repository"));
}

#[tokio::test]
async fn test_github_server_errors_are_retried() {
    let mock = MockGitHub::start().await;
    mock.flaky("/repos/octo/hello", 2, 503).await;
    mock.repository("octo", "hello", "main").await;
    let root = TempDir::new().unwrap();
    let access = access(&root, Some(&mock), None).await;

    let default = access
        .provider_default_branch(&octo(), &Credential::token("ghp_valid"), &Control::new())
        .await
        .unwrap();

    assert_eq!(default, "main");
    assert_eq!(mock.request_count().await, 3);
}

// ========== GitLab ==========

#[tokio::test]
async fn test_gitlab_nested_namespace_default_branch() {
    let mock = MockGitLab::start().await;
    mock.project_for_token("group/sub/proj", "develop", "glpat-valid")
        .await;
    let root = TempDir::new().unwrap();
    let access = access(&root, None, Some(&mock)).await;
    let reference = RepositoryReference::hosted(ProviderKind::GitLab, "group/sub", "proj").unwrap();

    let default = access
        .provider_default_branch(&reference, &Credential::token("glpat-valid"), &Control::new())
        .await
        .unwrap();
    assert_eq!(default, "develop");

    let err = access
        .provider_default_branch(&reference, &Credential::token("glpat-wrong"), &Control::new())
        .await
        .unwrap_err();
    assert!(err.is_auth_error(), "{err}");
}

// ========== Generic ==========

#[tokio::test]
async fn test_generic_remote_has_no_metadata_api() {
    let root = TempDir::new().unwrap();
    let access = access(&root, None, None).await;
    let reference = RepositoryReference::generic("https://git.example.com/team/app.git").unwrap();

    let err = access
        .provider_repository(&reference, &Credential::None, &Control::new())
        .await
        .unwrap_err();

    assert_matches!(
        err.kind(),
        AccessErrorKind::Provider(ProviderError::Unsupported { .. })
    );
    assert_eq!(access.http_stats().request_count(), 0);
}
