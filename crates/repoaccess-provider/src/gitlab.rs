//! GitLab REST API (v4) adapter.

use crate::client::{HttpClient, HttpResponse};
use crate::error::{ProviderError, Result};
use crate::models::{
    GitUser, LanguageBreakdown, NormalizedRepository, PaginationInfo, RepositoryPage,
    gitlab_per_page, valid_page,
};
use crate::{endpoint, hosted_parts};
use chrono::{DateTime, Utc};
use repoaccess_core::{Control, RepositoryReference, ResolvedAuth};
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;
use url::Url;

/// GitLab API base URL.
pub const GITLAB_API_URL: &str = "https://gitlab.com/api/v4/";

/// GitLab adapter.
pub struct GitLabAdapter {
    api_url: Url,
    http: Arc<HttpClient>,
}

impl std::fmt::Debug for GitLabAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitLabAdapter")
            .field("api_url", &self.api_url)
            .finish()
    }
}

impl GitLabAdapter {
    /// Adapter for an explicit API base URL.
    #[must_use]
    pub fn new(api_url: Url, http: Arc<HttpClient>) -> Self {
        Self { api_url, http }
    }

    /// Adapter for a (self-hosted) instance: `https://<host>/api/v4/`.
    ///
    /// # Errors
    /// Returns error if the derived URL is invalid.
    pub fn for_host(host: &str, override_url: Option<&Url>, http: Arc<HttpClient>) -> Result<Self> {
        let api_url = match override_url {
            Some(url) => url.clone(),
            None => {
                let raw = format!("https://{host}/api/v4/");
                Url::parse(&raw).map_err(|e| ProviderError::invalid_url(raw, e))?
            }
        };
        Ok(Self::new(api_url, http))
    }

    /// API base URL.
    #[must_use]
    pub const fn api_url(&self) -> &Url {
        &self.api_url
    }

    /// `projects/<namespace%2Fname>` plus `tail`.
    fn project_endpoint(&self, reference: &RepositoryReference, tail: &[&str]) -> Result<Url> {
        let (namespace, name) = hosted_parts(reference)?;
        let project = format!("{namespace}/{name}");
        let mut segments = vec!["projects", project.as_str()];
        segments.extend_from_slice(tail);
        endpoint(&self.api_url, &segments)
    }

    /// Project metadata.
    ///
    /// # Errors
    /// Returns error if the request fails.
    pub async fn get_repository(
        &self,
        reference: &RepositoryReference,
        auth: &ResolvedAuth,
        control: &Control,
    ) -> Result<NormalizedRepository> {
        let mut url = self.project_endpoint(reference, &[])?;
        url.query_pairs_mut().append_pair("statistics", "true");
        let (project, _): (GitLabProject, HttpResponse) =
            self.http.get_json(&url, auth, control).await?;
        Ok(project.into())
    }

    /// Default branch of a project.
    ///
    /// # Errors
    /// Returns error if the request fails.
    pub async fn default_branch(
        &self,
        reference: &RepositoryReference,
        auth: &ResolvedAuth,
        control: &Control,
    ) -> Result<String> {
        let url = self.project_endpoint(reference, &[])?;
        let (project, _): (GitLabProject, HttpResponse) =
            self.http.get_json(&url, auth, control).await?;
        let branch = project.default_branch.unwrap_or_else(|| "main".to_string());
        debug!(reference = %reference, branch = %branch, "gitlab default branch");
        Ok(branch)
    }

    /// Branch names (first 100).
    ///
    /// # Errors
    /// Returns error if the request fails.
    pub async fn list_branches(
        &self,
        reference: &RepositoryReference,
        auth: &ResolvedAuth,
        control: &Control,
    ) -> Result<Vec<String>> {
        let mut url = self.project_endpoint(reference, &["repository", "branches"])?;
        url.query_pairs_mut().append_pair("per_page", "100");
        let (branches, _): (Vec<GitLabBranch>, HttpResponse) =
            self.http.get_json(&url, auth, control).await?;
        Ok(branches.into_iter().map(|b| b.name).collect())
    }

    /// Language breakdown in percent.
    ///
    /// # Errors
    /// Returns error if the request fails.
    pub async fn languages(
        &self,
        reference: &RepositoryReference,
        auth: &ResolvedAuth,
        control: &Control,
    ) -> Result<LanguageBreakdown> {
        let url = self.project_endpoint(reference, &["languages"])?;
        let (languages, _): (LanguageBreakdown, HttpResponse) =
            self.http.get_json(&url, auth, control).await?;
        Ok(languages)
    }

    /// The user owning the token.
    ///
    /// # Errors
    /// Returns error if the request fails.
    pub async fn authenticated_user(
        &self,
        auth: &ResolvedAuth,
        control: &Control,
    ) -> Result<GitUser> {
        let url = endpoint(&self.api_url, &["user"])?;
        let (user, _): (GitLabUser, HttpResponse) = self.http.get_json(&url, auth, control).await?;
        Ok(user.into())
    }

    /// Projects the user is a member of with at least developer access.
    ///
    /// # Errors
    /// Returns error if the request fails.
    pub async fn list_user_repositories(
        &self,
        auth: &ResolvedAuth,
        page: u32,
        per_page: u32,
        control: &Control,
    ) -> Result<RepositoryPage> {
        let page = valid_page(page);
        let per_page = gitlab_per_page(per_page);
        let mut url = endpoint(&self.api_url, &["projects"])?;
        url.query_pairs_mut()
            .append_pair("membership", "true")
            .append_pair("min_access_level", "30")
            .append_pair("per_page", &per_page.to_string())
            .append_pair("page", &page.to_string());

        let (projects, response): (Vec<GitLabProject>, HttpResponse) =
            self.http.get_json(&url, auth, control).await?;

        let number = |name: &str| {
            response
                .header(name)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .filter(|n| *n > 0)
        };
        let total_pages = number("x-total-pages").unwrap_or(1) as u32;
        let pagination = PaginationInfo {
            current_page: page,
            per_page,
            total_count: number("x-total"),
            total_pages,
            next_page: number("x-next-page").map(|n| n as u32),
            prev_page: number("x-prev-page").map(|n| n as u32),
        };

        Ok(RepositoryPage {
            repositories: projects.into_iter().map(Into::into).collect(),
            pagination,
        })
    }
}

/// Whether a GitLab visibility level counts as private.
#[must_use]
pub fn visibility_is_private(visibility: &str) -> bool {
    matches!(
        visibility.to_ascii_lowercase().as_str(),
        "private" | "internal"
    )
}

/// GitLab project response.
#[derive(Debug, Clone, Deserialize)]
pub struct GitLabProject {
    /// Project id.
    pub id: u64,
    /// Name.
    pub name: String,
    /// Description.
    pub description: Option<String>,
    /// Default branch.
    pub default_branch: Option<String>,
    /// Forks.
    #[serde(default)]
    pub forks_count: u64,
    /// Stars.
    #[serde(default)]
    pub star_count: u64,
    /// HTTP clone URL.
    pub http_url_to_repo: String,
    /// `group/sub/project`.
    pub path_with_namespace: String,
    /// Visibility.
    pub visibility: Option<String>,
    /// Creation time.
    pub created_at: Option<DateTime<Utc>>,
    /// Statistics (only with `statistics=true` and sufficient access).
    pub statistics: Option<GitLabStatistics>,
}

/// GitLab project statistics.
#[derive(Debug, Clone, Deserialize)]
pub struct GitLabStatistics {
    /// Repository size in bytes.
    #[serde(default)]
    pub repository_size: u64,
}

impl From<GitLabProject> for NormalizedRepository {
    fn from(project: GitLabProject) -> Self {
        Self {
            id: project.id.to_string(),
            name: project.name,
            description: project.description,
            html_url: project.http_url_to_repo,
            relative_path: project.path_with_namespace,
            default_branch: project.default_branch.unwrap_or_else(|| "main".to_string()),
            forks_count: project.forks_count,
            stargazers_count: project.star_count,
            size_bytes: project.statistics.map_or(0, |s| s.repository_size),
            created_at: project.created_at,
            private: project.visibility.as_deref().map(visibility_is_private),
            visibility: project.visibility,
        }
    }
}

/// GitLab branch response.
#[derive(Debug, Clone, Deserialize)]
pub struct GitLabBranch {
    /// Branch name.
    pub name: String,
}

/// GitLab user response.
#[derive(Debug, Clone, Deserialize)]
pub struct GitLabUser {
    /// Username.
    pub username: Option<String>,
    /// User id.
    pub id: Option<u64>,
    /// Display name.
    pub name: Option<String>,
    /// Email.
    pub email: Option<String>,
    /// Avatar URL.
    pub avatar_url: Option<String>,
    /// Profile URL.
    #[serde(alias = "html_url")]
    pub web_url: Option<String>,
}

impl From<GitLabUser> for GitUser {
    fn from(user: GitLabUser) -> Self {
        Self {
            username: user.username,
            id: user.id,
            name: user.name,
            email: user.email,
            avatar_url: user.avatar_url,
            html_url: user.web_url,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use repoaccess_core::ProviderKind;

    fn http() -> Arc<HttpClient> {
        Arc::new(HttpClient::new().unwrap())
    }

    #[test]
    fn test_project_endpoint_encodes_namespace() {
        let adapter = GitLabAdapter::for_host("gitlab.com", None, http()).unwrap();
        assert_eq!(adapter.api_url().as_str(), GITLAB_API_URL);
        let reference =
            RepositoryReference::hosted(ProviderKind::GitLab, "group/sub", "proj").unwrap();
        let url = adapter
            .project_endpoint(&reference, &["repository", "branches"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://gitlab.com/api/v4/projects/group%2Fsub%2Fproj/repository/branches"
        );
    }

    #[test]
    fn test_visibility_is_private() {
        assert!(visibility_is_private("private"));
        assert!(visibility_is_private("Internal"));
        assert!(!visibility_is_private("public"));
    }

    #[test]
    fn test_normalize_project() {
        let project: GitLabProject = sonic_rs::from_str(
            r#"{"id": 7, "name": "proj", "description": "d", "default_branch": "develop",
                "forks_count": 1, "star_count": 2,
                "http_url_to_repo": "https://gitlab.com/group/sub/proj.git",
                "path_with_namespace": "group/sub/proj", "visibility": "internal",
                "created_at": "2021-06-01T00:00:00Z", "statistics": {"repository_size": 4096}}"#,
        )
        .unwrap();
        let normalized = NormalizedRepository::from(project);
        assert_eq!(normalized.default_branch, "develop");
        assert_eq!(normalized.size_bytes, 4096);
        assert_eq!(normalized.private, Some(true));
        assert_eq!(normalized.stargazers_count, 2);
    }
}
