//! GitHub REST API adapter.

use crate::client::{HttpClient, HttpResponse};
use crate::error::{ProviderError, Result};
use crate::models::{
    GitUser, LanguageBreakdown, NormalizedRepository, PaginationInfo, RepositoryPage,
    github_per_page, valid_page,
};
use crate::{endpoint, hosted_parts, percentages};
use chrono::{DateTime, Utc};
use repoaccess_core::reference::GITHUB_HOST;
use repoaccess_core::{Control, RepositoryReference, ResolvedAuth};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;
use url::Url;

/// GitHub API base URL.
pub const GITHUB_API_URL: &str = "https://api.github.com/";

/// GitHub adapter.
pub struct GitHubAdapter {
    api_url: Url,
    http: Arc<HttpClient>,
}

impl std::fmt::Debug for GitHubAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubAdapter")
            .field("api_url", &self.api_url)
            .finish()
    }
}

impl GitHubAdapter {
    /// Adapter for an explicit API base URL.
    #[must_use]
    pub fn new(api_url: Url, http: Arc<HttpClient>) -> Self {
        Self { api_url, http }
    }

    /// Adapter for a host: `api.github.com` for github.com,
    /// `https://<host>/api/v3/` for GitHub Enterprise.
    ///
    /// # Errors
    /// Returns error if the derived URL is invalid.
    pub fn for_host(host: &str, override_url: Option<&Url>, http: Arc<HttpClient>) -> Result<Self> {
        let api_url = match override_url {
            Some(url) => url.clone(),
            None if host == GITHUB_HOST => {
                Url::parse(GITHUB_API_URL).map_err(|e| ProviderError::invalid_url(GITHUB_API_URL, e))?
            }
            None => {
                let raw = format!("https://{host}/api/v3/");
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

    fn repo_endpoint(&self, reference: &RepositoryReference, tail: &[&str]) -> Result<Url> {
        let (namespace, name) = hosted_parts(reference)?;
        let mut segments = vec!["repos"];
        segments.extend(namespace.split('/'));
        segments.push(name);
        segments.extend_from_slice(tail);
        endpoint(&self.api_url, &segments)
    }

    /// Repository metadata.
    ///
    /// # Errors
    /// Returns error if the request fails.
    pub async fn get_repository(
        &self,
        reference: &RepositoryReference,
        auth: &ResolvedAuth,
        control: &Control,
    ) -> Result<NormalizedRepository> {
        let url = self.repo_endpoint(reference, &[])?;
        let (repo, _): (GitHubRepository, HttpResponse) =
            self.http.get_json(&url, auth, control).await?;
        Ok(repo.into())
    }

    /// Default branch of a repository.
    ///
    /// # Errors
    /// Returns error if the request fails.
    pub async fn default_branch(
        &self,
        reference: &RepositoryReference,
        auth: &ResolvedAuth,
        control: &Control,
    ) -> Result<String> {
        let repo = self.get_repository(reference, auth, control).await?;
        debug!(reference = %reference, branch = %repo.default_branch, "github default branch");
        Ok(repo.default_branch)
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
        let mut url = self.repo_endpoint(reference, &["branches"])?;
        url.query_pairs_mut().append_pair("per_page", "100");
        let (branches, _): (Vec<GitHubBranch>, HttpResponse) =
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
        let url = self.repo_endpoint(reference, &["languages"])?;
        let (bytes, _): (BTreeMap<String, u64>, HttpResponse) =
            self.http.get_json(&url, auth, control).await?;
        Ok(percentages(&bytes))
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
        let (user, _): (GitHubUser, HttpResponse) = self.http.get_json(&url, auth, control).await?;
        Ok(user.into())
    }

    /// Repositories visible to the token's user, most recently updated first.
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
        let per_page = github_per_page(per_page);
        let mut url = endpoint(&self.api_url, &["user", "repos"])?;
        url.query_pairs_mut()
            .append_pair("visibility", "all")
            .append_pair("sort", "updated")
            .append_pair("direction", "desc")
            .append_pair("per_page", &per_page.to_string())
            .append_pair("page", &page.to_string());

        let (repos, response): (Vec<GitHubRepository>, HttpResponse) =
            self.http.get_json(&url, auth, control).await?;
        let links = response.header("link").unwrap_or_default();

        let pagination = match link_page(links, "last") {
            Some(last) => PaginationInfo::from_pages(None, last, page, per_page),
            None if link_page(links, "next").is_some() => {
                PaginationInfo::from_pages(None, page + 1, page, per_page)
            }
            None => {
                let total = u64::from(page - 1) * u64::from(per_page) + repos.len() as u64;
                PaginationInfo::from_total(total, page, per_page)
            }
        };

        Ok(RepositoryPage {
            repositories: repos.into_iter().map(Into::into).collect(),
            pagination,
        })
    }
}

/// Page number of the `rel` entry in a `Link` header.
#[must_use]
pub fn link_page(header: &str, rel: &str) -> Option<u32> {
    let wanted = format!("rel=\"{rel}\"");
    header.split(',').find_map(|part| {
        let (target, params) = part.split_once(';')?;
        if !params.split(';').any(|p| p.trim() == wanted) {
            return None;
        }
        let target = target.trim().trim_start_matches('<').trim_end_matches('>');
        let url = Url::parse(target).ok()?;
        url.query_pairs()
            .find(|(k, _)| k == "page")
            .and_then(|(_, v)| v.parse().ok())
    })
}

/// GitHub repository response.
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubRepository {
    /// Repository id.
    pub id: u64,
    /// Name.
    pub name: String,
    /// `owner/name`.
    pub full_name: String,
    /// Description.
    pub description: Option<String>,
    /// Web URL.
    pub html_url: String,
    /// Default branch.
    pub default_branch: Option<String>,
    /// Forks.
    #[serde(default)]
    pub forks_count: u64,
    /// Stars.
    #[serde(default)]
    pub stargazers_count: u64,
    /// Size in kilobytes.
    #[serde(default)]
    pub size: u64,
    /// Creation time.
    pub created_at: Option<DateTime<Utc>>,
    /// Private flag.
    pub private: Option<bool>,
    /// Visibility.
    pub visibility: Option<String>,
}

impl From<GitHubRepository> for NormalizedRepository {
    fn from(repo: GitHubRepository) -> Self {
        Self {
            id: repo.id.to_string(),
            name: repo.name,
            description: repo.description,
            html_url: repo.html_url,
            relative_path: repo.full_name,
            default_branch: repo.default_branch.unwrap_or_else(|| "main".to_string()),
            forks_count: repo.forks_count,
            stargazers_count: repo.stargazers_count,
            size_bytes: repo.size.saturating_mul(1024),
            created_at: repo.created_at,
            private: repo.private,
            visibility: repo.visibility,
        }
    }
}

/// GitHub branch response.
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubBranch {
    /// Branch name.
    pub name: String,
}

/// GitHub user response.
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubUser {
    /// Login.
    pub login: Option<String>,
    /// User id.
    pub id: Option<u64>,
    /// Display name.
    pub name: Option<String>,
    /// Email.
    pub email: Option<String>,
    /// Avatar URL.
    pub avatar_url: Option<String>,
    /// Profile URL.
    pub html_url: Option<String>,
}

impl From<GitHubUser> for GitUser {
    fn from(user: GitHubUser) -> Self {
        Self {
            username: user.login,
            id: user.id,
            name: user.name,
            email: user.email,
            avatar_url: user.avatar_url,
            html_url: user.html_url,
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
    fn test_for_host() {
        let public = GitHubAdapter::for_host("github.com", None, http()).unwrap();
        assert_eq!(public.api_url().as_str(), GITHUB_API_URL);

        let enterprise = GitHubAdapter::for_host("github.acme.io", None, http()).unwrap();
        assert_eq!(enterprise.api_url().as_str(), "https://github.acme.io/api/v3/");
    }

    #[test]
    fn test_repo_endpoint() {
        let adapter = GitHubAdapter::for_host("github.com", None, http()).unwrap();
        let reference = RepositoryReference::hosted(ProviderKind::GitHub, "octo", "hello").unwrap();
        let url = adapter.repo_endpoint(&reference, &["branches"]).unwrap();
        assert_eq!(url.as_str(), "https://api.github.com/repos/octo/hello/branches");
    }

    #[test]
    fn test_link_page() {
        let header = r#"<https://api.github.com/user/repos?per_page=30&page=2>; rel="next", <https://api.github.com/user/repos?per_page=30&page=7>; rel="last""#;
        assert_eq!(link_page(header, "next"), Some(2));
        assert_eq!(link_page(header, "last"), Some(7));
        assert_eq!(link_page(header, "prev"), None);
        assert_eq!(link_page("", "last"), None);
    }

    #[test]
    fn test_normalize_repository() {
        let repo: GitHubRepository = sonic_rs::from_str(
            r#"{"id": 42, "name": "hello", "full_name": "octo/hello", "description": null,
                "html_url": "https://github.com/octo/hello", "default_branch": null,
                "forks_count": 3, "stargazers_count": 9, "size": 2,
                "created_at": "2020-01-02T03:04:05Z", "private": false, "visibility": "public"}"#,
        )
        .unwrap();
        let normalized = NormalizedRepository::from(repo);
        assert_eq!(normalized.id, "42");
        assert_eq!(normalized.default_branch, "main");
        assert_eq!(normalized.size_bytes, 2048);
        assert_eq!(normalized.relative_path, "octo/hello");
        assert_eq!(normalized.private, Some(false));
    }
}
