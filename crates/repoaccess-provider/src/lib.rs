//! Provider adapters for repoaccess.
//!
//! [`ProviderAdapter`] is a closed set of providers (GitHub, GitLab, generic
//! git) behind one normalized interface: clone URL resolution, branch listing
//! and default branch lookup. Hosted providers additionally expose repository
//! metadata, the authenticated user, and paginated repository listings.

pub mod client;
pub mod error;
pub mod generic;
pub mod github;
pub mod gitlab;
pub mod models;

pub use client::{HttpClient, HttpClientConfig, HttpClientStats};
pub use error::{ProviderError, Result};
pub use generic::GenericAdapter;
pub use github::GitHubAdapter;
pub use gitlab::GitLabAdapter;
pub use models::{GitUser, LanguageBreakdown, NormalizedRepository, PaginationInfo, RepositoryPage};

use repoaccess_core::{
    AccessConfig, CloneUrl, Control, ProviderKind, RepositoryReference, ResolvedAuth,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use url::Url;

/// Provider adapter, one variant per supported provider.
#[derive(Debug)]
pub enum ProviderAdapter {
    /// GitHub / GitHub Enterprise.
    GitHub(GitHubAdapter),
    /// GitLab.
    GitLab(GitLabAdapter),
    /// Any other git remote.
    Generic(GenericAdapter),
}

impl ProviderAdapter {
    /// Adapter for a reference, honouring API URL overrides from `config`.
    ///
    /// # Errors
    /// Returns error if an API URL cannot be derived.
    pub fn for_reference(
        reference: &RepositoryReference,
        config: &AccessConfig,
        http: Arc<HttpClient>,
    ) -> Result<Self> {
        let host = reference.host().unwrap_or_default();
        Ok(match reference.provider() {
            ProviderKind::GitHub => Self::GitHub(GitHubAdapter::for_host(
                &host,
                config.github_api_url.as_ref(),
                http,
            )?),
            ProviderKind::GitLab => Self::GitLab(GitLabAdapter::for_host(
                &host,
                config.gitlab_api_url.as_ref(),
                http,
            )?),
            ProviderKind::Generic => {
                Self::Generic(GenericAdapter::new(&config.git, config.retry_policy()))
            }
        })
    }

    /// Provider of this adapter.
    #[must_use]
    pub const fn kind(&self) -> ProviderKind {
        match self {
            Self::GitHub(_) => ProviderKind::GitHub,
            Self::GitLab(_) => ProviderKind::GitLab,
            Self::Generic(_) => ProviderKind::Generic,
        }
    }

    /// Canonical clone URL with auth embedded where the transport allows it.
    ///
    /// Hosted providers clone over HTTPS, or over SSH when `auth` is an SSH key.
    ///
    /// # Errors
    /// Returns error if the reference does not match the adapter.
    pub fn resolve_clone_url(
        &self,
        reference: &RepositoryReference,
        auth: &ResolvedAuth,
    ) -> Result<CloneUrl> {
        match self {
            Self::GitHub(_) | Self::GitLab(_) => hosted_clone_url(reference, auth),
            Self::Generic(adapter) => adapter.clone_url(reference, auth),
        }
    }

    /// Branch names.
    ///
    /// # Errors
    /// Returns error if the provider call fails.
    pub async fn list_branches(
        &self,
        reference: &RepositoryReference,
        auth: &ResolvedAuth,
        control: &Control,
    ) -> Result<Vec<String>> {
        match self {
            Self::GitHub(adapter) => adapter.list_branches(reference, auth, control).await,
            Self::GitLab(adapter) => adapter.list_branches(reference, auth, control).await,
            Self::Generic(adapter) => adapter.list_branches(reference, auth, control).await,
        }
    }

    /// Default branch.
    ///
    /// # Errors
    /// Returns error if the provider call fails.
    pub async fn default_branch(
        &self,
        reference: &RepositoryReference,
        auth: &ResolvedAuth,
        control: &Control,
    ) -> Result<String> {
        match self {
            Self::GitHub(adapter) => adapter.default_branch(reference, auth, control).await,
            Self::GitLab(adapter) => adapter.default_branch(reference, auth, control).await,
            Self::Generic(adapter) => adapter.default_branch(reference, auth, control).await,
        }
    }

    /// Normalized repository metadata (hosted providers only).
    ///
    /// # Errors
    /// Returns `Unsupported` for generic remotes, or the provider error.
    pub async fn get_repository(
        &self,
        reference: &RepositoryReference,
        auth: &ResolvedAuth,
        control: &Control,
    ) -> Result<NormalizedRepository> {
        match self {
            Self::GitHub(adapter) => adapter.get_repository(reference, auth, control).await,
            Self::GitLab(adapter) => adapter.get_repository(reference, auth, control).await,
            Self::Generic(_) => Err(self.unsupported("repository metadata")),
        }
    }

    /// Language breakdown (hosted providers only).
    ///
    /// # Errors
    /// Returns `Unsupported` for generic remotes, or the provider error.
    pub async fn languages(
        &self,
        reference: &RepositoryReference,
        auth: &ResolvedAuth,
        control: &Control,
    ) -> Result<LanguageBreakdown> {
        match self {
            Self::GitHub(adapter) => adapter.languages(reference, auth, control).await,
            Self::GitLab(adapter) => adapter.languages(reference, auth, control).await,
            Self::Generic(_) => Err(self.unsupported("language statistics")),
        }
    }

    /// The user owning the credential (hosted providers only).
    ///
    /// # Errors
    /// Returns `Unsupported` for generic remotes, or the provider error.
    pub async fn authenticated_user(&self, auth: &ResolvedAuth, control: &Control) -> Result<GitUser> {
        match self {
            Self::GitHub(adapter) => adapter.authenticated_user(auth, control).await,
            Self::GitLab(adapter) => adapter.authenticated_user(auth, control).await,
            Self::Generic(_) => Err(self.unsupported("user lookup")),
        }
    }

    /// One page of the user's repositories (hosted providers only).
    ///
    /// # Errors
    /// Returns `Unsupported` for generic remotes, or the provider error.
    pub async fn list_user_repositories(
        &self,
        auth: &ResolvedAuth,
        page: u32,
        per_page: u32,
        control: &Control,
    ) -> Result<RepositoryPage> {
        match self {
            Self::GitHub(adapter) => {
                adapter
                    .list_user_repositories(auth, page, per_page, control)
                    .await
            }
            Self::GitLab(adapter) => {
                adapter
                    .list_user_repositories(auth, page, per_page, control)
                    .await
            }
            Self::Generic(_) => Err(self.unsupported("repository listing")),
        }
    }

    fn unsupported(&self, operation: &'static str) -> ProviderError {
        ProviderError::Unsupported {
            provider: self.kind(),
            operation,
        }
    }
}

/// Namespace and name of a hosted reference.
pub(crate) fn hosted_parts(reference: &RepositoryReference) -> Result<(&str, &str)> {
    reference
        .namespace()
        .map(|ns| (ns, reference.name()))
        .ok_or_else(|| {
            ProviderError::invalid_url(reference.to_string(), "reference has no namespace")
        })
}

/// Append percent-encoded path segments to an API base URL.
pub(crate) fn endpoint(base: &Url, segments: &[&str]) -> Result<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|()| ProviderError::invalid_url(base.as_str(), "cannot be a base url"))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Byte counts to percentages, rounded to two decimals.
pub(crate) fn percentages(bytes: &BTreeMap<String, u64>) -> LanguageBreakdown {
    let total: u64 = bytes.values().sum();
    if total == 0 {
        return LanguageBreakdown::new();
    }
    bytes
        .iter()
        .map(|(lang, count)| {
            let share = (*count as f64 / total as f64 * 10_000.0).round() / 100.0;
            (lang.clone(), share)
        })
        .collect()
}

fn hosted_clone_url(reference: &RepositoryReference, auth: &ResolvedAuth) -> Result<CloneUrl> {
    let (namespace, name) = hosted_parts(reference)?;
    let host = reference
        .host()
        .ok_or_else(|| ProviderError::invalid_url(reference.to_string(), "reference has no host"))?;
    if auth.ssh_identity().is_some() {
        return Ok(CloneUrl::plain(format!("git@{host}:{namespace}/{name}.git")));
    }
    let raw = format!("https://{host}/{namespace}/{name}.git");
    CloneUrl::with_auth(&raw, auth).map_err(|e| ProviderError::invalid_url(raw, e))
}
