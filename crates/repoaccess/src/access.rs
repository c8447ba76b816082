//! The access layer: checkouts, fetches, inspection and provider calls.

use crate::cache::{CheckoutCache, CheckoutKey};
use crate::checkout::{Checkout, CheckoutOptions};
use crate::error::{AccessError, Operation, Result};
use repoaccess_core::{
    AccessConfig, CloneUrl, Control, Credential, RepositoryReference, ResolvedAuth, auth,
};
use repoaccess_provider::{
    GenericAdapter, GitUser, HttpClient, HttpClientConfig, HttpClientStats, LanguageBreakdown,
    NormalizedRepository, ProviderAdapter, RepositoryPage,
};
use repoaccess_vcs::{
    CloneDepth, CloneEngine, CloneRequest, CloneResult, Inspector, ReleaseOutcome, ReleasePolicy,
    WorkspaceManager,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Entry point for repository access.
///
/// Cheap to share behind an `Arc`; every method takes `&self` and separate
/// checkouts never contend with each other.
pub struct RepoAccess {
    config: AccessConfig,
    http: Arc<HttpClient>,
    workspaces: WorkspaceManager,
    engine: CloneEngine,
    cache: Option<CheckoutCache>,
}

impl std::fmt::Debug for RepoAccess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepoAccess")
            .field("workspace_dir", &self.config.workspace_dir)
            .field("git", &self.config.git)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl RepoAccess {
    /// Build the access layer.
    ///
    /// Sweeps workspaces left behind by earlier processes when
    /// `sweep_on_startup` is set; a failed sweep is logged, not returned.
    ///
    /// # Errors
    /// Returns error if the configuration is invalid or the HTTP client
    /// cannot be built.
    pub async fn open(config: AccessConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| AccessError::global(Operation::Configure, e))?;
        let http = HttpClient::with_config(HttpClientConfig::from_access(&config))
            .map_err(|e| AccessError::global(Operation::Configure, e))?;

        let access = Self {
            workspaces: WorkspaceManager::new(&config.workspace_dir),
            engine: CloneEngine::new(&config.git, config.retry_policy()),
            cache: config.cache_enabled.then(|| {
                CheckoutCache::new(
                    config.cache_capacity,
                    Duration::from_secs(config.cache_idle_secs),
                )
            }),
            http: Arc::new(http),
            config,
        };

        if access.config.sweep_on_startup
            && let Err(e) = access.sweep_stale().await
        {
            warn!(error = %e, "startup sweep failed");
        }

        info!(
            workspace_dir = %access.config.workspace_dir.display(),
            cache = access.cache.is_some(),
            "repository access ready"
        );
        Ok(access)
    }

    /// Configuration in use.
    #[must_use]
    pub const fn config(&self) -> &AccessConfig {
        &self.config
    }

    /// Counters of the shared provider HTTP client.
    #[must_use]
    pub fn http_stats(&self) -> &HttpClientStats {
        self.http.stats()
    }

    /// Workspace cache, when enabled.
    #[must_use]
    pub const fn cache(&self) -> Option<&CheckoutCache> {
        self.cache.as_ref()
    }

    /// Clone `reference` into a fresh workspace.
    ///
    /// Without an explicit ref, hosted repositories are checked out at the
    /// provider's default branch and generic remotes at their `HEAD`. Hosted
    /// repositories cloned with an SSH key also take the remote `HEAD`. If the
    /// clone fails the workspace is released with `options.policy`, or always
    /// deleted when the checkout was cancelled or timed out.
    ///
    /// # Errors
    /// Returns `AccessError` naming the step that failed.
    pub async fn checkout(
        &self,
        reference: &RepositoryReference,
        credential: &Credential,
        options: &CheckoutOptions,
        control: &Control,
    ) -> Result<Checkout> {
        let auth = resolve_auth(reference, credential)?;
        self.checkout_with(reference, auth, options, control).await
    }

    /// Like [`checkout`](Self::checkout) but shares one workspace between
    /// identical requests while the cache is enabled.
    ///
    /// Shared workspaces are read-only: they cannot be fetched into or
    /// released, and are deleted once evicted and no longer held. The
    /// credential is validated on every call; cache identity ignores it.
    ///
    /// # Errors
    /// Returns `AccessError` naming the step that failed.
    pub async fn checkout_shared(
        &self,
        reference: &RepositoryReference,
        credential: &Credential,
        options: &CheckoutOptions,
        control: &Control,
    ) -> Result<Arc<Checkout>> {
        let auth = resolve_auth(reference, credential)?;
        let Some(cache) = &self.cache else {
            return self
                .checkout_with(reference, auth, options, control)
                .await
                .map(Arc::new);
        };

        let key = CheckoutKey {
            reference: reference.clone(),
            git_ref: options.git_ref.clone(),
            depth: self.depth_for(options),
        };
        cache
            .get_or_populate(key, self.checkout_with(reference, auth, options, control))
            .await
    }

    async fn checkout_with(
        &self,
        reference: &RepositoryReference,
        auth: ResolvedAuth,
        options: &CheckoutOptions,
        control: &Control,
    ) -> Result<Checkout> {
        let control = control.child(options.timeout);
        let adapter = self.adapter(reference)?;
        let url = adapter
            .resolve_clone_url(reference, &auth)
            .map_err(|e| AccessError::new(reference, Operation::Clone, e))?;

        // Provider APIs cannot use an SSH key; such clones take the remote HEAD.
        let git_ref = match &options.git_ref {
            Some(git_ref) => Some(git_ref.clone()),
            None if reference.provider().is_hosted() && auth.ssh_identity().is_none() => Some(
                adapter
                    .default_branch(reference, &auth, &control)
                    .await
                    .map_err(|e| AccessError::new(reference, Operation::DefaultBranch, e))?,
            ),
            None => None,
        };

        let mut request = CloneRequest::new().with_depth(self.depth_for(options));
        if let Some(git_ref) = git_ref {
            request = request.with_ref(git_ref);
        }

        let mut workspace = self
            .workspaces
            .allocate(reference)
            .await
            .map_err(|e| AccessError::new(reference, Operation::Allocate, e))?;

        match self
            .engine
            .populate(&mut workspace, &url, &auth, &request, &control)
            .await
        {
            Ok(result) => Ok(Checkout {
                workspace,
                result,
                url,
                auth,
                policy: options.policy,
                git: self.config.git.clone(),
            }),
            Err(e) => {
                let err = AccessError::new(reference, Operation::Clone, e);
                let policy = if err.interrupt().is_some() {
                    ReleasePolicy::DeleteAlways
                } else {
                    options.policy
                };
                match workspace.release(policy).await {
                    Ok(outcome) => {
                        debug!(workspace = %workspace.id(), ?outcome, "failed checkout released");
                    }
                    Err(release) => {
                        warn!(workspace = %workspace.id(), error = %release, "failed to release workspace");
                    }
                }
                Err(err)
            }
        }
    }

    /// Fetch a ref into an existing checkout and move its `HEAD` there.
    ///
    /// A failed fetch leaves the previous checkout intact.
    ///
    /// # Errors
    /// Returns `AccessError` if the checkout was released or the fetch fails.
    pub async fn fetch<'c>(
        &self,
        checkout: &'c mut Checkout,
        git_ref: Option<&str>,
        depth: CloneDepth,
        control: &Control,
    ) -> Result<&'c CloneResult> {
        let mut request = CloneRequest::new().with_depth(depth);
        if let Some(git_ref) = git_ref {
            request = request.with_ref(git_ref);
        }
        let result = self
            .engine
            .fetch(
                &mut checkout.workspace,
                &checkout.url,
                &checkout.auth,
                &request,
                control,
            )
            .await
            .map_err(|e| AccessError::new(checkout.workspace.reference(), Operation::Fetch, e))?;
        checkout.result = result;
        Ok(&checkout.result)
    }

    /// Read-only inspector for a checkout.
    ///
    /// # Errors
    /// Returns `AccessError` if the checkout was released.
    pub fn inspect<'a>(&self, checkout: &'a Checkout) -> Result<Inspector<'a>> {
        checkout.inspector()
    }

    /// Release a checkout with the policy it was created with. Idempotent.
    ///
    /// # Errors
    /// Returns `AccessError` if the directory cannot be removed.
    pub async fn release(&self, checkout: &mut Checkout) -> Result<ReleaseOutcome> {
        let policy = checkout.policy;
        self.release_with(checkout, policy).await
    }

    /// Release a checkout with an explicit policy. Idempotent.
    ///
    /// # Errors
    /// Returns `AccessError` if the directory cannot be removed.
    pub async fn release_with(
        &self,
        checkout: &mut Checkout,
        policy: ReleasePolicy,
    ) -> Result<ReleaseOutcome> {
        checkout
            .workspace
            .release(policy)
            .await
            .map_err(|e| AccessError::new(checkout.workspace.reference(), Operation::Release, e))
    }

    /// Remove workspaces older than the configured age.
    ///
    /// # Errors
    /// Returns `AccessError` if the workspace directory cannot be listed.
    pub async fn sweep_stale(&self) -> Result<Vec<PathBuf>> {
        self.workspaces
            .sweep_stale(self.config.stale_workspace_age())
            .await
            .map_err(|e| AccessError::global(Operation::Sweep, e))
    }

    // ========== Provider calls ==========

    /// Branch names of `reference`.
    ///
    /// # Errors
    /// Returns `AccessError` if auth resolution or the provider call fails.
    pub async fn provider_branches(
        &self,
        reference: &RepositoryReference,
        credential: &Credential,
        control: &Control,
    ) -> Result<Vec<String>> {
        const OP: Operation = Operation::Provider("branches");
        let (adapter, auth) = self.provider_for(reference, credential)?;
        let branches = match self.ssh_remote(&adapter, reference, &auth)? {
            Some((git, url)) => git.branches_at(&url, &auth, control).await,
            None => adapter.list_branches(reference, &auth, control).await,
        };
        branches.map_err(|e| AccessError::new(reference, OP, e))
    }

    /// Default branch of `reference`.
    ///
    /// # Errors
    /// Returns `AccessError` if auth resolution or the provider call fails.
    pub async fn provider_default_branch(
        &self,
        reference: &RepositoryReference,
        credential: &Credential,
        control: &Control,
    ) -> Result<String> {
        let (adapter, auth) = self.provider_for(reference, credential)?;
        let branch = match self.ssh_remote(&adapter, reference, &auth)? {
            Some((git, url)) => git.default_branch_at(&url, &auth, control).await,
            None => adapter.default_branch(reference, &auth, control).await,
        };
        branch.map_err(|e| AccessError::new(reference, Operation::DefaultBranch, e))
    }

    /// Normalized metadata of a hosted repository.
    ///
    /// # Errors
    /// Returns `AccessError` if auth resolution or the provider call fails,
    /// or the reference is generic.
    pub async fn provider_repository(
        &self,
        reference: &RepositoryReference,
        credential: &Credential,
        control: &Control,
    ) -> Result<NormalizedRepository> {
        const OP: Operation = Operation::Provider("repository");
        let (adapter, auth) = self.provider_for(reference, credential)?;
        adapter
            .get_repository(reference, &auth, control)
            .await
            .map_err(|e| AccessError::new(reference, OP, e))
    }

    /// Language breakdown of a hosted repository.
    ///
    /// # Errors
    /// Returns `AccessError` if auth resolution or the provider call fails,
    /// or the reference is generic.
    pub async fn provider_languages(
        &self,
        reference: &RepositoryReference,
        credential: &Credential,
        control: &Control,
    ) -> Result<LanguageBreakdown> {
        const OP: Operation = Operation::Provider("languages");
        let (adapter, auth) = self.provider_for(reference, credential)?;
        adapter
            .languages(reference, &auth, control)
            .await
            .map_err(|e| AccessError::new(reference, OP, e))
    }

    /// User owning `credential` on the provider hosting `reference`.
    ///
    /// # Errors
    /// Returns `AccessError` if auth resolution or the provider call fails,
    /// or the reference is generic.
    pub async fn provider_user(
        &self,
        reference: &RepositoryReference,
        credential: &Credential,
        control: &Control,
    ) -> Result<GitUser> {
        const OP: Operation = Operation::Provider("user");
        let (adapter, auth) = self.provider_for(reference, credential)?;
        adapter
            .authenticated_user(&auth, control)
            .await
            .map_err(|e| AccessError::new(reference, OP, e))
    }

    /// One page of the repositories visible to `credential` on the provider
    /// hosting `reference`. Pages start at 1.
    ///
    /// # Errors
    /// Returns `AccessError` if auth resolution or the provider call fails,
    /// or the reference is generic.
    pub async fn provider_user_repositories(
        &self,
        reference: &RepositoryReference,
        credential: &Credential,
        page: u32,
        per_page: u32,
        control: &Control,
    ) -> Result<RepositoryPage> {
        const OP: Operation = Operation::Provider("user repositories");
        let (adapter, auth) = self.provider_for(reference, credential)?;
        adapter
            .list_user_repositories(&auth, page, per_page, control)
            .await
            .map_err(|e| AccessError::new(reference, OP, e))
    }

    fn provider_for(
        &self,
        reference: &RepositoryReference,
        credential: &Credential,
    ) -> Result<(ProviderAdapter, ResolvedAuth)> {
        let auth = resolve_auth(reference, credential)?;
        Ok((self.adapter(reference)?, auth))
    }

    /// Git transport for a hosted repository authenticated with an SSH key.
    fn ssh_remote(
        &self,
        adapter: &ProviderAdapter,
        reference: &RepositoryReference,
        auth: &ResolvedAuth,
    ) -> Result<Option<(GenericAdapter, CloneUrl)>> {
        if !adapter.kind().is_hosted() || auth.ssh_identity().is_none() {
            return Ok(None);
        }
        let url = adapter
            .resolve_clone_url(reference, auth)
            .map_err(|e| AccessError::new(reference, Operation::Configure, e))?;
        debug!(reference = %reference, "using git transport for ssh credential");
        let git = GenericAdapter::new(&self.config.git, self.config.retry_policy());
        Ok(Some((git, url)))
    }

    fn adapter(&self, reference: &RepositoryReference) -> Result<ProviderAdapter> {
        ProviderAdapter::for_reference(reference, &self.config, Arc::clone(&self.http))
            .map_err(|e| AccessError::new(reference, Operation::Configure, e))
    }

    fn depth_for(&self, options: &CheckoutOptions) -> CloneDepth {
        options
            .depth
            .unwrap_or_else(|| CloneDepth::from_option(self.config.default_depth))
    }
}

fn resolve_auth(reference: &RepositoryReference, credential: &Credential) -> Result<ResolvedAuth> {
    auth::resolve(credential, reference)
        .map_err(|e| AccessError::new(reference, Operation::ResolveCredential, e))
}
