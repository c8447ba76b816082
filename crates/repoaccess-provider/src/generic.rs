//! Generic git remotes, queried through `git ls-remote`.

use crate::error::{ProviderError, Result};
use repoaccess_core::{
    AuthError, CloneUrl, CommandError, Control, GitCommand, GitFailure, RepositoryReference,
    ResolvedAuth, RetryFailure, RetryPolicy, classify_stderr, retry,
};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Adapter for remotes without a REST API.
#[derive(Debug, Clone)]
pub struct GenericAdapter {
    git: PathBuf,
    retry: RetryPolicy,
}

impl GenericAdapter {
    /// Adapter using the given git executable.
    #[must_use]
    pub fn new(git: impl AsRef<Path>, retry: RetryPolicy) -> Self {
        Self {
            git: git.as_ref().to_path_buf(),
            retry,
        }
    }

    /// Clone URL: the raw URL, with token userinfo for HTTP(S).
    ///
    /// # Errors
    /// Returns error if the reference is not generic or the URL is unusable.
    pub fn clone_url(&self, reference: &RepositoryReference, auth: &ResolvedAuth) -> Result<CloneUrl> {
        let raw = reference
            .raw_url()
            .ok_or_else(|| ProviderError::invalid_url(reference.to_string(), "generic reference without url"))?;
        CloneUrl::with_auth(raw, auth).map_err(|e| ProviderError::invalid_url(reference.to_string(), e))
    }

    /// Branch names advertised by the remote.
    ///
    /// # Errors
    /// Returns error if `git ls-remote` fails.
    pub async fn list_branches(
        &self,
        reference: &RepositoryReference,
        auth: &ResolvedAuth,
        control: &Control,
    ) -> Result<Vec<String>> {
        let url = self.clone_url(reference, auth)?;
        self.branches_at(&url, auth, control).await
    }

    /// Branch names advertised at an already resolved clone URL.
    ///
    /// Also serves hosted repositories reached over SSH, where the REST API
    /// cannot use the credential.
    ///
    /// # Errors
    /// Returns error if `git ls-remote` fails.
    pub async fn branches_at(
        &self,
        url: &CloneUrl,
        auth: &ResolvedAuth,
        control: &Control,
    ) -> Result<Vec<String>> {
        let out = self.ls_remote(url, auth, &["--heads"], control).await?;
        Ok(parse_heads(&out))
    }

    /// Branch the remote's `HEAD` points at.
    ///
    /// # Errors
    /// Returns error if `git ls-remote` fails or `HEAD` is not symbolic.
    pub async fn default_branch(
        &self,
        reference: &RepositoryReference,
        auth: &ResolvedAuth,
        control: &Control,
    ) -> Result<String> {
        let url = self.clone_url(reference, auth)?;
        let branch = self.default_branch_at(&url, auth, control).await?;
        debug!(reference = %reference, branch = %branch, "remote default branch");
        Ok(branch)
    }

    /// Branch `HEAD` points at for an already resolved clone URL.
    ///
    /// # Errors
    /// Returns error if `git ls-remote` fails or `HEAD` is not symbolic.
    pub async fn default_branch_at(
        &self,
        url: &CloneUrl,
        auth: &ResolvedAuth,
        control: &Control,
    ) -> Result<String> {
        let out = self.ls_remote(url, auth, &["--symref"], control).await?;
        parse_symref_head(&out).ok_or_else(|| ProviderError::Git {
            message: format!("{url} has no symbolic HEAD"),
            transient: false,
        })
    }

    async fn ls_remote(
        &self,
        url: &CloneUrl,
        auth: &ResolvedAuth,
        flags: &[&str],
        control: &Control,
    ) -> Result<String> {
        let outcome = retry(&self.retry, control, ProviderError::interrupt, |_| async move {
            let mut cmd = GitCommand::new(&self.git).arg("ls-remote").args(flags);
            if flags.contains(&"--symref") {
                cmd = cmd.secret_arg(url.expose(), url.redacted()).arg("HEAD");
            } else {
                cmd = cmd.secret_arg(url.expose(), url.redacted());
            }
            cmd.with_auth(auth)
                .output(control)
                .await
                .map_err(|e| classify(e, url))
        })
        .await;

        match outcome {
            Ok(done) => Ok(done.value),
            Err(RetryFailure::Permanent { error, .. } | RetryFailure::Exhausted { last: error, .. }) => {
                Err(error)
            }
            Err(RetryFailure::Interrupted { interrupt, .. }) => Err(interrupt.into()),
        }
    }
}

fn classify(err: CommandError, url: &CloneUrl) -> ProviderError {
    let CommandError::Failed { stderr, .. } = err else {
        return err.into();
    };
    let stderr = url.scrub(&stderr);
    match classify_stderr(&stderr) {
        GitFailure::Auth => AuthError::rejected(url.redacted(), stderr).into(),
        GitFailure::RepositoryNotFound => ProviderError::NotFound {
            url: url.redacted().to_string(),
        },
        GitFailure::Transient => ProviderError::Git {
            message: stderr,
            transient: true,
        },
        GitFailure::RefNotFound | GitFailure::Other => ProviderError::Git {
            message: stderr,
            transient: false,
        },
    }
}

fn parse_heads(out: &str) -> Vec<String> {
    out.lines()
        .filter_map(|line| line.split_once('\t'))
        .filter_map(|(_, name)| name.strip_prefix("refs/heads/"))
        .map(str::to_string)
        .collect()
}

fn parse_symref_head(out: &str) -> Option<String> {
    out.lines().find_map(|line| {
        let rest = line.strip_prefix("ref: ")?;
        let (target, name) = rest.split_once('\t')?;
        (name == "HEAD")
            .then(|| target.strip_prefix("refs/heads/"))
            .flatten()
            .map(str::to_string)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_heads() {
        let out = "1111111111111111111111111111111111111111\trefs/heads/main\n\
                   2222222222222222222222222222222222222222\trefs/heads/feature/x\n";
        assert_eq!(parse_heads(out), vec!["main", "feature/x"]);
    }

    #[test]
    fn test_parse_symref_head() {
        let out = "ref: refs/heads/trunk\tHEAD\n1111111111111111111111111111111111111111\tHEAD\n";
        assert_eq!(parse_symref_head(out).as_deref(), Some("trunk"));
        assert_eq!(parse_symref_head("abc\tHEAD\n"), None);
    }

    #[test]
    fn test_clone_url_keeps_local_path() {
        let adapter = GenericAdapter::new("git", RetryPolicy::no_retry());
        let reference = RepositoryReference::generic("/srv/git/r.git").unwrap();
        let url = adapter.clone_url(&reference, &ResolvedAuth::Anonymous).unwrap();
        assert_eq!(url.expose(), "/srv/git/r.git");
    }
}
