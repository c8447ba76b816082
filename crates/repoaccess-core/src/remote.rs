//! Git remote string parsing.
//!
//! Accepts URL forms (`https://`, `ssh://`, `git://`, `git+ssh://`), scp-like
//! SSH remotes (`[user@]host:namespace/repo.git`) and bare `namespace/repo`
//! paths. Nested namespaces (GitLab groups) are preserved.

use crate::error::ReferenceError;
use crate::reference::ProviderKind;
use url::Url;

/// A parsed git remote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRemote {
    /// The remote exactly as supplied.
    pub original: String,
    /// Lowercased host without userinfo or port; empty for bare paths.
    pub host: String,
    /// Provider detected from the host, `None` when unknown.
    pub provider: Option<ProviderKind>,
    /// Namespace segments (`["owner"]` or `["group", "subgroup"]`).
    pub namespace: Vec<String>,
    /// Repository name without `.git`.
    pub repo: String,
}

impl ParsedRemote {
    /// `namespace/repo` joined with `/`.
    #[must_use]
    pub fn full_name(&self) -> String {
        let mut full = self.namespace.join("/");
        full.push('/');
        full.push_str(&self.repo);
        full
    }

    /// Namespace joined with `/`.
    #[must_use]
    pub fn namespace_path(&self) -> String {
        self.namespace.join("/")
    }
}

/// Detect the provider from a host name.
///
/// `gitlab` is checked first so hosts like `gitlab.github-mirror.example`
/// resolve to GitLab. Any host containing `github` counts as GitHub
/// (covers GitHub Enterprise installs).
#[must_use]
pub fn provider_from_host(host: &str) -> Option<ProviderKind> {
    let host = host.to_ascii_lowercase();
    if host.contains("gitlab") {
        Some(ProviderKind::GitLab)
    } else if host.contains("github") {
        Some(ProviderKind::GitHub)
    } else {
        None
    }
}

fn split_path(path: &str) -> Vec<String> {
    let mut parts: Vec<String> = path
        .trim_matches('/')
        .split('/')
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect();
    if let Some(last) = parts.last_mut()
        && let Some(stripped) = last.strip_suffix(".git")
    {
        *last = stripped.to_string();
    }
    parts.retain(|p| !p.is_empty());
    parts
}

fn split_scp(remote: &str) -> Option<(&str, &str)> {
    let (head, path) = remote.split_once(':')?;
    let host = head.rsplit_once('@').map_or(head, |(_, host)| host);
    if host.is_empty() || path.is_empty() || host.contains('/') {
        return None;
    }
    Some((host, path))
}

/// Parse a git remote string.
///
/// # Errors
/// Returns `ReferenceError::UnrecognizedRemote` for blank or unparsable input and
/// `ReferenceError::MissingPath` when fewer than two path segments remain.
pub fn parse_git_remote(remote: &str) -> Result<ParsedRemote, ReferenceError> {
    let trimmed = remote.trim();
    if trimmed.is_empty() {
        return Err(ReferenceError::UnrecognizedRemote {
            remote: remote.to_string(),
        });
    }

    let (host, parts) = if trimmed.contains("://") {
        let url = Url::parse(trimmed).map_err(|_| ReferenceError::UnrecognizedRemote {
            remote: remote.to_string(),
        })?;
        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| ReferenceError::UnrecognizedRemote {
                remote: remote.to_string(),
            })?
            .to_ascii_lowercase();
        (host, split_path(url.path()))
    } else if let Some((host, path)) = split_scp(trimmed) {
        (host.to_ascii_lowercase(), split_path(path))
    } else if trimmed.contains('/') {
        (String::new(), split_path(trimmed))
    } else {
        return Err(ReferenceError::UnrecognizedRemote {
            remote: remote.to_string(),
        });
    };

    if parts.len() < 2 {
        return Err(ReferenceError::MissingPath {
            remote: remote.to_string(),
        });
    }

    let mut namespace = parts;
    let repo = namespace.pop().unwrap_or_default();

    Ok(ParsedRemote {
        original: remote.to_string(),
        provider: provider_from_host(&host),
        host,
        namespace,
        repo,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test_case("https://github.com/torvalds/linux.git", "github.com", Some(ProviderKind::GitHub), "torvalds/linux" ; "github https with suffix")]
    #[test_case("https://github.com/torvalds/linux", "github.com", Some(ProviderKind::GitHub), "torvalds/linux" ; "github https")]
    #[test_case("git@github.com:owner/repo.git", "github.com", Some(ProviderKind::GitHub), "owner/repo" ; "github scp")]
    #[test_case("ssh://git@github.example.com:2222/org/tool.git", "github.example.com", Some(ProviderKind::GitHub), "org/tool" ; "enterprise ssh with port")]
    #[test_case("https://gitlab.com/group/sub/project.git", "gitlab.com", Some(ProviderKind::GitLab), "group/sub/project" ; "gitlab nested")]
    #[test_case("git@gitlab.github-mirror.io:a/b.git", "gitlab.github-mirror.io", Some(ProviderKind::GitLab), "a/b" ; "gitlab checked first")]
    #[test_case("git+ssh://git@bitbucket.org/team/app", "bitbucket.org", None, "team/app" ; "unknown host")]
    #[test_case("torvalds/linux", "", None, "torvalds/linux" ; "bare path")]
    #[test_case("/torvalds/linux", "", None, "torvalds/linux" ; "leading slash path")]
    fn test_parse_remote(remote: &str, host: &str, provider: Option<ProviderKind>, full: &str) {
        let parsed = parse_git_remote(remote).unwrap();
        assert_eq!(parsed.original, remote);
        assert_eq!(parsed.host, host);
        assert_eq!(parsed.provider, provider);
        assert_eq!(parsed.full_name(), full);
    }

    #[test]
    fn test_nested_namespace_segments() {
        let parsed = parse_git_remote("https://gitlab.com/group/sub/project.git").unwrap();
        assert_eq!(parsed.namespace, vec!["group", "sub"]);
        assert_eq!(parsed.repo, "project");
        assert_eq!(parsed.namespace_path(), "group/sub");
    }

    #[test_case("https://github.com/owner" ; "missing repo")]
    #[test_case("git@github.com:repo-only" ; "missing namespace")]
    #[test_case("ssh://" ; "empty host")]
    #[test_case("notaurl" ; "not a url")]
    #[test_case("https://gitlab.com/" ; "missing path")]
    #[test_case("" ; "blank")]
    #[test_case("   " ; "whitespace")]
    fn test_parse_remote_errors(remote: &str) {
        assert!(parse_git_remote(remote).is_err());
    }
}
