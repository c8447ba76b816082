//! Credential resolution.
//!
//! [`resolve`] turns a caller credential into the auth material a specific
//! reference needs. Everything here runs locally: a malformed or mismatched
//! credential fails before any network call is made.

use crate::credential::{Credential, Secret};
use crate::error::AuthError;
use crate::reference::{ProviderKind, RepositoryReference};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Longest token accepted.
pub const MAX_TOKEN_LEN: usize = 4096;

/// How a token is presented to a provider API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenScheme {
    /// `Authorization: Bearer <token>` (GitHub).
    Bearer,
    /// `PRIVATE-TOKEN: <token>` (GitLab).
    PrivateToken,
    /// Userinfo in the clone URL only (generic HTTP remotes).
    UrlUserinfo,
}

/// Auth material ready for a provider call or a git transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedAuth {
    /// No authentication.
    Anonymous,
    /// Token auth.
    Token {
        /// The token.
        secret: Secret,
        /// Presentation scheme for API calls.
        scheme: TokenScheme,
        /// Username paired with the token in clone URLs.
        username: &'static str,
    },
    /// SSH transport with an identity file.
    SshKey {
        /// Private key path.
        identity: PathBuf,
    },
}

impl ResolvedAuth {
    /// HTTP header name and value for API calls, if any.
    ///
    /// The value contains the secret; mark it sensitive before sending.
    #[must_use]
    pub fn api_header(&self) -> Option<(&'static str, String)> {
        match self {
            Self::Token {
                secret,
                scheme: TokenScheme::Bearer,
                ..
            } => Some(("authorization", format!("Bearer {}", secret.expose()))),
            Self::Token {
                secret,
                scheme: TokenScheme::PrivateToken,
                ..
            } => Some(("private-token", secret.expose().to_string())),
            _ => None,
        }
    }

    /// Username and secret to embed in an HTTPS clone URL.
    #[must_use]
    pub fn userinfo(&self) -> Option<(&'static str, &Secret)> {
        match self {
            Self::Token {
                secret, username, ..
            } => Some((username, secret)),
            _ => None,
        }
    }

    /// SSH identity file, if SSH transport is used.
    #[must_use]
    pub fn ssh_identity(&self) -> Option<&Path> {
        match self {
            Self::SshKey { identity } => Some(identity),
            _ => None,
        }
    }

    /// Short kind name, safe to log.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Anonymous => "anonymous",
            Self::Token { .. } => "token",
            Self::SshKey { .. } => "ssh-key",
        }
    }
}

/// Check a token's shape without contacting anyone.
///
/// # Errors
/// Returns `AuthError::MalformedCredential` describing the first problem found.
pub fn validate_token(token: &Secret) -> Result<(), AuthError> {
    let value = token.expose();
    if value.trim().is_empty() {
        return Err(AuthError::malformed("token is empty"));
    }
    if value.len() > MAX_TOKEN_LEN {
        return Err(AuthError::malformed(format!(
            "token exceeds {MAX_TOKEN_LEN} bytes"
        )));
    }
    if !value.is_ascii() {
        return Err(AuthError::malformed("token contains non-ASCII characters"));
    }
    if value.chars().any(|c| c.is_ascii_whitespace() || c.is_ascii_control()) {
        return Err(AuthError::malformed(
            "token contains whitespace or control characters",
        ));
    }
    Ok(())
}

fn validate_ssh_key(path: &Path) -> Result<(), AuthError> {
    if path.as_os_str().is_empty() {
        return Err(AuthError::malformed("ssh key path is empty"));
    }
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_file() => Ok(()),
        Ok(_) => Err(AuthError::malformed(format!(
            "ssh key {} is not a regular file",
            path.display()
        ))),
        Err(e) => Err(AuthError::malformed(format!(
            "ssh key {} is not readable: {e}",
            path.display()
        ))),
    }
}

/// Resolve a credential for a reference.
///
/// - Hosted references require a credential.
/// - Generic references without a credential resolve to [`ResolvedAuth::Anonymous`].
/// - Tokens need an HTTP(S) transport; SSH keys need an SSH transport or a
///   hosted provider (which is then cloned over SSH).
///
/// # Errors
/// Returns `AuthError` if the credential is missing, malformed, or cannot be
/// used with this reference.
pub fn resolve(
    credential: &Credential,
    reference: &RepositoryReference,
) -> Result<ResolvedAuth, AuthError> {
    let provider = reference.provider();
    let resolved = match (credential, provider) {
        (Credential::None, ProviderKind::Generic) => ResolvedAuth::Anonymous,
        (Credential::None, _) => return Err(AuthError::MissingCredential { provider }),
        (Credential::Token(secret), ProviderKind::GitHub | ProviderKind::GitLab) => {
            validate_token(secret)?;
            let (scheme, username) = if provider == ProviderKind::GitHub {
                (TokenScheme::Bearer, "x-access-token")
            } else {
                (TokenScheme::PrivateToken, "oauth2")
            };
            ResolvedAuth::Token {
                secret: secret.clone(),
                scheme,
                username,
            }
        }
        (Credential::Token(secret), ProviderKind::Generic) => {
            validate_token(secret)?;
            if reference.is_local() || reference.is_ssh() {
                return Err(AuthError::UnsupportedProviderForCredentialKind {
                    kind: credential.kind(),
                    target: reference.to_string(),
                });
            }
            ResolvedAuth::Token {
                secret: secret.clone(),
                scheme: TokenScheme::UrlUserinfo,
                username: "oauth2",
            }
        }
        (Credential::SshKeyRef(path), _) => {
            if provider == ProviderKind::Generic && !reference.is_ssh() {
                return Err(AuthError::UnsupportedProviderForCredentialKind {
                    kind: credential.kind(),
                    target: reference.to_string(),
                });
            }
            validate_ssh_key(path)?;
            ResolvedAuth::SshKey {
                identity: path.clone(),
            }
        }
    };

    debug!(reference = %reference, auth = resolved.kind(), "credential resolved");
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    fn github() -> RepositoryReference {
        RepositoryReference::hosted(ProviderKind::GitHub, "octo", "hello").unwrap()
    }

    fn gitlab() -> RepositoryReference {
        RepositoryReference::hosted(ProviderKind::GitLab, "group/sub", "proj").unwrap()
    }

    #[test_case("" ; "empty")]
    #[test_case("   " ; "blank")]
    #[test_case("abc def" ; "inner space")]
    #[test_case("abc\n" ; "newline")]
    #[test_case("tökén" ; "non ascii")]
    fn test_malformed_tokens(token: &str) {
        let err = resolve(&Credential::token(token), &github()).unwrap_err();
        assert_matches!(err, AuthError::MalformedCredential { .. });
        assert!(err.is_local());
    }

    #[test]
    fn test_oversized_token() {
        let token = "a".repeat(MAX_TOKEN_LEN + 1);
        assert_matches!(
            resolve(&Credential::token(token), &github()),
            Err(AuthError::MalformedCredential { .. })
        );
    }

    #[test]
    fn test_hosted_requires_credential() {
        assert_eq!(
            resolve(&Credential::None, &gitlab()),
            Err(AuthError::MissingCredential {
                provider: ProviderKind::GitLab
            })
        );
    }

    #[test]
    fn test_github_bearer_header() {
        let auth = resolve(&Credential::token("ghp_abc123"), &github()).unwrap();
        assert_eq!(
            auth.api_header(),
            Some(("authorization", "Bearer ghp_abc123".to_string()))
        );
        assert_eq!(auth.userinfo().map(|(u, _)| u), Some("x-access-token"));
    }

    #[test]
    fn test_gitlab_private_token_header() {
        let auth = resolve(&Credential::token("glpat-xyz"), &gitlab()).unwrap();
        assert_eq!(
            auth.api_header(),
            Some(("private-token", "glpat-xyz".to_string()))
        );
        assert_eq!(auth.userinfo().map(|(u, _)| u), Some("oauth2"));
    }

    #[test]
    fn test_generic_without_credential_is_anonymous() {
        let reference = RepositoryReference::generic("/srv/git/repo.git").unwrap();
        assert_eq!(
            resolve(&Credential::None, &reference).unwrap(),
            ResolvedAuth::Anonymous
        );
    }

    #[test]
    fn test_generic_token_over_https() {
        let reference = RepositoryReference::generic("https://git.example.org/a/b.git").unwrap();
        let auth = resolve(&Credential::token("tok"), &reference).unwrap();
        assert!(auth.api_header().is_none());
        assert_eq!(auth.userinfo().map(|(u, _)| u), Some("oauth2"));
    }

    #[test]
    fn test_token_on_local_path_is_unsupported() {
        let reference = RepositoryReference::generic("/srv/git/repo.git").unwrap();
        assert_matches!(
            resolve(&Credential::token("tok"), &reference),
            Err(AuthError::UnsupportedProviderForCredentialKind { kind: "token", .. })
        );
    }

    #[test]
    fn test_ssh_key_on_https_generic_is_unsupported() {
        let key = tempfile::NamedTempFile::new().unwrap();
        let reference = RepositoryReference::generic("https://git.example.org/a/b.git").unwrap();
        assert_matches!(
            resolve(&Credential::ssh_key(key.path()), &reference),
            Err(AuthError::UnsupportedProviderForCredentialKind { kind: "ssh-key", .. })
        );
    }

    #[test]
    fn test_ssh_key_must_exist() {
        let reference = RepositoryReference::generic("git@git.example.org:a/b.git").unwrap();
        assert_matches!(
            resolve(&Credential::ssh_key("/definitely/missing/id_ed25519"), &reference),
            Err(AuthError::MalformedCredential { .. })
        );
    }

    #[test]
    fn test_ssh_key_for_hosted() {
        let key = tempfile::NamedTempFile::new().unwrap();
        let auth = resolve(&Credential::ssh_key(key.path()), &github()).unwrap();
        assert_eq!(auth.ssh_identity(), Some(key.path()));
        assert!(auth.api_header().is_none());
    }
}
