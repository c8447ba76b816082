//! Credentials supplied by callers.
//!
//! Secret material lives in [`Secret`], which redacts itself in `Debug` and
//! `Display`, implements no serialization, and is zeroized on drop.

use std::fmt;
use std::path::{Path, PathBuf};
use zeroize::Zeroize;

/// An opaque secret string.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    /// Wrap a secret value.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Access the secret value. Never log the result.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Whether the secret is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Drop for Secret {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Secret {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Credential for a repository.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Credential {
    /// Personal access / OAuth token.
    Token(Secret),
    /// Path to an SSH private key.
    SshKeyRef(PathBuf),
    /// No credential.
    #[default]
    None,
}

impl Credential {
    /// Token credential.
    #[must_use]
    pub fn token(token: impl Into<Secret>) -> Self {
        Self::Token(token.into())
    }

    /// SSH key credential.
    #[must_use]
    pub fn ssh_key(path: impl AsRef<Path>) -> Self {
        Self::SshKeyRef(path.as_ref().to_path_buf())
    }

    /// Short kind name, safe to log.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Token(_) => "token",
            Self::SshKeyRef(_) => "ssh-key",
            Self::None => "none",
        }
    }

    /// Whether any credential is present.
    #[must_use]
    pub const fn is_some(&self) -> bool {
        !matches!(self, Self::None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_is_redacted() {
        let credential = Credential::token("ghp_supersecretvalue");
        let debug = format!("{credential:?}");
        assert!(!debug.contains("supersecret"));
        assert!(debug.contains("***"));
        assert_eq!(format!("{}", Secret::new("abc")), "***");
    }

    #[test]
    fn test_credential_kind() {
        assert_eq!(Credential::token("x").kind(), "token");
        assert_eq!(Credential::ssh_key("/tmp/id").kind(), "ssh-key");
        assert_eq!(Credential::default().kind(), "none");
        assert!(!Credential::None.is_some());
    }
}
