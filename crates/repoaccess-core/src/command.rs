//! Invocation of the `git` toolchain.

use crate::auth::ResolvedAuth;
use crate::control::Control;
use crate::error::CommandError;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::trace;

/// Default git executable.
pub const DEFAULT_GIT: &str = "git";

/// A git invocation whose command line is safe to log.
///
/// Arguments added with [`GitCommand::secret_arg`] are passed to git as-is
/// but appear only in their redacted form in logs and errors.
#[derive(Debug, Clone)]
pub struct GitCommand {
    program: PathBuf,
    args: Vec<OsString>,
    shown: Vec<String>,
    cwd: Option<PathBuf>,
    envs: Vec<(&'static str, OsString)>,
}

impl GitCommand {
    /// Start a command for the given git executable.
    #[must_use]
    pub fn new(program: impl AsRef<Path>) -> Self {
        Self {
            program: program.as_ref().to_path_buf(),
            args: Vec::new(),
            shown: Vec::new(),
            cwd: None,
            envs: Vec::new(),
        }
    }

    /// Append an argument.
    #[must_use]
    pub fn arg(mut self, arg: impl AsRef<std::ffi::OsStr>) -> Self {
        let arg = arg.as_ref();
        self.shown.push(arg.to_string_lossy().into_owned());
        self.args.push(arg.to_os_string());
        self
    }

    /// Append several arguments.
    #[must_use]
    pub fn args<I, S>(self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<std::ffi::OsStr>,
    {
        args.into_iter().fold(self, Self::arg)
    }

    /// Append an argument carrying secret material, logged as `shown`.
    #[must_use]
    pub fn secret_arg(mut self, arg: &str, shown: impl Into<String>) -> Self {
        self.shown.push(shown.into());
        self.args.push(arg.into());
        self
    }

    /// Set the working directory.
    #[must_use]
    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Set an environment variable.
    #[must_use]
    pub fn env(mut self, key: &'static str, value: impl Into<OsString>) -> Self {
        self.envs.push((key, value.into()));
        self
    }

    /// Route SSH transport through the resolved identity file, if any.
    #[must_use]
    pub fn with_auth(self, auth: &ResolvedAuth) -> Self {
        match auth.ssh_identity() {
            Some(identity) => self.env(
                "GIT_SSH_COMMAND",
                format!(
                    "ssh -i {} -o IdentitiesOnly=yes -o BatchMode=yes",
                    shell_quote(&identity.to_string_lossy())
                ),
            ),
            None => self,
        }
    }

    /// Loggable command line.
    #[must_use]
    pub fn display(&self) -> String {
        let mut line = self.program.display().to_string();
        for arg in &self.shown {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }

    /// Run to completion, returning stdout.
    ///
    /// The child is killed if `control` is cancelled or its deadline passes.
    ///
    /// # Errors
    /// Returns `CommandError` on spawn failure, non-zero exit, or interruption.
    pub async fn output(&self, control: &Control) -> Result<String, CommandError> {
        let bytes = self.output_bytes(control).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Run to completion, returning raw stdout.
    ///
    /// # Errors
    /// Returns `CommandError` on spawn failure, non-zero exit, or interruption.
    pub async fn output_bytes(&self, control: &Control) -> Result<Vec<u8>, CommandError> {
        if let Some(cwd) = &self.cwd
            && !cwd.is_dir()
        {
            return Err(CommandError::MissingDirectory { path: cwd.clone() });
        }

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .env("GCM_INTERACTIVE", "never")
            .env("LC_ALL", "C")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for (key, value) in &self.envs {
            cmd.env(key, value);
        }
        if let Some(cwd) = &self.cwd {
            cmd.current_dir(cwd);
        }

        let rendered = self.display();
        trace!(command = %rendered, "running git");

        let output = control
            .guard(async {
                cmd.output().await.map_err(|e| CommandError::Spawn {
                    command: rendered.clone(),
                    message: e.to_string(),
                })
            })
            .await?;

        if output.status.success() {
            Ok(output.stdout)
        } else {
            Err(CommandError::Failed {
                command: rendered,
                exit_code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}

fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// What a failed git transfer's stderr says went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GitFailure {
    /// Repository does not exist or is not visible.
    RepositoryNotFound,
    /// Requested branch, tag or commit is missing on the remote.
    RefNotFound,
    /// Credentials missing or rejected.
    Auth,
    /// Network or server trouble worth retrying.
    Transient,
    /// Anything else.
    Other,
}

const REF_NOT_FOUND: &[&str] = &[
    "remote branch",
    "couldn't find remote ref",
    "not our ref",
    "unadvertised object",
    "did not match any file(s) known to git",
    "unknown revision",
    "invalid reference",
];

const AUTH: &[&str] = &[
    "authentication failed",
    "could not read username",
    "could not read password",
    "invalid username or password",
    "permission denied (publickey",
    "permission denied, please try again",
    "host key verification failed",
    "access denied",
    "http basic: access denied",
    "requested url returned error: 401",
    "requested url returned error: 403",
    "terminal prompts disabled",
];

const NOT_FOUND: &[&str] = &[
    "repository not found",
    "does not appear to be a git repository",
    "project you were looking for could not be found",
    "requested url returned error: 404",
];

const TRANSIENT: &[&str] = &[
    "could not resolve host",
    "connection timed out",
    "operation timed out",
    "connection reset",
    "connection refused",
    "network is unreachable",
    "early eof",
    "the remote end hung up unexpectedly",
    "rpc failed",
    "requested url returned error: 429",
    "requested url returned error: 500",
    "requested url returned error: 502",
    "requested url returned error: 503",
    "requested url returned error: 504",
    "temporary failure",
    "gnutls",
    "tls connection",
    "unexpected disconnect",
];

/// Classify git's stderr. Requires `LC_ALL=C` output, which
/// [`GitCommand`] always sets.
#[must_use]
pub fn classify_stderr(stderr: &str) -> GitFailure {
    let lower = stderr.to_ascii_lowercase();
    let has = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));
    if has(REF_NOT_FOUND) {
        GitFailure::RefNotFound
    } else if has(AUTH) {
        GitFailure::Auth
    } else if has(NOT_FOUND) || is_missing_local_repository(&lower) {
        GitFailure::RepositoryNotFound
    } else if has(TRANSIENT) {
        GitFailure::Transient
    } else {
        GitFailure::Other
    }
}

// `fatal: repository '<path>' does not exist`, not any path git could not find.
fn is_missing_local_repository(lower: &str) -> bool {
    lower.lines().any(|line| {
        line.strip_prefix("fatal: repository '")
            .is_some_and(|rest| rest.ends_with("' does not exist"))
    })
}
