//! Core types for the repoaccess git repository access layer.
//!
//! - [`RepositoryReference`] and remote parsing
//! - [`Credential`] and the auth resolver ([`auth::resolve`])
//! - [`RetryPolicy`] with explicit [`Attempt`] state
//! - [`Control`] for cancellation and deadlines
//! - [`GitCommand`] for running the git toolchain
//! - [`AccessConfig`] with environment overrides

pub mod auth;
pub mod clone_url;
pub mod command;
pub mod config;
pub mod control;
pub mod credential;
pub mod error;
pub mod reference;
pub mod remote;
pub mod retry;

pub use auth::{ResolvedAuth, TokenScheme};
pub use clone_url::CloneUrl;
pub use command::{GitCommand, GitFailure, classify_stderr};
pub use config::{AccessConfig, AccessEnvVar};
pub use control::Control;
pub use credential::{Credential, Secret};
pub use error::{AuthError, CommandError, ConfigError, Interrupt, ReferenceError};
pub use reference::{ProviderKind, RepositoryReference};
pub use remote::{ParsedRemote, parse_git_remote};
pub use retry::{Attempt, Retried, RetryFailure, RetryPolicy, Transient, retry};
