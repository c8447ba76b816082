//! Testing utilities for repoaccess.
//!
//! # Modules
//!
//! - [`git_utils`]: throwaway git repositories (working trees and bare remotes)
//! - [`mock_server`]: wiremock-backed GitHub and GitLab API servers
//! - [`fixtures`]: provider JSON payloads
//!
//! # Example
//!
//! ```rust,no_run
//! use repoaccess_test_utils::git_utils::{TempGitRepo, git_available};
//!
//! #[tokio::test]
//! async fn test_checkout() {
//!     if !git_available().await {
//!         return;
//!     }
//!     let repo = TempGitRepo::with_content(&[("README.md", "hi")]).await.unwrap();
//!     let remote = repo.bare_clone().await.unwrap();
//!     // check out `remote.path()` ...
//! }
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod fixtures;
pub mod git_utils;
pub mod mock_server;

use std::path::Path;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Install a test subscriber once per process.
///
/// `RUST_LOG` wins; otherwise `warn`. Output goes through the test writer so
/// it is captured per test.
pub fn init_test_tracing() {
    let filter = EnvFilter::builder()
        .with_default_directive(tracing_subscriber::filter::LevelFilter::WARN.into())
        .from_env_lossy();
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .with_target(false)
        .try_init();
}

/// Wait up to five seconds for `path` to disappear.
///
/// Workspaces dropped inside a runtime are removed on the blocking pool, so
/// the directory outlives the drop briefly.
pub async fn wait_until_removed(path: &Path) -> bool {
    for _ in 0..500 {
        if !path.exists() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

/// Re-export commonly used testing utilities.
pub mod prelude {
    pub use crate::fixtures::Fixtures;
    pub use crate::git_utils::{TempGitRepo, git_available};
    pub use crate::{init_test_tracing, wait_until_removed};
    pub use crate::mock_server::{MockGitHub, MockGitLab};

    pub use pretty_assertions::{assert_eq, assert_ne};
}
