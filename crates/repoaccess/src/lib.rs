//! Authenticated, provider-neutral git repository access.
//!
//! `repoaccess` takes a repository reference and a credential, checks the
//! repository out into an isolated workspace, and lets callers read it:
//! file tree, diff between refs, branches and tags. Workspaces are released
//! (or kept for inspection) explicitly, and anything left behind by a crashed
//! process is swept on startup.
//!
//! # Quick Start
//!
//! ```no_run
//! use repoaccess::{
//!     AccessConfig, CheckoutOptions, Control, Credential, PathFilter, RepoAccess,
//!     RepositoryReference,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let access = RepoAccess::open(AccessConfig::from_env()?).await?;
//! let reference = RepositoryReference::parse("https://github.com/rust-lang/cargo")?;
//! let credential = Credential::token(std::env::var("GITHUB_TOKEN")?);
//!
//! let mut checkout = access
//!     .checkout(&reference, &credential, &CheckoutOptions::new(), &Control::new())
//!     .await?;
//! for entry in checkout.inspector()?.list_file_tree(PathFilter::SourceFiles).iter() {
//!     println!("{}", entry?.path.display());
//! }
//! access.release(&mut checkout).await?;
//! # Ok(())
//! # }
//! ```

pub mod access;
pub mod cache;
pub mod checkout;
pub mod error;

pub use access::RepoAccess;
pub use cache::{CheckoutCache, CheckoutKey};
pub use checkout::{Checkout, CheckoutOptions};
pub use error::{AccessError, AccessErrorKind, Operation, Result};

pub use repoaccess_core::{
    AccessConfig, AccessEnvVar, AuthError, Control, Credential, Interrupt, ProviderKind,
    RepositoryReference, Secret,
};
pub use repoaccess_provider::{
    GitUser, LanguageBreakdown, NormalizedRepository, PaginationInfo, RepositoryPage,
};
pub use repoaccess_vcs::{
    ChangeKind, CloneDepth, CloneError, CloneResult, DiffEntry, DiffResult, EntryKind, FileTree,
    FileTreeEntry, Head, InspectionError, Inspector, LineStats, PathFilter, Refs, ReleaseOutcome,
    ReleasePolicy, WorkspaceError, WorkspaceState,
};
