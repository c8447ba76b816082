//! Provider-independent response models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Repository metadata in a provider-independent shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedRepository {
    /// Provider repository id.
    pub id: String,
    /// Repository name.
    pub name: String,
    /// Description.
    pub description: Option<String>,
    /// Web or clone URL.
    pub html_url: String,
    /// Path below the host (`owner/repo`, `group/sub/project`).
    pub relative_path: String,
    /// Default branch.
    pub default_branch: String,
    /// Number of forks.
    pub forks_count: u64,
    /// Number of stars.
    pub stargazers_count: u64,
    /// Repository size in bytes.
    pub size_bytes: u64,
    /// Creation time reported by the provider.
    pub created_at: Option<DateTime<Utc>>,
    /// Private flag.
    pub private: Option<bool>,
    /// Visibility (`public`, `private`, `internal`).
    pub visibility: Option<String>,
}

/// Authenticated user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitUser {
    /// Login name.
    pub username: Option<String>,
    /// Provider user id.
    pub id: Option<u64>,
    /// Display name.
    pub name: Option<String>,
    /// Public email.
    pub email: Option<String>,
    /// Avatar URL.
    pub avatar_url: Option<String>,
    /// Profile URL.
    pub html_url: Option<String>,
}

/// Pagination state of a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationInfo {
    /// Page returned.
    pub current_page: u32,
    /// Items per page.
    pub per_page: u32,
    /// Total items, when the provider reports or implies it.
    pub total_count: Option<u64>,
    /// Total pages.
    pub total_pages: u32,
    /// Next page, if any.
    pub next_page: Option<u32>,
    /// Previous page, if any.
    pub prev_page: Option<u32>,
}

impl PaginationInfo {
    /// Pagination from a known total item count.
    #[must_use]
    pub fn from_total(total_count: u64, page: u32, per_page: u32) -> Self {
        let per_page = per_page.max(1);
        let total_pages = total_count.div_ceil(u64::from(per_page)) as u32;
        Self::from_pages(Some(total_count), total_pages, page, per_page)
    }

    /// Pagination from a known page count.
    #[must_use]
    pub fn from_pages(total_count: Option<u64>, total_pages: u32, page: u32, per_page: u32) -> Self {
        Self {
            current_page: page,
            per_page,
            total_count,
            total_pages,
            next_page: (page < total_pages).then(|| page + 1),
            prev_page: (page > 1).then(|| page - 1),
        }
    }

    /// Whether a next page exists.
    #[must_use]
    pub const fn has_next_page(&self) -> bool {
        self.next_page.is_some()
    }

    /// Whether a previous page exists.
    #[must_use]
    pub const fn has_prev_page(&self) -> bool {
        self.prev_page.is_some()
    }
}

/// One page of repositories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryPage {
    /// Repositories on this page.
    pub repositories: Vec<NormalizedRepository>,
    /// Pagination state.
    pub pagination: PaginationInfo,
}

/// Language name to share of the code base, in percent.
pub type LanguageBreakdown = BTreeMap<String, f64>;

/// GitHub accepts 1..=100 items per page; anything else falls back to 30.
#[must_use]
pub const fn github_per_page(per_page: u32) -> u32 {
    if per_page >= 1 && per_page <= 100 {
        per_page
    } else {
        30
    }
}

/// GitLab per-page values are clamped to 1..=100.
#[must_use]
pub fn gitlab_per_page(per_page: u32) -> u32 {
    per_page.clamp(1, 100)
}

/// Pages start at 1.
#[must_use]
pub fn valid_page(page: u32) -> u32 {
    page.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_pagination_from_total() {
        let info = PaginationInfo::from_total(45, 2, 20);
        assert_eq!(info.total_pages, 3);
        assert_eq!(info.next_page, Some(3));
        assert_eq!(info.prev_page, Some(1));
        assert!(info.has_next_page());
        assert!(info.has_prev_page());

        let last = PaginationInfo::from_total(45, 3, 20);
        assert!(!last.has_next_page());

        let empty = PaginationInfo::from_total(0, 1, 20);
        assert_eq!(empty.total_pages, 0);
        assert!(!empty.has_next_page());
        assert!(!empty.has_prev_page());
    }

    #[test]
    fn test_per_page_rules() {
        assert_eq!(github_per_page(50), 50);
        assert_eq!(github_per_page(0), 30);
        assert_eq!(github_per_page(101), 30);
        assert_eq!(gitlab_per_page(0), 1);
        assert_eq!(gitlab_per_page(500), 100);
        assert_eq!(valid_page(0), 1);
    }
}
