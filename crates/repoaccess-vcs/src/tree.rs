//! Working tree enumeration.

use crate::error::InspectionError;
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use serde::Serialize;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// Git's control directory, never listed.
pub const CONTROL_DIR: &str = ".git";

/// File extensions matched by [`PathFilter::SourceFiles`].
pub const SOURCE_EXTENSIONS: &[&str] = &[
    "py", "js", "ts", "java", "go", "rs", "cpp", "c", "hpp", "h", "rb", "php", "cs", "jsx", "tsx",
    "vue", "swift", "kt", "scala", "md", "txt", "json", "yaml", "yml", "xml",
];

/// Kind of a tree entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    /// Regular file.
    File,
    /// Directory.
    Directory,
    /// Symbolic link (not followed).
    Symlink,
}

/// One entry of the working tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileTreeEntry {
    /// Path relative to the workspace root.
    pub path: PathBuf,
    /// Entry kind.
    pub kind: EntryKind,
    /// Size in bytes, for files.
    pub size: Option<u64>,
}

/// Which entries to yield.
#[derive(Debug, Clone, Default)]
pub enum PathFilter {
    /// Everything.
    #[default]
    All,
    /// Paths matching any of the glob patterns (`*` stops at `/`, `**` does not).
    Glob {
        /// Original patterns.
        patterns: Vec<String>,
        /// Compiled set.
        set: GlobSet,
    },
    /// Paths at or below a relative prefix.
    Prefix(PathBuf),
    /// Files and symlinks with a supported source extension.
    SourceFiles,
}

impl PathFilter {
    /// Glob filter from patterns.
    ///
    /// # Errors
    /// Returns `InspectionError::InvalidFilter` for a malformed pattern.
    pub fn glob<I, S>(patterns: I) -> Result<Self, InspectionError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut builder = GlobSetBuilder::new();
        let mut kept = Vec::new();
        for pattern in patterns {
            let pattern = pattern.as_ref();
            let glob = GlobBuilder::new(pattern)
                .literal_separator(true)
                .build()
                .map_err(|e| InspectionError::InvalidFilter {
                    pattern: pattern.to_string(),
                    message: e.to_string(),
                })?;
            builder.add(glob);
            kept.push(pattern.to_string());
        }
        let set = builder.build().map_err(|e| InspectionError::InvalidFilter {
            pattern: kept.join(","),
            message: e.to_string(),
        })?;
        Ok(Self::Glob {
            patterns: kept,
            set,
        })
    }

    /// Prefix filter. The prefix must be relative and stay inside the tree.
    ///
    /// # Errors
    /// Returns `InspectionError::InvalidFilter` for absolute or escaping prefixes.
    pub fn prefix(prefix: impl AsRef<Path>) -> Result<Self, InspectionError> {
        let prefix = prefix.as_ref();
        let escapes = prefix
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(InspectionError::InvalidFilter {
                pattern: prefix.display().to_string(),
                message: "prefix must be a relative path inside the repository".into(),
            });
        }
        Ok(Self::Prefix(
            prefix
                .components()
                .filter(|c| matches!(c, Component::Normal(_)))
                .collect(),
        ))
    }

    /// Whether an entry passes the filter.
    #[must_use]
    pub fn matches(&self, path: &Path, kind: EntryKind) -> bool {
        match self {
            Self::All => true,
            Self::Glob { set, .. } => set.is_match(path),
            Self::Prefix(prefix) => path.starts_with(prefix),
            Self::SourceFiles => kind != EntryKind::Directory && is_source_file(path),
        }
    }
}

/// Whether the path has one of [`SOURCE_EXTENSIONS`].
#[must_use]
pub fn is_source_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| SOURCE_EXTENSIONS.contains(&ext))
}

/// Lazy view of a working tree.
///
/// Every call to [`FileTree::iter`] starts a fresh walk, so a tree can be
/// traversed any number of times. Entries come in file-name order, parents
/// before children.
#[derive(Debug, Clone)]
pub struct FileTree {
    root: PathBuf,
    filter: PathFilter,
}

impl FileTree {
    pub(crate) fn new(root: impl Into<PathBuf>, filter: PathFilter) -> Self {
        Self {
            root: root.into(),
            filter,
        }
    }

    /// Root of the walk.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Start a walk.
    #[must_use]
    pub fn iter(&self) -> FileTreeIter<'_> {
        let walker = WalkDir::new(&self.root)
            .min_depth(1)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter();
        FileTreeIter {
            tree: self,
            walker,
        }
    }

    /// Walk to completion.
    ///
    /// # Errors
    /// Returns the first read failure.
    pub fn entries(&self) -> Result<Vec<FileTreeEntry>, InspectionError> {
        self.iter().collect()
    }
}

impl<'a> IntoIterator for &'a FileTree {
    type Item = Result<FileTreeEntry, InspectionError>;
    type IntoIter = FileTreeIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// One walk over a [`FileTree`].
pub struct FileTreeIter<'a> {
    tree: &'a FileTree,
    walker: walkdir::IntoIter,
}

impl std::fmt::Debug for FileTreeIter<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileTreeIter")
            .field("root", &self.tree.root)
            .finish()
    }
}

impl Iterator for FileTreeIter<'_> {
    type Item = Result<FileTreeEntry, InspectionError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.walker.next()? {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e
                        .path()
                        .map_or_else(|| self.tree.root.display().to_string(), |p| p.display().to_string());
                    return Some(Err(InspectionError::read_failed(path, e)));
                }
            };

            let relative = match entry.path().strip_prefix(&self.tree.root) {
                Ok(relative) => relative.to_path_buf(),
                Err(e) => {
                    return Some(Err(InspectionError::read_failed(
                        entry.path().display().to_string(),
                        e,
                    )));
                }
            };

            let file_type = entry.file_type();
            if entry.depth() == 1 && entry.file_name() == CONTROL_DIR {
                if file_type.is_dir() {
                    self.walker.skip_current_dir();
                }
                continue;
            }

            let kind = if file_type.is_symlink() {
                EntryKind::Symlink
            } else if file_type.is_dir() {
                EntryKind::Directory
            } else {
                EntryKind::File
            };

            if !self.tree.filter.matches(&relative, kind) {
                continue;
            }

            let size = match kind {
                EntryKind::File => match entry.metadata() {
                    Ok(meta) => Some(meta.len()),
                    Err(e) => {
                        return Some(Err(InspectionError::read_failed(
                            relative.display().to_string(),
                            e,
                        )));
                    }
                },
                _ => None,
            };

            return Some(Ok(FileTreeEntry {
                path: relative,
                kind,
                size,
            }));
        }
    }
}
