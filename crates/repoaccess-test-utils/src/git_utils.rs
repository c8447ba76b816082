//! Git repository utilities for testing checkouts.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tempfile::{TempDir, tempdir};
use tokio::process::Command;
use url::Url;

/// A temporary git repository, deleted on drop.
#[derive(Debug)]
pub struct TempGitRepo {
    _dir: TempDir,
    path: PathBuf,
}

impl TempGitRepo {
    /// Create an empty repository whose initial branch is `main`.
    pub async fn new() -> Result<Self> {
        let dir = tempdir().context("Failed to create temp directory")?;
        let path = dir.path().to_path_buf();
        let repo = Self { _dir: dir, path };

        repo.git(&["init", "--quiet"]).await?;
        repo.git(&["symbolic-ref", "HEAD", "refs/heads/main"]).await?;
        repo.git(&["config", "user.email", "test@example.com"]).await?;
        repo.git(&["config", "user.name", "Test User"]).await?;
        repo.git(&["config", "commit.gpgsign", "false"]).await?;
        repo.git(&["config", "tag.gpgsign", "false"]).await?;

        Ok(repo)
    }

    /// Create a repository with one commit holding `files`.
    pub async fn with_content(files: &[(&str, &str)]) -> Result<Self> {
        let repo = Self::new().await?;
        for (path, content) in files {
            repo.write_file(path, content).await?;
        }
        repo.commit_all("Initial commit").await?;
        Ok(repo)
    }

    /// Create a repository with `count` commits, each tagged `v{n}`.
    ///
    /// Returns the repository and the commit ids, oldest first.
    pub async fn with_history(count: usize) -> Result<(Self, Vec<String>)> {
        let repo = Self::new().await?;
        let mut commits = Vec::with_capacity(count);
        for n in 1..=count {
            repo.write_file("CHANGELOG.md", &format!("release {n}\n"))
                .await?;
            repo.write_file(&format!("src/v{n}.rs"), &format!("pub const V: u32 = {n};\n"))
                .await?;
            commits.push(repo.commit_all(&format!("release {n}")).await?);
            repo.create_tag(&format!("v{n}")).await?;
        }
        Ok((repo, commits))
    }

    /// Repository path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `file://` URL of this repository.
    pub fn file_url(&self) -> Result<Url> {
        Url::from_directory_path(&self.path)
            .map_err(|()| anyhow::anyhow!("not an absolute path: {}", self.path.display()))
    }

    /// Run git in the repository and return trimmed stdout.
    pub async fn git(&self, args: &[&str]) -> Result<String> {
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.path)
            .env("GIT_TERMINAL_PROMPT", "0")
            .output()
            .await
            .with_context(|| format!("Failed to run git {}", args.join(" ")))?;

        if !output.status.success() {
            anyhow::bail!(
                "git {} failed: {}",
                args.join(" "),
                String::from_utf8_lossy(&output.stderr)
            );
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Write a file, creating parent directories.
    pub async fn write_file(&self, relative_path: &str, content: &str) -> Result<()> {
        let file_path = self.path.join(relative_path);
        if let Some(parent) = file_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&file_path, content).await?;
        Ok(())
    }

    /// Delete a file.
    pub async fn remove_file(&self, relative_path: &str) -> Result<()> {
        tokio::fs::remove_file(self.path.join(relative_path)).await?;
        Ok(())
    }

    /// Rename a tracked file with `git mv`.
    pub async fn rename_file(&self, from: &str, to: &str) -> Result<()> {
        if let Some(parent) = self.path.join(to).parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        self.git(&["mv", from, to]).await?;
        Ok(())
    }

    /// Stage everything and commit; returns the new commit id.
    pub async fn commit_all(&self, message: &str) -> Result<String> {
        self.git(&["add", "-A"]).await?;
        self.git(&["commit", "--quiet", "--allow-empty", "-m", message])
            .await?;
        self.head_commit().await
    }

    /// Create a lightweight tag at `HEAD`.
    pub async fn create_tag(&self, tag: &str) -> Result<()> {
        self.git(&["tag", tag]).await.map(drop)
    }

    /// Create an annotated tag at `HEAD`.
    pub async fn create_annotated_tag(&self, tag: &str, message: &str) -> Result<()> {
        self.git(&["tag", "-a", tag, "-m", message]).await.map(drop)
    }

    /// Create a branch at `HEAD`.
    pub async fn create_branch(&self, branch: &str) -> Result<()> {
        self.git(&["branch", branch]).await.map(drop)
    }

    /// Check out a branch, tag or commit.
    pub async fn checkout(&self, ref_name: &str) -> Result<()> {
        self.git(&["checkout", "--quiet", ref_name]).await.map(drop)
    }

    /// Current `HEAD` commit id.
    pub async fn head_commit(&self) -> Result<String> {
        self.git(&["rev-parse", "HEAD"]).await
    }

    /// Tag names.
    pub async fn list_tags(&self) -> Result<Vec<String>> {
        let out = self.git(&["tag", "-l"]).await?;
        Ok(out.lines().map(String::from).collect())
    }

    /// Local branch names.
    pub async fn list_branches(&self) -> Result<Vec<String>> {
        let out = self
            .git(&["branch", "--list", "--format=%(refname:short)"])
            .await?;
        Ok(out.lines().map(String::from).collect())
    }

    /// Bare copy of this repository with all branches and tags, usable as a
    /// remote.
    pub async fn bare_clone(&self) -> Result<Self> {
        let dir = tempdir().context("Failed to create temp directory")?;
        let target = dir.path().join("remote.git");
        let output = Command::new("git")
            .arg("clone")
            .arg("--bare")
            .arg("--quiet")
            .arg(&self.path)
            .arg(&target)
            .output()
            .await
            .context("Failed to run git clone --bare")?;

        if !output.status.success() {
            anyhow::bail!(
                "git clone --bare failed: {}",
                String::from_utf8_lossy(&output.stderr)
            );
        }

        Ok(Self {
            _dir: dir,
            path: target,
        })
    }
}

/// Check if git is available on the system.
pub async fn git_available() -> bool {
    Command::new("git")
        .args(["--version"])
        .output()
        .await
        .map(|o| o.status.success())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_create_temp_repo() {
        if !git_available().await {
            return;
        }

        let repo = TempGitRepo::new().await.unwrap();
        assert!(repo.path().join(".git").exists());
        assert_eq!(
            repo.git(&["symbolic-ref", "--short", "HEAD"]).await.unwrap(),
            "main"
        );
    }

    #[tokio::test]
    async fn test_history_tags_every_commit() {
        if !git_available().await {
            return;
        }

        let (repo, commits) = TempGitRepo::with_history(3).await.unwrap();
        assert_eq!(commits.len(), 3);
        assert_eq!(repo.list_tags().await.unwrap(), vec!["v1", "v2", "v3"]);
        assert_eq!(repo.head_commit().await.unwrap(), commits[2]);
    }

    #[tokio::test]
    async fn test_bare_clone_keeps_refs() {
        if !git_available().await {
            return;
        }

        let repo = TempGitRepo::with_content(&[("a.txt", "a")]).await.unwrap();
        repo.create_branch("feature").await.unwrap();
        repo.create_annotated_tag("v1.0.0", "first").await.unwrap();

        let bare = repo.bare_clone().await.unwrap();
        assert!(bare.path().join("HEAD").exists());
        let branches = bare.list_branches().await.unwrap();
        assert!(branches.contains(&"main".to_string()));
        assert!(branches.contains(&"feature".to_string()));
        assert_eq!(bare.list_tags().await.unwrap(), vec!["v1.0.0"]);
    }
}
