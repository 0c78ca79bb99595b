//! The [`GitRepo`] handle — the single surface through which onyo talks to git.
//!
//! All history reads and writes go through this type. It spawns the `git`
//! binary for every operation; no other crate in the workspace is allowed to
//! do so. Bare repositories are rejected — onyo needs a working tree.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

use crate::error::GitError;

/// Where a configuration read or write is directed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigScope {
    /// git's normal resolution chain (worktree, local, global, system).
    Default,
    /// The repository-local config (`.git/config`).
    Local,
    /// The user-global config.
    Global,
    /// The system config.
    System,
    /// The per-worktree config.
    Worktree,
    /// An explicit config file (used for the tracked onyo config).
    File(PathBuf),
}

impl ConfigScope {
    fn args(&self) -> Vec<String> {
        match self {
            Self::Default => vec![],
            Self::Local => vec!["--local".into()],
            Self::Global => vec!["--global".into()],
            Self::System => vec!["--system".into()],
            Self::Worktree => vec!["--worktree".into()],
            Self::File(path) => vec!["--file".into(), path.to_string_lossy().into_owned()],
        }
    }
}

/// A local, non-bare git repository.
///
/// Paths passed to and returned from methods are relative to [`root`](Self::root)
/// unless noted otherwise.
#[derive(Debug)]
pub struct GitRepo {
    root: PathBuf,
}

impl GitRepo {
    /// Open the repository containing `path`.
    ///
    /// The worktree root is discovered via `git rev-parse --show-toplevel`,
    /// so any directory inside the repository is accepted.
    ///
    /// # Errors
    /// [`GitError::NotARepository`] if `path` is not inside a git repository,
    /// [`GitError::BareRepository`] if the repository has no working tree.
    pub fn open(path: &Path) -> Result<Self, GitError> {
        if !path.is_dir() {
            return Err(GitError::NotARepository {
                path: path.to_owned(),
            });
        }

        let probe = Command::new("git")
            .args(["rev-parse", "--is-bare-repository", "--show-toplevel"])
            .current_dir(path)
            .output()?;
        if !probe.status.success() {
            return Err(GitError::NotARepository {
                path: path.to_owned(),
            });
        }

        let stdout = String::from_utf8_lossy(&probe.stdout);
        let mut lines = stdout.lines();
        if lines.next().map(str::trim) == Some("true") {
            return Err(GitError::BareRepository {
                path: path.to_owned(),
            });
        }
        let root = lines.next().map(str::trim).ok_or(GitError::NotARepository {
            path: path.to_owned(),
        })?;

        Ok(Self {
            root: PathBuf::from(root),
        })
    }

    /// Initialise `path` as a git repository, creating the directory if
    /// needed. A no-op if `path` already is one.
    ///
    /// # Errors
    /// Fails if `path` resolves to a bare repository or `git init` fails.
    pub fn init(path: &Path) -> Result<Self, GitError> {
        std::fs::create_dir_all(path)?;

        if !path.join(".git").exists() {
            let output = Command::new("git")
                .args(["init", "--quiet"])
                .current_dir(path)
                .output()?;
            if !output.status.success() {
                return Err(GitError::CommandFailed {
                    command: "git init".to_owned(),
                    stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
                });
            }
        }

        Self::open(path)
    }

    /// Absolute path of the worktree root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Run a git command in the worktree root and return its stdout.
    ///
    /// Non-zero exits become [`GitError::CommandFailed`] carrying the command
    /// line and stderr.
    fn run<I, S>(&self, args: I) -> Result<String, GitError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let args: Vec<_> = args.into_iter().collect();
        let command_line = format!(
            "git {}",
            args.iter()
                .map(|a| a.as_ref().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join(" ")
        );
        debug!(command = %command_line, "running");

        let output = Command::new("git")
            .args(&args)
            .current_dir(&self.root)
            .output()?;
        if !output.status.success() {
            return Err(GitError::CommandFailed {
                command: command_line,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// List tracked file paths (relative to the root), optionally limited to
    /// a subtree. An unborn HEAD yields an empty list.
    pub fn tracked_files(&self, subtree: Option<&Path>) -> Result<Vec<PathBuf>, GitError> {
        if self.head_oid()?.is_none() {
            return Ok(vec![]);
        }

        let mut args: Vec<String> = ["ls-tree", "-r", "--full-tree", "--name-only", "-z", "HEAD"]
            .iter()
            .map(|s| (*s).to_owned())
            .collect();
        if let Some(p) = subtree {
            args.push("--".to_owned());
            args.push(p.to_string_lossy().into_owned());
        }

        let listing = self.run(args)?;
        Ok(listing
            .split('\0')
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
            .collect())
    }

    /// Whether the worktree has no staged, unstaged, or untracked changes.
    pub fn is_clean(&self) -> Result<bool, GitError> {
        Ok(self.status_lines()?.is_empty())
    }

    /// Porcelain status lines, one per changed or untracked path.
    pub fn status_lines(&self) -> Result<Vec<String>, GitError> {
        let output = self.run(["status", "--porcelain", "--untracked-files=all"])?;
        Ok(output.lines().map(str::to_owned).collect())
    }

    /// Stage paths.
    pub fn stage(&self, paths: &[PathBuf]) -> Result<(), GitError> {
        if paths.is_empty() {
            return Ok(());
        }
        let mut args: Vec<String> = vec!["add".to_owned(), "--".to_owned()];
        args.extend(paths.iter().map(|p| p.to_string_lossy().into_owned()));
        self.run(args)?;
        Ok(())
    }

    /// Move a tracked path, preserving history (`git mv`).
    pub fn rename(&self, src: &Path, dst: &Path) -> Result<(), GitError> {
        self.run([
            "mv".to_owned(),
            src.to_string_lossy().into_owned(),
            dst.to_string_lossy().into_owned(),
        ])?;
        Ok(())
    }

    /// Remove a tracked path from the index and the worktree (`git rm -r`).
    pub fn remove(&self, path: &Path) -> Result<(), GitError> {
        self.run([
            "rm".to_owned(),
            "-r".to_owned(),
            "--quiet".to_owned(),
            "--".to_owned(),
            path.to_string_lossy().into_owned(),
        ])?;
        Ok(())
    }

    /// Write a file inside the worktree, creating parent directories.
    ///
    /// The path is relative to the root. The write itself does not stage.
    pub fn write_file(&self, path: &Path, contents: &[u8]) -> Result<(), GitError> {
        let absolute = self.root.join(path);
        if let Some(parent) = absolute.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(absolute, contents)?;
        Ok(())
    }

    /// Create a directory (and parents) inside the worktree.
    pub fn create_dir(&self, path: &Path) -> Result<(), GitError> {
        std::fs::create_dir_all(self.root.join(path))?;
        Ok(())
    }

    /// Read a file from the worktree.
    pub fn read_file(&self, path: &Path) -> Result<Vec<u8>, GitError> {
        Ok(std::fs::read(self.root.join(path))?)
    }

    /// Whether a worktree path exists (any kind).
    #[must_use]
    pub fn exists(&self, path: &Path) -> bool {
        self.root.join(path).exists()
    }

    /// Commit whatever is staged.
    ///
    /// Returns the new commit id, or `None` when nothing was staged (a no-op
    /// batch is not an error).
    pub fn commit(&self, message: &str) -> Result<Option<String>, GitError> {
        let staged = Command::new("git")
            .args(["diff", "--cached", "--quiet"])
            .current_dir(&self.root)
            .output()?;
        if staged.status.success() {
            debug!("nothing staged; skipping commit");
            return Ok(None);
        }

        self.run(["commit", "--quiet", "-m", message])?;
        self.head_oid()
    }

    /// Commit staged changes limited to the given pathspecs.
    ///
    /// Used where surrounding staged state must not be swept into the
    /// commit (e.g. repository initialisation).
    pub fn commit_paths(&self, message: &str, paths: &[PathBuf]) -> Result<Option<String>, GitError> {
        let mut args: Vec<String> = vec![
            "commit".to_owned(),
            "--quiet".to_owned(),
            "-m".to_owned(),
            message.to_owned(),
            "--".to_owned(),
        ];
        args.extend(paths.iter().map(|p| p.to_string_lossy().into_owned()));
        self.run(args)?;
        self.head_oid()
    }

    /// Read a file's bytes at a revision (`git show REV:PATH`).
    pub fn read_blob(&self, path: &Path, revision: &str) -> Result<Vec<u8>, GitError> {
        let spec = format!("{}:{}", revision, path.to_string_lossy());
        let output = Command::new("git")
            .args(["show", &spec])
            .current_dir(&self.root)
            .output()?;
        if !output.status.success() {
            return Err(GitError::CommandFailed {
                command: format!("git show {spec}"),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            });
        }
        Ok(output.stdout)
    }

    /// Read a config value. `None` when the key is unset in `scope`.
    pub fn config_get(&self, key: &str, scope: &ConfigScope) -> Result<Option<String>, GitError> {
        let mut args = vec!["config".to_owned()];
        args.extend(scope.args());
        args.push("--get".to_owned());
        args.push(key.to_owned());

        let output = Command::new("git")
            .args(&args)
            .current_dir(&self.root)
            .output()?;
        if !output.status.success() {
            // git config --get exits 1 for a missing key.
            return Ok(None);
        }
        Ok(Some(
            String::from_utf8_lossy(&output.stdout).trim().to_owned(),
        ))
    }

    /// Set a config value in `scope`.
    pub fn config_set(&self, key: &str, value: &str, scope: &ConfigScope) -> Result<(), GitError> {
        let mut args = vec!["config".to_owned()];
        args.extend(scope.args());
        args.push(key.to_owned());
        args.push(value.to_owned());
        self.run(args)?;
        Ok(())
    }

    /// Run `git config --file <file> <args...>` with inherited stdio and
    /// return git's exit code.
    ///
    /// Backs the `config` passthrough command, which must mirror
    /// git-config's own output and exit semantics.
    pub fn config_file_passthrough(&self, file: &Path, args: &[String]) -> Result<i32, GitError> {
        let status = Command::new("git")
            .arg("config")
            .arg("--file")
            .arg(file)
            .args(args)
            .current_dir(&self.root)
            .status()?;
        Ok(status.code().unwrap_or(1))
    }

    /// The OID of HEAD, or `None` on an unborn branch.
    pub fn head_oid(&self) -> Result<Option<String>, GitError> {
        let output = Command::new("git")
            .args(["rev-parse", "--quiet", "--verify", "HEAD^{commit}"])
            .current_dir(&self.root)
            .output()?;
        if !output.status.success() {
            return Ok(None);
        }
        Ok(Some(
            String::from_utf8_lossy(&output.stdout).trim().to_owned(),
        ))
    }

    /// Full commit message of a revision.
    pub fn commit_message(&self, revision: &str) -> Result<String, GitError> {
        self.run(["log", revision, "-n1", "--pretty=%B"])
    }

    /// Number of commits reachable from HEAD. Zero on an unborn branch.
    pub fn commit_count(&self) -> Result<usize, GitError> {
        if self.head_oid()?.is_none() {
            return Ok(0);
        }
        let output = self.run(["rev-list", "--count", "HEAD"])?;
        Ok(output.trim().parse().unwrap_or(0))
    }

    /// Best-effort rollback: restore all tracked files to their HEAD state.
    ///
    /// Untracked artefacts of a failed batch are left behind for `fsck` to
    /// report.
    pub fn checkout_head(&self) -> Result<(), GitError> {
        if self.head_oid()?.is_none() {
            return Ok(());
        }
        self.run(["checkout", "--quiet", "HEAD", "--", "."])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_repo() -> (tempfile::TempDir, GitRepo) {
        let dir = tempfile::tempdir().unwrap();
        let repo = GitRepo::init(dir.path()).unwrap();
        repo.config_set("user.name", "Test", &ConfigScope::Local)
            .unwrap();
        repo.config_set("user.email", "test@example.com", &ConfigScope::Local)
            .unwrap();
        (dir, repo)
    }

    #[test]
    fn open_rejects_non_repo() {
        let dir = tempfile::tempdir().unwrap();
        let err = GitRepo::open(dir.path()).unwrap_err();
        assert!(matches!(err, GitError::NotARepository { .. }));
    }

    #[test]
    fn open_rejects_bare_repo() {
        let dir = tempfile::tempdir().unwrap();
        Command::new("git")
            .args(["init", "--quiet", "--bare"])
            .current_dir(dir.path())
            .output()
            .unwrap();
        let err = GitRepo::open(dir.path()).unwrap_err();
        assert!(matches!(err, GitError::BareRepository { .. }));
    }

    #[test]
    fn init_is_idempotent() {
        let (dir, _repo) = scratch_repo();
        let again = GitRepo::init(dir.path()).unwrap();
        assert_eq!(again.root(), dir.path().canonicalize().unwrap());
    }

    #[test]
    fn open_finds_root_from_subdir() {
        let (dir, _repo) = scratch_repo();
        let sub = dir.path().join("a/b");
        std::fs::create_dir_all(&sub).unwrap();
        let repo = GitRepo::open(&sub).unwrap();
        assert_eq!(repo.root(), dir.path().canonicalize().unwrap());
    }

    #[test]
    fn commit_and_tracked_files() {
        let (dir, repo) = scratch_repo();
        assert_eq!(repo.commit_count().unwrap(), 0);
        assert!(repo.tracked_files(None).unwrap().is_empty());

        std::fs::write(dir.path().join("a.yaml"), "---\n").unwrap();
        repo.stage(&[PathBuf::from("a.yaml")]).unwrap();
        let oid = repo.commit("add a").unwrap();
        assert!(oid.is_some());
        assert_eq!(repo.commit_count().unwrap(), 1);
        assert_eq!(repo.tracked_files(None).unwrap(), [PathBuf::from("a.yaml")]);
    }

    #[test]
    fn commit_with_nothing_staged_is_noop() {
        let (_dir, repo) = scratch_repo();
        assert_eq!(repo.commit("empty").unwrap(), None);
        assert_eq!(repo.commit_count().unwrap(), 0);
    }

    #[test]
    fn is_clean_reflects_untracked() {
        let (dir, repo) = scratch_repo();
        assert!(repo.is_clean().unwrap());
        std::fs::write(dir.path().join("stray"), "x").unwrap();
        assert!(!repo.is_clean().unwrap());
    }

    #[test]
    fn rename_preserves_tracking() {
        let (dir, repo) = scratch_repo();
        std::fs::write(dir.path().join("old"), "content").unwrap();
        repo.stage(&[PathBuf::from("old")]).unwrap();
        repo.commit("add").unwrap();

        repo.rename(Path::new("old"), Path::new("new")).unwrap();
        repo.commit("move").unwrap();
        assert_eq!(repo.tracked_files(None).unwrap(), [PathBuf::from("new")]);
    }

    #[test]
    fn read_blob_at_revision() {
        let (dir, repo) = scratch_repo();
        std::fs::write(dir.path().join("f"), "v1").unwrap();
        repo.stage(&[PathBuf::from("f")]).unwrap();
        repo.commit("v1").unwrap();
        std::fs::write(dir.path().join("f"), "v2").unwrap();
        repo.stage(&[PathBuf::from("f")]).unwrap();
        repo.commit("v2").unwrap();

        assert_eq!(repo.read_blob(Path::new("f"), "HEAD").unwrap(), b"v2");
        assert_eq!(repo.read_blob(Path::new("f"), "HEAD~1").unwrap(), b"v1");
    }

    #[test]
    fn config_roundtrip_in_file_scope() {
        let (dir, repo) = scratch_repo();
        let cfg = ConfigScope::File(dir.path().join("cfg"));
        assert_eq!(repo.config_get("onyo.test.key", &cfg).unwrap(), None);
        repo.config_set("onyo.test.key", "value", &cfg).unwrap();
        assert_eq!(
            repo.config_get("onyo.test.key", &cfg).unwrap().as_deref(),
            Some("value")
        );
    }

    #[test]
    fn checkout_head_restores_tracked_content() {
        let (dir, repo) = scratch_repo();
        std::fs::write(dir.path().join("f"), "committed").unwrap();
        repo.stage(&[PathBuf::from("f")]).unwrap();
        repo.commit("base").unwrap();

        std::fs::write(dir.path().join("f"), "scribbled").unwrap();
        repo.checkout_head().unwrap();
        assert_eq!(std::fs::read_to_string(dir.path().join("f")).unwrap(), "committed");
    }

    #[test]
    fn commit_message_is_preserved() {
        let (dir, repo) = scratch_repo();
        std::fs::write(dir.path().join("f"), "x").unwrap();
        repo.stage(&[PathBuf::from("f")]).unwrap();
        repo.commit("subject line\n\nbody paragraph").unwrap();
        let msg = repo.commit_message("HEAD").unwrap();
        assert!(msg.starts_with("subject line\n"));
        assert!(msg.contains("body paragraph"));
    }
}
