//! Error types for git plumbing operations.
//!
//! [`GitError`] is the single error type returned by all [`GitRepo`](crate::GitRepo)
//! methods. Variants are rich enough that callers can match on specific
//! failure modes (missing repository, dirty worktree, subprocess failure)
//! without parsing error messages.

use std::path::PathBuf;

use thiserror::Error;

/// Errors returned by [`GitRepo`](crate::GitRepo) operations.
#[derive(Debug, Error)]
pub enum GitError {
    /// The path is not inside a (non-bare) git repository.
    #[error("'{}' is not a git repository", path.display())]
    NotARepository {
        /// The path that was probed.
        path: PathBuf,
    },

    /// The repository is bare and has no working tree to operate on.
    #[error("'{}' is a bare repository; onyo requires a working tree", path.display())]
    BareRepository {
        /// The repository path.
        path: PathBuf,
    },

    /// A git subprocess exited with a non-zero status.
    #[error("git command failed: `{command}`: {stderr}")]
    CommandFailed {
        /// The full command line that was run.
        command: String,
        /// Captured stderr from git (trimmed).
        stderr: String,
    },

    /// The `git` binary could not be spawned or another I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
