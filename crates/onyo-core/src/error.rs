//! The unified error type for inventory operations.
//!
//! Every failure mode a command can hit is a distinct variant carrying the
//! offending path or operation, so the CLI can report a single-line reason
//! and tests can match on kinds rather than message text.

use std::path::PathBuf;

use thiserror::Error;

use onyo_git::GitError;

/// Errors produced by the inventory engine.
#[derive(Debug, Error)]
pub enum OnyoError {
    /// The target path is not inside an onyo repository.
    #[error("'{}' is not an onyo repository", path.display())]
    NotARepository { path: PathBuf },

    /// Tried to initialise a path that already is an onyo repository.
    #[error("'{}' already is an onyo repository", path.display())]
    AlreadyARepository { path: PathBuf },

    /// The repository was created by an unknown (likely newer) onyo version.
    #[error("unknown onyo repository version '{version}'")]
    UnknownRepoVersion { version: String },

    /// The working tree has uncommitted or untracked changes.
    #[error("working tree is not clean:\n{}", changes.join("\n"))]
    DirtyWorkingTree { changes: Vec<String> },

    /// An asset name does not conform to the configured name template.
    #[error("invalid asset name '{name}': {reason}")]
    InvalidAssetName { name: String, reason: String },

    /// Two inventory items would occupy the same path or name.
    #[error("name collision: '{}' already exists", path.display())]
    NameCollision { path: PathBuf },

    /// The referenced asset does not exist.
    #[error("no such asset: '{}'", path.display())]
    NoSuchAsset { path: PathBuf },

    /// The referenced inventory directory does not exist.
    #[error("no such inventory directory: '{}'", path.display())]
    NoSuchDirectory { path: PathBuf },

    /// Refused to remove a populated directory without `--recursive`.
    #[error("directory '{}' is not empty", path.display())]
    NotEmpty { path: PathBuf },

    /// A name-bound key was modified outside of a rename.
    #[error("cannot modify name-bound key '{key}' of '{}'; rename the asset instead", path.display())]
    BoundKeyMutation { path: PathBuf, key: String },

    /// An asset document failed to parse.
    #[error("invalid YAML in '{}': {reason}", path.display())]
    MalformedDocument { path: PathBuf, reason: String },

    /// The requested template does not exist.
    #[error("template '{name}' not found")]
    TemplateNotFound { name: String },

    /// No free faux serial could be generated within the retry budget.
    #[error("unable to generate a free faux serial after {attempts} attempts")]
    FauxSerialExhausted { attempts: u32 },

    /// A git invocation failed.
    #[error(transparent)]
    PluginFailure(#[from] GitError),

    /// The user declined an interactive confirmation.
    #[error("aborted by user")]
    UserAbort,

    /// An operation conflicts with the state projected by earlier operations
    /// in the same transaction, or is otherwise invalid there.
    #[error("invalid inventory operation: {reason}")]
    InvalidOperation { reason: String },

    /// Filesystem-level failure outside of git.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias used throughout the engine.
pub type Result<T, E = OnyoError> = std::result::Result<T, E>;
