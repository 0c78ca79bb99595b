//! The closed vocabulary of inventory operations.
//!
//! Each variant carries everything the commit step needs to materialise it;
//! validation happens when a [`Transaction`](crate::tx::Transaction) accepts
//! the operation, not here.

use std::path::PathBuf;

use crate::store::Document;

/// One intended change to the inventory.
#[derive(Clone, Debug)]
pub enum Operation {
    /// Create a tracked directory (with anchor).
    NewDirectory { path: PathBuf },
    /// Create an asset with the given body.
    NewAsset {
        path: PathBuf,
        doc: Document,
        as_dir: bool,
    },
    /// Rewrite an asset's body in place.
    ModifyAsset {
        path: PathBuf,
        old: Document,
        new: Document,
    },
    /// Rename an asset under the same parent. `old` is the body before the
    /// batch touched it; `doc` is the final body with the bound fields
    /// updated.
    RenameAsset {
        from: PathBuf,
        to: PathBuf,
        old: Document,
        doc: Document,
        is_dir: bool,
    },
    /// Move an asset to another directory (basename unchanged).
    MoveAsset {
        from: PathBuf,
        to: PathBuf,
        is_dir: bool,
    },
    /// Move a directory to another parent.
    MoveDirectory { from: PathBuf, to: PathBuf },
    /// Delete an asset.
    RemoveAsset { path: PathBuf, is_dir: bool },
    /// Delete a directory.
    RemoveDirectory { path: PathBuf },
    /// Turn an asset file into an asset directory.
    ConvertToAssetDir { path: PathBuf, doc: Document },
    /// Turn an (otherwise empty) asset directory back into a file.
    ConvertFromAssetDir { path: PathBuf, doc: Document },
}

/// Commit-subject verb classes, ranked for picking the dominant one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OperationKind {
    New,
    Mkdir,
    Modify,
    Rename,
    Move,
    Remove,
}

impl OperationKind {
    /// The verb used in generated commit subjects.
    #[must_use]
    pub const fn verb(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Mkdir => "mkdir",
            Self::Modify => "set",
            Self::Rename => "rename",
            Self::Move => "mv",
            Self::Remove => "rm",
        }
    }
}

/// Grouped sections of the Inventory Operations summary, in render order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Section {
    NewAssets,
    MovedAssets,
    ModifiedAssets,
    RemovedAssets,
    NewDirectories,
    MovedDirectories,
    RemovedDirectories,
}

impl Section {
    /// The section heading as it appears in commit messages.
    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::NewAssets => "New assets:",
            Self::MovedAssets => "Moved assets:",
            Self::ModifiedAssets => "Modified assets:",
            Self::RemovedAssets => "Removed assets:",
            Self::NewDirectories => "New directories:",
            Self::MovedDirectories => "Moved directories:",
            Self::RemovedDirectories => "Removed directories:",
        }
    }

    /// All sections in render order.
    #[must_use]
    pub const fn all() -> [Self; 7] {
        [
            Self::NewAssets,
            Self::MovedAssets,
            Self::ModifiedAssets,
            Self::RemovedAssets,
            Self::NewDirectories,
            Self::MovedDirectories,
            Self::RemovedDirectories,
        ]
    }
}

impl Operation {
    /// The verb class of this operation.
    #[must_use]
    pub const fn kind(&self) -> OperationKind {
        match self {
            Self::NewAsset { .. } => OperationKind::New,
            Self::NewDirectory { .. } | Self::ConvertToAssetDir { .. } => OperationKind::Mkdir,
            Self::ModifyAsset { .. } => OperationKind::Modify,
            Self::RenameAsset { .. } => OperationKind::Rename,
            Self::MoveAsset { .. } | Self::MoveDirectory { .. } => OperationKind::Move,
            Self::RemoveAsset { .. }
            | Self::RemoveDirectory { .. }
            | Self::ConvertFromAssetDir { .. } => OperationKind::Remove,
        }
    }

    /// The record lines this operation contributes to the grouped summary.
    #[must_use]
    pub fn records(&self) -> Vec<(Section, String)> {
        fn item(p: &std::path::Path) -> String {
            format!("- {}", p.display())
        }
        fn arrow(from: &std::path::Path, to: &std::path::Path) -> String {
            format!("- {} -> {}", from.display(), to.display())
        }

        match self {
            Self::NewDirectory { path } => vec![(Section::NewDirectories, item(path))],
            Self::NewAsset { path, as_dir, .. } => {
                let mut records = vec![(Section::NewAssets, item(path))];
                if *as_dir {
                    records.push((Section::NewDirectories, item(path)));
                }
                records
            }
            Self::ModifyAsset { path, .. } => vec![(Section::ModifiedAssets, item(path))],
            Self::RenameAsset {
                from, to, is_dir, ..
            }
            | Self::MoveAsset { from, to, is_dir } => {
                let mut records = vec![(Section::MovedAssets, arrow(from, to))];
                if *is_dir {
                    records.push((Section::MovedDirectories, arrow(from, to)));
                }
                records
            }
            Self::MoveDirectory { from, to } => {
                vec![(Section::MovedDirectories, arrow(from, to))]
            }
            Self::RemoveAsset { path, is_dir } => {
                let mut records = vec![(Section::RemovedAssets, item(path))];
                if *is_dir {
                    records.push((Section::RemovedDirectories, item(path)));
                }
                records
            }
            Self::RemoveDirectory { path } => vec![(Section::RemovedDirectories, item(path))],
            Self::ConvertToAssetDir { path, .. } => {
                vec![(Section::NewDirectories, item(path))]
            }
            Self::ConvertFromAssetDir { path, .. } => {
                vec![(Section::RemovedDirectories, item(path))]
            }
        }
    }

    /// Basenames to list in a generated commit subject.
    #[must_use]
    pub fn affected_names(&self) -> Vec<String> {
        let name = |p: &std::path::Path| {
            p.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        };
        match self {
            Self::NewDirectory { path }
            | Self::ModifyAsset { path, .. }
            | Self::RemoveAsset { path, .. }
            | Self::RemoveDirectory { path }
            | Self::ConvertToAssetDir { path, .. }
            | Self::ConvertFromAssetDir { path, .. }
            | Self::NewAsset { path, .. } => vec![name(path)],
            Self::RenameAsset { from, to, .. } => vec![format!("{} -> {}", name(from), name(to))],
            Self::MoveAsset { from, .. } | Self::MoveDirectory { from, .. } => vec![name(from)],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_group_asset_dir_aspects() {
        let op = Operation::MoveAsset {
            from: PathBuf::from("a/x_y_z.1"),
            to: PathBuf::from("b/x_y_z.1"),
            is_dir: true,
        };
        let records = op.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].0, Section::MovedAssets);
        assert_eq!(records[1].0, Section::MovedDirectories);
        assert_eq!(records[0].1, "- a/x_y_z.1 -> b/x_y_z.1");
    }

    #[test]
    fn kinds_map_to_verbs() {
        let op = Operation::NewDirectory {
            path: PathBuf::from("shelf"),
        };
        assert_eq!(op.kind().verb(), "mkdir");
        let op = Operation::RemoveAsset {
            path: PathBuf::from("shelf/x_y_z.1"),
            is_dir: false,
        };
        assert_eq!(op.kind().verb(), "rm");
    }

    #[test]
    fn affected_names_are_basenames() {
        let op = Operation::MoveAsset {
            from: PathBuf::from("a/x_y_z.1"),
            to: PathBuf::from("b/x_y_z.1"),
            is_dir: false,
        };
        assert_eq!(op.affected_names(), ["x_y_z.1"]);
    }
}
