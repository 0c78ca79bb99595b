//! Reserved names and render-time tokens.

/// The onyo control directory at the repository root.
pub const ONYO_DIR: &str = ".onyo";

/// The tracked onyo config file, relative to the repository root.
pub const ONYO_CONFIG: &str = ".onyo/config";

/// The template directory, relative to the repository root.
pub const TEMPLATE_DIR: &str = ".onyo/templates";

/// The (reserved, possibly empty) validation rules directory.
pub const VALIDATION_DIR: &str = ".onyo/validation";

/// Empty marker file recording an otherwise-empty tracked directory.
///
/// Git tracks files, not directories; the anchor makes a directory exist in
/// history even when it holds no assets.
pub const ANCHOR_FILE_NAME: &str = ".anchor";

/// The file an asset directory's YAML body is stored in.
///
/// Dot-prefixed so it can never collide with a legal asset basename.
pub const ASSET_DIR_FILE_NAME: &str = ".onyo-asset-dir";

/// Repository versions this build can operate on.
pub const KNOWN_REPO_VERSIONS: &[&str] = &["1"];

/// Render token for a key that is not present.
pub const TAG_UNSET: &str = "[unset]";

/// Render token for a mapping value.
pub const TAG_DICT: &str = "[dict]";

/// Render token for a list value.
pub const TAG_LIST: &str = "[list]";
