//! Layered configuration.
//!
//! Keys are resolved through git's normal config chain first (worktree,
//! local, global, system) and fall back to the tracked `.onyo/config` file.
//! Writes go to an explicitly chosen scope. Reads are cached per handle;
//! the cache clears on writes and on every commit.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use onyo_git::{ConfigScope, GitError, GitRepo};

use crate::consts::ONYO_CONFIG;

/// Editor override; falls back to `core.editor`, `$EDITOR`, then `nano`.
pub const KEY_EDITOR: &str = "onyo.core.editor";

/// Command for interactive history viewing.
pub const KEY_HISTORY_INTERACTIVE: &str = "onyo.history.interactive";

/// Command for non-interactive history viewing.
pub const KEY_HISTORY_NON_INTERACTIVE: &str = "onyo.history.non-interactive";

/// Default template for `new`.
pub const KEY_NEW_TEMPLATE: &str = "onyo.new.template";

/// The asset name template.
pub const KEY_NAME_FORMAT: &str = "onyo.assets.name-format";

/// Repository version, used to gate compatibility.
pub const KEY_REPO_VERSION: &str = "onyo.repo.version";

/// Default value of [`KEY_HISTORY_INTERACTIVE`].
pub const DEFAULT_HISTORY_INTERACTIVE: &str = "tig --follow";

/// Default value of [`KEY_HISTORY_NON_INTERACTIVE`].
pub const DEFAULT_HISTORY_NON_INTERACTIVE: &str = "git --no-pager log --follow";

/// Default value of [`KEY_NEW_TEMPLATE`].
pub const DEFAULT_NEW_TEMPLATE: &str = "empty";

/// Default value of [`KEY_NAME_FORMAT`].
pub const DEFAULT_NAME_FORMAT: &str = "{type}_{make}_{model}.{serial}";

/// Where a configuration write is directed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteScope {
    /// The tracked `.onyo/config` file.
    Onyo,
    Local,
    Global,
    System,
    Worktree,
}

/// Cached configuration reader for one repository.
#[derive(Debug)]
pub struct Config {
    onyo_file: PathBuf,
    cache: RefCell<HashMap<String, Option<String>>>,
}

impl Config {
    /// A config handle for the repository rooted at `root` (absolute).
    #[must_use]
    pub fn new(root: &Path) -> Self {
        Self {
            onyo_file: root.join(ONYO_CONFIG),
            cache: RefCell::new(HashMap::new()),
        }
    }

    /// Absolute path of the tracked onyo config file.
    #[must_use]
    pub fn onyo_file(&self) -> &Path {
        &self.onyo_file
    }

    /// Effective value of `key`: git config chain, then `.onyo/config`.
    pub fn get(&self, git: &GitRepo, key: &str) -> Result<Option<String>, GitError> {
        if let Some(cached) = self.cache.borrow().get(key) {
            return Ok(cached.clone());
        }

        let value = match git.config_get(key, &ConfigScope::Default)? {
            Some(v) => Some(v),
            None => git.config_get(key, &ConfigScope::File(self.onyo_file.clone()))?,
        };
        debug!(key, value = ?value, "config resolved");
        self.cache
            .borrow_mut()
            .insert(key.to_owned(), value.clone());
        Ok(value)
    }

    /// Set `key` to `value` in the chosen scope.
    pub fn set(
        &self,
        git: &GitRepo,
        key: &str,
        value: &str,
        scope: WriteScope,
    ) -> Result<(), GitError> {
        let scope = match scope {
            WriteScope::Onyo => ConfigScope::File(self.onyo_file.clone()),
            WriteScope::Local => ConfigScope::Local,
            WriteScope::Global => ConfigScope::Global,
            WriteScope::System => ConfigScope::System,
            WriteScope::Worktree => ConfigScope::Worktree,
        };
        git.config_set(key, value, &scope)?;
        self.clear();
        Ok(())
    }

    /// Drop all cached values.
    pub fn clear(&self) {
        self.cache.borrow_mut().clear();
    }

    /// The configured asset name template string.
    pub fn name_format(&self, git: &GitRepo) -> Result<String, GitError> {
        Ok(self
            .get(git, KEY_NAME_FORMAT)?
            .unwrap_or_else(|| DEFAULT_NAME_FORMAT.to_owned()))
    }

    /// The default template name for `new`.
    pub fn new_template(&self, git: &GitRepo) -> Result<String, GitError> {
        Ok(self
            .get(git, KEY_NEW_TEMPLATE)?
            .unwrap_or_else(|| DEFAULT_NEW_TEMPLATE.to_owned()))
    }

    /// The history viewer command line.
    pub fn history_command(&self, git: &GitRepo, interactive: bool) -> Result<String, GitError> {
        let (key, default) = if interactive {
            (KEY_HISTORY_INTERACTIVE, DEFAULT_HISTORY_INTERACTIVE)
        } else {
            (KEY_HISTORY_NON_INTERACTIVE, DEFAULT_HISTORY_NON_INTERACTIVE)
        };
        Ok(self.get(git, key)?.unwrap_or_else(|| default.to_owned()))
    }

    /// The editor to spawn.
    ///
    /// Resolution: `onyo.core.editor`, then git's `core.editor`, then the
    /// supplied `$EDITOR` value, then `nano`.
    pub fn editor(&self, git: &GitRepo, env_editor: Option<String>) -> Result<String, GitError> {
        if let Some(editor) = self.get(git, KEY_EDITOR)? {
            if !editor.is_empty() {
                return Ok(editor);
            }
        }
        if let Some(editor) = self.get(git, "core.editor")? {
            if !editor.is_empty() {
                return Ok(editor);
            }
        }
        if let Some(editor) = env_editor {
            if !editor.is_empty() {
                return Ok(editor);
            }
        }
        Ok("nano".to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use onyo_git::GitRepo;

    fn scratch() -> (tempfile::TempDir, GitRepo, Config) {
        let dir = tempfile::tempdir().unwrap();
        let git = GitRepo::init(dir.path()).unwrap();
        let config = Config::new(git.root());
        std::fs::create_dir_all(git.root().join(".onyo")).unwrap();
        (dir, git, config)
    }

    #[test]
    fn defaults_apply_when_unset() {
        let (_dir, git, config) = scratch();
        assert_eq!(config.name_format(&git).unwrap(), DEFAULT_NAME_FORMAT);
        assert_eq!(config.new_template(&git).unwrap(), DEFAULT_NEW_TEMPLATE);
        assert_eq!(
            config.history_command(&git, true).unwrap(),
            DEFAULT_HISTORY_INTERACTIVE
        );
        assert_eq!(
            config.history_command(&git, false).unwrap(),
            DEFAULT_HISTORY_NON_INTERACTIVE
        );
    }

    #[test]
    fn onyo_scope_round_trips() {
        let (_dir, git, config) = scratch();
        config
            .set(&git, KEY_NEW_TEMPLATE, "laptop", WriteScope::Onyo)
            .unwrap();
        assert_eq!(config.new_template(&git).unwrap(), "laptop");
        // The value landed in the tracked file, not the git chain.
        assert!(std::fs::read_to_string(config.onyo_file())
            .unwrap()
            .contains("laptop"));
    }

    #[test]
    fn git_chain_wins_over_onyo_file() {
        let (_dir, git, config) = scratch();
        config
            .set(&git, KEY_NAME_FORMAT, "{a}.{b}", WriteScope::Onyo)
            .unwrap();
        config
            .set(&git, KEY_NAME_FORMAT, "{x}.{y}", WriteScope::Local)
            .unwrap();
        assert_eq!(config.name_format(&git).unwrap(), "{x}.{y}");
    }

    #[test]
    fn cache_clears_on_write() {
        let (_dir, git, config) = scratch();
        assert_eq!(config.new_template(&git).unwrap(), "empty");
        config
            .set(&git, KEY_NEW_TEMPLATE, "server", WriteScope::Onyo)
            .unwrap();
        assert_eq!(config.new_template(&git).unwrap(), "server");
    }

    #[test]
    fn editor_resolution_order() {
        let (_dir, git, config) = scratch();
        assert_eq!(config.editor(&git, None).unwrap(), "nano");
        assert_eq!(
            config.editor(&git, Some("vi".to_owned())).unwrap(),
            "vi"
        );

        config
            .set(&git, "core.editor", "emacs", WriteScope::Local)
            .unwrap();
        assert_eq!(config.editor(&git, Some("vi".to_owned())).unwrap(), "emacs");

        config
            .set(&git, KEY_EDITOR, "helix", WriteScope::Onyo)
            .unwrap();
        assert_eq!(config.editor(&git, None).unwrap(), "helix");
    }
}
