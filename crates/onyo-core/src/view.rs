//! The inventory handle and its cached repository view.
//!
//! [`Inventory`] wraps the git adapter and answers the questions every
//! command asks: is this path a tracked directory, is it an asset, what
//! does its document say. The answers come from one cached [`View`] built
//! from the tracked-file listing; every successful commit invalidates it.

use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::path::{Component, Path, PathBuf};
use std::rc::Rc;

use tracing::debug;

use onyo_git::{ConfigScope, GitError, GitRepo};

use crate::config::{Config, WriteScope, KEY_REPO_VERSION};
use crate::consts::{
    ANCHOR_FILE_NAME, ASSET_DIR_FILE_NAME, KNOWN_REPO_VERSIONS, ONYO_CONFIG, ONYO_DIR,
    TEMPLATE_DIR, VALIDATION_DIR,
};
use crate::error::{OnyoError, Result};
use crate::name::NameTemplate;
use crate::store::Document;

/// A pure snapshot of the tracked inventory: directories, assets, and the
/// asset-directory subset. Paths are relative to the repository root; the
/// empty path is the root itself.
#[derive(Clone, Debug, Default)]
pub struct View {
    /// Tracked inventory directories (identified by their anchor file).
    pub dirs: BTreeSet<PathBuf>,
    /// Asset paths (files and asset directories).
    pub assets: BTreeSet<PathBuf>,
    /// Assets stored as directories.
    pub asset_dirs: BTreeSet<PathBuf>,
}

impl View {
    /// Whether `path` is the root or a tracked inventory directory.
    #[must_use]
    pub fn is_dir(&self, path: &Path) -> bool {
        path.as_os_str().is_empty() || self.dirs.contains(path)
    }

    /// Whether `path` is an asset.
    #[must_use]
    pub fn is_asset(&self, path: &Path) -> bool {
        self.assets.contains(path)
    }

    /// Whether `path` is an asset directory.
    #[must_use]
    pub fn is_asset_dir(&self, path: &Path) -> bool {
        self.asset_dirs.contains(path)
    }

    /// Asset paths under the include roots, minus the excluded subtrees,
    /// descending at most `depth` levels (0 = unlimited). Sorted.
    #[must_use]
    pub fn assets_under(
        &self,
        include: &[PathBuf],
        exclude: &[PathBuf],
        depth: usize,
    ) -> Vec<PathBuf> {
        self.select(&self.assets, include, exclude, depth)
    }

    /// Directory paths under the include roots, same scoping rules.
    #[must_use]
    pub fn dirs_under(
        &self,
        include: &[PathBuf],
        exclude: &[PathBuf],
        depth: usize,
    ) -> Vec<PathBuf> {
        self.select(&self.dirs, include, exclude, depth)
    }

    fn select(
        &self,
        set: &BTreeSet<PathBuf>,
        include: &[PathBuf],
        exclude: &[PathBuf],
        depth: usize,
    ) -> Vec<PathBuf> {
        let root_include = [PathBuf::new()];
        let include = if include.is_empty() {
            &root_include[..]
        } else {
            include
        };

        set.iter()
            .filter(|p| {
                include.iter().any(|root| {
                    let within = root.as_os_str().is_empty() || p.starts_with(root);
                    within
                        && (depth == 0
                            || p.components().count() - root.components().count() <= depth)
                })
            })
            .filter(|p| {
                !exclude
                    .iter()
                    .any(|e| *p == e || p.starts_with(e))
            })
            .cloned()
            .collect()
    }

    /// Children (dirs and assets) directly inside `dir`, sorted.
    #[must_use]
    pub fn children(&self, dir: &Path) -> Vec<PathBuf> {
        let mut out: BTreeSet<PathBuf> = BTreeSet::new();
        for p in self.dirs.iter().chain(self.assets.iter()) {
            if p.parent().map(Path::to_path_buf).unwrap_or_default() == *dir
                && !p.as_os_str().is_empty()
            {
                out.insert(p.clone());
            }
        }
        out.into_iter().collect()
    }
}

/// Handle on an onyo repository.
///
/// Owns the git adapter, the config cache, and the lazily-built [`View`].
#[derive(Debug)]
pub struct Inventory {
    git: GitRepo,
    config: Config,
    view: RefCell<Option<Rc<View>>>,
}

impl Inventory {
    /// Open the onyo repository containing `path`.
    ///
    /// # Errors
    /// [`OnyoError::NotARepository`] when `path` is not inside a git
    /// repository or the repository was never initialised for onyo;
    /// [`OnyoError::UnknownRepoVersion`] for repositories from a newer onyo.
    pub fn open(path: &Path) -> Result<Self> {
        let git = match GitRepo::open(path) {
            Ok(git) => git,
            Err(GitError::NotARepository { path } | GitError::BareRepository { path }) => {
                return Err(OnyoError::NotARepository { path })
            }
            Err(e) => return Err(e.into()),
        };

        let inv = Self {
            config: Config::new(git.root()),
            git,
            view: RefCell::new(None),
        };
        inv.validate_structure()?;
        Ok(inv)
    }

    /// Initialise `path` as an onyo repository and commit the skeleton.
    ///
    /// The directory is created and `git init`-ed if needed. Re-initialising
    /// an existing onyo repository is an error.
    pub fn init(path: &Path) -> Result<Self> {
        if path.join(ONYO_DIR).exists() {
            return Err(OnyoError::AlreadyARepository {
                path: path.to_owned(),
            });
        }
        // Nesting inside an enclosing onyo repository is a conflict, not a
        // fresh init.
        if path.is_dir() {
            if let Ok(enclosing) = GitRepo::open(path) {
                if enclosing.root().join(ONYO_CONFIG).is_file() {
                    return Err(OnyoError::AlreadyARepository {
                        path: enclosing.root().to_owned(),
                    });
                }
            }
        }

        let git = match GitRepo::init(path) {
            Ok(git) => git,
            Err(GitError::BareRepository { path }) => {
                return Err(OnyoError::NotARepository { path })
            }
            Err(e) => return Err(e.into()),
        };

        let inv = Self {
            config: Config::new(git.root()),
            git,
            view: RefCell::new(None),
        };

        let anchor = Path::new(ANCHOR_FILE_NAME);
        inv.git
            .write_file(&Path::new(ONYO_DIR).join(anchor), b"")?;
        inv.git
            .write_file(&Path::new(TEMPLATE_DIR).join(anchor), b"")?;
        inv.git
            .write_file(&Path::new(TEMPLATE_DIR).join("empty"), b"---\n")?;
        inv.git
            .write_file(&Path::new(VALIDATION_DIR).join(anchor), b"")?;
        inv.config
            .set(&inv.git, KEY_REPO_VERSION, "1", WriteScope::Onyo)?;

        let onyo_dir = PathBuf::from(ONYO_DIR);
        inv.git.stage(&[onyo_dir.clone()])?;
        inv.git
            .commit_paths("Initialize as an Onyo repository", &[onyo_dir])?;

        debug!(root = %inv.git.root().display(), "initialised onyo repository");
        Ok(inv)
    }

    fn validate_structure(&self) -> Result<()> {
        let root = self.git.root();
        if !root.join(ONYO_CONFIG).is_file() {
            return Err(OnyoError::NotARepository {
                path: root.to_owned(),
            });
        }

        let version = self
            .git
            .config_get(
                KEY_REPO_VERSION,
                &ConfigScope::File(root.join(ONYO_CONFIG)),
            )?
            .unwrap_or_default();
        if !KNOWN_REPO_VERSIONS.contains(&version.as_str()) {
            return Err(OnyoError::UnknownRepoVersion { version });
        }
        Ok(())
    }

    /// The git adapter.
    #[must_use]
    pub fn git(&self) -> &GitRepo {
        &self.git
    }

    /// The configuration layer.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Absolute path of the repository root.
    #[must_use]
    pub fn root(&self) -> &Path {
        self.git.root()
    }

    /// The compiled asset name template from configuration.
    pub fn name_template(&self) -> Result<NameTemplate> {
        NameTemplate::compile(&self.config.name_format(&self.git)?)
    }

    /// The current repository view (cached).
    pub fn view(&self) -> Result<Rc<View>> {
        if let Some(view) = self.view.borrow().as_ref() {
            return Ok(Rc::clone(view));
        }

        let mut view = View::default();
        for file in self.git.tracked_files(None)? {
            if !self.is_inventory_path_or_marker(&file) {
                continue;
            }
            let name = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let parent = file.parent().map(Path::to_path_buf).unwrap_or_default();
            if name == ANCHOR_FILE_NAME {
                if !parent.as_os_str().is_empty() {
                    view.dirs.insert(parent);
                }
            } else if name == ASSET_DIR_FILE_NAME {
                view.assets.insert(parent.clone());
                view.asset_dirs.insert(parent);
            } else {
                view.assets.insert(file);
            }
        }

        let view = Rc::new(view);
        *self.view.borrow_mut() = Some(Rc::clone(&view));
        Ok(view)
    }

    /// Drop the cached view (called after every commit).
    pub fn invalidate(&self) {
        *self.view.borrow_mut() = None;
        self.config.clear();
    }

    /// Whether `path` (repo-relative) may hold an inventory item.
    ///
    /// Paths used by git or onyo internally are off limits.
    #[must_use]
    pub fn is_inventory_path(&self, path: &Path) -> bool {
        if path.as_os_str().is_empty() {
            return false;
        }
        for component in path.components() {
            let Component::Normal(part) = component else {
                return false;
            };
            let part = part.to_string_lossy();
            if part == ".git"
                || part.starts_with(".git")
                || part.starts_with(".onyo")
                || part == ANCHOR_FILE_NAME
            {
                return false;
            }
        }
        true
    }

    /// Like [`is_inventory_path`](Self::is_inventory_path) but admits the
    /// anchor and asset-dir marker files themselves (used when classifying
    /// the tracked-file listing).
    fn is_inventory_path_or_marker(&self, path: &Path) -> bool {
        match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => {
                if !self.is_inventory_path(parent) {
                    return false;
                }
            }
            _ => {}
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        name == ANCHOR_FILE_NAME
            || name == ASSET_DIR_FILE_NAME
            || !(name.starts_with(".git") || name.starts_with(".onyo"))
    }

    /// The file holding `path`'s YAML: the path itself, or the body file
    /// for an asset directory.
    pub fn document_file(&self, path: &Path) -> Result<PathBuf> {
        let view = self.view()?;
        if view.is_asset_dir(path) {
            Ok(path.join(ASSET_DIR_FILE_NAME))
        } else {
            Ok(path.to_owned())
        }
    }

    /// Load the document of the asset at `path`.
    pub fn load_document(&self, path: &Path) -> Result<Document> {
        let file = self.document_file(path)?;
        let bytes = self.git.read_file(&file)?;
        let text = String::from_utf8_lossy(&bytes);
        Document::parse(&text).map_err(|e| OnyoError::MalformedDocument {
            path: path.to_owned(),
            reason: e.to_string(),
        })
    }

    /// Load a template by name (relative to `.onyo/templates/`).
    pub fn template(&self, name: &str) -> Result<Document> {
        let file = self.root().join(TEMPLATE_DIR).join(name);
        if !file.is_file() {
            return Err(OnyoError::TemplateNotFound {
                name: name.to_owned(),
            });
        }
        let text = std::fs::read_to_string(&file)?;
        Document::parse(&text).map_err(|e| OnyoError::MalformedDocument {
            path: PathBuf::from(TEMPLATE_DIR).join(name),
            reason: e.to_string(),
        })
    }

    /// Check repository invariants. Returns a list of problems; empty means
    /// the repository is sane.
    pub fn fsck(&self) -> Result<Vec<String>> {
        let mut problems = vec![];

        // Expected .onyo structure.
        for required in [
            PathBuf::from(ONYO_CONFIG),
            Path::new(ONYO_DIR).join(ANCHOR_FILE_NAME),
            Path::new(TEMPLATE_DIR).join(ANCHOR_FILE_NAME),
            Path::new(VALIDATION_DIR).join(ANCHOR_FILE_NAME),
        ] {
            if !self.root().join(&required).is_file() {
                problems.push(format!("missing onyo file: {}", required.display()));
            }
        }

        // Clean working tree.
        for change in self.git.status_lines()? {
            problems.push(format!("uncommitted change: {change}"));
        }

        // Every inventory directory on disk carries an anchor.
        let mut pending = vec![self.root().to_owned()];
        while let Some(dir) = pending.pop() {
            for entry in std::fs::read_dir(&dir)? {
                let entry = entry?;
                if !entry.file_type()?.is_dir() {
                    continue;
                }
                let rel = entry
                    .path()
                    .strip_prefix(self.root())
                    .expect("walk stays under root")
                    .to_path_buf();
                if !self.is_inventory_path(&rel) {
                    // .git, .onyo, and friends are not inventory directories.
                    continue;
                }
                if !entry.path().join(ANCHOR_FILE_NAME).is_file() {
                    problems.push(format!("missing anchor: {}", rel.display()));
                }
                pending.push(entry.path());
            }
        }

        // Asset names are unique, parse, and agree with their documents.
        let view = self.view()?;
        let template = self.name_template()?;
        let mut by_name: HashMap<String, Vec<PathBuf>> = HashMap::new();
        for asset in &view.assets {
            let name = asset
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            by_name.entry(name).or_default().push(asset.clone());
        }
        for (name, paths) in &by_name {
            if paths.len() > 1 {
                problems.push(format!(
                    "asset name '{name}' is not unique: {}",
                    paths
                        .iter()
                        .map(|p| p.display().to_string())
                        .collect::<Vec<_>>()
                        .join(", ")
                ));
            }
        }

        for asset in &view.assets {
            let name = asset
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let fields = match template.parse_name(&name) {
                Ok(fields) => fields,
                Err(e) => {
                    problems.push(format!("{e}"));
                    continue;
                }
            };
            let doc = match self.load_document(asset) {
                Ok(doc) => doc,
                Err(e) => {
                    problems.push(format!("{e}"));
                    continue;
                }
            };
            for (field, value) in fields {
                let stored = doc.get_text(&field).unwrap_or_default();
                if stored != value {
                    problems.push(format!(
                        "{}: key '{field}' is '{stored}' but the name says '{value}'",
                        asset.display()
                    ));
                }
            }
        }

        Ok(problems)
    }

    /// Turn a user-supplied path (absolute or cwd-relative) into a
    /// repo-relative one.
    pub fn relative_path(&self, path: &Path) -> Result<PathBuf> {
        let absolute = if path.is_absolute() {
            path.to_owned()
        } else {
            std::env::current_dir()?.join(path)
        };
        // Normalise `.` and `..` components lexically.
        let mut normalised = PathBuf::new();
        for component in absolute.components() {
            match component {
                Component::CurDir => {}
                Component::ParentDir => {
                    normalised.pop();
                }
                other => normalised.push(other),
            }
        }
        normalised
            .strip_prefix(self.root())
            .map(Path::to_path_buf)
            .map_err(|_| OnyoError::InvalidOperation {
                reason: format!("'{}' is outside the repository", path.display()),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch() -> (tempfile::TempDir, Inventory) {
        let dir = tempfile::tempdir().unwrap();
        let inv = Inventory::init(dir.path()).unwrap();
        inv.git()
            .config_set("user.name", "Test", &ConfigScope::Local)
            .unwrap();
        inv.git()
            .config_set("user.email", "test@example.com", &ConfigScope::Local)
            .unwrap();
        (dir, inv)
    }

    #[test]
    fn init_creates_skeleton_and_one_commit() {
        let (dir, inv) = scratch();
        assert!(dir.path().join(".onyo/config").is_file());
        assert!(dir.path().join(".onyo/templates/empty").is_file());
        assert_eq!(
            std::fs::read_to_string(dir.path().join(".onyo/templates/empty")).unwrap(),
            "---\n"
        );
        assert_eq!(inv.git().commit_count().unwrap(), 1);
        assert!(inv.git().is_clean().unwrap());
    }

    #[test]
    fn reinit_is_rejected() {
        let (dir, _inv) = scratch();
        let err = Inventory::init(dir.path()).unwrap_err();
        assert!(matches!(err, OnyoError::AlreadyARepository { .. }));
    }

    #[test]
    fn init_inside_enclosing_onyo_repo_is_rejected() {
        let (dir, _inv) = scratch();
        let nested = dir.path().join("sub");
        std::fs::create_dir(&nested).unwrap();
        let err = Inventory::init(&nested).unwrap_err();
        assert!(matches!(err, OnyoError::AlreadyARepository { .. }));
    }

    #[test]
    fn open_rejects_plain_git_repo() {
        let dir = tempfile::tempdir().unwrap();
        GitRepo::init(dir.path()).unwrap();
        let err = Inventory::open(dir.path()).unwrap_err();
        assert!(matches!(err, OnyoError::NotARepository { .. }));
    }

    #[test]
    fn open_rejects_unknown_version() {
        let (dir, inv) = scratch();
        inv.config()
            .set(inv.git(), KEY_REPO_VERSION, "99", WriteScope::Onyo)
            .unwrap();
        let err = Inventory::open(dir.path()).unwrap_err();
        assert!(matches!(err, OnyoError::UnknownRepoVersion { .. }));
    }

    #[test]
    fn view_classifies_tracked_paths() {
        let (_dir, inv) = scratch();
        let git = inv.git();
        git.write_file(Path::new("shelf/.anchor"), b"").unwrap();
        git.write_file(Path::new("shelf/laptop_apple_mbp.1"), b"---\n")
            .unwrap();
        git.write_file(Path::new("rack/.anchor"), b"").unwrap();
        git.write_file(Path::new("rack/server_dell_r640.2/.anchor"), b"")
            .unwrap();
        git.write_file(
            Path::new("rack/server_dell_r640.2/.onyo-asset-dir"),
            b"---\n",
        )
        .unwrap();
        git.stage(&[PathBuf::from(".")]).unwrap();
        git.commit("seed").unwrap();
        inv.invalidate();

        let view = inv.view().unwrap();
        assert!(view.is_dir(Path::new("")));
        assert!(view.is_dir(Path::new("shelf")));
        assert!(view.is_dir(Path::new("rack/server_dell_r640.2")));
        assert!(view.is_asset(Path::new("shelf/laptop_apple_mbp.1")));
        assert!(view.is_asset(Path::new("rack/server_dell_r640.2")));
        assert!(view.is_asset_dir(Path::new("rack/server_dell_r640.2")));
        assert!(!view.is_asset(Path::new("shelf/.anchor")));
        assert!(!view.is_dir(Path::new(".onyo")));
    }

    #[test]
    fn assets_under_respects_depth_and_exclude() {
        let (_dir, inv) = scratch();
        let git = inv.git();
        for p in ["a/.anchor", "a/b/.anchor"] {
            git.write_file(Path::new(p), b"").unwrap();
        }
        git.write_file(Path::new("a/x_y_z.1"), b"---\n").unwrap();
        git.write_file(Path::new("a/b/x_y_z.2"), b"---\n").unwrap();
        git.stage(&[PathBuf::from(".")]).unwrap();
        git.commit("seed").unwrap();
        inv.invalidate();

        let view = inv.view().unwrap();
        let all = view.assets_under(&[], &[], 0);
        assert_eq!(all.len(), 2);

        let shallow = view.assets_under(&[PathBuf::from("a")], &[], 1);
        assert_eq!(shallow, [PathBuf::from("a/x_y_z.1")]);

        let excluded = view.assets_under(&[], &[PathBuf::from("a/b")], 0);
        assert_eq!(excluded, [PathBuf::from("a/x_y_z.1")]);
    }

    #[test]
    fn load_document_reports_malformed_yaml() {
        let (_dir, inv) = scratch();
        let git = inv.git();
        git.write_file(Path::new("shelf/.anchor"), b"").unwrap();
        git.write_file(Path::new("shelf/x_y_z.1"), b"---\n- not a mapping\n")
            .unwrap();
        git.stage(&[PathBuf::from(".")]).unwrap();
        git.commit("seed").unwrap();
        inv.invalidate();

        let err = inv.load_document(Path::new("shelf/x_y_z.1")).unwrap_err();
        assert!(matches!(err, OnyoError::MalformedDocument { .. }));
    }

    #[test]
    fn template_lookup() {
        let (_dir, inv) = scratch();
        let doc = inv.template("empty").unwrap();
        assert!(doc.is_empty());
        let err = inv.template("missing").unwrap_err();
        assert!(matches!(err, OnyoError::TemplateNotFound { .. }));
    }

    #[test]
    fn fsck_clean_repo_has_no_problems() {
        let (_dir, inv) = scratch();
        assert!(inv.fsck().unwrap().is_empty());
    }

    #[test]
    fn fsck_reports_missing_anchor_and_bound_mismatch() {
        let (dir, inv) = scratch();
        let git = inv.git();
        git.write_file(Path::new("shelf/.anchor"), b"").unwrap();
        git.write_file(
            Path::new("shelf/laptop_apple_mbp.1"),
            b"---\ntype: laptop\nmake: lenovo\nmodel: mbp\nserial: 1\n",
        )
        .unwrap();
        git.stage(&[PathBuf::from(".")]).unwrap();
        git.commit("seed").unwrap();
        inv.invalidate();
        std::fs::create_dir(dir.path().join("unanchored")).unwrap();

        let problems = inv.fsck().unwrap();
        assert!(problems.iter().any(|p| p.contains("missing anchor")));
        assert!(problems
            .iter()
            .any(|p| p.contains("'make'") && p.contains("lenovo")));
    }

    #[test]
    fn is_inventory_path_guards_reserved_names() {
        let (_dir, inv) = scratch();
        assert!(inv.is_inventory_path(Path::new("shelf/laptop_a_b.1")));
        assert!(!inv.is_inventory_path(Path::new(".onyo/config")));
        assert!(!inv.is_inventory_path(Path::new("shelf/.anchor")));
        assert!(!inv.is_inventory_path(Path::new(".git/HEAD")));
        assert!(!inv.is_inventory_path(Path::new("a/.onyoignore")));
        assert!(!inv.is_inventory_path(Path::new("")));
    }
}
