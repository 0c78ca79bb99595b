//! The inventory transaction engine.
//!
//! A [`Transaction`] accumulates operations against a copy-on-write overlay
//! of the repository view. Each accepted operation has been validated
//! against the projected state (base view plus overlay), so by the time
//! [`commit`](Transaction::commit) runs, the batch is internally
//! consistent. Commit re-verifies the global invariants, materialises the
//! batch to disk in an order that never leaves the tree inconsistent
//! (directories, then writes, then renames, then removes), stages, and
//! produces exactly one commit. A batch that stages nothing is a
//! successful no-op.
//!
//! Any failure during materialisation triggers a best-effort rollback of
//! tracked files to HEAD; untracked leftovers are `fsck`'s to find.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};

use rand::thread_rng;
use tracing::debug;

use crate::consts::{ANCHOR_FILE_NAME, ASSET_DIR_FILE_NAME};
use crate::diff;
use crate::error::{OnyoError, Result};
use crate::name::{generate_faux_serial, NameTemplate, DEFAULT_FAUX_LENGTH, FAUX_SERIAL_PREFIX};
use crate::ops::{Operation, OperationKind, Section};
use crate::store::Document;
use crate::view::{Inventory, View};

/// How a commit message is put together.
#[derive(Clone, Debug, Default)]
pub struct CommitOptions {
    /// Verb for the generated subject; the dominant operation kind decides
    /// when unset.
    pub verb: Option<String>,
    /// User-supplied message paragraphs (`-m`, repeatable).
    pub paragraphs: Vec<String>,
    /// Generate the subject and operations summary. When off, the user
    /// paragraphs are the entire message and must not be empty.
    pub auto_message: bool,
}

impl CommitOptions {
    /// Auto-composed message with an explicit subject verb.
    #[must_use]
    pub fn with_verb(verb: &str) -> Self {
        Self {
            verb: Some(verb.to_owned()),
            paragraphs: vec![],
            auto_message: true,
        }
    }
}

/// Where an overlay asset's content comes from.
#[derive(Clone, Debug)]
enum AssetSource {
    /// In-memory document (new or rewritten).
    Doc(Document),
    /// Unchanged content that currently lives at another path (moves).
    FromPath(PathBuf),
}

#[derive(Debug, Default)]
struct Overlay {
    added_dirs: BTreeSet<PathBuf>,
    removed_dirs: BTreeSet<PathBuf>,
    added_assets: BTreeMap<PathBuf, AssetSource>,
    removed_assets: BTreeSet<PathBuf>,
    added_asset_dirs: BTreeSet<PathBuf>,
    removed_asset_dirs: BTreeSet<PathBuf>,
}

/// An open batch of inventory operations.
///
/// Dropping the transaction abandons it without side effects; only
/// [`commit`](Self::commit) touches the disk.
pub struct Transaction<'a> {
    inv: &'a Inventory,
    base: std::rc::Rc<View>,
    template: NameTemplate,
    ops: Vec<Operation>,
    overlay: Overlay,
}

impl<'a> Transaction<'a> {
    /// Open a transaction over the current repository view.
    pub fn new(inv: &'a Inventory) -> Result<Self> {
        Ok(Self {
            base: inv.view()?,
            template: inv.name_template()?,
            inv,
            ops: vec![],
            overlay: Overlay::default(),
        })
    }

    /// Whether any operations have been accepted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// The accepted operations, in push order.
    #[must_use]
    pub fn operations(&self) -> &[Operation] {
        &self.ops
    }

    // -----------------------------------------------------------------------
    // Projected state
    // -----------------------------------------------------------------------

    fn dir_exists(&self, path: &Path) -> bool {
        if path.as_os_str().is_empty() {
            return true;
        }
        if self.overlay.removed_dirs.contains(path) {
            return false;
        }
        self.base.is_dir(path) || self.overlay.added_dirs.contains(path)
    }

    fn asset_exists(&self, path: &Path) -> bool {
        if self.overlay.removed_assets.contains(path) {
            return false;
        }
        self.base.is_asset(path) || self.overlay.added_assets.contains_key(path)
    }

    fn is_asset_dir(&self, path: &Path) -> bool {
        if self.overlay.removed_asset_dirs.contains(path) {
            return false;
        }
        self.base.is_asset_dir(path) || self.overlay.added_asset_dirs.contains(path)
    }

    /// Whether anything (projected or on disk) occupies `path`.
    fn occupied(&self, path: &Path) -> bool {
        if self.dir_exists(path) || self.asset_exists(path) {
            return true;
        }
        // Untracked files on disk block the path too, unless the overlay
        // already vacated it.
        self.inv.git().exists(path)
            && !self.overlay.removed_assets.contains(path)
            && !self.overlay.removed_dirs.contains(path)
    }

    /// All projected asset paths.
    fn projected_assets(&self) -> BTreeSet<PathBuf> {
        let mut assets: BTreeSet<PathBuf> = self
            .base
            .assets
            .iter()
            .filter(|p| !self.overlay.removed_assets.contains(*p))
            .cloned()
            .collect();
        assets.extend(self.overlay.added_assets.keys().cloned());
        assets
    }

    /// All projected directory paths.
    fn projected_dirs(&self) -> BTreeSet<PathBuf> {
        let mut dirs: BTreeSet<PathBuf> = self
            .base
            .dirs
            .iter()
            .filter(|p| !self.overlay.removed_dirs.contains(*p))
            .cloned()
            .collect();
        dirs.extend(self.overlay.added_dirs.iter().cloned());
        dirs
    }

    /// Projected asset basenames (global uniqueness domain).
    fn projected_names(&self) -> HashSet<String> {
        self.projected_assets()
            .iter()
            .filter_map(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .collect()
    }

    /// The document of the asset at `path` in the projected state.
    pub fn asset_doc(&self, path: &Path) -> Result<Document> {
        match self.overlay.added_assets.get(path) {
            Some(AssetSource::Doc(doc)) => Ok(doc.clone()),
            Some(AssetSource::FromPath(src)) => self.inv.load_document(src),
            None => {
                if self.asset_exists(path) {
                    self.inv.load_document(path)
                } else {
                    Err(OnyoError::NoSuchAsset {
                        path: path.to_owned(),
                    })
                }
            }
        }
    }

    /// Projected items (assets and dirs) strictly below `path`, shallowest
    /// first.
    fn items_below(&self, path: &Path) -> (Vec<PathBuf>, Vec<PathBuf>) {
        let assets = self
            .projected_assets()
            .into_iter()
            .filter(|p| p.starts_with(path) && p != path)
            .collect();
        let dirs = self
            .projected_dirs()
            .into_iter()
            .filter(|p| p.starts_with(path) && p != path)
            .collect();
        (assets, dirs)
    }

    fn require_inventory_path(&self, path: &Path) -> Result<()> {
        if !self.inv.is_inventory_path(path) {
            return Err(OnyoError::InvalidOperation {
                reason: format!("'{}' is protected by onyo", path.display()),
            });
        }
        Ok(())
    }

    fn push(&mut self, op: Operation) {
        debug!(?op, "accepted operation");
        self.ops.push(op);
    }

    // -----------------------------------------------------------------------
    // Operations
    // -----------------------------------------------------------------------

    /// Create `path` (and any missing ancestors) as tracked directories.
    ///
    /// Returns `false` as a no-op when the directory already exists.
    pub fn add_directory(&mut self, path: &Path) -> Result<bool> {
        if self.dir_exists(path) {
            return Ok(false);
        }
        self.require_inventory_path(path)?;
        if self.occupied(path) {
            return Err(OnyoError::NameCollision {
                path: path.to_owned(),
            });
        }

        let mut missing: Vec<PathBuf> = path
            .ancestors()
            .filter(|p| !p.as_os_str().is_empty())
            .filter(|p| !self.dir_exists(p))
            .map(Path::to_path_buf)
            .collect();
        missing.reverse();
        for dir in missing {
            if self.asset_exists(&dir) {
                return Err(OnyoError::NameCollision { path: dir });
            }
            self.overlay.added_dirs.insert(dir.clone());
            self.push(Operation::NewDirectory { path: dir });
        }
        Ok(true)
    }

    /// Create an asset in `parent` from `doc`.
    ///
    /// The asset's name is generated from the document's bound fields; a
    /// missing (or literal `faux`) tail field gets a generated faux serial.
    /// Missing parent directories are created. Returns the new asset path.
    pub fn add_asset(&mut self, parent: &Path, mut doc: Document, as_dir: bool) -> Result<PathBuf> {
        self.fill_faux_serial(&mut doc)?;
        let name = self.template.generate(|field| doc.get_text(field))?;
        let path = parent.join(&name);
        self.require_inventory_path(&path)?;

        if self.projected_names().contains(&name) {
            return Err(OnyoError::NameCollision { path });
        }
        if self.occupied(&path) {
            return Err(OnyoError::NameCollision { path });
        }
        if !parent.as_os_str().is_empty() {
            self.add_directory(parent)?;
        }

        self.overlay.added_assets.insert(path.clone(), AssetSource::Doc(doc.clone()));
        if as_dir {
            self.overlay.added_dirs.insert(path.clone());
            self.overlay.added_asset_dirs.insert(path.clone());
        }
        self.push(Operation::NewAsset {
            path: path.clone(),
            doc,
            as_dir,
        });
        Ok(path)
    }

    /// Generate a faux serial into the tail field when it is absent, empty,
    /// or the literal `faux`.
    fn fill_faux_serial(&self, doc: &mut Document) -> Result<()> {
        let tail = self.template.tail_field().to_owned();
        let current = doc.get_text(&tail).unwrap_or_default();
        if !(current.is_empty() || current == FAUX_SERIAL_PREFIX) {
            return Ok(());
        }

        // Serials already in use, including pending ones.
        let taken: HashSet<String> = self
            .projected_assets()
            .iter()
            .filter_map(|p| p.file_name())
            .filter_map(|n| {
                self.template
                    .parse_name(&n.to_string_lossy())
                    .ok()
                    .and_then(|fields| fields.last().map(|(_, v)| v.clone()))
            })
            .collect();

        let serial = generate_faux_serial(&taken, DEFAULT_FAUX_LENGTH, &mut thread_rng())?;
        doc.set_scalar(&tail, &serial, false, false)
            .map_err(|e| OnyoError::InvalidOperation {
                reason: e.to_string(),
            })?;
        Ok(())
    }

    /// Replace the body of the asset at `path` with `new`.
    ///
    /// Changes to name-bound fields are rejected unless `allow_rename` is
    /// set, in which case the asset is renamed to match. Returns the asset's
    /// final path, or `None` when the modification is a no-op.
    pub fn modify_asset(
        &mut self,
        path: &Path,
        new: Document,
        allow_rename: bool,
    ) -> Result<Option<PathBuf>> {
        if !self.asset_exists(path) {
            return Err(OnyoError::NoSuchAsset {
                path: path.to_owned(),
            });
        }
        let old = self.asset_doc(path)?;
        if old.dump() == new.dump() {
            return Ok(None);
        }

        let changed_bound: Vec<String> = self
            .template
            .fields()
            .iter()
            .filter(|f| {
                old.get_text(f.as_str()).unwrap_or_default()
                    != new.get_text(f.as_str()).unwrap_or_default()
            })
            .cloned()
            .collect();

        if changed_bound.is_empty() {
            self.overlay
                .added_assets
                .insert(path.to_owned(), AssetSource::Doc(new.clone()));
            self.push(Operation::ModifyAsset {
                path: path.to_owned(),
                old,
                new,
            });
            return Ok(Some(path.to_owned()));
        }

        if !allow_rename {
            return Err(OnyoError::BoundKeyMutation {
                path: path.to_owned(),
                key: changed_bound[0].clone(),
            });
        }

        // Bound fields changed: rewrite content and rename in one batch.
        let name = self.template.generate(|field| new.get_text(field))?;
        let to = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default()
            .join(&name);

        if to == path {
            // The name happens to be unchanged (e.g. equivalent values).
            self.overlay
                .added_assets
                .insert(path.to_owned(), AssetSource::Doc(new.clone()));
            self.push(Operation::ModifyAsset {
                path: path.to_owned(),
                old,
                new,
            });
            return Ok(Some(path.to_owned()));
        }

        if self.projected_names().contains(&name) || self.occupied(&to) {
            return Err(OnyoError::NameCollision { path: to });
        }

        let non_bound_change = {
            let mut masked_old = old.clone();
            let mut masked_new = new.clone();
            for field in self.template.fields() {
                masked_old.unset(field);
                masked_new.unset(field);
            }
            masked_old.dump() != masked_new.dump()
        };
        if non_bound_change {
            self.push(Operation::ModifyAsset {
                path: path.to_owned(),
                old: old.clone(),
                new: new.clone(),
            });
        }

        let is_dir = self.is_asset_dir(path);
        self.overlay.removed_assets.insert(path.to_owned());
        self.overlay.added_assets.remove(path);
        self.overlay
            .added_assets
            .insert(to.clone(), AssetSource::Doc(new.clone()));
        if is_dir {
            self.overlay.removed_dirs.insert(path.to_owned());
            self.overlay.removed_asset_dirs.insert(path.to_owned());
            self.overlay.added_dirs.insert(to.clone());
            self.overlay.added_asset_dirs.insert(to.clone());
        }
        self.push(Operation::RenameAsset {
            from: path.to_owned(),
            to: to.clone(),
            old,
            doc: new,
            is_dir,
        });
        Ok(Some(to))
    }

    /// Move the asset at `src` into the directory `dst_dir`.
    pub fn move_asset(&mut self, src: &Path, dst_dir: &Path) -> Result<()> {
        if !self.asset_exists(src) {
            return Err(OnyoError::NoSuchAsset {
                path: src.to_owned(),
            });
        }
        if !self.dir_exists(dst_dir) {
            return Err(OnyoError::NoSuchDirectory {
                path: dst_dir.to_owned(),
            });
        }
        let parent = src.parent().map(Path::to_path_buf).unwrap_or_default();
        if parent == dst_dir {
            return Err(OnyoError::InvalidOperation {
                reason: format!(
                    "'{}' already is in '{}'",
                    src.display(),
                    display_root(dst_dir)
                ),
            });
        }
        let to = dst_dir.join(src.file_name().unwrap_or_default());
        if self.occupied(&to) {
            return Err(OnyoError::NameCollision { path: to });
        }

        let is_dir = self.is_asset_dir(src);
        self.overlay.removed_assets.insert(src.to_owned());
        self.overlay
            .added_assets
            .insert(to.clone(), AssetSource::FromPath(src.to_owned()));
        if is_dir {
            self.overlay.removed_dirs.insert(src.to_owned());
            self.overlay.removed_asset_dirs.insert(src.to_owned());
            self.overlay.added_dirs.insert(to.clone());
            self.overlay.added_asset_dirs.insert(to.clone());
        }
        self.push(Operation::MoveAsset {
            from: src.to_owned(),
            to,
            is_dir,
        });
        Ok(())
    }

    /// Move the directory at `src` to `dst` (the full destination path).
    ///
    /// `dst`'s parent must exist; everything under `src` is relocated.
    pub fn move_directory(&mut self, src: &Path, dst: &Path) -> Result<()> {
        if !self.dir_exists(src) || src.as_os_str().is_empty() {
            return Err(OnyoError::NoSuchDirectory {
                path: src.to_owned(),
            });
        }
        if self.is_asset_dir(src) {
            // Asset directories move as assets so their records carry both
            // aspects.
            let parent = dst.parent().map(Path::to_path_buf).unwrap_or_default();
            if dst.file_name() != src.file_name() {
                return Err(OnyoError::InvalidOperation {
                    reason: format!(
                        "'{}' is an asset; its name derives from content and cannot change on move",
                        src.display()
                    ),
                });
            }
            return self.move_asset(src, &parent);
        }
        self.require_inventory_path(dst)?;
        let dst_parent = dst.parent().map(Path::to_path_buf).unwrap_or_default();
        if !self.dir_exists(&dst_parent) {
            return Err(OnyoError::NoSuchDirectory { path: dst_parent });
        }
        if dst.starts_with(src) {
            return Err(OnyoError::InvalidOperation {
                reason: format!(
                    "cannot move '{}' into itself ('{}')",
                    src.display(),
                    dst.display()
                ),
            });
        }
        if self.occupied(dst) {
            return Err(OnyoError::NameCollision {
                path: dst.to_owned(),
            });
        }

        // Re-root everything beneath the source.
        let (assets, dirs) = self.items_below(src);
        for asset in assets {
            let relocated = dst.join(asset.strip_prefix(src).expect("asset is below src"));
            let source = match self.overlay.added_assets.remove(&asset) {
                Some(existing) => existing,
                None => AssetSource::FromPath(asset.clone()),
            };
            self.overlay.removed_assets.insert(asset.clone());
            self.overlay.added_assets.insert(relocated.clone(), source);
            if self.is_asset_dir(&asset) {
                self.overlay.removed_asset_dirs.insert(asset);
                self.overlay.added_asset_dirs.insert(relocated);
            }
        }
        for dir in dirs {
            let relocated = dst.join(dir.strip_prefix(src).expect("dir is below src"));
            self.overlay.removed_dirs.insert(dir);
            self.overlay.added_dirs.insert(relocated);
        }
        self.overlay.removed_dirs.insert(src.to_owned());
        self.overlay.added_dirs.insert(dst.to_owned());

        self.push(Operation::MoveDirectory {
            from: src.to_owned(),
            to: dst.to_owned(),
        });
        Ok(())
    }

    /// Remove the asset at `path`.
    ///
    /// An asset directory with contents requires `recursive`.
    pub fn remove_asset(&mut self, path: &Path, recursive: bool) -> Result<()> {
        if !self.asset_exists(path) {
            return Err(OnyoError::NoSuchAsset {
                path: path.to_owned(),
            });
        }
        let is_dir = self.is_asset_dir(path);
        if is_dir {
            self.remove_children(path, recursive)?;
            self.overlay.removed_dirs.insert(path.to_owned());
            self.overlay.removed_asset_dirs.insert(path.to_owned());
        }
        self.overlay.removed_assets.insert(path.to_owned());
        self.overlay.added_assets.remove(path);
        self.push(Operation::RemoveAsset {
            path: path.to_owned(),
            is_dir,
        });
        Ok(())
    }

    /// Remove the directory at `path`. Needs `recursive` when populated.
    pub fn remove_directory(&mut self, path: &Path, recursive: bool) -> Result<()> {
        if path.as_os_str().is_empty() {
            return Err(OnyoError::InvalidOperation {
                reason: "cannot remove the inventory root".to_owned(),
            });
        }
        if self.is_asset_dir(path) {
            return self.remove_asset(path, recursive);
        }
        if !self.dir_exists(path) {
            return Err(OnyoError::NoSuchDirectory {
                path: path.to_owned(),
            });
        }
        self.remove_children(path, recursive)?;
        self.overlay.removed_dirs.insert(path.to_owned());
        self.overlay.added_dirs.remove(path);
        self.push(Operation::RemoveDirectory {
            path: path.to_owned(),
        });
        Ok(())
    }

    /// Queue removals for everything below `path` (or fail with `NotEmpty`).
    fn remove_children(&mut self, path: &Path, recursive: bool) -> Result<()> {
        let (assets, dirs) = self.items_below(path);
        if !recursive && (!assets.is_empty() || !dirs.is_empty()) {
            return Err(OnyoError::NotEmpty {
                path: path.to_owned(),
            });
        }

        // Assets first, then directories deepest-first, so removal order in
        // the commit phase never deletes a parent before its children.
        for asset in &assets {
            if self.asset_exists(asset) {
                let is_dir = self.is_asset_dir(asset);
                if is_dir {
                    self.overlay.removed_dirs.insert(asset.clone());
                    self.overlay.removed_asset_dirs.insert(asset.clone());
                }
                self.overlay.removed_assets.insert(asset.clone());
                self.overlay.added_assets.remove(asset);
                self.push(Operation::RemoveAsset {
                    path: asset.clone(),
                    is_dir,
                });
            }
        }
        let mut dirs: Vec<PathBuf> = dirs
            .into_iter()
            .filter(|d| self.dir_exists(d) && !self.overlay.removed_dirs.contains(d))
            .collect();
        dirs.sort_by_key(|d| std::cmp::Reverse(d.components().count()));
        for dir in dirs {
            self.overlay.removed_dirs.insert(dir.clone());
            self.overlay.added_dirs.remove(&dir);
            self.push(Operation::RemoveDirectory { path: dir });
        }
        Ok(())
    }

    /// Turn the asset file at `path` into an asset directory.
    pub fn convert_to_asset_dir(&mut self, path: &Path) -> Result<bool> {
        if !self.asset_exists(path) {
            return Err(OnyoError::NoSuchAsset {
                path: path.to_owned(),
            });
        }
        if self.is_asset_dir(path) {
            return Ok(false);
        }
        let doc = self.asset_doc(path)?;
        self.overlay.added_dirs.insert(path.to_owned());
        self.overlay.added_asset_dirs.insert(path.to_owned());
        self.push(Operation::ConvertToAssetDir {
            path: path.to_owned(),
            doc,
        });
        Ok(true)
    }

    /// Turn the asset directory at `path` back into a file. The directory
    /// aspect must be empty.
    pub fn convert_from_asset_dir(&mut self, path: &Path) -> Result<bool> {
        if !self.asset_exists(path) {
            return Err(OnyoError::NoSuchAsset {
                path: path.to_owned(),
            });
        }
        if !self.is_asset_dir(path) {
            return Ok(false);
        }
        let (assets, dirs) = self.items_below(path);
        if !assets.is_empty() || !dirs.is_empty() {
            return Err(OnyoError::NotEmpty {
                path: path.to_owned(),
            });
        }
        let doc = self.asset_doc(path)?;
        self.overlay.removed_dirs.insert(path.to_owned());
        self.overlay.removed_asset_dirs.insert(path.to_owned());
        self.push(Operation::ConvertFromAssetDir {
            path: path.to_owned(),
            doc,
        });
        Ok(true)
    }

    // -----------------------------------------------------------------------
    // Rendering
    // -----------------------------------------------------------------------

    /// Human-reviewable diff of the whole batch, ending with the grouped
    /// operations summary.
    #[must_use]
    pub fn render_diff(&self) -> String {
        let mut out = String::new();
        for op in &self.ops {
            match op {
                Operation::NewAsset { path, doc, .. } => {
                    out.push_str(&format!("+++ {}\n", path.display()));
                    out.push_str(&diff::unified("", &doc.dump(), 3));
                    out.push('\n');
                }
                Operation::ModifyAsset { path, old, new } => {
                    out.push_str(&format!("--- {0}\n+++ {0}\n", path.display()));
                    out.push_str(&diff::unified(&old.dump(), &new.dump(), 3));
                    out.push('\n');
                }
                Operation::RenameAsset { from, to, old, doc, .. } => {
                    out.push_str(&format!("--- {}\n+++ {}\n", from.display(), to.display()));
                    out.push_str(&diff::unified(&old.dump(), &doc.dump(), 3));
                    out.push('\n');
                }
                Operation::MoveAsset { from, to, .. }
                | Operation::MoveDirectory { from, to } => {
                    out.push_str(&format!("move: {} -> {}\n\n", from.display(), to.display()));
                }
                Operation::NewDirectory { path } => {
                    out.push_str(&format!("new directory: {}\n\n", path.display()));
                }
                Operation::RemoveAsset { path, .. } => {
                    out.push_str(&format!("remove asset: {}\n\n", path.display()));
                }
                Operation::RemoveDirectory { path } => {
                    out.push_str(&format!("remove directory: {}\n\n", path.display()));
                }
                Operation::ConvertToAssetDir { path, .. } => {
                    out.push_str(&format!("asset file -> asset directory: {}\n\n", path.display()));
                }
                Operation::ConvertFromAssetDir { path, .. } => {
                    out.push_str(&format!("asset directory -> asset file: {}\n\n", path.display()));
                }
            }
        }
        out.push_str(&self.summary());
        out
    }

    /// The grouped Inventory Operations summary block.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut sections: BTreeMap<Section, BTreeSet<String>> = BTreeMap::new();
        for op in &self.ops {
            for (section, line) in op.records() {
                sections.entry(section).or_default().insert(line);
            }
        }

        let mut out = String::from("--- Inventory Operations ---\n");
        for section in Section::all() {
            if let Some(lines) = sections.get(&section) {
                out.push('\n');
                out.push_str(section.title());
                out.push('\n');
                for line in lines {
                    out.push_str(line);
                    out.push('\n');
                }
            }
        }
        out
    }

    fn build_message(&self, opts: &CommitOptions) -> Result<String> {
        if !opts.auto_message {
            if opts.paragraphs.is_empty() {
                return Err(OnyoError::InvalidOperation {
                    reason: "a commit message is required when auto-composition is off".to_owned(),
                });
            }
            return Ok(opts.paragraphs.join("\n\n"));
        }

        // Dominant operation kind decides the verb unless the caller set one.
        let mut counts: HashMap<OperationKind, usize> = HashMap::new();
        for op in &self.ops {
            *counts.entry(op.kind()).or_insert(0) += 1;
        }
        let dominant = counts
            .iter()
            .max_by_key(|(kind, count)| (**count, std::cmp::Reverse(**kind)))
            .map(|(kind, _)| *kind)
            .unwrap_or(OperationKind::Modify);
        let verb = opts
            .verb
            .clone()
            .unwrap_or_else(|| dominant.verb().to_owned());

        let names: BTreeSet<String> = self
            .ops
            .iter()
            .filter(|op| opts.verb.is_some() || op.kind() == dominant)
            .flat_map(Operation::affected_names)
            .filter(|n| !n.is_empty())
            .collect();
        let subject = format!(
            "{verb} [{}]: {}",
            names.len(),
            names.into_iter().collect::<Vec<_>>().join(",")
        );

        let mut message = format!("{subject}\n\n{}", self.summary());
        for paragraph in &opts.paragraphs {
            message.push('\n');
            message.push_str(paragraph);
            message.push('\n');
        }
        Ok(message)
    }

    // -----------------------------------------------------------------------
    // Commit
    // -----------------------------------------------------------------------

    /// Re-check the global invariants over the projected state.
    fn verify(&self) -> Result<()> {
        let mut seen: HashSet<String> = HashSet::new();
        for asset in self.projected_assets() {
            let name = asset
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            if !seen.insert(name) {
                return Err(OnyoError::NameCollision { path: asset });
            }
        }

        for (path, source) in &self.overlay.added_assets {
            let AssetSource::Doc(doc) = source else {
                continue;
            };
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            for (field, value) in self.template.parse_name(&name)? {
                let stored = doc.get_text(&field).unwrap_or_default();
                if stored != value {
                    return Err(OnyoError::BoundKeyMutation {
                        path: path.clone(),
                        key: field,
                    });
                }
            }
        }
        Ok(())
    }

    /// The file holding the asset body at `path` in its *current* on-disk
    /// shape.
    fn body_file(&self, path: &Path) -> PathBuf {
        if self.base.is_asset_dir(path) {
            path.join(ASSET_DIR_FILE_NAME)
        } else {
            path.to_owned()
        }
    }

    /// Materialise the batch: directories, writes, renames, removes.
    fn apply_to_disk(&self) -> Result<Vec<PathBuf>> {
        let git = self.inv.git();
        let mut touched: Vec<PathBuf> = vec![];
        let anchor = Path::new(ANCHOR_FILE_NAME);

        // Directories (and conversions that grow a directory).
        for op in &self.ops {
            match op {
                Operation::NewDirectory { path } => {
                    git.create_dir(path)?;
                    let a = path.join(anchor);
                    git.write_file(&a, b"")?;
                    touched.push(a);
                }
                Operation::NewAsset {
                    path, as_dir: true, ..
                } => {
                    git.create_dir(path)?;
                    let a = path.join(anchor);
                    git.write_file(&a, b"")?;
                    touched.push(a);
                }
                Operation::ConvertToAssetDir { path, doc } => {
                    git.remove(path)?;
                    git.create_dir(path)?;
                    let a = path.join(anchor);
                    git.write_file(&a, b"")?;
                    let body = path.join(ASSET_DIR_FILE_NAME);
                    git.write_file(&body, doc.dump().as_bytes())?;
                    touched.push(a);
                    touched.push(body);
                }
                _ => {}
            }
        }

        // Content writes.
        for op in &self.ops {
            match op {
                Operation::NewAsset { path, doc, as_dir } => {
                    let file = if *as_dir {
                        path.join(ASSET_DIR_FILE_NAME)
                    } else {
                        path.clone()
                    };
                    git.write_file(&file, doc.dump().as_bytes())?;
                    touched.push(file);
                }
                Operation::ModifyAsset { path, new, .. } => {
                    let file = self.body_file(path);
                    git.write_file(&file, new.dump().as_bytes())?;
                    touched.push(file);
                }
                Operation::RenameAsset { from, doc, .. } => {
                    let file = self.body_file(from);
                    git.write_file(&file, doc.dump().as_bytes())?;
                    touched.push(file);
                }
                _ => {}
            }
        }

        // Stage all writes now: renames below relocate some of the written
        // paths, after which the old pathspecs would no longer resolve.
        git.stage(&touched)?;
        touched.clear();

        // Renames and moves (history preserving, self-staging).
        for op in &self.ops {
            match op {
                Operation::RenameAsset { from, to, .. }
                | Operation::MoveAsset { from, to, .. }
                | Operation::MoveDirectory { from, to } => {
                    git.rename(from, to)?;
                }
                _ => {}
            }
        }

        // Removes (children were queued before their parents).
        for op in &self.ops {
            match op {
                Operation::RemoveAsset { path, .. } | Operation::RemoveDirectory { path } => {
                    git.remove(path)?;
                }
                Operation::ConvertFromAssetDir { path, doc } => {
                    git.remove(path)?;
                    git.write_file(path, doc.dump().as_bytes())?;
                    touched.push(path.clone());
                }
                _ => {}
            }
        }

        Ok(touched)
    }

    /// Validate, materialise, stage, and commit the batch.
    ///
    /// Returns the new commit id, or `None` when the batch reduced to a
    /// no-op. The transaction is consumed either way.
    pub fn commit(self, opts: &CommitOptions) -> Result<Option<String>> {
        if self.ops.is_empty() {
            return Ok(None);
        }

        let changes = self.inv.git().status_lines()?;
        if !changes.is_empty() {
            return Err(OnyoError::DirtyWorkingTree { changes });
        }

        self.verify()?;
        let message = self.build_message(opts)?;

        let touched = match self.apply_to_disk() {
            Ok(touched) => touched,
            Err(e) => {
                let _ = self.inv.git().checkout_head();
                return Err(e);
            }
        };

        let outcome = (|| {
            self.inv.git().stage(&touched)?;
            self.inv.git().commit(&message)
        })();

        match outcome {
            Ok(commit_id) => {
                self.inv.invalidate();
                Ok(commit_id)
            }
            Err(e) => {
                let _ = self.inv.git().checkout_head();
                Err(e.into())
            }
        }
    }
}

fn display_root(path: &Path) -> String {
    if path.as_os_str().is_empty() {
        ".".to_owned()
    } else {
        path.display().to_string()
    }
}
