//! Read-only matcher over assets.
//!
//! `get`-style queries: path scoping (include/exclude, depth), AND-combined
//! `key=regex` predicates, dotted-key projection, and a stable multi-key
//! natural sort. Per-asset read errors are collected, not fatal: a broken
//! document costs one row, never the whole query.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use regex::Regex;

use crate::consts::{TAG_DICT, TAG_LIST, TAG_UNSET};
use crate::error::{OnyoError, Result};
use crate::store::{Document, Node};
use crate::view::Inventory;

/// Direction of one sort key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// Which inventory items a query returns.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ItemType {
    Assets,
    Directories,
}

/// One `key=pattern` predicate.
#[derive(Clone, Debug)]
pub struct MatchExpr {
    pub key: String,
    pattern: MatchPattern,
}

#[derive(Clone, Debug)]
enum MatchPattern {
    /// Unanchored regular expression over the rendered value.
    Regex(Regex),
    /// The key must be absent.
    Unset,
    /// The key must hold a mapping.
    Dict,
    /// The key must hold a list.
    List,
}

impl MatchExpr {
    /// Parse a `key=value` predicate. The value is a regular expression
    /// unless it is one of the reserved literals `[unset]`, `[dict]`,
    /// `[list]`.
    pub fn parse(raw: &str) -> Result<Self> {
        let (key, value) = raw.split_once('=').ok_or_else(|| OnyoError::InvalidOperation {
            reason: format!("match expressions take the form key=value, got '{raw}'"),
        })?;
        if key.is_empty() {
            return Err(OnyoError::InvalidOperation {
                reason: format!("match expression '{raw}' has an empty key"),
            });
        }
        let pattern = match value {
            v if v == TAG_UNSET => MatchPattern::Unset,
            v if v == TAG_DICT => MatchPattern::Dict,
            v if v == TAG_LIST => MatchPattern::List,
            v => MatchPattern::Regex(Regex::new(v).map_err(|e| OnyoError::InvalidOperation {
                reason: format!("invalid regex in '{raw}': {e}"),
            })?),
        };
        Ok(Self {
            key: key.to_owned(),
            pattern,
        })
    }

    fn matches(&self, value: &Resolved) -> bool {
        match (&self.pattern, value) {
            (MatchPattern::Unset, Resolved::Missing) => true,
            (MatchPattern::Unset, _) => false,
            (MatchPattern::Dict, Resolved::Dict) => true,
            (MatchPattern::Dict, _) => false,
            (MatchPattern::List, Resolved::List) => true,
            (MatchPattern::List, _) => false,
            (MatchPattern::Regex(_), Resolved::Missing) => false,
            (MatchPattern::Regex(re), present) => re.is_match(&present.render()),
        }
    }
}

/// A `get` request.
#[derive(Clone, Debug)]
pub struct Query {
    /// Include roots (repo-relative); empty means the whole inventory.
    pub include: Vec<PathBuf>,
    /// Excluded subtrees; exclusion wins over inclusion.
    pub exclude: Vec<PathBuf>,
    /// Depth bound under each include root; 0 is unlimited.
    pub depth: usize,
    /// AND-combined predicates.
    pub matches: Vec<MatchExpr>,
    /// Projected (possibly dotted) keys, in output order.
    pub keys: Vec<String>,
    /// Sort keys with direction; applied as one stable multi-key sort.
    pub sort: Vec<(String, SortOrder)>,
    /// Item types to consider.
    pub types: Vec<ItemType>,
}

impl Default for Query {
    fn default() -> Self {
        Self {
            include: vec![],
            exclude: vec![],
            depth: 0,
            matches: vec![],
            keys: vec![],
            sort: vec![],
            types: vec![ItemType::Assets],
        }
    }
}

/// One output row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Row {
    /// The item's repo-relative path.
    pub path: PathBuf,
    /// Rendered values of the projected keys, in query order.
    pub values: Vec<String>,
}

/// Query results plus non-fatal per-item errors.
#[derive(Clone, Debug, Default)]
pub struct QueryOutput {
    pub rows: Vec<Row>,
    pub errors: Vec<String>,
}

/// A resolved key value, before rendering.
enum Resolved {
    Missing,
    Dict,
    List,
    Text(String),
}

impl Resolved {
    fn render(&self) -> String {
        match self {
            Self::Missing => TAG_UNSET.to_owned(),
            Self::Dict => TAG_DICT.to_owned(),
            Self::List => TAG_LIST.to_owned(),
            Self::Text(t) if t.is_empty() => TAG_UNSET.to_owned(),
            Self::Text(t) => t.clone(),
        }
    }
}

/// Resolve a key against an item. `path` and `directory` are pseudo-keys
/// derived from the item's location; everything else is a dotted read of
/// the document.
fn resolve(path: &Path, doc: Option<&Document>, key: &str) -> Resolved {
    match key {
        "path" => Resolved::Text(path.display().to_string()),
        "directory" => Resolved::Text(
            path.parent()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
        ),
        _ => match doc.and_then(|d| d.get(key)) {
            None => Resolved::Missing,
            Some(Node::Map(_)) => Resolved::Dict,
            Some(Node::List(_)) => Resolved::List,
            Some(Node::Scalar(s)) => Resolved::Text(s.text()),
        },
    }
}

/// Run a query against the repository view.
pub fn run(inv: &Inventory, query: &Query) -> Result<QueryOutput> {
    let view = inv.view()?;
    let mut out = QueryOutput::default();

    let mut items: Vec<(PathBuf, Option<Document>)> = vec![];
    if query.types.contains(&ItemType::Assets) {
        for path in view.assets_under(&query.include, &query.exclude, query.depth) {
            match inv.load_document(&path) {
                Ok(doc) => items.push((path, Some(doc))),
                Err(e) => out.errors.push(e.to_string()),
            }
        }
    }
    if query.types.contains(&ItemType::Directories) {
        for path in view.dirs_under(&query.include, &query.exclude, query.depth) {
            if view.is_asset_dir(&path) {
                continue; // already listed as an asset
            }
            items.push((path, None));
        }
    }

    let mut matched: Vec<(PathBuf, Option<Document>)> = items
        .into_iter()
        .filter(|(path, doc)| {
            query
                .matches
                .iter()
                .all(|m| m.matches(&resolve(path, doc.as_ref(), &m.key)))
        })
        .collect();

    // Stable multi-key sort: apply keys in reverse so the first key is the
    // primary one.
    for (key, order) in query.sort.iter().rev() {
        matched.sort_by(|(pa, da), (pb, db)| {
            let va = resolve(pa, da.as_ref(), key).render();
            let vb = resolve(pb, db.as_ref(), key).render();
            let ordering = natural_cmp(&va, &vb);
            match order {
                SortOrder::Ascending => ordering,
                SortOrder::Descending => ordering.reverse(),
            }
        });
    }

    out.rows = matched
        .into_iter()
        .map(|(path, doc)| Row {
            values: query
                .keys
                .iter()
                .map(|k| resolve(&path, doc.as_ref(), k).render())
                .collect(),
            path,
        })
        .collect();
    Ok(out)
}

/// Version-aware ordering: digit runs compare numerically, everything else
/// byte-wise ('5' < '300', 'a9' < 'a10').
#[must_use]
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut ca = a.chars().peekable();
    let mut cb = b.chars().peekable();

    loop {
        match (ca.peek().copied(), cb.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => {
                if x.is_ascii_digit() && y.is_ascii_digit() {
                    let mut na = String::new();
                    while ca.peek().is_some_and(char::is_ascii_digit) {
                        na.push(ca.next().expect("peeked"));
                    }
                    let mut nb = String::new();
                    while cb.peek().is_some_and(char::is_ascii_digit) {
                        nb.push(cb.next().expect("peeked"));
                    }
                    let va: u128 = na.trim_start_matches('0').parse().unwrap_or(0);
                    let vb: u128 = nb.trim_start_matches('0').parse().unwrap_or(0);
                    match va.cmp(&vb).then_with(|| na.len().cmp(&nb.len())) {
                        Ordering::Equal => {}
                        other => return other,
                    }
                } else {
                    match x.cmp(&y) {
                        Ordering::Equal => {
                            ca.next();
                            cb.next();
                        }
                        other => return other,
                    }
                }
            }
        }
    }
}
