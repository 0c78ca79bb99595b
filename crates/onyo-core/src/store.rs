//! Round-trip YAML document store.
//!
//! Asset bodies are YAML mappings whose exact written form matters: key
//! order, scalar quoting, and comments must survive a load/dump cycle so
//! that touching one key never rewrites the rest of the file. None of the
//! serde-based YAML crates keep that information, so the store carries its
//! own document model: every scalar remembers its verbatim text, every
//! entry its leading comment lines and trailing inline comment, and every
//! block its indentation.
//!
//! `dump(load(x)) == x` holds for well-formed documents apart from trailing
//! whitespace and the normalisation of the leading `---` marker.

use std::fmt;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// A document failed to parse.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseError {
    /// 1-based line number of the offending line.
    pub line: usize,
    /// What went wrong.
    pub message: String,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

impl std::error::Error for ParseError {}

/// A patch could not be applied to a document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PatchError {
    /// An intermediate key exists but is not a mapping.
    NotAMapping { key: String },
    /// An intermediate key is missing and creation was not requested.
    MissingParent { key: String },
    /// The target key holds a mapping or list and replacement was not
    /// requested.
    CompositeExists { key: String },
}

impl fmt::Display for PatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAMapping { key } => write!(f, "'{key}' is not a dictionary"),
            Self::MissingParent { key } => write!(f, "'{key}' does not exist"),
            Self::CompositeExists { key } => {
                write!(f, "'{key}' holds a dictionary or list; refusing to overwrite")
            }
        }
    }
}

impl std::error::Error for PatchError {}

// ---------------------------------------------------------------------------
// Value — the typed view of a scalar
// ---------------------------------------------------------------------------

/// Typed interpretation of a scalar's written text.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

// ---------------------------------------------------------------------------
// Nodes
// ---------------------------------------------------------------------------

/// A scalar, stored verbatim as written (quotes, spacing, block indicators).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Scalar {
    /// Text after the `:` or `-` separator, right-trimmed. Multi-line for
    /// block scalars. Empty means null.
    raw: String,
}

impl Scalar {
    /// A scalar from plain text, quoted only when the text would otherwise
    /// be misread.
    #[must_use]
    pub fn from_text(text: &str) -> Self {
        Self {
            raw: format!(" {}", quote_if_needed(text)),
        }
    }

    /// The null scalar (`key:` with no value).
    #[must_use]
    pub const fn null() -> Self {
        Self { raw: String::new() }
    }

    /// The unquoted, trimmed text of the scalar.
    #[must_use]
    pub fn text(&self) -> String {
        let t = self.raw.trim();
        if t.len() >= 2 && t.starts_with('"') && t.ends_with('"') {
            unescape_double(&t[1..t.len() - 1])
        } else if t.len() >= 2 && t.starts_with('\'') && t.ends_with('\'') {
            t[1..t.len() - 1].replace("''", "'")
        } else if let Some(rest) = t.strip_prefix('|').or_else(|| t.strip_prefix('>')) {
            // Block scalar: drop the indicator line, dedent the body.
            let body = rest.split_once('\n').map_or("", |(_, b)| b);
            let dedent = body
                .lines()
                .filter(|l| !l.trim().is_empty())
                .map(|l| l.len() - l.trim_start().len())
                .min()
                .unwrap_or(0);
            body.lines()
                .map(|l| if l.len() >= dedent { &l[dedent..] } else { l })
                .collect::<Vec<_>>()
                .join("\n")
        } else {
            t.to_owned()
        }
    }

    /// The typed value of the scalar.
    #[must_use]
    pub fn value(&self) -> Value {
        let t = self.raw.trim();
        if t.starts_with('"') || t.starts_with('\'') {
            return Value::Str(self.text());
        }
        match t {
            "" | "~" | "null" | "Null" | "NULL" => Value::Null,
            "true" | "True" | "TRUE" => Value::Bool(true),
            "false" | "False" | "FALSE" => Value::Bool(false),
            _ => {
                if let Ok(i) = t.parse::<i64>() {
                    // Leading zeros stay strings ("0123" is a serial, not 123).
                    if t == i.to_string() {
                        return Value::Int(i);
                    }
                } else if let Ok(f) = t.parse::<f64>() {
                    return Value::Float(f);
                }
                Value::Str(self.text())
            }
        }
    }
}

/// A document node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Node {
    Scalar(Scalar),
    Map(Map),
    List(List),
}

impl Node {
    /// Whether the node is a mapping.
    #[must_use]
    pub const fn is_map(&self) -> bool {
        matches!(self, Self::Map(_))
    }

    /// Whether the node is a list.
    #[must_use]
    pub const fn is_list(&self) -> bool {
        matches!(self, Self::List(_))
    }

    /// The scalar behind this node, if any.
    #[must_use]
    pub const fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Self::Scalar(s) => Some(s),
            _ => None,
        }
    }
}

/// One `key: value` entry with its surrounding comments.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entry {
    /// Verbatim comment and blank lines preceding the key.
    leading: Vec<String>,
    /// The key exactly as written (possibly quoted).
    key_raw: String,
    /// The value.
    value: Node,
    /// Trailing comment on the key line, including its leading spaces and `#`.
    inline: Option<String>,
}

impl Entry {
    fn new(key: &str, value: Node) -> Self {
        Self {
            leading: vec![],
            key_raw: key.to_owned(),
            value,
            inline: None,
        }
    }

    /// The logical (unquoted, trimmed) key name.
    #[must_use]
    pub fn key(&self) -> String {
        let t = self.key_raw.trim();
        if t.len() >= 2
            && ((t.starts_with('"') && t.ends_with('"'))
                || (t.starts_with('\'') && t.ends_with('\'')))
        {
            t[1..t.len() - 1].to_owned()
        } else {
            t.to_owned()
        }
    }

    /// The entry's value node.
    #[must_use]
    pub const fn node(&self) -> &Node {
        &self.value
    }
}

/// An ordered mapping block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Map {
    indent: usize,
    entries: Vec<Entry>,
}

impl Map {
    const fn new(indent: usize) -> Self {
        Self {
            indent,
            entries: vec![],
        }
    }

    /// Entries in document order.
    #[must_use]
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Whether the mapping has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn find(&self, key: &str) -> Option<&Entry> {
        self.entries.iter().find(|e| e.key() == key)
    }

    fn find_mut(&mut self, key: &str) -> Option<&mut Entry> {
        self.entries.iter_mut().find(|e| e.key() == key)
    }
}

/// A sequence block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct List {
    indent: usize,
    items: Vec<ListItem>,
}

impl List {
    /// Item nodes in document order.
    #[must_use]
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.items.iter().map(|i| &i.value)
    }

    /// Number of items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the list has no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct ListItem {
    leading: Vec<String>,
    value: Node,
    inline: Option<String>,
}

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

/// A parsed YAML document whose top level is a mapping.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Document {
    root: Map,
    /// Comment/blank lines after the last entry.
    trailing: Vec<String>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// An empty document (`---` only).
    #[must_use]
    pub const fn new() -> Self {
        Self {
            root: Map {
                indent: 0,
                entries: vec![],
            },
            trailing: vec![],
        }
    }

    /// Parse a document, preserving order, comments, and scalar styles.
    ///
    /// # Errors
    /// [`ParseError`] when the text is not parseable or the top level is not
    /// a mapping.
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        Parser::new(text).document()
    }

    /// Render the document with a leading `---` marker.
    #[must_use]
    pub fn dump(&self) -> String {
        let mut out = String::from("---\n");
        emit_map(&self.root, &mut out);
        for line in &self.trailing {
            out.push_str(line);
            out.push('\n');
        }
        out
    }

    /// Whether the document has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// The top-level mapping.
    #[must_use]
    pub const fn root(&self) -> &Map {
        &self.root
    }

    /// Look up a (possibly dotted) key.
    #[must_use]
    pub fn get(&self, dotted: &str) -> Option<&Node> {
        let mut map = &self.root;
        let mut parts = dotted.split('.').peekable();
        loop {
            let part = parts.next()?;
            let entry = map.find(part)?;
            if parts.peek().is_none() {
                return Some(&entry.value);
            }
            match &entry.value {
                Node::Map(m) => map = m,
                _ => return None,
            }
        }
    }

    /// The trimmed scalar text at a dotted key, if it holds a scalar.
    #[must_use]
    pub fn get_text(&self, dotted: &str) -> Option<String> {
        self.get(dotted)?.as_scalar().map(Scalar::text)
    }

    /// All leaf keys in dotted notation, in document order.
    ///
    /// Keys holding mappings are traversed, not yielded.
    #[must_use]
    pub fn flat_keys(&self) -> Vec<String> {
        fn walk(map: &Map, prefix: &str, out: &mut Vec<String>) {
            for entry in &map.entries {
                let key = if prefix.is_empty() {
                    entry.key()
                } else {
                    format!("{prefix}.{}", entry.key())
                };
                match &entry.value {
                    Node::Map(m) => walk(m, &key, out),
                    _ => out.push(key),
                }
            }
        }
        let mut out = vec![];
        walk(&self.root, "", &mut out);
        out
    }

    /// Set a dotted key to a scalar value.
    ///
    /// Intermediate mappings are created only when `create_parents` is set.
    /// Overwriting a mapping or list (at any level) requires `replace`.
    ///
    /// # Errors
    /// [`PatchError`] when a parent is missing or a composite is in the way.
    pub fn set_scalar(
        &mut self,
        dotted: &str,
        text: &str,
        create_parents: bool,
        replace: bool,
    ) -> Result<(), PatchError> {
        let parts: Vec<&str> = dotted.split('.').collect();
        let mut map = &mut self.root;
        let mut traversed = String::new();

        for part in parts[..parts.len() - 1].iter().copied() {
            if !traversed.is_empty() {
                traversed.push('.');
            }
            traversed.push_str(part);

            let exists = map.find(part).is_some();
            let child_indent = map.indent + 2;
            if !exists {
                if !create_parents {
                    return Err(PatchError::MissingParent {
                        key: traversed.clone(),
                    });
                }
                let child = Map::new(child_indent);
                map.entries.push(Entry::new(part, Node::Map(child)));
            }

            let entry = map.find_mut(part).expect("entry exists or was just added");
            match &mut entry.value {
                Node::Map(_) => {}
                _ if replace => {
                    entry.value = Node::Map(Map::new(child_indent));
                }
                _ => {
                    return Err(PatchError::NotAMapping {
                        key: traversed.clone(),
                    })
                }
            }
            map = match &mut entry.value {
                Node::Map(m) => m,
                _ => unreachable!(),
            };
        }

        let last = parts[parts.len() - 1];
        match map.find_mut(last) {
            Some(entry) => {
                if !matches!(entry.value, Node::Scalar(_)) && !replace {
                    return Err(PatchError::CompositeExists {
                        key: dotted.to_owned(),
                    });
                }
                entry.value = Node::Scalar(Scalar::from_text(text));
            }
            None => {
                map.entries
                    .push(Entry::new(last, Node::Scalar(Scalar::from_text(text))));
            }
        }
        Ok(())
    }

    /// Remove a dotted key. Returns `false` (a no-op) when the key is absent.
    pub fn unset(&mut self, dotted: &str) -> bool {
        fn remove(map: &mut Map, parts: &[&str]) -> bool {
            if parts.len() == 1 {
                let before = map.entries.len();
                map.entries.retain(|e| e.key() != parts[0]);
                return map.entries.len() != before;
            }
            match map.find_mut(parts[0]) {
                Some(Entry {
                    value: Node::Map(m),
                    ..
                }) => remove(m, &parts[1..]),
                _ => false,
            }
        }
        let parts: Vec<&str> = dotted.split('.').collect();
        remove(&mut self.root, &parts)
    }
}

// ---------------------------------------------------------------------------
// Scalar formatting helpers
// ---------------------------------------------------------------------------

fn quote_if_needed(text: &str) -> String {
    if text.is_empty() {
        return "''".to_owned();
    }
    let needs_quotes = text.starts_with(|c: char| c.is_whitespace() || "#&*!|>%@`\"'".contains(c))
        || text.ends_with(char::is_whitespace)
        || text.contains(": ")
        || text.ends_with(':')
        || text.contains(" #")
        || text.starts_with('-') && text.len() > 1 && text.as_bytes()[1] == b' '
        || text.starts_with('[')
        || text.starts_with('{')
        || text.contains('\n');
    if needs_quotes {
        format!("\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        text.to_owned()
    }
}

fn unescape_double(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some(other) => out.push(other),
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

struct Parser {
    lines: Vec<String>,
    pos: usize,
}

fn is_blank_or_comment(line: &str) -> bool {
    let t = line.trim();
    t.is_empty() || t.starts_with('#')
}

/// Split a value segment into (code, inline comment). The comment starts at
/// the first `#` outside quotes that is preceded by whitespace (or begins
/// the segment).
fn split_comment(segment: &str) -> (&str, Option<&str>) {
    let bytes = segment.as_bytes();
    let mut in_single = false;
    let mut in_double = false;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\'' if !in_double => in_single = !in_single,
            b'"' if !in_single => in_double = !in_double,
            b'\\' if in_double => i += 1,
            b'#' if !in_single && !in_double => {
                let preceded_by_space = i == 0 || bytes[i - 1].is_ascii_whitespace();
                if preceded_by_space {
                    // Include the gap before the `#` in the comment so it
                    // round-trips byte-exactly.
                    let start = segment[..i].trim_end().len();
                    return (&segment[..start], Some(&segment[start..]));
                }
            }
            _ => {}
        }
        i += 1;
    }
    (segment, None)
}

/// Find the colon that separates key from value, skipping quoted sections.
/// The colon must be at end-of-segment or followed by whitespace.
fn find_key_colon(segment: &str) -> Option<usize> {
    let bytes = segment.as_bytes();
    let mut in_single = false;
    let mut in_double = false;
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'\'' if !in_double => in_single = !in_single,
            b'"' if !in_single => in_double = !in_double,
            b':' if !in_single && !in_double => {
                if i + 1 == bytes.len() || bytes[i + 1].is_ascii_whitespace() {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

impl Parser {
    fn new(text: &str) -> Self {
        Self {
            lines: text.lines().map(|l| l.trim_end().to_owned()).collect(),
            pos: 0,
        }
    }

    fn document(mut self) -> Result<Document, ParseError> {
        // Normalise the leading `---` marker: drop the first content line if
        // it is the marker.
        if let Some(idx) = self
            .lines
            .iter()
            .position(|l| !is_blank_or_comment(l))
        {
            if self.lines[idx] == "---" {
                self.lines.remove(idx);
            }
        }

        let root = self.block_map(0, true)?;

        // Everything left must be comments or blanks.
        let mut trailing = vec![];
        while self.pos < self.lines.len() {
            let line = &self.lines[self.pos];
            if !is_blank_or_comment(line) {
                return Err(self.err("unexpected content after document"));
            }
            trailing.push(line.clone());
            self.pos += 1;
        }
        // Trailing blank lines are insignificant.
        while trailing.last().is_some_and(|l| l.trim().is_empty()) {
            trailing.pop();
        }

        Ok(Document { root, trailing })
    }

    fn err(&self, message: &str) -> ParseError {
        ParseError {
            line: self.pos + 1,
            message: message.to_owned(),
        }
    }

    fn indent_of(&self, line: &str) -> Result<usize, ParseError> {
        if line.trim_start_matches(' ').starts_with('\t') {
            return Err(self.err("tabs are not allowed in indentation"));
        }
        Ok(line.len() - line.trim_start_matches(' ').len())
    }

    /// Indent of the next content line without consuming anything.
    fn peek_content_indent(&self) -> Option<(usize, String)> {
        self.lines[self.pos..]
            .iter()
            .find(|l| !is_blank_or_comment(l))
            .map(|l| (l.len() - l.trim_start_matches(' ').len(), l.clone()))
    }

    fn block_map(&mut self, indent: usize, top: bool) -> Result<Map, ParseError> {
        let mut map = Map::new(indent);

        loop {
            let mark = self.pos;
            let mut leading = vec![];
            while self.pos < self.lines.len() && is_blank_or_comment(&self.lines[self.pos]) {
                leading.push(self.lines[self.pos].clone());
                self.pos += 1;
            }
            if self.pos >= self.lines.len() {
                self.pos = mark;
                break;
            }

            let line = self.lines[self.pos].clone();
            let ind = self.indent_of(&line)?;
            if ind < indent {
                self.pos = mark;
                break;
            }
            if ind > indent {
                return Err(self.err("unexpected indentation"));
            }

            let content = &line[ind..];
            if content.starts_with("- ") || content == "-" {
                if top {
                    return Err(self.err("top level of an asset document must be a mapping"));
                }
                self.pos = mark;
                break;
            }

            let Some(colon) = find_key_colon(content) else {
                if top && map.entries.is_empty() {
                    return Err(self.err("top level of an asset document must be a mapping"));
                }
                return Err(self.err("expected 'key: value'"));
            };

            let key_raw = content[..colon].to_owned();
            let rest = &content[colon + 1..];
            self.pos += 1;

            let (value, inline) = if rest.trim_start().starts_with('|')
                || rest.trim_start().starts_with('>')
            {
                (Node::Scalar(self.block_scalar(rest, indent)?), None)
            } else {
                let (code, inline) = split_comment(rest);
                let inline = inline.map(str::to_owned);
                if code.trim().is_empty() {
                    (self.nested_or_null(indent)?, inline)
                } else {
                    (
                        Node::Scalar(Scalar {
                            raw: code.trim_end().to_owned(),
                        }),
                        inline,
                    )
                }
            };

            map.entries.push(Entry {
                leading,
                key_raw,
                value,
                inline,
            });
        }

        Ok(map)
    }

    /// After a `key:` with nothing on the line: a nested block or a null.
    fn nested_or_null(&mut self, key_indent: usize) -> Result<Node, ParseError> {
        match self.peek_content_indent() {
            Some((ind, line)) if ind > key_indent => {
                let content = &line[ind..];
                if content.starts_with("- ") || content == "-" {
                    Ok(Node::List(self.block_list(ind)?))
                } else {
                    Ok(Node::Map(self.block_map(ind, false)?))
                }
            }
            Some((ind, line))
                if ind == key_indent && (line[ind..].starts_with("- ") || &line[ind..] == "-") =>
            {
                // Lists may sit at the same indent as their key.
                Ok(Node::List(self.block_list(ind)?))
            }
            _ => Ok(Node::Scalar(Scalar::null())),
        }
    }

    /// Consume a block scalar (`|` or `>`): the indicator plus all deeper
    /// lines, verbatim.
    fn block_scalar(&mut self, header: &str, key_indent: usize) -> Result<Scalar, ParseError> {
        let mut raw = header.trim_end().to_owned();
        while self.pos < self.lines.len() {
            let line = self.lines[self.pos].clone();
            if !line.trim().is_empty() {
                let ind = self.indent_of(&line)?;
                if ind <= key_indent {
                    break;
                }
            }
            raw.push('\n');
            raw.push_str(&line);
            self.pos += 1;
        }
        while raw.ends_with('\n') {
            raw.pop();
        }
        Ok(Scalar { raw })
    }

    fn block_list(&mut self, indent: usize) -> Result<List, ParseError> {
        let mut list = List {
            indent,
            items: vec![],
        };

        loop {
            let mark = self.pos;
            let mut leading = vec![];
            while self.pos < self.lines.len() && is_blank_or_comment(&self.lines[self.pos]) {
                leading.push(self.lines[self.pos].clone());
                self.pos += 1;
            }
            if self.pos >= self.lines.len() {
                self.pos = mark;
                break;
            }

            let line = self.lines[self.pos].clone();
            let ind = self.indent_of(&line)?;
            let content = &line[ind..];
            if ind != indent || !(content.starts_with("- ") || content == "-") {
                self.pos = mark;
                break;
            }

            let after_dash = &content[1..];
            let (value, inline) = if after_dash.trim().is_empty() {
                self.pos += 1;
                (self.nested_or_null(indent)?, None)
            } else if find_key_colon(split_comment(after_dash).0).is_some() {
                // Mapping item: re-read the dash line as its first entry by
                // blanking the dash, then parse the block at the entry column.
                let entry_col = ind + 1 + (after_dash.len() - after_dash.trim_start().len());
                let mut rewritten = line.clone();
                rewritten.replace_range(ind..=ind, " ");
                self.lines[self.pos] = rewritten;
                (Node::Map(self.block_map(entry_col, false)?), None)
            } else {
                self.pos += 1;
                let (code, inline) = split_comment(after_dash);
                (
                    Node::Scalar(Scalar {
                        raw: code.trim_end().to_owned(),
                    }),
                    inline.map(str::to_owned),
                )
            };

            list.items.push(ListItem {
                leading,
                value,
                inline,
            });
        }

        Ok(list)
    }
}

// ---------------------------------------------------------------------------
// Emission
// ---------------------------------------------------------------------------

fn emit_map(map: &Map, out: &mut String) {
    for entry in &map.entries {
        for line in &entry.leading {
            out.push_str(line);
            out.push('\n');
        }
        emit_entry(map.indent, entry, out);
    }
}

fn emit_entry(indent: usize, entry: &Entry, out: &mut String) {
    out.push_str(&" ".repeat(indent));
    out.push_str(&entry.key_raw);
    out.push(':');
    match &entry.value {
        Node::Scalar(s) => {
            emit_scalar_raw(&s.raw, out);
            if let Some(c) = &entry.inline {
                out.push_str(c);
            }
            out.push('\n');
        }
        Node::Map(m) => {
            if let Some(c) = &entry.inline {
                out.push_str(c);
            }
            out.push('\n');
            emit_map(m, out);
        }
        Node::List(l) => {
            if let Some(c) = &entry.inline {
                out.push_str(c);
            }
            out.push('\n');
            emit_list(l, out);
        }
    }
}

fn emit_scalar_raw(raw: &str, out: &mut String) {
    // Multi-line raws (block scalars) carry their own line structure.
    let mut lines = raw.split('\n');
    if let Some(first) = lines.next() {
        out.push_str(first);
    }
    for line in lines {
        out.push('\n');
        out.push_str(line);
    }
}

fn emit_list(list: &List, out: &mut String) {
    for item in &list.items {
        for line in &item.leading {
            out.push_str(line);
            out.push('\n');
        }
        match &item.value {
            Node::Scalar(s) => {
                out.push_str(&" ".repeat(list.indent));
                out.push('-');
                emit_scalar_raw(&s.raw, out);
                if let Some(c) = &item.inline {
                    out.push_str(c);
                }
                out.push('\n');
            }
            Node::Map(m) => {
                // First entry shares the dash line.
                if let Some((first, rest)) = m.entries.split_first() {
                    for line in &first.leading {
                        out.push_str(line);
                        out.push('\n');
                    }
                    out.push_str(&" ".repeat(list.indent));
                    out.push('-');
                    out.push_str(&" ".repeat(m.indent.saturating_sub(list.indent + 1)));
                    let mut first_line = String::new();
                    emit_entry(0, first, &mut first_line);
                    out.push_str(&first_line);
                    let sub = Map {
                        indent: m.indent,
                        entries: rest.to_vec(),
                    };
                    emit_map(&sub, out);
                } else {
                    out.push_str(&" ".repeat(list.indent));
                    out.push_str("- {}\n");
                }
            }
            Node::List(nested) => {
                out.push_str(&" ".repeat(list.indent));
                out.push('-');
                if let Some(c) = &item.inline {
                    out.push_str(c);
                }
                out.push('\n');
                emit_list(nested, out);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(text: &str) {
        let doc = Document::parse(text).unwrap();
        assert_eq!(doc.dump(), text, "round-trip mismatch");
    }

    #[test]
    fn empty_document() {
        let doc = Document::parse("---\n").unwrap();
        assert!(doc.is_empty());
        assert_eq!(doc.dump(), "---\n");
    }

    #[test]
    fn blank_input_is_empty_document() {
        let doc = Document::parse("").unwrap();
        assert!(doc.is_empty());
    }

    #[test]
    fn simple_mapping_roundtrip() {
        roundtrip("---\ntype: laptop\nmake: apple\nmodel: macbookpro\nserial: 867\n");
    }

    #[test]
    fn comments_survive_roundtrip() {
        roundtrip(
            "---\n# purchased 2023\ntype: laptop\nmake: apple  # refurbished\n\nmodel: macbookpro\n",
        );
    }

    #[test]
    fn quoting_styles_survive_roundtrip() {
        roundtrip("---\na: 'single'\nb: \"double\"\nc: plain\nd: 007\n");
    }

    #[test]
    fn nested_mapping_roundtrip() {
        roundtrip("---\ndisplay:\n  size: 13.3\n  resolution: 2560x1600\ntype: laptop\n");
    }

    #[test]
    fn list_roundtrip() {
        roundtrip("---\nports:\n- usb-c\n- hdmi\n");
    }

    #[test]
    fn indented_list_roundtrip() {
        roundtrip("---\nports:\n  - usb-c\n  - hdmi\n");
    }

    #[test]
    fn list_of_mappings_roundtrip() {
        roundtrip("---\ndrives:\n- size: 512\n  kind: ssd\n- size: 1024\n  kind: hdd\n");
    }

    #[test]
    fn block_scalar_roundtrip() {
        roundtrip("---\nnotes: |\n  line one\n  line two\nserial: 9\n");
    }

    #[test]
    fn trailing_comment_roundtrip() {
        roundtrip("---\nkey: value\n# the end\n");
    }

    #[test]
    fn marker_is_normalised_in() {
        let doc = Document::parse("type: laptop\n").unwrap();
        assert_eq!(doc.dump(), "---\ntype: laptop\n");
    }

    #[test]
    fn top_level_list_is_malformed() {
        let err = Document::parse("---\n- a\n- b\n").unwrap_err();
        assert!(err.message.contains("mapping"));
    }

    #[test]
    fn top_level_scalar_is_malformed() {
        assert!(Document::parse("---\njust text\n").is_err());
    }

    #[test]
    fn tab_indentation_is_malformed() {
        let err = Document::parse("---\nkey:\n\tsub: x\n").unwrap_err();
        assert!(err.message.contains("tab"));
    }

    #[test]
    fn null_values() {
        let doc = Document::parse("---\na:\nb: ~\nc: null\n").unwrap();
        for key in ["a", "b", "c"] {
            assert_eq!(
                doc.get(key).unwrap().as_scalar().unwrap().value(),
                Value::Null,
                "key {key}"
            );
        }
    }

    #[test]
    fn typed_scalar_values() {
        let doc = Document::parse("---\ni: 42\nf: 2.5\nb: true\ns: hello\nz: '42'\n").unwrap();
        let scalar = |k: &str| doc.get(k).unwrap().as_scalar().unwrap().value();
        assert_eq!(scalar("i"), Value::Int(42));
        assert_eq!(scalar("f"), Value::Float(2.5));
        assert_eq!(scalar("b"), Value::Bool(true));
        assert_eq!(scalar("s"), Value::Str("hello".into()));
        assert_eq!(scalar("z"), Value::Str("42".into()));
    }

    #[test]
    fn leading_zeros_stay_strings() {
        let doc = Document::parse("---\nserial: 00123\n").unwrap();
        assert_eq!(
            doc.get("serial").unwrap().as_scalar().unwrap().value(),
            Value::Str("00123".into())
        );
        assert_eq!(doc.get_text("serial").unwrap(), "00123");
    }

    #[test]
    fn dotted_get() {
        let doc = Document::parse("---\ndisplay:\n  size: 13.3\n").unwrap();
        assert_eq!(doc.get_text("display.size").unwrap(), "13.3");
        assert!(doc.get("display.missing").is_none());
        assert!(doc.get("display").unwrap().is_map());
    }

    #[test]
    fn flat_keys_are_dotted_and_ordered() {
        let doc = Document::parse("---\nb: 1\na:\n  y: 2\n  x: 3\nc: 4\n").unwrap();
        assert_eq!(doc.flat_keys(), ["b", "a.y", "a.x", "c"]);
    }

    #[test]
    fn set_preserves_unrelated_formatting() {
        let text = "---\n# header\ntype: laptop  # kind\nserial: '007'\n";
        let mut doc = Document::parse(text).unwrap();
        doc.set_scalar("make", "apple", false, false).unwrap();
        assert_eq!(
            doc.dump(),
            "---\n# header\ntype: laptop  # kind\nserial: '007'\nmake: apple\n"
        );
    }

    #[test]
    fn set_existing_key_in_place() {
        let mut doc = Document::parse("---\na: 1\nb: 2\nc: 3\n").unwrap();
        doc.set_scalar("b", "20", false, false).unwrap();
        assert_eq!(doc.dump(), "---\na: 1\nb: 20\nc: 3\n");
    }

    #[test]
    fn set_dotted_requires_parent_creation() {
        let mut doc = Document::new();
        let err = doc.set_scalar("a.b", "x", false, false).unwrap_err();
        assert_eq!(err, PatchError::MissingParent { key: "a".into() });

        doc.set_scalar("a.b", "x", true, false).unwrap();
        assert_eq!(doc.dump(), "---\na:\n  b: x\n");
    }

    #[test]
    fn set_through_scalar_needs_replace() {
        let mut doc = Document::parse("---\na: scalar\n").unwrap();
        let err = doc.set_scalar("a.b", "x", true, false).unwrap_err();
        assert_eq!(err, PatchError::NotAMapping { key: "a".into() });

        doc.set_scalar("a.b", "x", true, true).unwrap();
        assert_eq!(doc.get_text("a.b").unwrap(), "x");
    }

    #[test]
    fn set_over_composite_needs_replace() {
        let mut doc = Document::parse("---\na:\n  b: x\n").unwrap();
        let err = doc.set_scalar("a", "flat", false, false).unwrap_err();
        assert_eq!(err, PatchError::CompositeExists { key: "a".into() });

        doc.set_scalar("a", "flat", false, true).unwrap();
        assert_eq!(doc.get_text("a").unwrap(), "flat");
    }

    #[test]
    fn unset_missing_is_noop() {
        let mut doc = Document::parse("---\na: 1\n").unwrap();
        assert!(!doc.unset("zzz"));
        assert!(!doc.unset("a.b"));
        assert_eq!(doc.dump(), "---\na: 1\n");
    }

    #[test]
    fn unset_nested_key() {
        let mut doc = Document::parse("---\na:\n  b: 1\n  c: 2\n").unwrap();
        assert!(doc.unset("a.b"));
        assert_eq!(doc.dump(), "---\na:\n  c: 2\n");
    }

    #[test]
    fn values_needing_quotes_are_quoted() {
        let mut doc = Document::new();
        doc.set_scalar("note", "contains: colon", false, false)
            .unwrap();
        doc.set_scalar("empty", "", false, false).unwrap();
        let reparsed = Document::parse(&doc.dump()).unwrap();
        assert_eq!(reparsed.get_text("note").unwrap(), "contains: colon");
        assert_eq!(reparsed.get_text("empty").unwrap(), "");
    }

    #[test]
    fn hash_inside_quotes_is_not_a_comment() {
        let doc = Document::parse("---\na: 'value # not comment'\n").unwrap();
        assert_eq!(doc.get_text("a").unwrap(), "value # not comment");
        roundtrip("---\na: 'value # not comment'\n");
    }

    #[test]
    fn block_scalar_text_is_dedented() {
        let doc = Document::parse("---\nnotes: |\n  one\n  two\n").unwrap();
        assert_eq!(doc.get_text("notes").unwrap(), "one\ntwo");
    }

    #[test]
    fn dump_parse_dump_is_stable() {
        let text = "---\n# top\ntype: laptop\ndisplay:\n  size: 13.3\nports:\n- usb-c\n";
        let once = Document::parse(text).unwrap().dump();
        let twice = Document::parse(&once).unwrap().dump();
        assert_eq!(once, twice);
    }
}
