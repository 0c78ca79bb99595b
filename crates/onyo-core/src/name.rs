//! Asset names: the name template, name↔key binding, and faux serials.
//!
//! An asset's file name is generated from its document through a template
//! such as `{type}_{make}_{model}.{serial}`. The field after the final `.`
//! is the *tail* and may contain any character (manufacturer serials are
//! arbitrary); every other field excludes the reserved characters `_` and
//! `.` so the name parses unambiguously. Parsing is greedy from the
//! template structure: non-tail fields match `[^_.]+`, the tail matches
//! `.+`.

use std::collections::HashSet;

use rand::Rng;
use regex::Regex;

use crate::error::{OnyoError, Result};

/// Prefix of generated serials, so they are recognisable as placeholders.
pub const FAUX_SERIAL_PREFIX: &str = "faux";

/// Default length of the random part of a faux serial.
pub const DEFAULT_FAUX_LENGTH: usize = 6;

/// Retry budget for finding a free faux serial.
const FAUX_SERIAL_ATTEMPTS: u32 = 1000;

const FAUX_SERIAL_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

#[derive(Clone, Debug, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Field(String),
}

/// A compiled asset name template.
#[derive(Clone, Debug)]
pub struct NameTemplate {
    format: String,
    segments: Vec<Segment>,
    fields: Vec<String>,
    matcher: Regex,
}

impl NameTemplate {
    /// Compile a template string of literal runs and `{field}` placeholders.
    ///
    /// # Errors
    /// [`OnyoError::InvalidOperation`] when the template has no fields, an
    /// unterminated placeholder, adjacent fields without a separating
    /// literal, or a tail that is not the final segment.
    pub fn compile(format: &str) -> Result<Self> {
        let bad = |reason: String| OnyoError::InvalidOperation {
            reason: format!("invalid name format '{format}': {reason}"),
        };

        let mut segments = vec![];
        let mut rest = format;
        while !rest.is_empty() {
            match rest.find('{') {
                Some(open) => {
                    if open > 0 {
                        segments.push(Segment::Literal(rest[..open].to_owned()));
                    }
                    let close = rest[open..]
                        .find('}')
                        .ok_or_else(|| bad("unterminated '{' placeholder".to_owned()))?
                        + open;
                    let field = rest[open + 1..close].trim();
                    if field.is_empty() {
                        return Err(bad("empty placeholder".to_owned()));
                    }
                    segments.push(Segment::Field(field.to_owned()));
                    rest = &rest[close + 1..];
                }
                None => {
                    segments.push(Segment::Literal(rest.to_owned()));
                    rest = "";
                }
            }
        }

        let fields: Vec<String> = segments
            .iter()
            .filter_map(|s| match s {
                Segment::Field(f) => Some(f.clone()),
                Segment::Literal(_) => None,
            })
            .collect();
        if fields.is_empty() {
            return Err(bad("no '{field}' placeholders".to_owned()));
        }
        for pair in segments.windows(2) {
            if matches!(pair, [Segment::Field(_), Segment::Field(_)]) {
                return Err(bad("two placeholders without a separating literal".to_owned()));
            }
        }

        // The tail is the field after the final '.' literal and must close
        // the template; everything else gets the strict charset.
        let last_dot = segments
            .iter()
            .rposition(|s| matches!(s, Segment::Literal(l) if l.contains('.')));
        let tail_field = match (last_dot, segments.last()) {
            (Some(dot), Some(Segment::Field(f))) if dot + 1 == segments.len() - 1 => f.clone(),
            (Some(_), _) => {
                return Err(bad("the field after the final '.' must end the template".to_owned()))
            }
            (None, _) => return Err(bad("missing a '.' separator before the tail field".to_owned())),
        };

        let mut pattern = String::from("^");
        for segment in &segments {
            match segment {
                Segment::Literal(l) => pattern.push_str(&regex::escape(l)),
                Segment::Field(f) if *f == tail_field => pattern.push_str("(.+)"),
                Segment::Field(_) => pattern.push_str("([^_.]+)"),
            }
        }
        pattern.push('$');
        let matcher = Regex::new(&pattern).map_err(|e| bad(e.to_string()))?;

        Ok(Self {
            format: format.to_owned(),
            segments,
            fields,
            matcher,
        })
    }

    /// The template string this was compiled from.
    #[must_use]
    pub fn format(&self) -> &str {
        &self.format
    }

    /// The bound field names, in template order. The last one is the tail.
    #[must_use]
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// The tail field name.
    #[must_use]
    pub fn tail_field(&self) -> &str {
        self.fields.last().expect("template has at least one field")
    }

    /// Parse an asset basename into its bound field values.
    ///
    /// # Errors
    /// [`OnyoError::InvalidAssetName`] naming the template clause that
    /// failed to match.
    pub fn parse_name(&self, name: &str) -> Result<Vec<(String, String)>> {
        match self.matcher.captures(name) {
            Some(caps) => Ok(self
                .fields
                .iter()
                .zip(caps.iter().skip(1))
                .map(|(field, cap)| {
                    (
                        field.clone(),
                        cap.map(|m| m.as_str().to_owned()).unwrap_or_default(),
                    )
                })
                .collect()),
            None => Err(OnyoError::InvalidAssetName {
                name: name.to_owned(),
                reason: self.describe_mismatch(name),
            }),
        }
    }

    /// Which clause of the template a non-matching name fails on.
    fn describe_mismatch(&self, name: &str) -> String {
        let mut pos = 0;
        for segment in &self.segments {
            match segment {
                Segment::Literal(l) => {
                    if !name[pos..].starts_with(l.as_str()) {
                        return format!(
                            "expected '{l}' at position {pos} (name format is '{}')",
                            self.format
                        );
                    }
                    pos += l.len();
                }
                Segment::Field(f) if f == self.tail_field() => {
                    if name[pos..].is_empty() {
                        return format!("field '{{{f}}}' is empty");
                    }
                    pos = name.len();
                }
                Segment::Field(f) => {
                    let taken = name[pos..]
                        .chars()
                        .take_while(|c| *c != '_' && *c != '.')
                        .map(char::len_utf8)
                        .sum::<usize>();
                    if taken == 0 {
                        return format!("field '{{{f}}}' is empty");
                    }
                    pos += taken;
                }
            }
        }
        format!("does not match name format '{}'", self.format)
    }

    /// Generate an asset basename from bound field values.
    ///
    /// `lookup` resolves a field name to its value (typically a dotted read
    /// of the asset document).
    ///
    /// # Errors
    /// [`OnyoError::InvalidAssetName`] when a field is missing, empty, or a
    /// non-tail value contains a reserved character.
    pub fn generate(&self, lookup: impl Fn(&str) -> Option<String>) -> Result<String> {
        let mut name = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(l) => name.push_str(l),
                Segment::Field(f) => {
                    let value = lookup(f).unwrap_or_default();
                    let value = value.trim();
                    if value.is_empty() {
                        return Err(OnyoError::InvalidAssetName {
                            name: name.clone(),
                            reason: format!("required field '{{{f}}}' has no value"),
                        });
                    }
                    if value.contains('/') {
                        return Err(OnyoError::InvalidAssetName {
                            name: value.to_owned(),
                            reason: format!("field '{{{f}}}' must not contain '/'"),
                        });
                    }
                    if f != self.tail_field() && value.contains(['_', '.']) {
                        return Err(OnyoError::InvalidAssetName {
                            name: value.to_owned(),
                            reason: format!(
                                "field '{{{f}}}' must not contain the reserved characters '_' or '.'"
                            ),
                        });
                    }
                    name.push_str(value);
                }
            }
        }
        Ok(name)
    }
}

/// Generate a faux serial not present in `taken`.
///
/// The serial is `faux` followed by `length` random lowercase alphanumeric
/// characters. Collisions are retried within a fixed budget.
///
/// # Errors
/// [`OnyoError::FauxSerialExhausted`] when no free serial was found.
pub fn generate_faux_serial<R: Rng>(
    taken: &HashSet<String>,
    length: usize,
    rng: &mut R,
) -> Result<String> {
    for _ in 0..FAUX_SERIAL_ATTEMPTS {
        let suffix: String = (0..length)
            .map(|_| {
                let idx = rng.gen_range(0..FAUX_SERIAL_CHARSET.len());
                FAUX_SERIAL_CHARSET[idx] as char
            })
            .collect();
        let serial = format!("{FAUX_SERIAL_PREFIX}{suffix}");
        if !taken.contains(&serial) {
            return Ok(serial);
        }
    }
    Err(OnyoError::FauxSerialExhausted {
        attempts: FAUX_SERIAL_ATTEMPTS,
    })
}
