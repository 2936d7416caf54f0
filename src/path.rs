//! Path syntax used by rules, and concrete document locations.
//!
//! A rule path is a dot-separated list of property names, each optionally
//! followed by bracket selectors: `resources[*].properties.enabled`,
//! `properties.rules[0]`, `tags.*`. A [`DocumentPath`] is the concrete
//! location a path resolved to, rendered canonically as
//! `resources[0].properties.enabled`.

use std::fmt;
use std::str::FromStr;

/// One step of a rule path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Selector {
    /// A named property. Matched exactly first, then ASCII case-insensitively.
    Property(String),
    /// `*`: every property of an object or every element of an array.
    AnyChild,
    /// `[*]`: every element of an array.
    AllElements,
    /// `[N]`: one array element.
    Index(usize),
}

/// A parsed rule path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JsonPath {
    raw: String,
    selectors: Vec<Selector>,
}

impl JsonPath {
    /// Parses a rule path. The empty string is the identity path.
    pub fn parse(path: &str) -> Result<JsonPath, String> {
        let mut selectors = Vec::new();
        let chars: Vec<char> = path.chars().collect();
        let mut current = String::new();
        let mut segment_open = true;
        let mut i = 0;

        while i < chars.len() {
            match chars[i] {
                '.' => {
                    if !current.is_empty() {
                        selectors.push(name_selector(&current));
                        current.clear();
                    } else if segment_open {
                        return Err(format!("empty segment at offset {} in '{}'", i, path));
                    }
                    segment_open = true;
                    i += 1;
                }
                '[' => {
                    if !current.is_empty() {
                        selectors.push(name_selector(&current));
                        current.clear();
                    } else if segment_open && i > 0 {
                        return Err(format!("empty segment at offset {} in '{}'", i, path));
                    }
                    let close = chars[i + 1..]
                        .iter()
                        .position(|c| *c == ']')
                        .map(|p| p + i + 1)
                        .ok_or_else(|| format!("unclosed '[' at offset {} in '{}'", i, path))?;
                    let inner: String = chars[i + 1..close].iter().collect();
                    if inner == "*" {
                        selectors.push(Selector::AllElements);
                    } else {
                        let index = inner.parse::<usize>().map_err(|_| {
                            format!("invalid array selector '[{}]' in '{}'", inner, path)
                        })?;
                        selectors.push(Selector::Index(index));
                    }
                    i = close + 1;
                    segment_open = false;
                    // After ']', only '.', '[' or end
                    if i < chars.len() && chars[i] != '.' && chars[i] != '[' {
                        return Err(format!(
                            "expected '.' or '[' after ']' at offset {} in '{}'",
                            i, path
                        ));
                    }
                }
                ']' => {
                    return Err(format!("unmatched ']' at offset {} in '{}'", i, path));
                }
                c => {
                    current.push(c);
                    i += 1;
                }
            }
        }

        if !current.is_empty() {
            selectors.push(name_selector(&current));
        } else if segment_open && !chars.is_empty() {
            return Err(format!("path '{}' ends with an empty segment", path));
        }

        Ok(JsonPath {
            raw: path.to_string(),
            selectors,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn selectors(&self) -> &[Selector] {
        &self.selectors
    }

    pub fn is_empty(&self) -> bool {
        self.selectors.is_empty()
    }
}

fn name_selector(name: &str) -> Selector {
    if name == "*" {
        Selector::AnyChild
    } else {
        Selector::Property(name.to_string())
    }
}

impl FromStr for JsonPath {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JsonPath::parse(s)
    }
}

impl fmt::Display for JsonPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

// ─── Concrete locations ─────────────────────────────────────────────────────

/// One step of a concrete document location.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

/// A concrete location inside a JSON document, from the root down.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct DocumentPath(Vec<PathSegment>);

impl DocumentPath {
    pub fn root() -> Self {
        DocumentPath(Vec::new())
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns a new path one property deeper.
    pub fn key(&self, key: &str) -> Self {
        let mut segments = self.0.clone();
        segments.push(PathSegment::Key(key.to_string()));
        DocumentPath(segments)
    }

    /// Returns a new path one array element deeper.
    pub fn index(&self, index: usize) -> Self {
        let mut segments = self.0.clone();
        segments.push(PathSegment::Index(index));
        DocumentPath(segments)
    }
}

impl From<Vec<PathSegment>> for DocumentPath {
    fn from(segments: Vec<PathSegment>) -> Self {
        DocumentPath(segments)
    }
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&render_segments(&self.0))
    }
}

/// Renders segments in canonical form: `resources[0].properties.name`.
///
/// Keys that contain `.`, `[`, `]` or `'` are written as `['key']`.
pub fn render_segments(segments: &[PathSegment]) -> String {
    append_segments("", segments)
}

/// Appends segments to an already-rendered canonical path.
pub fn append_segments(base: &str, segments: &[PathSegment]) -> String {
    let mut out = base.to_string();
    for segment in segments {
        match segment {
            PathSegment::Key(key) => {
                if key.contains(['.', '[', ']', '\'']) {
                    out.push_str("['");
                    out.push_str(&key.replace('\'', "\\'"));
                    out.push_str("']");
                } else {
                    if !out.is_empty() {
                        out.push('.');
                    }
                    out.push_str(key);
                }
            }
            PathSegment::Index(i) => {
                out.push('[');
                out.push_str(&i.to_string());
                out.push(']');
            }
        }
    }
    out
}
