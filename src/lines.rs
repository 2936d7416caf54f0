//! Line recovery: mapping locations in the expanded document back to lines
//! in the original template text.

use crate::context::TemplateContext;
use crate::error::{TemplateError, TemplateErrorKind};
use crate::path::{DocumentPath, PathSegment, render_segments};
use std::collections::HashMap;
use tracing::trace;

/// serde_json refuses documents nested deeper than this; so do we.
const MAX_DEPTH: usize = 128;

// ─── resolve_line ───────────────────────────────────────────────────────────

/// Returns the best-known original line for a location in the expanded
/// document. Always answers: line 1 when nothing else is known.
///
/// Walks from `path` up to the root. The first prefix present in the
/// resource mapping table wins and the line of its mapped original path is
/// returned. A mapped path the original source does not contain is skipped.
pub fn resolve_line(context: &TemplateContext, path: &DocumentPath) -> usize {
    let segments = path.segments();
    let mappings = context.resource_mappings();
    let index = context.source_index();

    for depth in (0..=segments.len()).rev() {
        let prefix = render_segments(&segments[..depth]);
        let Some(original) = mappings.get(&prefix) else {
            continue;
        };

        if let Some(line) = index.line_of(original) {
            return line;
        }

        trace!(
            expanded = %prefix,
            original,
            "mapped location missing from the original source"
        );
    }

    trace!(path = %path, "no resource mapping covers location, reporting line 1");
    1
}

// ─── SourcePositionIndex ────────────────────────────────────────────────────

/// Line numbers for every value in a JSON text, keyed by canonical path.
///
/// Object members are indexed at the line of their key, array elements and
/// the root at the line where the value starts.
#[derive(Clone, Debug, Default)]
pub struct SourcePositionIndex {
    exact: HashMap<String, usize>,
    folded: HashMap<String, usize>,
}

impl SourcePositionIndex {
    /// Scans `text` once and records every location.
    ///
    /// Comments must already be blanked out (see [`strip_comments`]).
    pub fn build(text: &str) -> Result<Self, TemplateError> {
        let mut scanner = Scanner {
            text,
            bytes: text.as_bytes(),
            pos: 0,
            line: 1,
            line_start: 0,
            index: SourcePositionIndex::default(),
        };
        let mut path = Vec::new();

        scanner.skip_whitespace();
        let line = scanner.line;
        scanner.value(&mut path, line, 0)?;
        scanner.skip_whitespace();
        if scanner.pos < scanner.bytes.len() {
            return Err(scanner.error("trailing characters after document"));
        }

        Ok(scanner.index)
    }

    /// Line of a canonical path. Exact match first, then ASCII case-insensitive.
    pub fn line_of(&self, path: &str) -> Option<usize> {
        self.exact
            .get(path)
            .or_else(|| self.folded.get(&path.to_ascii_lowercase()))
            .copied()
    }

    pub fn len(&self) -> usize {
        self.exact.len()
    }

    /// Every recorded canonical path, in no particular order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.exact.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.exact.is_empty()
    }

    fn record(&mut self, path: &[PathSegment], line: usize) {
        let key = render_segments(path);
        self.folded.insert(key.to_ascii_lowercase(), line);
        self.exact.insert(key, line);
    }
}

struct Scanner<'t> {
    text: &'t str,
    bytes: &'t [u8],
    pos: usize,
    line: usize,
    line_start: usize,
    index: SourcePositionIndex,
}

impl Scanner<'_> {
    fn value(
        &mut self,
        path: &mut Vec<PathSegment>,
        line: usize,
        depth: usize,
    ) -> Result<(), TemplateError> {
        if depth > MAX_DEPTH {
            return Err(self.error("document nested too deeply"));
        }
        self.index.record(path, line);

        match self.peek() {
            Some(b'{') => {
                self.pos += 1;
                self.skip_whitespace();
                if self.peek() == Some(b'}') {
                    self.pos += 1;
                    return Ok(());
                }
                loop {
                    self.skip_whitespace();
                    let key_line = self.line;
                    let key = self.string()?;
                    self.skip_whitespace();
                    self.expect(b':')?;
                    self.skip_whitespace();
                    path.push(PathSegment::Key(key));
                    self.value(path, key_line, depth + 1)?;
                    path.pop();
                    self.skip_whitespace();
                    match self.next_byte() {
                        Some(b',') => continue,
                        Some(b'}') => return Ok(()),
                        _ => return Err(self.error("expected ',' or '}' in object")),
                    }
                }
            }
            Some(b'[') => {
                self.pos += 1;
                self.skip_whitespace();
                if self.peek() == Some(b']') {
                    self.pos += 1;
                    return Ok(());
                }
                let mut i = 0;
                loop {
                    self.skip_whitespace();
                    let element_line = self.line;
                    path.push(PathSegment::Index(i));
                    self.value(path, element_line, depth + 1)?;
                    path.pop();
                    i += 1;
                    self.skip_whitespace();
                    match self.next_byte() {
                        Some(b',') => continue,
                        Some(b']') => return Ok(()),
                        _ => return Err(self.error("expected ',' or ']' in array")),
                    }
                }
            }
            Some(b'"') => self.string().map(|_| ()),
            Some(_) => self.scalar(),
            None => Err(self.error("unexpected end of input")),
        }
    }

    /// Consumes a string literal and returns its decoded contents.
    fn string(&mut self) -> Result<String, TemplateError> {
        if self.peek() != Some(b'"') {
            return Err(self.error("expected string"));
        }
        let start = self.pos;
        self.pos += 1;
        let mut escaped = false;
        loop {
            match self.next_byte() {
                Some(b'\\') => {
                    escaped = true;
                    self.next_byte();
                }
                Some(b'"') => break,
                Some(_) => {}
                None => return Err(self.error("unterminated string")),
            }
        }
        let raw = &self.text[start..self.pos];
        if escaped {
            serde_json::from_str::<String>(raw).map_err(|e| self.error(&e.to_string()))
        } else {
            Ok(raw[1..raw.len() - 1].to_string())
        }
    }

    /// Consumes a number or literal. The text was already validated by
    /// serde_json, so only the extent matters.
    fn scalar(&mut self) -> Result<(), TemplateError> {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if matches!(b, b',' | b'}' | b']' | b' ' | b'\t' | b'\r' | b'\n') {
                break;
            }
            self.pos += 1;
        }
        if self.pos == start {
            return Err(self.error("unexpected character"));
        }
        Ok(())
    }

    fn expect(&mut self, byte: u8) -> Result<(), TemplateError> {
        if self.next_byte() == Some(byte) {
            Ok(())
        } else {
            Err(self.error(&format!("expected '{}'", byte as char)))
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(b) = self.peek() {
            if !matches!(b, b' ' | b'\t' | b'\r' | b'\n') {
                break;
            }
            self.next_byte();
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn next_byte(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        if b == b'\n' {
            self.line += 1;
            self.line_start = self.pos;
        }
        Some(b)
    }

    fn error(&self, message: &str) -> TemplateError {
        TemplateError {
            kind: TemplateErrorKind::Syntax,
            message: message.to_string(),
            line: Some(self.line),
            column: Some(self.pos.saturating_sub(self.line_start) + 1),
        }
    }
}

// ─── strip_comments ─────────────────────────────────────────────────────────

/// Blanks out `//` and `/* */` comments, keeping every newline so line
/// numbers stay valid.
pub fn strip_comments(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                result.push(c);
                while let Some(s) = chars.next() {
                    result.push(s);
                    match s {
                        '\\' => {
                            if let Some(escaped) = chars.next() {
                                result.push(escaped);
                            }
                        }
                        '"' => break,
                        _ => {}
                    }
                }
            }
            '/' if chars.peek() == Some(&'/') => {
                result.push(' ');
                while let Some(&s) = chars.peek() {
                    if s == '\n' {
                        break;
                    }
                    result.push(blank(s));
                    chars.next();
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                result.push(' ');
                result.push(' ');
                chars.next();
                let mut previous = '\0';
                for s in chars.by_ref() {
                    result.push(blank(s));
                    if previous == '*' && s == '/' {
                        break;
                    }
                    previous = s;
                }
            }
            _ => result.push(c),
        }
    }

    result
}

/// Replaces a comment character, keeping line breaks.
fn blank(c: char) -> char {
    match c {
        '\n' | '\r' => c,
        _ => ' ',
    }
}
