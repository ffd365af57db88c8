//! Route rule text: one `group(pattern)` per line, `#` comments and
//! `file:` includes.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, SniError};
use crate::types::RouteRule;

/// A comment-free, trimmed line: `file: <path>` or `group(pattern)`.
static LINE_GRAMMAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:file:\s*(?P<include>\S.*)|(?P<group>[\w.\-]+)\s*\(\s*(?P<pattern>[^()\s]*)\s*\))$",
    )
    .expect("LINE_GRAMMAR: hardcoded regex is invalid")
});

/// Maximum number of rule files open at once through nested includes.
const MAX_INCLUDE_DEPTH: usize = 10;

enum Line<'a> {
    Include(&'a str),
    Rule { group: &'a str, pattern: &'a str },
}

impl<'a> Line<'a> {
    fn parse(line: &'a str, line_num: usize) -> Result<Self> {
        let invalid = |message: String| SniError::ParseErrorAtLine {
            line: line_num,
            message,
        };
        let captures = LINE_GRAMMAR
            .captures(line)
            .ok_or_else(|| invalid(format!("Invalid rule format: {}", line)))?;

        if let Some(path) = captures.name("include") {
            return Ok(Line::Include(path.as_str().trim_end()));
        }
        let group = captures.name("group").map_or("", |m| m.as_str());
        let pattern = captures.name("pattern").map_or("", |m| m.as_str());
        if pattern.is_empty() {
            return Err(invalid("Empty pattern".to_string()));
        }
        Ok(Line::Rule { group, pattern })
    }
}

/// Collects rules while following includes. Relative include paths resolve
/// against the directory of the file that names them.
#[derive(Default)]
struct RuleReader {
    /// Files currently being read, outermost first
    open: Vec<PathBuf>,
    rules: Vec<RouteRule>,
}

impl RuleReader {
    fn read_text(&mut self, text: &str, dir: Option<&Path>) -> Result<()> {
        for (index, raw) in text.lines().enumerate() {
            let line_num = index + 1;
            let line = raw.split_once('#').map_or(raw, |(rule, _)| rule).trim();
            if line.is_empty() {
                continue;
            }

            match Line::parse(line, line_num)? {
                Line::Rule { group, pattern } => self.rules.push(RouteRule {
                    group: group.to_string(),
                    pattern: pattern.to_string(),
                    line_num,
                }),
                Line::Include(path) => {
                    let path = match dir {
                        Some(dir) => dir.join(path),
                        None => PathBuf::from(path),
                    };
                    self.read_file(&path, Some(line_num))?;
                }
            }
        }
        Ok(())
    }

    /// Read one file. `included_at` is the line of the `file:` directive,
    /// used to place errors.
    fn read_file(&mut self, path: &Path, included_at: Option<usize>) -> Result<()> {
        let fail = |message: String| match included_at {
            Some(line) => SniError::ParseErrorAtLine { line, message },
            None => SniError::ParseError(message),
        };

        if self.open.len() >= MAX_INCLUDE_DEPTH {
            return Err(fail(format!(
                "file include depth exceeds maximum ({MAX_INCLUDE_DEPTH}) at '{}'",
                path.display()
            )));
        }
        let text = fs::read_to_string(path).map_err(|e| {
            fail(format!(
                "Failed to read rules file '{}': {}",
                path.display(),
                e
            ))
        })?;

        let canonical = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        if self.open.contains(&canonical) {
            return Err(fail(format!("circular include of '{}'", path.display())));
        }

        self.open.push(canonical);
        let result = self.read_text(&text, path.parent());
        self.open.pop();
        result
    }
}

/// Parse route rules from text.
///
/// A `file: /path/to/routes.sni` line splices in the rules of that file.
pub fn parse_routes(text: &str) -> Result<Vec<RouteRule>> {
    let mut reader = RuleReader::default();
    reader.read_text(text, None)?;
    Ok(reader.rules)
}

/// Parse route rules from a file.
pub fn parse_routes_from_file(path: impl AsRef<Path>) -> Result<Vec<RouteRule>> {
    let mut reader = RuleReader::default();
    reader.read_file(path.as_ref(), None)?;
    Ok(reader.rules)
}
