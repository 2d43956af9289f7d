//! Filename conventions and path-to-route translation.
//!
//! | File / directory          | Meaning                                         |
//! |---------------------------|-------------------------------------------------|
//! | `get.js`, `post.js`, ...  | handler for that verb on the enclosing route     |
//! | `owner-entity.js`         | entity `owner`, bound into every request below   |
//! | `me/`                     | the preceding directory becomes a parameter      |
//!
//! All three rules are configurable ([`ScannerConfig`]). Patterns compile
//! once in [`Scanner::new`]; every classification afterwards is a plain
//! `bool` / `Option` answer.

use std::path::{Component, Path};

use regex::Regex;

use crate::config::ScannerConfig;
use crate::error::Error;
use crate::method::Verb;
use crate::route::{RouteTemplate, Segment};

const PLACEHOLDER: &str = "{param}";
const DEFAULT_SUFFIX: &str = "js";
const DEFAULT_MARKER: &str = "^me$";
const DEFAULT_TEMPLATE: &str = ":{param}Id";
const PARAM_NAME_SUFFIX: &str = "Id";

/// A path segment mid-translation. `Param` holds the captured name.
enum Part {
    Literal(String),
    Param(String),
}

impl Part {
    fn text(&self) -> &str {
        match self {
            Part::Literal(text) | Part::Param(text) => text,
        }
    }
}

/// Classifies file and directory names and turns file paths into routes.
#[derive(Clone, Debug)]
pub struct Scanner {
    suffix: String,
    entity: Regex,
    marker: Regex,
    template: String,
}

impl Scanner {
    pub fn new(config: &ScannerConfig) -> Result<Self, Error> {
        let suffix = config.suffix.clone().unwrap_or_else(|| DEFAULT_SUFFIX.to_owned());
        let entity = config
            .entity_regex
            .clone()
            .unwrap_or_else(|| format!(r"^(\w+-)+entity\.{}$", regex::escape(&suffix)));
        let marker = config.uri_param_regex.as_deref().unwrap_or(DEFAULT_MARKER);
        let template = config
            .uri_param_template
            .clone()
            .unwrap_or_else(|| DEFAULT_TEMPLATE.to_owned());

        if !template.contains(PLACEHOLDER) {
            return Err(Error::Template(template));
        }

        Ok(Self {
            entity: compile(&entity)?,
            marker: compile(marker)?,
            suffix,
            template,
        })
    }

    // ── Classification ───────────────────────────────────────────────────────

    /// The verb a file is named after: `get.js` is `Get`, `abcdefg.js` is `None`.
    pub fn verb(&self, filename: &str) -> Option<Verb> {
        self.stem(filename)?.parse().ok()
    }

    pub fn is_verb(&self, filename: &str) -> bool {
        self.verb(filename).is_some()
    }

    /// `test-entity.js` is an entity file; `testentity.js`, `-entity.js`,
    /// `test-entity.jpg` and `test-entity` are not.
    pub fn is_entity(&self, filename: &str) -> bool {
        self.entity.is_match(filename)
    }

    /// Name an entity file binds under: everything before its last hyphen.
    pub fn entity_name<'a>(&self, filename: &'a str) -> Option<&'a str> {
        if !self.is_entity(filename) {
            return None;
        }
        filename.rsplit_once('-').map(|(name, _)| name)
    }

    /// Whether a directory name is the parameter marker (`me` by default).
    pub fn is_parameter(&self, name: &str) -> bool {
        self.marker.is_match(name)
    }

    /// Renders a captured segment name with the parameter template.
    pub fn render_param(&self, name: &str) -> String {
        self.template.replace(PLACEHOLDER, name)
    }

    // ── Translation ──────────────────────────────────────────────────────────

    /// Translates a file path into its route string.
    ///
    /// ```text
    /// /srv/api/users/me/posts/get.js    <- file
    /// /srv/api                          <- base
    /// /users/:usersId/posts/get         <- returned
    /// ```
    pub fn to_path(&self, file: &Path, base: &Path) -> String {
        RouteTemplate::new(self.segments(file, base)).to_string()
    }

    /// The route a file is served under. A verb file names the method, not a
    /// path segment, so its stem is dropped: `users/me/get.js` is
    /// `/users/:usersId`.
    pub fn to_route(&self, file: &Path, base: &Path) -> RouteTemplate {
        let mut segments = self.segments(file, base);
        let is_verb = file
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| self.is_verb(name));
        if is_verb {
            segments.pop();
        }
        RouteTemplate::new(segments)
    }

    fn segments(&self, file: &Path, base: &Path) -> Vec<Segment> {
        let relative = file.strip_prefix(base).unwrap_or(file);
        let mut parts: Vec<Part> = relative
            .components()
            .filter_map(|component| match component {
                Component::Normal(part) => Some(Part::Literal(part.to_string_lossy().into_owned())),
                _ => None,
            })
            .collect();
        if let Some(Part::Literal(last)) = parts.last_mut() {
            *last = self.strip_suffix(last).to_owned();
        }

        // A rewritten marker also consumes the separator after it, so the
        // directory two places on cannot lead a second match in the same
        // pass. Nested markers are only reached by the second pass.
        self.rewrite_markers(&mut parts);
        self.rewrite_markers(&mut parts);

        parts.into_iter()
            .filter(|part| !part.text().is_empty())
            .map(|part| match part {
                Part::Literal(text) => Segment::Literal(text),
                Part::Param(captured) => Segment::Param {
                    name: format!("{captured}{PARAM_NAME_SUFFIX}"),
                    token: self.render_param(&captured),
                },
            })
            .collect()
    }

    /// One left-to-right pass. A marker needs a segment before it and one
    /// after it; the file name itself is never a marker.
    fn rewrite_markers(&self, parts: &mut [Part]) {
        let mut lead = 0;
        while lead + 2 < parts.len() {
            let is_marker = matches!(&parts[lead + 1], Part::Literal(text) if self.marker.is_match(text));
            if is_marker {
                parts[lead + 1] = Part::Param(parts[lead].text().to_owned());
                lead += 3;
            } else {
                lead += 1;
            }
        }
    }

    fn strip_suffix<'a>(&self, path: &'a str) -> &'a str {
        path.strip_suffix(self.suffix.as_str())
            .and_then(|rest| rest.strip_suffix('.'))
            .unwrap_or(path)
    }

    fn stem<'a>(&self, filename: &'a str) -> Option<&'a str> {
        filename.strip_suffix(self.suffix.as_str())?.strip_suffix('.')
    }
}

impl Default for Scanner {
    fn default() -> Self {
        // The built-in patterns are constants and always compile.
        match Self::new(&ScannerConfig::default()) {
            Ok(scanner) => scanner,
            Err(e) => unreachable!("built-in scanner patterns: {e}"),
        }
    }
}

fn compile(pattern: &str) -> Result<Regex, Error> {
    Regex::new(pattern).map_err(|source| Error::Pattern { pattern: pattern.to_owned(), source })
}
