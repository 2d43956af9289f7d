//! Configuration surface.
//!
//! Every field has a default, so an empty file (or `Config::default()`) gives
//! the conventional layout: `*.js` service files, `me` marker directories,
//! `:{param}Id` route parameters, `node_modules` skipped.
//!
//! ```toml
//! [discover]
//! globs = ["**/*.js", "!node_modules/**", "!fixtures/**"]
//!
//! [scanner]
//! uri_param_template = "{{param}}"
//! ```

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::Error;

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub discover: DiscoverConfig,
    pub scanner: ScannerConfig,
}

impl Config {
    pub fn from_toml(source: &str) -> Result<Self, Error> {
        Ok(toml::from_str(source)?)
    }

    /// Reads and parses a TOML file.
    pub fn load(path: &Path) -> Result<Self, Error> {
        let source = fs::read_to_string(path)?;
        Self::from_toml(&source)
    }
}

/// Which files under a directory count as service files.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct DiscoverConfig {
    /// Globs relative to the scanned directory; a leading `!` excludes.
    pub globs: Vec<String>,
    /// Return absolute paths rather than paths relative to the directory.
    pub absolute: bool,
}

impl Default for DiscoverConfig {
    fn default() -> Self {
        Self {
            globs: vec!["**/*.js".to_owned(), "!node_modules/**".to_owned()],
            absolute: true,
        }
    }
}

/// Overrides for filename classification. `None` keeps the built-in rule.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Module file extension, without the dot. Defaults to `js`.
    pub suffix: Option<String>,
    #[serde(alias = "entityRegEx")]
    pub entity_regex: Option<String>,
    #[serde(alias = "uriParamRegEx")]
    pub uri_param_regex: Option<String>,
    /// Rendered parameter syntax; `{param}` is replaced by the captured name.
    #[serde(alias = "uriParamTemplate")]
    pub uri_param_template: Option<String>,
}
