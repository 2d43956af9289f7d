//! Finding service files on disk.

use std::path::{Path, PathBuf};

use ignore::WalkBuilder;
use ignore::overrides::OverrideBuilder;
use tracing::{debug, trace};

use crate::config::DiscoverConfig;
use crate::error::Error;

/// Files found under a directory, in a stable order.
#[derive(Clone, Debug, Default)]
pub struct Discovered {
    pub files: Vec<PathBuf>,
    /// Prefix stripped from every file when its route is derived.
    pub base: Option<PathBuf>,
}

impl Discovered {
    pub fn new(files: Vec<PathBuf>) -> Self {
        Self { files, base: None }
    }

    pub fn with_base(mut self, base: impl Into<PathBuf>) -> Self {
        self.base = Some(base.into());
        self
    }
}

/// Walks `directory` for files matching `config.globs`.
///
/// Globs are relative to `directory`; one starting with `!` excludes what it
/// matches. Hidden files and directories are skipped. The returned base is
/// `directory` itself, so routes start below it.
pub fn discover(directory: &Path, config: &DiscoverConfig) -> Result<Discovered, Error> {
    let directory = if config.absolute { std::path::absolute(directory)? } else { directory.to_path_buf() };
    debug!(directory = %directory.display(), globs = ?config.globs, "discovering service files");

    let mut overrides = OverrideBuilder::new(&directory);
    for glob in &config.globs {
        overrides.add(glob)?;
    }

    let walker = WalkBuilder::new(&directory)
        .standard_filters(false)
        .hidden(true)
        .overrides(overrides.build()?)
        .sort_by_file_name(|a, b| a.cmp(b))
        .build();

    let mut files = Vec::new();
    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_some_and(|kind| kind.is_file()) {
            continue;
        }
        let path = entry.into_path();
        trace!(file = %path.display(), "discovered");
        files.push(if config.absolute {
            path
        } else {
            path.strip_prefix(&directory).map(Path::to_path_buf).unwrap_or(path)
        });
    }

    Ok(Discovered { files, base: Some(directory) })
}
