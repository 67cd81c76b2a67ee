//! Configuration types for mirror runs.

use std::path::PathBuf;

/// Default links file read by a run.
pub const DEFAULT_LINKS_FILE: &str = "./download_links.txt";

/// Default root of the local mirror.
pub const DEFAULT_OUTPUT_DIR: &str = "./Downloaded_Files";

/// Default bound on folder nesting below each root.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Configuration for a bulk mirror run.
#[derive(Debug, Clone)]
pub struct MirrorConfig {
    /// File holding one candidate folder link per line.
    pub links_file: PathBuf,
    /// Directory the folder trees are mirrored into.
    pub output_dir: PathBuf,
    /// Folder IDs mirrored after the ones found in `links_file`.
    pub extra_folder_ids: Vec<String>,
    /// Deepest folder level descended into below a root.
    pub max_depth: usize,
    /// Whether to draw a progress bar.
    pub show_progress: bool,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            links_file: PathBuf::from(DEFAULT_LINKS_FILE),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            extra_folder_ids: Vec::new(),
            max_depth: DEFAULT_MAX_DEPTH,
            show_progress: true,
        }
    }
}

impl MirrorConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_links_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.links_file = path.into();
        self
    }

    #[must_use]
    pub fn with_output_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_dir = path.into();
        self
    }

    #[must_use]
    pub fn with_extra_folder_ids(mut self, ids: Vec<String>) -> Self {
        self.extra_folder_ids = ids;
        self
    }

    #[must_use]
    pub const fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    #[must_use]
    pub const fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }
}
