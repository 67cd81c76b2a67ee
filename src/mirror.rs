//! Recursive mirroring of a remote folder tree onto the local filesystem.
//!
//! The walk is sequential and depth-first in listing order. Failures never
//! abort the whole walk: a folder whose metadata or listing cannot be fetched
//! is recorded as a [`FolderFailure`] and its siblings continue, and a file that
//! cannot be fetched is recorded as [`FileOutcome::Failed`].
//!
//! A file whose target path already exists is never fetched again, so
//! re-running a walk over a finished mirror only produces skips.

use std::collections::HashSet;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use futures::future::BoxFuture;
use tracing::{error, info, warn};

use crate::error::DriveError;
use crate::progress::Progress;
use crate::remote::{RemoteEntry, RemoteLister};

/// Why a file entry produced no local file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnavailableReason {
    /// The entry only has export references, none of them PDF.
    NoPdfExport,
    /// The entry has neither a download nor an export reference.
    NotDownloadable,
}

/// Terminal state of one file entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    SkippedExisting,
    Downloaded { bytes: u64 },
    Exported { bytes: u64 },
    Unavailable(UnavailableReason),
    Failed(String),
}

/// What happened to one file entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub file_id: String,
    pub name: String,
    /// Local path the entry maps to; `None` when it has no fetchable content.
    pub path: Option<PathBuf>,
    pub outcome: FileOutcome,
}

/// A folder whose subtree was abandoned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderFailure {
    pub folder_id: String,
    pub reason: String,
}

/// Everything a walk did, in processing order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalkReport {
    pub files: Vec<FileRecord>,
    pub folder_failures: Vec<FolderFailure>,
}

impl WalkReport {
    fn count(&self, f: impl Fn(&FileOutcome) -> bool) -> usize {
        self.files.iter().filter(|r| f(&r.outcome)).count()
    }

    pub fn downloaded(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::Downloaded { .. }))
    }

    pub fn exported(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::Exported { .. }))
    }

    pub fn skipped_existing(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::SkippedExisting))
    }

    pub fn unavailable(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::Unavailable(_)))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::Failed(_)))
    }

    /// Bytes written by downloads and exports.
    pub fn bytes_written(&self) -> u64 {
        self.files
            .iter()
            .map(|r| match r.outcome {
                FileOutcome::Downloaded { bytes } | FileOutcome::Exported { bytes } => bytes,
                _ => 0,
            })
            .sum()
    }

    /// Append the records of another walk.
    pub fn merge(&mut self, other: WalkReport) {
        self.files.extend(other.files);
        self.folder_failures.extend(other.folder_failures);
    }

    fn fail_folder(&mut self, folder_id: &str, reason: String) {
        self.folder_failures.push(FolderFailure {
            folder_id: folder_id.to_string(),
            reason,
        });
    }
}

/// Make a remote display name usable as a single path component.
pub fn sanitize_component(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c == '/' || c == '\\' || c == '\0' || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();

    match cleaned.as_str() {
        "" | "." | ".." => "_".to_string(),
        _ => cleaned,
    }
}

/// Local directory for a folder named `folder_name` mirrored under `output_dir`.
///
/// When `output_dir` already ends in that name it is reused as is, so a root
/// named like the output directory does not produce `out/Name/Name`.
pub fn target_dir(output_dir: &Path, folder_name: &str) -> PathBuf {
    let name = sanitize_component(folder_name);
    if output_dir.file_name() == Some(OsStr::new(&name)) {
        output_dir.to_path_buf()
    } else {
        output_dir.join(name)
    }
}

/// Where a file's content comes from and where it lands.
#[derive(Debug, PartialEq, Eq)]
enum Plan<'a> {
    Download { link: &'a str, path: PathBuf },
    Export { link: &'a str, path: PathBuf },
    Unavailable(UnavailableReason),
}

fn plan_for<'a>(entry: &'a RemoteEntry, dir: &Path) -> Plan<'a> {
    let path = dir.join(sanitize_component(&entry.name));

    if let Some(link) = entry.download_link.as_deref() {
        return Plan::Download { link, path };
    }

    if entry.export_links.is_some() {
        return match entry.pdf_export_link() {
            Some(link) => Plan::Export {
                link,
                path: path.with_extension("pdf"),
            },
            None => Plan::Unavailable(UnavailableReason::NoPdfExport),
        };
    }

    Plan::Unavailable(UnavailableReason::NotDownloadable)
}

/// Bookkeeping for one root walk.
#[derive(Default)]
struct WalkState {
    visited: HashSet<String>,
    /// Paths this walk has written, to tell name collisions from earlier runs.
    written: HashSet<PathBuf>,
}

/// Mirrors remote folder trees into local directories.
pub struct Mirror<'a, L: ?Sized> {
    lister: &'a L,
    max_depth: usize,
}

impl<'a, L> Mirror<'a, L>
where
    L: RemoteLister + ?Sized,
{
    pub fn new(lister: &'a L, max_depth: usize) -> Self {
        Self { lister, max_depth }
    }

    /// Mirror the tree rooted at `folder_id` into `output_dir`.
    ///
    /// `progress` advances once per file entry encountered.
    pub async fn walk(&self, folder_id: &str, output_dir: &Path, progress: &Progress) -> WalkReport {
        let mut report = WalkReport::default();
        let mut state = WalkState::default();
        self.walk_folder(folder_id, output_dir, 0, &mut state, progress, &mut report)
            .await;
        report
    }

    fn walk_folder<'b>(
        &'b self,
        folder_id: &'b str,
        output_dir: &'b Path,
        depth: usize,
        state: &'b mut WalkState,
        progress: &'b Progress,
        report: &'b mut WalkReport,
    ) -> BoxFuture<'b, ()> {
        Box::pin(async move {
            if depth > self.max_depth {
                let err = DriveError::DepthLimit {
                    folder_id: folder_id.to_string(),
                    max_depth: self.max_depth,
                };
                error!("{}", err);
                report.fail_folder(folder_id, err.to_string());
                return;
            }
            if !state.visited.insert(folder_id.to_string()) {
                let err = DriveError::CycleDetected(folder_id.to_string());
                warn!("{}", err);
                report.fail_folder(folder_id, err.to_string());
                return;
            }

            let folder_name = match self.lister.folder_name(folder_id).await {
                Ok(name) => name,
                Err(e) => {
                    error!("Failed to fetch folder metadata for folder ID {}: {}", folder_id, e);
                    report.fail_folder(folder_id, e.to_string());
                    return;
                }
            };
            info!("Processing folder: {}", folder_name);

            let dir = target_dir(output_dir, &folder_name);
            if let Err(e) = tokio::fs::create_dir_all(&dir).await {
                error!("Failed to create directory {}: {}", dir.display(), e);
                report.fail_folder(folder_id, e.to_string());
                return;
            }

            let children = match self.lister.list_children(folder_id).await {
                Ok(children) => children,
                Err(e) => {
                    error!("Failed to fetch file list for folder ID {}: {}", folder_id, e);
                    report.fail_folder(folder_id, e.to_string());
                    return;
                }
            };

            for child in &children {
                if child.is_folder() {
                    self.walk_folder(&child.id, &dir, depth + 1, state, progress, report)
                        .await;
                } else {
                    let record = self.mirror_file(child, &dir, &mut state.written).await;
                    progress.advance();
                    report.files.push(record);
                }
            }
        })
    }

    async fn mirror_file(
        &self,
        entry: &RemoteEntry,
        dir: &Path,
        written: &mut HashSet<PathBuf>,
    ) -> FileRecord {
        let record = |path: Option<PathBuf>, outcome: FileOutcome| FileRecord {
            file_id: entry.id.clone(),
            name: entry.name.clone(),
            path,
            outcome,
        };

        let (link, path, exporting) = match plan_for(entry, dir) {
            Plan::Download { link, path } => (link, path, false),
            Plan::Export { link, path } => (link, path, true),
            Plan::Unavailable(reason) => {
                match reason {
                    UnavailableReason::NoPdfExport => {
                        warn!("No export link available for {}. Skipping.", entry.name)
                    }
                    UnavailableReason::NotDownloadable => {
                        warn!("Skipped: {} (not downloadable or exportable)", entry.name)
                    }
                }
                return record(None, FileOutcome::Unavailable(reason));
            }
        };

        match tokio::fs::try_exists(&path).await {
            Ok(true) => {
                if written.contains(&path) {
                    warn!(
                        "Skipped: {} ({} was already written by another entry in this run)",
                        entry.name,
                        path.display()
                    );
                } else {
                    info!("Skipped: {} (already exists)", entry.name);
                }
                return record(Some(path), FileOutcome::SkippedExisting);
            }
            Ok(false) => {}
            Err(e) => {
                error!("Failed to process {}: {}", entry.name, e);
                return record(Some(path), FileOutcome::Failed(e.to_string()));
            }
        }

        let fetched = self.lister.fetch_to(link, &path).await;
        if fetched.is_ok() {
            written.insert(path.clone());
        }
        let outcome = match fetched {
            Ok(bytes) if exporting => {
                info!("Exported: {} as PDF", entry.name);
                FileOutcome::Exported { bytes }
            }
            Ok(bytes) => {
                info!("Downloaded: {} to {}", entry.name, path.display());
                FileOutcome::Downloaded { bytes }
            }
            Err(e) => {
                error!("Failed to process {}: {}", entry.name, e);
                FileOutcome::Failed(e.to_string())
            }
        };
        record(Some(path), outcome)
    }
}
