//! Bulk mirroring of every folder listed in a links file.

use tracing::{error, info};

use crate::config::MirrorConfig;
use crate::counter::count_all;
use crate::error::{DriveError, Result};
use crate::mirror::{Mirror, WalkReport};
use crate::progress::Progress;
use crate::remote::RemoteLister;
use crate::url_parser::read_folder_ids;

/// Outcome of a bulk run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Root folders that were walked.
    pub roots: Vec<String>,
    /// Files counted in the pre-pass.
    pub total_files: u64,
    /// Files processed during the walk.
    pub processed: u64,
    pub report: WalkReport,
}

/// Root folder IDs for a run: the links file first, then the extra IDs.
pub fn collect_roots(config: &MirrorConfig) -> Vec<String> {
    let mut roots = read_folder_ids(&config.links_file);
    roots.extend(config.extra_folder_ids.iter().cloned());
    roots
}

/// Count, then mirror every root folder into `config.output_dir`.
///
/// Returns `DriveError::NoFolderIds` before touching `lister` when no folder
/// IDs were found. Failures inside a root never stop the following roots.
pub async fn bulk_download<L>(lister: &L, config: &MirrorConfig) -> Result<RunSummary>
where
    L: RemoteLister + ?Sized,
{
    let roots = collect_roots(config);
    if roots.is_empty() {
        error!("No valid folder IDs found. Exiting.");
        return Err(DriveError::NoFolderIds);
    }

    info!("Counting all files in the provided folders. This may take some time, please be patient...");
    let total_files = count_all(lister, &roots, config.max_depth).await;
    info!("Total files to download: {}", total_files);

    let progress = if config.show_progress {
        Progress::new(total_files)
    } else {
        Progress::hidden(total_files)
    };

    let mirror = Mirror::new(lister, config.max_depth);
    let mut report = WalkReport::default();
    for root in &roots {
        report.merge(mirror.walk(root, &config.output_dir, &progress).await);
    }
    progress.finish();

    Ok(RunSummary {
        processed: progress.processed(),
        roots,
        total_files,
        report,
    })
}
