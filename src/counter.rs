//! Pre-pass that sizes the progress display.

use std::collections::HashSet;

use tracing::{error, warn};

use crate::remote::RemoteLister;

/// Count the files below `root_id` at any depth.
///
/// Best effort: a folder whose listing fails contributes 0, as does anything
/// beyond `max_depth` or a folder seen twice in the same tree.
pub async fn count_files<L>(lister: &L, root_id: &str, max_depth: usize) -> u64
where
    L: RemoteLister + ?Sized,
{
    let mut visited = HashSet::new();
    let mut pending = vec![(root_id.to_string(), 0usize)];
    let mut count = 0;

    while let Some((folder_id, depth)) = pending.pop() {
        if depth > max_depth {
            warn!(
                "Not counting folder {}: deeper than {} levels",
                folder_id, max_depth
            );
            continue;
        }
        if !visited.insert(folder_id.clone()) {
            warn!("Folder {} appears twice in one tree; counted once", folder_id);
            continue;
        }

        let children = match lister.list_children(&folder_id).await {
            Ok(children) => children,
            Err(e) => {
                error!("Failed to fetch file list for folder ID {}: {}", folder_id, e);
                continue;
            }
        };

        for child in children {
            if child.is_folder() {
                pending.push((child.id, depth + 1));
            } else {
                count += 1;
            }
        }
    }

    count
}

/// Sum of [`count_files`] over every root, one root after another.
pub async fn count_all<L>(lister: &L, root_ids: &[String], max_depth: usize) -> u64
where
    L: RemoteLister + ?Sized,
{
    let mut total = 0;
    for root_id in root_ids {
        total += count_files(lister, root_id, max_depth).await;
    }
    total
}
