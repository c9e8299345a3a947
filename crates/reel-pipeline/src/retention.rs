//! Output directory retention.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tracing::{info, warn};

use crate::error::PipelineResult;

async fn list_dirs(root: &Path) -> PipelineResult<Vec<(PathBuf, SystemTime)>> {
    let mut entries = match tokio::fs::read_dir(root).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut dirs = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let meta = match entry.metadata().await {
            Ok(meta) if meta.is_dir() => meta,
            _ => continue,
        };
        let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        dirs.push((entry.path(), modified));
    }
    Ok(dirs)
}

async fn remove_dir(path: &Path) -> bool {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => true,
        Err(e) => {
            warn!(path = %path.display(), "Failed to remove output dir: {}", e);
            false
        }
    }
}

/// Delete the `count` least recently modified directories under `root`.
pub async fn prune_oldest(root: &Path, count: usize) -> PipelineResult<Vec<PathBuf>> {
    if count == 0 {
        return Ok(Vec::new());
    }

    let mut dirs = list_dirs(root).await?;
    dirs.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));

    let mut removed = Vec::new();
    for (path, _) in dirs.into_iter().take(count) {
        if remove_dir(&path).await {
            removed.push(path);
        }
    }
    if !removed.is_empty() {
        info!(root = %root.display(), count = removed.len(), "Pruned oldest output dirs");
    }
    Ok(removed)
}

/// Delete directories under `root` at least `max_age` old, unless `is_protected`.
pub async fn remove_older_than<F>(root: &Path, max_age: Duration, is_protected: F) -> PipelineResult<Vec<PathBuf>>
where
    F: Fn(&Path) -> bool,
{
    let now = SystemTime::now();
    let mut removed = Vec::new();

    for (path, modified) in list_dirs(root).await? {
        let age = now.duration_since(modified).unwrap_or(Duration::ZERO);
        if age < max_age || is_protected(&path) {
            continue;
        }
        if remove_dir(&path).await {
            removed.push(path);
        }
    }
    Ok(removed)
}
