//! Background retention sweep.
//!
//! Periodically removes job directories older than the retention age from
//! the output, temp and staging roots. Directories belonging to jobs the
//! registry still reports as `queued` or `running` are never removed,
//! whatever their age, and neither are dot-prefixed scratch directories.
//! Terminal jobs whose directories are gone are dropped from the registry.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use reel_pipeline::{remove_older_than, PipelineResult};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::metrics;
use crate::registry::JobRegistry;

/// Retention sweeper service.
pub struct RetentionSweeper {
    registry: Arc<JobRegistry>,
    roots: Vec<PathBuf>,
    max_age: Duration,
    every: Duration,
}

impl RetentionSweeper {
    pub fn new(registry: Arc<JobRegistry>, roots: Vec<PathBuf>, max_age: Duration, every: Duration) -> Self {
        Self {
            registry,
            roots,
            max_age,
            every,
        }
    }

    /// Start the background loop. Runs indefinitely; spawn it.
    pub async fn run(&self) {
        info!(
            "Starting retention sweeper (interval: {:?}, max age: {:?})",
            self.every, self.max_age
        );

        let mut ticker = interval(self.every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            if let Err(e) = self.sweep().await {
                error!("Retention sweep error: {}", e);
            }
        }
    }

    /// One sweep over every root. Returns the removed directories.
    pub async fn sweep(&self) -> PipelineResult<Vec<PathBuf>> {
        let protected = self.registry.protected_names().await;
        let mut removed = Vec::new();

        for root in &self.roots {
            let swept = remove_older_than(root, self.max_age, |dir| {
                dir_name(dir)
                    .map(|name| name.starts_with('.') || protected.contains(&name))
                    .unwrap_or(false)
            })
            .await?;
            removed.extend(swept);
        }

        if !removed.is_empty() {
            info!(count = removed.len(), "Retention sweep removed expired job directories");
            metrics::record_retention_removed(removed.len());
        }

        let swept: HashSet<String> = removed.iter().filter_map(|dir| dir_name(dir)).collect();
        let evicted = self.registry.evict_expired(&swept, self.max_age, Utc::now()).await;
        if !evicted.is_empty() {
            debug!(count = evicted.len(), "Evicted expired jobs from the registry");
        }

        Ok(removed)
    }
}

fn dir_name(dir: &Path) -> Option<String> {
    dir.file_name().map(|name| name.to_string_lossy().into_owned())
}
