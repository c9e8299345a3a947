//! In-memory job registry and submission rate table.
//!
//! Both live behind one mutex so admission (rate check + insert) is atomic
//! with respect to status transitions made by workers and reads made by the
//! retention sweeper.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use reel_models::{Job, JobId, JobStatus};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::config::ApiConfig;
use crate::error::{ApiError, ApiResult};

/// A registered job plus the directories it owns.
#[derive(Debug, Clone)]
pub struct JobEntry {
    pub job: Job,
    /// Final artifacts land here
    pub output_dir: PathBuf,
    /// Submitted script and uploaded background
    pub staging_dir: PathBuf,
}

impl JobEntry {
    pub fn new(job: Job, output_dir: impl Into<PathBuf>, staging_dir: impl Into<PathBuf>) -> Self {
        Self {
            job,
            output_dir: output_dir.into(),
            staging_dir: staging_dir.into(),
        }
    }

    pub fn job_id(&self) -> &JobId {
        &self.job.job_id
    }

    pub fn status(&self) -> JobStatus {
        self.job.status
    }

    /// The job id plus the file names of its directories.
    fn dir_names(&self) -> impl Iterator<Item = String> + '_ {
        std::iter::once(self.job.job_id.as_str().to_string()).chain(
            [&self.output_dir, &self.staging_dir]
                .into_iter()
                .filter_map(|dir| dir.file_name())
                .map(|name| name.to_string_lossy().into_owned()),
        )
    }

    fn finished_before(&self, cutoff: Duration, now: DateTime<Utc>) -> bool {
        self.job
            .completed_at
            .and_then(|done| now.signed_duration_since(done).to_std().ok())
            .map(|age| age >= cutoff)
            .unwrap_or(false)
    }
}

#[derive(Default)]
struct RegistryInner {
    jobs: HashMap<JobId, JobEntry>,
    submissions: HashMap<String, VecDeque<Instant>>,
}

impl RegistryInner {
    /// Sliding-window admission. Records `now` when admitted.
    fn admit(&mut self, submitter: &str, now: Instant, limit: usize, window: Duration) -> Result<(), u64> {
        let stamps = self.submissions.entry(submitter.to_string()).or_default();
        while let Some(oldest) = stamps.front() {
            if now.saturating_duration_since(*oldest) >= window {
                stamps.pop_front();
            } else {
                break;
            }
        }

        if stamps.len() >= limit {
            let retry_after = stamps
                .front()
                .map(|oldest| window.saturating_sub(now.saturating_duration_since(*oldest)))
                .unwrap_or(window);
            return Err(retry_after.as_secs().max(1));
        }

        stamps.push_back(now);
        Ok(())
    }

    fn forget_idle_submitters(&mut self, now: Instant, window: Duration) {
        self.submissions.retain(|_, stamps| {
            stamps
                .back()
                .map(|last| now.saturating_duration_since(*last) < window)
                .unwrap_or(false)
        });
    }
}

/// Live job registry. Shared as `Arc<JobRegistry>`.
pub struct JobRegistry {
    inner: Mutex<RegistryInner>,
    limit: usize,
    window: Duration,
}

impl JobRegistry {
    pub fn new(limit: usize, window: Duration) -> Self {
        Self {
            inner: Mutex::new(RegistryInner::default()),
            limit,
            window,
        }
    }

    pub fn from_config(config: &ApiConfig) -> Self {
        Self::new(config.submit_limit, config.submit_window)
    }

    /// Admit and register a job, or reject it without touching the registry.
    pub async fn try_submit(&self, submitter: &str, entry: JobEntry) -> ApiResult<JobId> {
        self.try_submit_at(submitter, entry, Instant::now()).await
    }

    async fn try_submit_at(&self, submitter: &str, entry: JobEntry, now: Instant) -> ApiResult<JobId> {
        let mut inner = self.inner.lock().await;

        if inner.jobs.contains_key(entry.job_id()) {
            return Err(ApiError::Conflict(format!("job {} already exists", entry.job_id())));
        }

        if let Err(retry_after_secs) = inner.admit(submitter, now, self.limit, self.window) {
            warn!(submitter = %submitter, limit = self.limit, "Submission rate limit exceeded");
            return Err(ApiError::RateLimited { retry_after_secs });
        }

        if inner.submissions.len() > 1024 {
            inner.forget_idle_submitters(now, self.window);
        }

        let job_id = entry.job_id().clone();
        debug!(job_id = %job_id, submitter = %submitter, "Job registered");
        inner.jobs.insert(job_id.clone(), entry);
        Ok(job_id)
    }

    pub async fn get(&self, job_id: &JobId) -> Option<JobEntry> {
        self.inner.lock().await.jobs.get(job_id).cloned()
    }

    pub async fn contains(&self, job_id: &JobId) -> bool {
        self.inner.lock().await.jobs.contains_key(job_id)
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.jobs.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// `queued -> running`. False if the job is unknown or already started.
    pub async fn mark_running(&self, job_id: &JobId) -> bool {
        let mut inner = self.inner.lock().await;
        match inner.jobs.get_mut(job_id) {
            Some(entry) => entry.job.start(),
            None => false,
        }
    }

    /// Replace the tracked job with the pipeline's finished record.
    pub async fn finish(&self, finished: Job) {
        let mut inner = self.inner.lock().await;
        match inner.jobs.get_mut(&finished.job_id) {
            Some(entry) if !entry.job.is_terminal() => {
                let started_at = entry.job.started_at;
                entry.job = finished;
                if entry.job.started_at.is_none() {
                    entry.job.started_at = started_at;
                }
            }
            Some(_) => debug!(job_id = %finished.job_id, "Ignoring update to terminal job"),
            None => warn!(job_id = %finished.job_id, "Finished job is not registered"),
        }
    }

    /// Mark a job failed with `reason`.
    pub async fn fail(&self, job_id: &JobId, reason: impl Into<String>) {
        let mut inner = self.inner.lock().await;
        if let Some(entry) = inner.jobs.get_mut(job_id) {
            entry.job.fail(reason);
        }
    }

    /// Directory names owned by `queued`/`running` jobs.
    ///
    /// API jobs name their output, temp and staging directories after the
    /// job id, so the id set covers all three roots.
    pub async fn protected_names(&self) -> HashSet<String> {
        let inner = self.inner.lock().await;
        inner
            .jobs
            .values()
            .filter(|e| !e.job.is_terminal())
            .flat_map(JobEntry::dir_names)
            .collect()
    }

    /// Forget terminal jobs whose directories were swept, or that finished
    /// at least `max_age` before `now`. Returns the evicted ids.
    pub async fn evict_expired(&self, swept: &HashSet<String>, max_age: Duration, now: DateTime<Utc>) -> Vec<JobId> {
        let mut inner = self.inner.lock().await;
        let mut evicted = Vec::new();
        inner.jobs.retain(|job_id, entry| {
            let expired = entry.job.is_terminal()
                && (entry.finished_before(max_age, now) || entry.dir_names().any(|name| swept.contains(&name)));
            if expired {
                evicted.push(job_id.clone());
            }
            !expired
        });
        evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reel_models::JobFlags;

    fn entry(id: &str) -> JobEntry {
        let job = Job::new(JobId::from_string(id), JobFlags::test());
        JobEntry::new(job, format!("/out/{id}"), format!("/jobs/{id}"))
    }

    #[tokio::test]
    async fn test_window_slides() {
        let registry = JobRegistry::new(2, Duration::from_secs(60));
        let t0 = Instant::now();

        registry.try_submit_at("ip", entry("a"), t0).await.unwrap();
        registry
            .try_submit_at("ip", entry("b"), t0 + Duration::from_secs(10))
            .await
            .unwrap();

        let err = registry
            .try_submit_at("ip", entry("c"), t0 + Duration::from_secs(20))
            .await
            .unwrap_err();
        match err {
            ApiError::RateLimited { retry_after_secs } => assert_eq!(retry_after_secs, 40),
            other => panic!("unexpected {other:?}"),
        }

        // First stamp has aged out
        registry
            .try_submit_at("ip", entry("c"), t0 + Duration::from_secs(61))
            .await
            .unwrap();
        assert_eq!(registry.len().await, 3);
    }

    #[tokio::test]
    async fn test_submitters_are_independent() {
        let registry = JobRegistry::new(1, Duration::from_secs(60));
        registry.try_submit("10.0.0.1", entry("a")).await.unwrap();
        registry.try_submit("10.0.0.2", entry("b")).await.unwrap();
        assert!(registry.try_submit("10.0.0.1", entry("c")).await.is_err());
        assert!(!registry.contains(&JobId::from_string("c")).await);
    }

    #[tokio::test]
    async fn test_duplicate_id_conflicts() {
        let registry = JobRegistry::new(5, Duration::from_secs(60));
        registry.try_submit("ip", entry("a")).await.unwrap();
        let err = registry.try_submit("ip", entry("a")).await.unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_lifecycle_and_protection() {
        let registry = JobRegistry::new(5, Duration::from_secs(60));
        let id = registry.try_submit("ip", entry("a")).await.unwrap();
        assert!(registry.protected_names().await.contains("a"));

        assert!(registry.mark_running(&id).await);
        assert!(!registry.mark_running(&id).await);
        assert_eq!(registry.get(&id).await.unwrap().status(), JobStatus::Running);

        let mut finished = Job::new(id.clone(), JobFlags::test());
        finished.start();
        finished.complete();
        registry.finish(finished).await;

        let entry = registry.get(&id).await.unwrap();
        assert_eq!(entry.status(), JobStatus::Complete);
        assert!(registry.protected_names().await.is_empty());

        // Terminal jobs are never revisited
        registry.fail(&id, "late").await;
        assert_eq!(registry.get(&id).await.unwrap().status(), JobStatus::Complete);
    }

    #[tokio::test]
    async fn test_evict_expired_keeps_live_and_recent_jobs() {
        let registry = JobRegistry::new(10, Duration::from_secs(60));
        for id in ["live", "swept", "old", "recent"] {
            registry.try_submit("ip", entry(id)).await.unwrap();
        }
        assert!(registry.mark_running(&JobId::from_string("live")).await);
        for id in ["swept", "old", "recent"] {
            registry.fail(&JobId::from_string(id), "done").await;
        }

        let swept: HashSet<String> = ["swept".to_string(), "live".to_string()].into();
        let later = Utc::now() + chrono::Duration::hours(2);
        let old_done = registry.get(&JobId::from_string("old")).await.unwrap().job.completed_at.unwrap();

        // Only "swept" matches by name; nothing has aged out yet
        let evicted = registry.evict_expired(&swept, Duration::from_secs(7200), old_done).await;
        assert_eq!(evicted, vec![JobId::from_string("swept")]);

        let mut evicted = registry
            .evict_expired(&HashSet::new(), Duration::from_secs(3600), later)
            .await;
        evicted.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        assert_eq!(evicted, vec![JobId::from_string("old"), JobId::from_string("recent")]);

        assert_eq!(registry.len().await, 1);
        assert!(registry.contains(&JobId::from_string("live")).await);
    }
}
