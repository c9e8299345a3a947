//! API configuration.

use std::path::PathBuf;
use std::time::Duration;

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// CORS origins
    pub cors_origins: Vec<String>,
    /// Per-IP request rate (requests per second)
    pub rate_limit_rps: u32,
    /// Take client IPs from X-Forwarded-For / X-Real-IP. Only safe behind a
    /// proxy that overwrites them.
    pub trust_proxy_headers: bool,
    /// Max request body size; uploads carry whole background videos
    pub max_body_size: usize,
    /// Environment (development/production)
    pub environment: String,
    /// Concurrent pipeline runs
    pub worker_count: usize,
    /// Submissions allowed per submitter within `submit_window`
    pub submit_limit: usize,
    pub submit_window: Duration,
    /// Output directories older than this are swept
    pub retention_age: Duration,
    pub sweep_interval: Duration,
    /// Staging area for submitted scripts and uploaded backgrounds
    pub jobs_dir: PathBuf,
    pub metrics_enabled: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_origins: vec!["*".to_string()],
            rate_limit_rps: 10,
            trust_proxy_headers: false,
            max_body_size: 512 * 1024 * 1024, // 512MB
            environment: "development".to_string(),
            worker_count: 3,
            submit_limit: 5,
            submit_window: Duration::from_secs(60),
            retention_age: Duration::from_secs(24 * 3600),
            sweep_interval: Duration::from_secs(3600),
            jobs_dir: PathBuf::from("jobs"),
            metrics_enabled: true,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}

impl ApiConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("API_HOST").unwrap_or(defaults.host),
            port: env_parse("API_PORT").unwrap_or(defaults.port),
            cors_origins: std::env::var("CORS_ORIGINS")
                .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(defaults.cors_origins),
            rate_limit_rps: env_parse("RATE_LIMIT_RPS").unwrap_or(defaults.rate_limit_rps),
            trust_proxy_headers: std::env::var("TRUST_PROXY_HEADERS")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(defaults.trust_proxy_headers),
            max_body_size: env_parse("MAX_BODY_SIZE").unwrap_or(defaults.max_body_size),
            environment: std::env::var("ENVIRONMENT").unwrap_or(defaults.environment),
            worker_count: env_parse::<usize>("WORKER_COUNT")
                .filter(|n| *n > 0)
                .unwrap_or(defaults.worker_count),
            submit_limit: env_parse("SUBMIT_LIMIT").unwrap_or(defaults.submit_limit),
            submit_window: env_parse("SUBMIT_WINDOW_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.submit_window),
            retention_age: env_parse("RETENTION_AGE_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.retention_age),
            sweep_interval: env_parse::<u64>("SWEEP_INTERVAL_SECS")
                .filter(|s| *s > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.sweep_interval),
            jobs_dir: std::env::var("JOBS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.jobs_dir),
            metrics_enabled: std::env::var("METRICS_ENABLED")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(defaults.metrics_enabled),
        }
    }

    /// Check if running in production mode.
    pub fn is_production(&self) -> bool {
        self.environment.to_lowercase() == "production"
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
