//! HTTP job API for the reel pipeline.
//!
//! Jobs are accepted over HTTP, admitted through a per-submitter sliding
//! window, and run by a bounded [`WorkerPool`]. Status, result and log
//! endpoints read the in-memory [`JobRegistry`]; a [`RetentionSweeper`]
//! expires old job directories in the background.

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod registry;
pub mod routes;
pub mod services;
pub mod state;
pub mod worker;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use registry::{JobEntry, JobRegistry};
pub use routes::create_router;
pub use services::RetentionSweeper;
pub use state::AppState;
pub use worker::WorkerPool;
