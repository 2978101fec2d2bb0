//! Axum HTTP API server for the montage-sheet pipeline.
//!
//! This crate provides:
//! - The three pipeline entry points (`POST /videos/init`, `POST
//!   /videos/:id/drive`, `GET /videos/:id`)
//! - Rate limiting and security headers
//! - Prometheus metrics

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
