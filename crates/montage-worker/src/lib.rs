#![deny(unreachable_patterns)]
//! Montage-sheet pipeline worker.
//!
//! This crate provides:
//! - The per-video pipeline driver (chunk planning through finalization)
//! - The analyzer-response reconciler and the character-registry wiring
//! - Entry de-duplication and pacing validation
//! - A job executor consuming `PipelineJob`s off the queue
//! - Structured job logging and retry/backoff helpers

pub mod config;
pub mod dedup;
pub mod error;
pub mod executor;
pub mod finalizer;
pub mod logging;
pub mod orchestrator;
pub mod reconciler;
pub mod registry;
pub mod retry;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use executor::JobExecutor;
pub use finalizer::Finalizer;
pub use logging::JobLogger;
pub use orchestrator::Orchestrator;
