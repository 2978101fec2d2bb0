//! Analyzer-client pool, prompt builder and response parser (C6/C7).
//!
//! The pool is a process-wide, constructor-injected set of API-key handles
//! shared by every video's orchestrator task; clients hold no per-video
//! state. The prompt builder and parser are pure functions operating on a
//! single chunk's scenes and the analyzer's raw text reply.

pub mod client;
pub mod error;
pub mod parser;
pub mod pool;
pub mod prompt;
pub mod types;

pub use client::{quadratic_backoff, AnalyzerClient, AnalyzerConfig};
pub use error::{AnalyzerError, AnalyzerResult};
pub use parser::{parse_response, ParsedScene};
pub use pool::AnalyzerPool;
pub use prompt::build_prompt;
pub use types::{CreatePredictionRequest, CreatePredictionResponse, GetPredictionResponse, PredictionStatus};
