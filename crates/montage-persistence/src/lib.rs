//! Document-store REST API client and repositories (C10).
//!
//! Modeled as a Firestore-style document database reached over bearer-token
//! HTTP. Two application-level conventions emulate what a relational store
//! would give natively: a sheet's document ID is its video's ID (idempotent
//! creation), and an entry's document ID is derived from `(sheet_id,
//! plan_number)` (a poor man's unique index — see `repos`).
//!
//! ## Modules
//! - `client` - the document-store REST client
//! - `retry` - retry policy with exponential backoff
//! - `metrics` - Prometheus metrics collection
//! - `repos` - typed repositories for videos, sheets and entries
//! - `types` - wire-format document/value types

pub mod client;
pub mod error;
pub mod metrics;
pub mod repos;
pub mod retry;
pub mod types;

pub use client::{DocumentStoreClient, DocumentStoreConfig};
pub use error::{PersistenceError, PersistenceResult};
pub use repos::{DraftEntry, EntryRepository, LockOutcome, SheetRepository, VideoRepository};
pub use retry::RetryConfig;
pub use types::{Document, FromFirestoreValue, ToFirestoreValue, Value};
