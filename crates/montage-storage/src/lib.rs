//! S3-compatible object storage client.
//!
//! This crate provides upload/download of chunk files and progress
//! artifacts to the object-storage bucket that backs the pipeline (spec
//! §6's generic "object storage" dependency), plus presigned-URL
//! generation and listing/deletion for cleanup.

pub mod client;
pub mod error;

pub use client::{ObjectInfo, ObjectStoreClient, ObjectStoreConfig};
pub use error::{StorageError, StorageResult};
