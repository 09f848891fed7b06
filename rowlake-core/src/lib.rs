//! # rowlake-core
//!
//! An offline-first, in-process data engine. Datasets are ingested through
//! format adapters, described by an inferred schema, transformed through
//! lazy pipelines and queried with an embedded SQL engine. A [`Lake`] owns
//! their lifecycle and persists them through a pluggable storage backend.
//!
//! The [`perf`] module holds the utilities that keep large datasets usable:
//! windowed rendering, paged loading, sampling, chunked streaming and
//! memory-pressure reclamation.

// Foundation
pub mod config;
pub mod error;

// Record & schema model
pub mod data;

// Transformation
pub mod pipeline;

// Registry and its collaborators
pub mod adapters;
pub mod lake;
pub mod sql;
pub mod storage;

// Performance layer
pub mod perf;

// Re-exports
pub use adapters::{AdapterOptions, AdapterRegistry, ExternalHandle, FormatAdapter};
pub use config::{LakeConfig, load_config};
pub use data::{ColumnDescriptor, ColumnType, Dataset, DatasetKind, Record, Schema, record};
pub use error::LakeError;
pub use lake::{CreateOptions, DatasetPatch, Lake, LakeStats, MergeOptions, UpdateOptions};
pub use pipeline::{Aggregation, Condition, Pipeline, SortDirection};
pub use storage::{FileStorage, MemoryStorage, Storage};
