//! # ES Indexer Shared
//!
//! Plain data types shared by the repository, pipeline and binary crates:
//! source rows and their typed values, watermark keys, the configuration
//! document and the per-run report.

pub mod config;
pub mod report;
pub mod row;
pub mod watermark;

pub use config::{
    EsConfig, FieldKind, IndexSettings, IndexerConfig, RdsConfig, SqlConfig, TableSpec,
    UpdateStrategy,
};
pub use report::{DocumentFailure, RunReport, StageTimings};
pub use row::{FieldValue, SourceRow};
pub use watermark::{UpdateKey, WatermarkColumn, WATERMARK_SENTINEL};
