//! # ES Indexer Pipeline
//!
//! This crate provides the pipeline components that move changed rows from
//! the relational store into the search index.
//!
//! ## Architecture
//!
//! A run follows a Fetch-Map-Submit-Update sequence:
//!
//! 1. **Query**: Builds the bounded SELECT from the table description
//! 2. **Fetcher**: Runs the optional pre-query and the SELECT
//! 3. **Mapper**: Turns rows into documents and a size-bounded bulk batch
//! 4. **Loader**: Ensures the index exists and submits the batch
//! 5. **Watermark**: Resets the watermark of exactly the submitted rows
//! 6. **Orchestrator**: Coordinates the run and collects timings

pub mod errors;
pub mod fetcher;
pub mod loader;
pub mod mapper;
pub mod orchestrator;
pub mod query;
pub mod watermark;

pub use errors::PipelineError;
pub use orchestrator::{Orchestrator, RunOptions, RunState};
