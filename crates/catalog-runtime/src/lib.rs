//! Runtime layer of the catalog statistics engine.
//!
//! Runs the daily statistics pipeline over the snapshot history, persists
//! its artifacts, folds them into time series and writes the web-facing
//! series files.

pub mod accumulator;
pub mod orchestrator;
pub mod pipeline;
pub mod series_writer;
pub mod store;

pub use catalog_core as core;
pub use catalog_data as data;
