//! Snapshot ingestion and the per-snapshot engine.
//!
//! Responsible for discovering capture folders, streaming and validating
//! their shards, deduplicating and filtering records, and computing the
//! per-snapshot aggregates and the delta between adjacent snapshots.

pub mod aggregator;
pub mod differencer;
pub mod filter;
pub mod normalizer;
pub mod plan;
pub mod reader;

pub use catalog_core as core;
