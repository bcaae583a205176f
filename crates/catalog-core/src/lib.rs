//! Shared data model, errors and configuration for the catalog statistics
//! engine.

pub mod error;
pub mod exclusions;
pub mod models;
pub mod settings;
pub mod statistics;
pub mod time_utils;
