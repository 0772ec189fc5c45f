//! # NFO Common Library
//!
//! Shared code for the fiscal-document organizer:
//! - Error type used across crates
//! - Configuration loading and startup validation
//! - Database initialization and row models

pub mod config;
pub mod db;
pub mod error;

pub use config::IngestConfig;
pub use error::{Error, Result};
