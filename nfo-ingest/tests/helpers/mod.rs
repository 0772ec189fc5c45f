//! Test Helper Utilities
//!
//! Shared utilities for nfo-ingest integration tests

#![allow(dead_code)]

pub mod env;
pub mod fixtures;

pub use env::TestEnv;
pub use fixtures::{nfe_xml, CollectingSink, PanickingExtractor};
