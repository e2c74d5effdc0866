//! Test Helper Utilities
//!
//! Shared utilities for testing slm-analysis

#![allow(dead_code)]

pub mod db_utils;
pub mod mock_analyzer;

pub use db_utils::{create_test_db, get_table_columns};
pub use mock_analyzer::{ConcurrencyProbe, MockAnalyzer};
