//! # SLM Common Library
//!
//! Shared code for the sample library manager services:
//! - Error type
//! - Bootstrap configuration and root folder resolution
//! - Logging initialization

pub mod config;
pub mod error;
pub mod logging;

pub use error::{Error, Result};
