//! Shared library for the Roomlog services
//!
//! Holds the common error type, configuration resolution, and database
//! initialization used by the Roomlog image service.

pub mod config;
pub mod db;
pub mod error;

pub use error::{Error, Result};
