//! Database access for roomlog-api
//!
//! Row types and query functions, one module per table. UUIDs are
//! stored as TEXT, timestamps as RFC 3339 / CURRENT_TIMESTAMP.

pub mod images;
pub mod inferences;
pub mod organizations;
pub mod projects;
pub mod rooms;
pub mod sessions;
