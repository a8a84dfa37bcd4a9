//! Database access shared across Roomlog services

pub mod init;

pub use init::init_database;
