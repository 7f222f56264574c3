//! anilib command line interface
//!
//! Library surface of the CLI so integration tests can reach configuration
//! and path handling.

pub mod config;
pub mod hashing;
pub mod paths;
pub mod sink;
