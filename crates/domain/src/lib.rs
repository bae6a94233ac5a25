//! # vectorsync Domain
//!
//! Business domain types and models for vectorsync.
//!
//! This crate contains:
//! - Source records, reference tables and the record filter tree
//! - Vector records with their enumerated payload schema
//! - Sync state, results, progress and health types
//! - Domain error types and Result definitions
//! - Configuration structures
//!
//! ## Architecture
//! - Depends only on the foundation tier of `vectorsync-common` (for error
//!   conversions)
//! - Pure domain models and data structures

pub mod config;
pub mod errors;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
