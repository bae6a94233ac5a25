//! Shared HTTP client used by every remote adapter.

pub mod client;

pub use client::{HttpClient, HttpClientBuilder, RetryPolicy};
