//! Source-system adapters: JSON-RPC transport, wire codec and the resilient
//! client the sync pipeline reads through.

pub mod jsonrpc;
pub mod resilient_client;
pub mod wire;

pub use jsonrpc::JsonRpcSourceApi;
pub use resilient_client::{FetchProgressCallback, ResilientClient};
