//! MCP tool implementations.
//!
//! One tool per externally triggered gateway operation.

pub mod gateway_fetch;
pub mod gateway_install;
