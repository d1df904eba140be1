//! Client code for offgate.
//!
//! This crate provides the network transport and the offline cache gateway
//! built on top of it: install a generation from the manifest, then serve
//! fetches network-first with a fallback to that generation.

pub mod fetch;
pub mod gateway;

pub use fetch::{FetchConfig, FetchRequest, HttpTransport, NetworkResponse, Transport, TransportError};
pub use gateway::{FetchOutcome, Gateway, GatewaySettings, InstallPhase, InstallReport, ResponseSource};
