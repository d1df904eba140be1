//! Core types and shared functionality for offgate.
//!
//! This crate provides:
//! - Generation-scoped response cache with SQLite backend
//! - The static asset manifest
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod manifest;

pub use cache::{CacheDb, CacheEntry, CachedResponse, GenerationId, GenerationInfo, GenerationState};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
pub use manifest::Manifest;
