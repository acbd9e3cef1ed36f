//! # flow-debugproxy-core
//!
//! Core types shared by the flow-debugproxy crates.
//!
//! This crate provides:
//! - Error type and result alias
//! - Relay configuration
//! - Traffic direction
//! - The shared cache-to-original path store

pub mod config;
pub mod direction;
pub mod error;
pub mod mapping;

pub use config::{Config, Framework};
pub use direction::Direction;
pub use error::{DebugProxyError, Result};
pub use mapping::PathMappingStore;
