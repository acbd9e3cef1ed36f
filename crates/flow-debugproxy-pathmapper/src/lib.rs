//! # flow-debugproxy-pathmapper
//!
//! Rewrites file paths in DBGp traffic so that the debugger engine works on
//! compiled cache artifacts while the IDE only ever sees original sources.
//!
//! This crate provides:
//! - `PathMapper` trait and the framework mappers (Flow, dummy)
//! - Path candidate extraction per direction
//! - Flow cache path layout
//! - Response frame length reconciliation

pub mod cache_path;
pub mod extract;
pub mod flow;
pub mod frame;
pub mod mapper;
pub mod substitution;

pub use cache_path::{CachePathTemplate, PackageClass};
pub use extract::{PathToken, extract};
pub use flow::FlowPathMapper;
pub use frame::{complete_frames_len, rewrite_frames};
pub use mapper::{DummyPathMapper, PathMapper, build};
pub use substitution::Substitutions;
