//! # flow-debugproxy-relay
//!
//! TCP relay between a DBGp debugger engine and an IDE.
//!
//! This crate provides:
//! - `Relay` accept loop, one session per debugger connection
//! - `Session` lifecycle with coordinated teardown of both legs
//! - Directional pipes rewriting every chunk through a `PathMapper`

pub mod pipe;
pub mod relay;
pub mod session;

pub use pipe::{BUFFER_SIZE, PipeExit, Teardown, pipe};
pub use relay::Relay;
pub use session::{Session, SessionReport, SessionState};
