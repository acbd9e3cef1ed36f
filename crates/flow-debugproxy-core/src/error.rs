//! Error types for flow-debugproxy

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for flow-debugproxy operations
pub type Result<T> = std::result::Result<T, DebugProxyError>;

/// flow-debugproxy error types
#[derive(Debug, Error)]
pub enum DebugProxyError {
    /// Upstream (IDE) endpoint refused or failed the connection
    #[error("Unable to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// The source leg reached end of stream
    #[error("End of stream")]
    EndOfStream,

    /// Read or write failure on a stream leg
    #[error("Stream I/O error: {0}")]
    Io(#[from] io::Error),

    /// The other leg of the session was torn down
    #[error("Pipe closed by the other leg of the session")]
    PeerClosed,

    /// A cache artifact needed to resolve a path could not be read
    #[error("Unable to read cache artifact {path:?}: {source}")]
    CacheArtifact {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// No path mapper exists for the requested framework
    #[error("Unknown framework: {0}")]
    UnknownFramework(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl DebugProxyError {
    /// Whether this is the clean end of a session rather than a failure
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, DebugProxyError::EndOfStream)
    }
}

impl From<serde_json::Error> for DebugProxyError {
    fn from(err: serde_json::Error) -> Self {
        DebugProxyError::Serialization(err.to_string())
    }
}
