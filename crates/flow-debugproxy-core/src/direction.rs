//! Traffic direction through the relay

use std::fmt;

/// Which way a chunk is travelling through a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// XML response channel: `<length>\0<xml>\0` frames
    DebuggerToIde,
    /// Text command channel: `command -i id -f file:///...\0`
    IdeToDebugger,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::DebuggerToIde => f.write_str("Debugger >>> IDE"),
            Direction::IdeToDebugger => f.write_str("IDE >>> Debugger"),
        }
    }
}
