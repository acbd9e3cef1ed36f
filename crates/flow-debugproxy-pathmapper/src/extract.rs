//! Candidate path extraction from raw protocol chunks
//!
//! Matching is pattern based: a chunk does not have to hold a complete
//! protocol message for its paths to be found.

use flow_debugproxy_core::Direction;
use regex::bytes::Regex;
use std::sync::LazyLock;

/// `/absolute/path/File.php`, optionally behind a `//` marker (as in `file:///abs`)
static SOURCE_FILE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?://)?(/[^\s\x00]*\.php)").expect("must compile")
});

/// `file://<base>/Data/Temporary/<context>/Cache/Code/Flow_Object_Classes/<class>.php`
static CACHE_ARTIFACT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"file://(/[^\s"<>\x00]*?)/Data/Temporary/([^\s"<>\x00]+?)/Cache/Code/Flow_Object_Classes/([^/\s"<>\x00]+)\.php"#,
    )
    .expect("must compile")
});

/// A path candidate found in a chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathToken {
    /// Absolute source path sent by the IDE
    Source(String),
    /// Cache artifact reference sent by the debugger engine
    CacheArtifact {
        base: String,
        context: String,
        class_name: String,
    },
}

/// Distinct path candidates of `message`, in order of first appearance
pub fn extract(direction: Direction, message: &[u8]) -> Vec<PathToken> {
    let mut tokens = Vec::new();
    match direction {
        Direction::IdeToDebugger => {
            for caps in SOURCE_FILE.captures_iter(message) {
                push_unique(&mut tokens, PathToken::Source(lossy(&caps[1])));
            }
        }
        Direction::DebuggerToIde => {
            for caps in CACHE_ARTIFACT.captures_iter(message) {
                push_unique(
                    &mut tokens,
                    PathToken::CacheArtifact {
                        base: lossy(&caps[1]),
                        context: lossy(&caps[2]),
                        class_name: lossy(&caps[3]),
                    },
                );
            }
        }
    }
    tokens
}

fn push_unique(tokens: &mut Vec<PathToken>, token: PathToken) {
    if !tokens.contains(&token) {
        tokens.push(token);
    }
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}
