//! Path mapper trait and construction from configuration

use crate::flow::FlowPathMapper;
use flow_debugproxy_core::{Config, Direction, Framework, PathMappingStore, Result};
use std::borrow::Cow;
use std::sync::Arc;

/// Rewrites the file paths of DBGp traffic
///
/// Implementations are shared by both copiers of a session and must only
/// keep state in the [`PathMappingStore`] they were built with.
pub trait PathMapper: Send + Sync {
    /// Rewrite an IDE command chunk (text protocol)
    fn apply_mapping_to_text_protocol<'a>(&self, message: &'a [u8]) -> Result<Cow<'a, [u8]>>;

    /// Rewrite a debugger response chunk (framed XML)
    fn apply_mapping_to_xml<'a>(&self, message: &'a [u8]) -> Result<Cow<'a, [u8]>>;

    /// Rewrite a chunk travelling in `direction`
    fn rewrite<'a>(&self, direction: Direction, message: &'a [u8]) -> Result<Cow<'a, [u8]>> {
        match direction {
            Direction::IdeToDebugger => self.apply_mapping_to_text_protocol(message),
            Direction::DebuggerToIde => self.apply_mapping_to_xml(message),
        }
    }
}

/// Forwards every chunk untouched
#[derive(Debug, Clone, Copy, Default)]
pub struct DummyPathMapper;

impl PathMapper for DummyPathMapper {
    fn apply_mapping_to_text_protocol<'a>(&self, message: &'a [u8]) -> Result<Cow<'a, [u8]>> {
        Ok(Cow::Borrowed(message))
    }

    fn apply_mapping_to_xml<'a>(&self, message: &'a [u8]) -> Result<Cow<'a, [u8]>> {
        Ok(Cow::Borrowed(message))
    }
}

/// Build the mapper selected by `config.framework`, bound to `store`
pub fn build(config: &Config, store: Arc<PathMappingStore>) -> Arc<dyn PathMapper> {
    match config.framework {
        Framework::Flow => Arc::new(FlowPathMapper::new(config.context.clone(), store)),
        Framework::Dummy => Arc::new(DummyPathMapper),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dummy_borrows_input() {
        let mapper = DummyPathMapper;
        let message = b"breakpoint_set -f file:///proj/Packages/A/B.Pkg/Classes/C.php\0";
        let out = mapper.rewrite(Direction::IdeToDebugger, message).unwrap();
        assert!(matches!(out, Cow::Borrowed(_)));
        assert_eq!(&*out, &message[..]);
    }

    #[test]
    fn test_build_dummy_ignores_store() {
        let store = Arc::new(PathMappingStore::new());
        let config = Config {
            framework: Framework::Dummy,
            ..Config::default()
        };
        let mapper = build(&config, store.clone());
        let message = b"11\0<response/>\0";
        assert_eq!(&*mapper.rewrite(Direction::DebuggerToIde, message).unwrap(), &message[..]);
        assert!(store.is_empty());
    }
}
