//! Flow Framework path mapper
//!
//! Flow executes proxy classes compiled into
//! `Data/Temporary/<context>/Cache/Code/Flow_Object_Classes`. Breakpoints set
//! by the IDE on package sources are moved to those proxies, and file
//! references sent back by the debugger engine are moved back to the sources.

use crate::cache_path::{CachePathTemplate, PackageClass};
use crate::extract::{PathToken, extract};
use crate::frame::rewrite_frames;
use crate::mapper::PathMapper;
use crate::substitution::Substitutions;
use flow_debugproxy_core::{DebugProxyError, Direction, PathMappingStore, Result};
use regex::bytes::Regex;
use std::borrow::Cow;
use std::path::Path;
use std::sync::{Arc, LazyLock};
use tracing::{debug, info};

/// Header Flow writes into every proxy class
static PATH_AND_FILENAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^# PathAndFilename: (.*?)\r?$").expect("must compile")
});

/// Maps between Flow package sources and their compiled proxy classes
pub struct FlowPathMapper {
    template: CachePathTemplate,
    store: Arc<PathMappingStore>,
}

impl FlowPathMapper {
    /// Mapper for the Flow `context`, registering mappings in `store`
    pub fn new(context: impl Into<String>, store: Arc<PathMappingStore>) -> Self {
        Self {
            template: CachePathTemplate::new(context),
            store,
        }
    }

    pub fn store(&self) -> &Arc<PathMappingStore> {
        &self.store
    }

    /// Cache artifact for an IDE source path, if it exists on disk
    fn map_source_path(&self, original_path: &str) -> Option<String> {
        let class = PackageClass::from_source_path(original_path)?;
        debug!("Path {} is a Flow package file", original_path);

        let cache_path = self.template.render(&class.base, &class.class_file);
        if !Path::new(&cache_path).exists() {
            debug!("No proxy class at {}, keeping {}", cache_path, original_path);
            return None;
        }

        if self.store.set(cache_path.as_str(), original_path) {
            info!("Found proxy class for {}\n>>> {}", original_path, cache_path);
        }
        Some(cache_path)
    }

    /// Original source for a cache artifact referenced by the debugger
    fn resolve_cache_path(&self, cache_path: &str) -> Result<String> {
        if let Some(original_path) = self.store.get(cache_path) {
            debug!("Mapping exists {} >>> {}", cache_path, original_path);
            return Ok(original_path);
        }

        let original_path = match read_original_path(Path::new(cache_path))? {
            Some(original_path) => {
                info!("Reversed proxy class {}\n>>> {}", cache_path, original_path);
                original_path
            }
            None => {
                debug!("No PathAndFilename header in {}", cache_path);
                cache_path.to_string()
            }
        };

        self.store.set(cache_path, original_path.as_str());
        // the other direction may have registered first
        Ok(self.store.get(cache_path).unwrap_or(original_path))
    }
}

impl PathMapper for FlowPathMapper {
    fn apply_mapping_to_text_protocol<'a>(&self, message: &'a [u8]) -> Result<Cow<'a, [u8]>> {
        let mut substitutions = Substitutions::new();
        for token in extract(Direction::IdeToDebugger, message) {
            let PathToken::Source(original_path) = token else {
                continue;
            };
            if let Some(cache_path) = self.map_source_path(&original_path) {
                debug!("Text mapping {} >>> {}", original_path, cache_path);
                substitutions.insert(
                    real_filename(&original_path),
                    real_filename(&cache_path),
                );
            }
        }

        if substitutions.is_empty() {
            return Ok(Cow::Borrowed(message));
        }
        Ok(Cow::Owned(substitutions.apply(message)))
    }

    fn apply_mapping_to_xml<'a>(&self, message: &'a [u8]) -> Result<Cow<'a, [u8]>> {
        let mut substitutions = Substitutions::new();
        for token in extract(Direction::DebuggerToIde, message) {
            let PathToken::CacheArtifact {
                base,
                context,
                class_name,
            } = token
            else {
                continue;
            };
            if context != self.template.context() {
                debug!(
                    "Ignoring proxy class {} of context {} (mapping {})",
                    class_name,
                    context,
                    self.template.context()
                );
                continue;
            }

            let cache_path = self.template.render(&base, &class_name);
            let original_path = self.resolve_cache_path(&cache_path)?;
            substitutions.insert(real_filename(&cache_path), real_filename(&original_path));
        }

        // frames are always walked so that lengths stay consistent
        Ok(Cow::Owned(rewrite_frames(message, &substitutions)))
    }
}

/// Strip the `file://` protocol
fn real_filename(path: &str) -> &str {
    path.strip_prefix("file://").unwrap_or(path)
}

/// `# PathAndFilename:` header of a proxy class
fn read_original_path(cache_path: &Path) -> Result<Option<String>> {
    let data = std::fs::read(cache_path).map_err(|source| DebugProxyError::CacheArtifact {
        path: cache_path.to_path_buf(),
        source,
    })?;
    Ok(PATH_AND_FILENAME
        .captures(&data)
        .map(|caps| String::from_utf8_lossy(&caps[1]).into_owned())
        .filter(|path| !path.is_empty()))
}
