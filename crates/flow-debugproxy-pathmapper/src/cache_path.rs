//! Flow proxy class cache layout

use regex::Regex;
use std::sync::LazyLock;

/// On-disk location of a compiled proxy class
pub const CACHE_PATH_PATTERN: &str =
    "@base@/Data/Temporary/@context@/Cache/Code/Flow_Object_Classes/@filename@.php";

/// `<root>/Packages/<package path>/Classes/<class path>.php`
static PACKAGE_CLASS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.*?)/Packages/(.+?)/Classes/(.+)\.php$").expect("must compile")
});

/// Renders cache artifact paths for one Flow context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachePathTemplate {
    context: String,
}

impl CachePathTemplate {
    pub fn new(context: impl Into<String>) -> Self {
        Self {
            context: context.into(),
        }
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    /// Cache artifact path for `class_file` under the installation at `base`
    pub fn render(&self, base: &str, class_file: &str) -> String {
        CACHE_PATH_PATTERN
            .replacen("@context@", &self.context, 1)
            .replacen("@filename@", class_file, 1)
            .replacen("@base@", base, 1)
    }
}

/// A source file located inside a Flow package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageClass {
    /// Installation root, the part before `/Packages/`
    pub base: String,
    /// Package key, e.g. `Acme.Demo`
    pub package_key: String,
    /// Flattened class name used as cache file name, e.g. `Acme_Demo_Foo_Bar`
    pub class_file: String,
}

impl PackageClass {
    /// Locate `path` in the package layout; `None` for files outside of it
    ///
    /// Both PSR-0 (`Classes/Acme/Demo/Foo/Bar.php`) and PSR-4
    /// (`Classes/Foo/Bar.php`) layouts resolve to `Acme_Demo_Foo_Bar`.
    pub fn from_source_path(path: &str) -> Option<Self> {
        let caps = PACKAGE_CLASS.captures(path)?;
        let base = caps[1].to_string();
        let package_key = caps[2].rsplit('/').next()?.to_string();
        let class_path = &caps[3];
        if package_key.is_empty() {
            return None;
        }

        let namespace = package_key.replace('.', "/");
        let qualified = if class_path.starts_with(&format!("{}/", namespace)) {
            class_path.to_string()
        } else {
            format!("{}/{}", package_key, class_path)
        };

        Some(Self {
            base,
            package_key,
            class_file: fold_class_name(&qualified),
        })
    }
}

fn fold_class_name(path: &str) -> String {
    path.chars()
        .map(|c| if c == '.' || c == '/' { '_' } else { c })
        .collect()
}
