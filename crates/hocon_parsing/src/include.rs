use std::path::PathBuf;

use hocon_tree::ConfigError;

/// What an `include` statement is asking for.
#[derive(Debug, Clone, PartialEq)]
pub enum IncludeKind {
    /// `include "path/to/file"` or `include file("path/to/file")`
    File(String),
    Url(String),
    Package(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct IncludeDirective {
    pub kind: IncludeKind,
    pub required: bool,
}

/// Supplies the bytes behind an `include` directive. The parser never touches the filesystem or
/// network directly; an embedder wires in an implementation (a plain filesystem loader for a
/// CLI, something sandboxed for a library embedded elsewhere).
pub trait ResourceLoader {
    fn load_file(&self, path: &str) -> Result<String, ConfigError>;
    fn load_url(&self, url: &str) -> Result<String, ConfigError>;
}

/// Resolves `include package("name")` to a list of candidate directories to search for `PATH`,
/// in priority order. The first directory that contains the requested file wins.
pub trait PackageResolver {
    fn resolve(&self, package: &str) -> Vec<PathBuf>;
}

/// A `ResourceLoader` that reads plain files from disk and rejects URL includes, the shape
/// `hoconc` wires in by default.
pub struct FilesystemLoader;

impl ResourceLoader for FilesystemLoader {
    fn load_file(&self, path: &str) -> Result<String, ConfigError> {
        std::fs::read_to_string(path).map_err(|err| ConfigError::Io {
            message: format!("could not read '{}': {}", path, err),
        })
    }

    fn load_url(&self, url: &str) -> Result<String, ConfigError> {
        Err(ConfigError::Include {
            message: format!(
                "no URL loader configured, cannot fetch '{}' (embed a ResourceLoader that \
                 supports load_url to enable include url(...))",
                url
            ),
            pos: None,
        })
    }
}

/// Validates that a string naming a URL-include target is at least a well-formed absolute URL,
/// grounded on pyhocon's use of `urlparse`/`urlopen` before attempting a fetch.
pub fn validate_url(raw: &str) -> Result<url::Url, ConfigError> {
    url::Url::parse(raw).map_err(|err| ConfigError::Include {
        message: format!("'{}' is not a valid URL: {}", raw, err),
        pos: None,
    })
}

pub fn warn_skipped_optional(kind: &IncludeKind, error: &ConfigError) {
    match kind {
        IncludeKind::File(path) => {
            tracing::warn!(target = "hocon_parsing::include", path = %path, %error, "skipping optional include")
        }
        IncludeKind::Url(url) => {
            tracing::warn!(target = "hocon_parsing::include", url = %url, %error, "skipping optional include")
        }
        IncludeKind::Package(package) => {
            tracing::warn!(target = "hocon_parsing::include", package = %package, %error, "skipping optional include")
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_validate_url_rejects_garbage() {
        assert!(validate_url("not a url").is_err());
    }

    #[test]
    fn test_validate_url_accepts_absolute_url() {
        assert!(validate_url("https://example.com/app.conf").is_ok());
    }
}
