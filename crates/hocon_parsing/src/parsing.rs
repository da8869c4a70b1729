//
// The grammar and tree-builder stage: turns a HOCON document's token stream into a `ConfigTree`
// still carrying `Value::Deferred` runs wherever a value needs concatenation or substitution
// resolution, and resolves `include` directives along the way.
//

pub mod grammar;
pub mod include;

pub use grammar::{parse_document, IncludeContext};
pub use include::{FilesystemLoader, IncludeDirective, IncludeKind, PackageResolver, ResourceLoader};

use hocon_tree::{ConfigError, ConfigTree};

/// Parses a HOCON document with no include resolution; an `include` statement is skipped with a
/// warning unless marked `required`, in which case it's a hard error.
pub fn parse_string(text: &str) -> Result<ConfigTree, ConfigError> {
    grammar::parse_document(text, None)
}

/// Parses a HOCON document, resolving `include` directives through `loader` (and `packages` for
/// `include package(...)`, if supplied).
pub fn parse_with_includes(
    text: &str,
    loader: &dyn ResourceLoader,
    packages: Option<&dyn PackageResolver>,
) -> Result<ConfigTree, ConfigError> {
    let ctx = IncludeContext { loader, packages, depth: 0 };
    grammar::parse_document(text, Some(&ctx))
}

/// Reads and parses a file from disk, resolving any includes relative to the filesystem.
pub fn parse_file(path: &str) -> Result<ConfigTree, ConfigError> {
    let loader = FilesystemLoader;
    let text = loader
        .load_file(path)
        .map_err(|err| ConfigError::Io { message: format!("{}", err) })?;

    parse_with_includes(&text, &loader, None)
}

#[cfg(test)]
mod test {
    use super::*;
    use hocon_tree::Value;

    #[test]
    fn test_parse_string_smoke() {
        let tree = parse_string("a = 1\n").unwrap();
        assert_eq!(tree.get_path(&["a".to_string()]).unwrap(), &Value::Int(1));
    }
}
