//
// The public facade: parses a HOCON document, resolves substitutions, and exposes the typed
// path-accessor API over the result. Wires together `hocon_lexing` + `hocon_tree` +
// `hocon_parsing` + `hocon_resolve` + `hocon_format`, the same way the teacher's CLI bin wires
// its own pipeline crates together.
//

pub mod accessor;
pub mod duration;
pub mod options;

pub use accessor::ConfigAccess;
pub use duration::parse_duration_nanos;
pub use hocon_format::{render, Format, RenderOptions};
pub use hocon_parsing::{FilesystemLoader, PackageResolver, ResourceLoader};
pub use hocon_resolve::UnresolvedMode;
pub use hocon_tree::{ConfigError, ConfigResult, ConfigTree, Value};
pub use options::ParseOptions;

/// Parses and (by default) resolves a HOCON document from a string, with no include support.
pub fn parse_string(text: &str, opts: &ParseOptions) -> ConfigResult<ConfigTree> {
    let tree = match (opts.loader, opts.packages) {
        (Some(loader), packages) => hocon_parsing::parse_with_includes(text, loader, packages)?,
        (None, _) => hocon_parsing::parse_string(text)?,
    };

    if opts.resolve {
        hocon_resolve::resolve_substitutions(tree, opts.unresolved)
    } else {
        Ok(tree)
    }
}

/// Parses a file from disk, resolving `include` directives relative to the filesystem.
pub fn parse_file(path: &str, opts: &ParseOptions) -> ConfigResult<ConfigTree> {
    let loader = FilesystemLoader;
    let text = loader
        .load_file(path)
        .map_err(|err| ConfigError::Io { message: format!("{}", err) })?;

    let file_opts = ParseOptions {
        resolve: opts.resolve,
        unresolved: opts.unresolved,
        loader: Some(&loader),
        packages: opts.packages,
    };

    parse_string(&text, &file_opts)
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_and_resolve_substitution() {
        let tree = parse_string("a = 1\nb = ${a}\n", &ParseOptions::default()).unwrap();
        assert_eq!(tree.get_int("b").unwrap(), 1);
    }

    #[test]
    fn test_parse_without_resolving() {
        let opts = ParseOptions { resolve: false, ..ParseOptions::default() };
        let tree = parse_string("a = ${b}\n", &opts).unwrap();

        assert!(matches!(tree.get("a").unwrap(), Value::Deferred(_)));
    }

    #[test]
    fn test_string_concatenation_end_to_end() {
        let tree = parse_string("a = foo bar\n", &ParseOptions::default()).unwrap();
        assert_eq!(tree.get_string("a").unwrap(), "foo bar");
    }

    #[test]
    fn test_object_merge_end_to_end() {
        let tree = parse_string("a { x = 1 }\na { y = 2 }\n", &ParseOptions::default()).unwrap();

        assert_eq!(tree.get_int("a.x").unwrap(), 1);
        assert_eq!(tree.get_int("a.y").unwrap(), 2);
    }

    #[test]
    fn test_render_json_round_trip() {
        let tree = parse_string("a = 1\nb = \"x\"\n", &ParseOptions::default()).unwrap();
        let json = render(&tree, Format::Json, &RenderOptions::default());

        assert_eq!(json, "{\n  \"a\": 1,\n  \"b\": \"x\"\n}");
    }

    fn dedent(text: &str) -> String {
        let mut text = textwrap::dedent(text).trim().to_string();
        text.push('\n');
        text
    }

    #[test]
    fn test_scenario_self_referencing_override() {
        let tree = parse_string(
            &dedent(
                r#"
                connections = 10
                connections = ${connections} 5
                "#,
            ),
            &ParseOptions::default(),
        )
        .unwrap();

        assert_eq!(tree.get_string("connections").unwrap(), "10 5");
    }

    #[test]
    fn test_scenario_plus_equals_builds_a_list() {
        let tree = parse_string(
            &dedent(
                r#"
                plugins = [a, b]
                plugins += c
                "#,
            ),
            &ParseOptions::default(),
        )
        .unwrap();

        assert_eq!(
            tree.get_list("plugins").unwrap(),
            vec![
                Value::String("a".to_string()),
                Value::String("b".to_string()),
                Value::String("c".to_string()),
            ]
        );
    }

    #[test]
    fn test_scenario_unresolved_mandatory_substitution_is_an_error() {
        let result = parse_string("a = ${nowhere}\n", &ParseOptions::default());
        assert!(result.is_err());
    }

    #[test]
    fn test_scenario_literal_unit_suffixed_string_survives_list_concatenation() {
        let tree = parse_string("timeouts = [128m, 30s]\n", &ParseOptions::default()).unwrap();

        assert_eq!(
            tree.get_list("timeouts").unwrap(),
            vec![Value::String("128m".to_string()), Value::String("30s".to_string())]
        );
    }

    #[test]
    fn test_scenario_nested_tree_merge_across_statements() {
        let tree = parse_string(
            &dedent(
                r#"
                database {
                  host = "localhost"
                  port = 5432
                }
                database.port = 5433
                "#,
            ),
            &ParseOptions::default(),
        )
        .unwrap();

        assert_eq!(tree.get_string("database.host").unwrap(), "localhost");
        assert_eq!(tree.get_int("database.port").unwrap(), 5433);
    }
}
