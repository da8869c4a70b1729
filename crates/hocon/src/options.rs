use hocon_parsing::{PackageResolver, ResourceLoader};
use hocon_resolve::UnresolvedMode;

/// Controls how a document is parsed and resolved, the facade's equivalent of the teacher's
/// `FormatConfig` plain-struct-of-knobs pattern.
pub struct ParseOptions<'a> {
    /// Run the substitution resolver after parsing. Disabling this is useful for inspecting the
    /// raw parse tree (mirrors the CLI's `--tree` debug flag in the teacher).
    pub resolve: bool,
    pub unresolved: UnresolvedMode,
    pub loader: Option<&'a dyn ResourceLoader>,
    pub packages: Option<&'a dyn PackageResolver>,
}

impl<'a> Default for ParseOptions<'a> {
    fn default() -> Self {
        Self {
            resolve: true,
            unresolved: UnresolvedMode::Mandatory,
            loader: None,
            packages: None,
        }
    }
}
