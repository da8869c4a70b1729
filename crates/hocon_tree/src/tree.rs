//
// The HOCON data model: `Value`, `ConfigTree`, the merge algebra that implements object merging
// and override history (§4.3), and the concatenation-run types that carry a value through to the
// substitution resolver once it can't be fully resolved at parse time.
//

pub mod error;
pub mod path;
pub mod value;

use std::collections::HashMap;

pub use error::{ConfigError, ConfigResult, SourcePos};
pub use path::parse_key;
pub use value::{ConcatRun, ConcatToken, Substitution, Value};

/// An ordered key -> value map, preserving insertion order the way pyhocon's `ConfigTree`
/// (an `OrderedDict` subclass) does, plus the per-key history of values that were overridden by
/// later merges — needed by the resolver's self-reference fixup pass.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConfigTree {
    entries: Vec<(String, Value)>,
    index: HashMap<String, usize>,
    pub is_root: bool,
    pub history: HashMap<String, Vec<Value>>,
}

impl ConfigTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root() -> Self {
        Self {
            is_root: true,
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Looks up a single direct (non-dotted) key in this tree.
    pub fn get_own(&self, key: &str) -> Option<&Value> {
        self.index.get(key).map(|&i| &self.entries[i].1)
    }

    pub fn get_own_mut(&mut self, key: &str) -> Option<&mut Value> {
        match self.index.get(key) {
            Some(&i) => Some(&mut self.entries[i].1),
            None => None,
        }
    }

    /// Sets a direct key, replacing any existing value in place (preserving its position) or
    /// appending if new. Returns the previous value, if any.
    pub fn set(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        let key = key.into();

        match self.index.get(&key) {
            Some(&i) => Some(std::mem::replace(&mut self.entries[i].1, value)),
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key, value));
                None
            }
        }
    }

    fn remove_own(&mut self, key: &str) -> Option<Value> {
        let i = self.index.remove(key)?;
        let (_, value) = self.entries.remove(i);

        for idx in self.index.values_mut() {
            if *idx > i {
                *idx -= 1;
            }
        }

        Some(value)
    }

    /// Traverses/creates intermediate trees along `path` and assigns `value` at the leaf,
    /// merging tree-into-tree and recording override history exactly like pyhocon's
    /// `ConfigTree._put`.
    pub fn put_path(&mut self, path: &[String], value: Value) {
        assert!(!path.is_empty(), "put_path requires a non-empty path");

        if path.len() == 1 {
            self.put_leaf(&path[0], value);
            return;
        }

        let key = &path[0];
        let idx = match self.index.get(key) {
            Some(&i) => {
                if !matches!(self.entries[i].1, Value::Tree(_)) {
                    self.entries[i].1 = Value::Tree(ConfigTree::new());
                }
                i
            }
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key.clone(), Value::Tree(ConfigTree::new())));
                self.entries.len() - 1
            }
        };

        if let Value::Tree(child) = &mut self.entries[idx].1 {
            child.put_path(&path[1..], value);
        }
    }

    fn put_leaf(&mut self, key: &str, mut value: Value) {
        let existing = self.get_own(key).cloned();

        if let (Some(Value::Tree(a)), Value::Tree(b)) = (&existing, &value) {
            let merged = merge_configs(a.clone(), b.clone());
            self.set(key.to_string(), Value::Tree(merged.clone()));

            if self.is_root {
                self.history.entry(key.to_string()).or_default().push(Value::Tree(merged));
            }

            return;
        }

        if let Value::Deferred(run) = &mut value {
            run.overridden = existing.map(Box::new);
        }

        self.set(key.to_string(), value.clone());

        if self.is_root {
            self.history.entry(key.to_string()).or_default().push(value);
        }
    }

    /// Removes the value at `path`, returning it if present. Used for the library's `pop` API
    /// and for `_do_substitute`'s "delete key whose resolved value vanished" behavior.
    pub fn remove_path(&mut self, path: &[String]) -> Option<Value> {
        if path.len() == 1 {
            return self.remove_own(&path[0]);
        }

        match self.get_own_mut(&path[0]) {
            Some(Value::Tree(child)) => child.remove_path(&path[1..]),
            _ => None,
        }
    }

    /// Resolves a dotted path against this tree, descending through nested `Value::Tree`s.
    pub fn get_path(&self, path: &[String]) -> ConfigResult<&Value> {
        let full_path = path.join(".");
        let (key, rest) = path.split_first().expect("get_path requires a non-empty path");

        let value = self.get_own(key).ok_or_else(|| ConfigError::Missing {
            path: full_path.clone(),
            pos: None,
        })?;

        if rest.is_empty() {
            return Ok(value);
        }

        match value {
            Value::Tree(child) => child.get_path(rest),
            other => Err(ConfigError::WrongType {
                path: full_path,
                expected: "object".to_string(),
                found: other.type_name().to_string(),
                pos: None,
            }),
        }
    }

    pub fn get_path_mut(&mut self, path: &[String]) -> ConfigResult<&mut Value> {
        let full_path = path.join(".");
        let (key, rest) = path.split_first().expect("get_path_mut requires a non-empty path");

        if rest.is_empty() {
            return self.get_own_mut(key).ok_or(ConfigError::Missing {
                path: full_path,
                pos: None,
            });
        }

        match self.get_own_mut(key) {
            Some(Value::Tree(child)) => child.get_path_mut(rest),
            Some(other) => Err(ConfigError::WrongType {
                path: full_path,
                expected: "object".to_string(),
                found: other.type_name().to_string(),
                pos: None,
            }),
            None => Err(ConfigError::Missing { path: full_path, pos: None }),
        }
    }

    /// Merges `other` on top of `self`, recursing into matching object keys and overwriting
    /// everything else, exactly like pyhocon's `merge_configs` static method. The new tree's
    /// value for a key wins unless both sides hold a tree, in which case they're merged.
    pub fn with_fallback(self, fallback: ConfigTree) -> ConfigTree {
        merge_configs(fallback, self)
    }

    /// Recursively converts this tree into a plain value tree free of any `Deferred` runs,
    /// erroring if one survived resolution.
    pub fn as_plain(&self) -> ConfigResult<ConfigTree> {
        let mut out = ConfigTree { is_root: self.is_root, ..ConfigTree::new() };

        for (key, value) in self.iter() {
            out.set(key.to_string(), plain_value(key, value)?);
        }

        Ok(out)
    }
}

fn plain_value(key: &str, value: &Value) -> ConfigResult<Value> {
    match value {
        Value::Tree(t) => Ok(Value::Tree(t.as_plain()?)),
        Value::List(items) => {
            let mut out = Vec::with_capacity(items.len());

            for item in items {
                out.push(plain_value(key, item)?);
            }

            Ok(Value::List(out))
        }
        Value::Deferred(_) => Err(ConfigError::Missing {
            path: key.to_string(),
            pos: None,
        }),
        other => Ok(other.clone()),
    }
}

/// Merges tree `b` on top of tree `a`: keys only in `a` are kept, keys only in `b` are added,
/// keys in both recurse if both sides are objects, otherwise `b`'s value wins. Any `Deferred`
/// value placed by the merge records the value it overrode, so the resolver can fix up
/// self-referencing substitutions later. Mirrors `ConfigTree.merge_configs`.
pub fn merge_configs(mut a: ConfigTree, b: ConfigTree) -> ConfigTree {
    for (key, mut value) in b.entries {
        let existing = a.get_own(&key).cloned();

        match (&existing, &value) {
            (Some(Value::Tree(at)), Value::Tree(bt)) => {
                let merged = merge_configs(at.clone(), bt.clone());
                a.set(key.clone(), Value::Tree(merged));
            }
            _ => {
                if let Value::Deferred(run) = &mut value {
                    run.overridden = existing.clone().map(Box::new);
                }

                a.set(key.clone(), value);
            }
        }

        if a.is_root {
            let b_history = b.history.get(&key).cloned().unwrap_or_default();
            a.history.entry(key).or_default().extend(b_history);
        }
    }

    a
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_put_and_get_dotted_path() {
        let mut tree = ConfigTree::root();
        tree.put_path(&parse_key("a.b.c"), Value::Int(1));

        assert_eq!(tree.get_path(&parse_key("a.b.c")).unwrap(), &Value::Int(1));
    }

    #[test]
    fn test_put_tree_merges_existing_tree() {
        let mut tree = ConfigTree::root();
        tree.put_path(&parse_key("a.x"), Value::Int(1));
        tree.put_path(&parse_key("a.y"), Value::Int(2));

        assert_eq!(tree.get_path(&parse_key("a.x")).unwrap(), &Value::Int(1));
        assert_eq!(tree.get_path(&parse_key("a.y")).unwrap(), &Value::Int(2));
    }

    #[test]
    fn test_put_scalar_overwrites_scalar_and_records_history() {
        let mut tree = ConfigTree::root();
        tree.put_path(&parse_key("a"), Value::Int(1));
        tree.put_path(&parse_key("a"), Value::Int(2));

        assert_eq!(tree.get_path(&parse_key("a")).unwrap(), &Value::Int(2));
        assert_eq!(tree.history.get("a").unwrap().len(), 2);
    }

    #[test]
    fn test_get_missing_path() {
        let tree = ConfigTree::root();
        assert!(matches!(
            tree.get_path(&parse_key("missing")),
            Err(ConfigError::Missing { .. })
        ));
    }

    #[test]
    fn test_get_wrong_type() {
        let mut tree = ConfigTree::root();
        tree.put_path(&parse_key("a"), Value::Int(1));

        assert!(matches!(
            tree.get_path(&parse_key("a.b")),
            Err(ConfigError::WrongType { .. })
        ));
    }

    #[test]
    fn test_merge_configs_recurses_into_trees() {
        let mut a = ConfigTree::root();
        a.put_path(&parse_key("a.x"), Value::Int(1));

        let mut b = ConfigTree::root();
        b.put_path(&parse_key("a.y"), Value::Int(2));

        let merged = merge_configs(a, b);

        assert_eq!(merged.get_path(&parse_key("a.x")).unwrap(), &Value::Int(1));
        assert_eq!(merged.get_path(&parse_key("a.y")).unwrap(), &Value::Int(2));
    }

    #[test]
    fn test_merge_configs_scalar_b_wins() {
        let mut a = ConfigTree::root();
        a.put_path(&parse_key("a"), Value::Int(1));

        let mut b = ConfigTree::root();
        b.put_path(&parse_key("a"), Value::Int(2));

        let merged = merge_configs(a, b);

        assert_eq!(merged.get_path(&parse_key("a")).unwrap(), &Value::Int(2));
    }

    #[test]
    fn test_as_plain_errors_on_deferred() {
        let mut tree = ConfigTree::root();
        tree.put_path(
            &parse_key("a"),
            Value::Deferred(ConcatRun {
                tokens: vec![],
                path: vec!["a".to_string()],
                overridden: None,
            }),
        );

        assert!(tree.as_plain().is_err());
    }
}
