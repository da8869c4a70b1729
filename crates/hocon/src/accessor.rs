use std::time::Duration;

use hocon_tree::{parse_key, ConfigError, ConfigResult, ConfigTree, Value};

use crate::duration::parse_duration_nanos;

/// Typed path accessors over a resolved `ConfigTree`, the library's public surface for reading
/// values (spec §4.6). Implemented as an extension trait rather than inherent methods on
/// `ConfigTree` itself, keeping `hocon_tree` free of any accessor-layer policy (duration parsing,
/// numeric-key coercion) that only makes sense once a document is fully resolved.
pub trait ConfigAccess {
    fn get(&self, path: &str) -> ConfigResult<&Value>;
    fn contains(&self, path: &str) -> bool;

    fn get_bool(&self, path: &str) -> ConfigResult<bool>;
    fn get_int(&self, path: &str) -> ConfigResult<i64>;
    fn get_real(&self, path: &str) -> ConfigResult<f64>;
    fn get_string(&self, path: &str) -> ConfigResult<String>;
    fn get_list(&self, path: &str) -> ConfigResult<Vec<Value>>;
    fn get_tree(&self, path: &str) -> ConfigResult<&ConfigTree>;

    fn get_duration_nanos(&self, path: &str) -> ConfigResult<i64>;
    fn get_duration(&self, path: &str) -> ConfigResult<Duration>;

    fn pop(&mut self, path: &str) -> Option<Value>;
    fn as_plain_ordered_map(&self) -> ConfigResult<ConfigTree>;
}

impl ConfigAccess for ConfigTree {
    fn get(&self, path: &str) -> ConfigResult<&Value> {
        self.get_path(&parse_key(path))
    }

    fn contains(&self, path: &str) -> bool {
        self.get(path).is_ok()
    }

    fn get_bool(&self, path: &str) -> ConfigResult<bool> {
        match self.get(path)? {
            Value::Bool(b) => Ok(*b),
            other => Err(wrong_type(path, "boolean", other)),
        }
    }

    fn get_int(&self, path: &str) -> ConfigResult<i64> {
        match self.get(path)? {
            Value::Int(n) => Ok(*n),
            Value::Real(n) if n.fract() == 0.0 => Ok(*n as i64),
            other => Err(wrong_type(path, "number", other)),
        }
    }

    fn get_real(&self, path: &str) -> ConfigResult<f64> {
        match self.get(path)? {
            Value::Int(n) => Ok(*n as f64),
            Value::Real(n) => Ok(*n),
            other => Err(wrong_type(path, "number", other)),
        }
    }

    fn get_string(&self, path: &str) -> ConfigResult<String> {
        match self.get(path)? {
            Value::String(s) => Ok(s.clone()),
            other => Err(wrong_type(path, "string", other)),
        }
    }

    /// Returns the list at `path`. If the value there is instead an object whose keys are all
    /// decimal integers, coerces it into a list ordered by key — a pyhocon feature-parity
    /// behavior the spec calls out explicitly.
    fn get_list(&self, path: &str) -> ConfigResult<Vec<Value>> {
        match self.get(path)? {
            Value::List(items) => Ok(items.clone()),
            Value::Tree(t) if is_numeric_keyed(t) => Ok(numeric_keyed_to_list(t)),
            other => Err(wrong_type(path, "list", other)),
        }
    }

    fn get_tree(&self, path: &str) -> ConfigResult<&ConfigTree> {
        match self.get(path)? {
            Value::Tree(t) => Ok(t),
            other => Err(wrong_type(path, "object", other)),
        }
    }

    fn get_duration_nanos(&self, path: &str) -> ConfigResult<i64> {
        let text = self.get_string(path)?;

        parse_duration_nanos(&text).ok_or_else(|| ConfigError::WrongType {
            path: path.to_string(),
            expected: "duration".to_string(),
            found: format!("string '{}'", text),
            pos: None,
        })
    }

    fn get_duration(&self, path: &str) -> ConfigResult<Duration> {
        let nanos = self.get_duration_nanos(path)?;
        Ok(Duration::from_nanos(nanos.max(0) as u64))
    }

    fn pop(&mut self, path: &str) -> Option<Value> {
        self.remove_path(&parse_key(path))
    }

    fn as_plain_ordered_map(&self) -> ConfigResult<ConfigTree> {
        self.as_plain()
    }
}

fn wrong_type(path: &str, expected: &str, found: &Value) -> ConfigError {
    ConfigError::WrongType {
        path: path.to_string(),
        expected: expected.to_string(),
        found: found.type_name().to_string(),
        pos: None,
    }
}

fn is_numeric_keyed(tree: &ConfigTree) -> bool {
    !tree.is_empty() && tree.keys().all(|k| k.parse::<usize>().is_ok())
}

fn numeric_keyed_to_list(tree: &ConfigTree) -> Vec<Value> {
    let mut pairs: Vec<(usize, Value)> = tree
        .iter()
        .map(|(k, v)| (k.parse::<usize>().unwrap(), v.clone()))
        .collect();

    pairs.sort_by_key(|(i, _)| *i);
    pairs.into_iter().map(|(_, v)| v).collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use hocon_tree::parse_key as pk;
    use pretty_assertions::assert_eq;

    fn tree_with(path: &str, value: Value) -> ConfigTree {
        let mut tree = ConfigTree::root();
        tree.put_path(&pk(path), value);
        tree
    }

    #[test]
    fn test_get_string() {
        let tree = tree_with("a", Value::String("x".to_string()));
        assert_eq!(tree.get_string("a").unwrap(), "x");
    }

    #[test]
    fn test_get_int_wrong_type() {
        let tree = tree_with("a", Value::String("x".to_string()));
        assert!(tree.get_int("a").is_err());
    }

    #[test]
    fn test_numeric_keyed_object_becomes_list() {
        let mut tree = ConfigTree::root();
        tree.put_path(&pk("a.0"), Value::Int(10));
        tree.put_path(&pk("a.1"), Value::Int(20));

        assert_eq!(tree.get_list("a").unwrap(), vec![Value::Int(10), Value::Int(20)]);
    }

    #[test]
    fn test_get_duration_nanos() {
        let tree = tree_with("a", Value::String("2s".to_string()));
        assert_eq!(tree.get_duration_nanos("a").unwrap(), 2_000_000_000);
    }

    #[test]
    fn test_pop_removes_key() {
        let mut tree = tree_with("a", Value::Int(1));
        assert_eq!(tree.pop("a"), Some(Value::Int(1)));
        assert!(!tree.contains("a"));
    }
}
