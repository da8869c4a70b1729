//
// The substitution resolver: an iterative fixpoint over every `${path}` placeholder left in a
// parsed `ConfigTree`, plus the value-concatenation engine that turns a resolved `ConcatRun` back
// into a plain `Value`.
//
// Mirrors pyhocon's `ConfigParser.resolve_substitutions`/`_fixup_self_references`/`_do_substitute`
// and `ConfigValues.transform`.
//

use hocon_tree::{ConcatRun, ConcatToken, ConfigError, ConfigResult, ConfigTree, Value};

/// What happens to a `${path}` that never resolves, controlled by `ParseOptions` in the facade
/// crate (mirrors pyhocon's lenient `ConfigTree.get` semantics plus the spec's `allow_unresolved`
/// knob).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnresolvedMode {
    /// Fail with a `SubstitutionCycle` error naming every unresolved path. The default.
    Mandatory,
    /// Silently drop the key.
    Omit,
    /// Replace the value with `null`.
    Null,
    /// Replace the value with the literal `${path}` text it came from.
    Str,
}

impl Default for UnresolvedMode {
    fn default() -> Self {
        UnresolvedMode::Mandatory
    }
}

/// Resolves every substitution in `root`, returning a tree with no `Value::Deferred` left in it
/// (barring `UnresolvedMode::Str`, which intentionally reintroduces plain strings in their place).
pub fn resolve_substitutions(mut root: ConfigTree, mode: UnresolvedMode) -> ConfigResult<ConfigTree> {
    fixup_self_references(&mut root)?;

    let mut prev_unresolved: Option<Vec<String>> = None;

    loop {
        let snapshot = root.clone();
        let mut progress = false;
        let mut unresolved_this_round: Vec<String> = Vec::new();

        resolve_tree_in_place(&mut root, &snapshot, &mut progress, &mut unresolved_this_round)?;

        if unresolved_this_round.is_empty() {
            break;
        }

        if progress {
            prev_unresolved = None;
            continue;
        }

        let mut sorted = unresolved_this_round.clone();
        sorted.sort();
        sorted.dedup();

        if prev_unresolved.as_deref() == Some(&sorted[..]) {
            return finalize_unresolved(root, mode, sorted);
        }

        prev_unresolved = Some(sorted);
    }

    Ok(root)
}

/// Resolves self-referencing overrides (`a = 1` then `a = ${a} 2`, possibly reassigned several
/// times in a row) against the value each override replaced, rather than the final value — which
/// would just be itself. Threads a running `previous` value through the whole reassignment
/// history for a key, folding each intermediate step down to a concrete value before the next
/// self-reference consumes it, matching pyhocon's `_fixup_self_references`.
fn fixup_self_references(root: &mut ConfigTree) -> ConfigResult<()> {
    let keys: Vec<String> = root.history.keys().cloned().collect();

    for key in keys {
        let history = match root.history.get(&key) {
            Some(h) if h.len() > 1 => h.clone(),
            _ => continue,
        };

        let mut previous = history[0].clone();
        let last = history.len() - 1;

        for (i, item) in history.into_iter().enumerate().skip(1) {
            let resolved = substitute_self_reference(item, &key, &previous)?;

            if i == last {
                root.set(key.clone(), resolved);
            } else {
                previous = resolved;
            }
        }
    }

    Ok(())
}

/// Replaces every token in `item` that substitutes `key` into itself with the literal `previous`
/// value it overrode, then folds the run down to a concrete value once every token is literal.
/// Leaves `item` untouched if it doesn't reference `key` at all, and leaves it deferred if other,
/// non-self substitutions remain — those are left for the main fixpoint loop.
fn substitute_self_reference(mut item: Value, key: &str, previous: &Value) -> ConfigResult<Value> {
    let changed = match &mut item {
        Value::Deferred(run) => {
            let mut changed = false;

            for token in run.tokens.iter_mut() {
                if let ConcatToken::Substitution(sub) = token {
                    if sub.path.len() == 1 && sub.path[0] == key {
                        *token = ConcatToken::Literal(previous.clone());
                        changed = true;
                    }
                }
            }

            changed
        }
        _ => false,
    };

    if !changed {
        return Ok(item);
    }

    let run = match &item {
        Value::Deferred(run) => run,
        _ => unreachable!("changed is only set inside the Deferred arm"),
    };

    let all_literal = run.tokens.iter().all(|t| matches!(t, ConcatToken::Literal(_)));

    if !all_literal {
        return Ok(item);
    }

    let literals: Vec<Value> = run
        .tokens
        .iter()
        .map(|t| match t {
            ConcatToken::Literal(v) => v.clone(),
            ConcatToken::Substitution(_) => unreachable!("checked above"),
        })
        .collect();

    match transform_concat(&literals)? {
        Some(v) => Ok(v),
        None => Ok(Value::Null),
    }
}

fn resolve_tree_in_place(
    tree: &mut ConfigTree,
    root: &ConfigTree,
    progress: &mut bool,
    unresolved: &mut Vec<String>,
) -> ConfigResult<()> {
    let keys: Vec<String> = tree.keys().map(|k| k.to_string()).collect();

    for key in keys {
        let mut value = tree.get_own(&key).cloned().unwrap();
        let delete = resolve_value_in_place(&mut value, root, progress, unresolved)?;

        if delete {
            tree.remove_path(&[key]);
        } else {
            tree.set(key, value);
        }
    }

    Ok(())
}

fn resolve_value_in_place(
    value: &mut Value,
    root: &ConfigTree,
    progress: &mut bool,
    unresolved: &mut Vec<String>,
) -> ConfigResult<bool> {
    match value {
        Value::Tree(t) => {
            resolve_tree_in_place(t, root, progress, unresolved)?;
            Ok(false)
        }
        Value::List(items) => {
            let mut new_items = Vec::with_capacity(items.len());

            for mut item in items.drain(..) {
                let delete = resolve_value_in_place(&mut item, root, progress, unresolved)?;

                if !delete {
                    new_items.push(item);
                }
            }

            *items = new_items;
            Ok(false)
        }
        Value::Deferred(run) => {
            let resolution = resolve_deferred_in_place(run, root, progress, unresolved)?;
            Ok(apply_resolution(value, resolution))
        }
        _ => Ok(false),
    }
}

enum Resolution {
    StillDeferred(ConcatRun),
    Delete,
    Value(Value),
}

fn apply_resolution(slot: &mut Value, resolution: Resolution) -> bool {
    match resolution {
        Resolution::StillDeferred(run) => {
            *slot = Value::Deferred(run);
            false
        }
        Resolution::Delete => true,
        Resolution::Value(v) => {
            *slot = v;
            false
        }
    }
}

fn resolve_deferred_in_place(
    run: &mut ConcatRun,
    root: &ConfigTree,
    progress: &mut bool,
    unresolved: &mut Vec<String>,
) -> ConfigResult<Resolution> {
    let mut new_tokens = Vec::with_capacity(run.tokens.len());
    let mut all_literal = true;

    for token in run.tokens.drain(..) {
        match token {
            ConcatToken::Literal(v) => new_tokens.push(ConcatToken::Literal(v)),
            ConcatToken::Substitution(sub) if !run.path.is_empty() && sub.path == run.path => {
                // Self-reference on a nested (dotted) key, e.g. `a.b += x`: the live tree entry
                // at this path IS this very run, so looking it up via `root` would just find
                // itself. Root-level self-references are already folded by
                // `fixup_self_references`; this only fires for non-root keys, which don't carry
                // history, so `overridden` is the only place the prior value survives.
                match run.overridden.as_deref() {
                    Some(prev) if !prev.is_deferred() => {
                        *progress = true;
                        new_tokens.push(ConcatToken::Literal(prev.clone()));

                        if !sub.trailing_ws.is_empty() {
                            new_tokens.push(ConcatToken::Literal(Value::String(sub.trailing_ws.clone())));
                        }
                    }
                    _ if sub.optional => {
                        *progress = true;
                        // Optional, no prior value to fall back on: contributes nothing.
                    }
                    _ => {
                        all_literal = false;
                        unresolved.push(sub.path.join("."));
                        new_tokens.push(ConcatToken::Substitution(sub));
                    }
                }
            }
            ConcatToken::Substitution(sub) => match root.get_path(&sub.path) {
                Ok(found) if !found.is_deferred() => {
                    *progress = true;
                    new_tokens.push(ConcatToken::Literal(found.clone()));

                    if !sub.trailing_ws.is_empty() {
                        new_tokens.push(ConcatToken::Literal(Value::String(sub.trailing_ws.clone())));
                    }
                }
                Ok(_) => {
                    all_literal = false;
                    unresolved.push(sub.path.join("."));
                    new_tokens.push(ConcatToken::Substitution(sub));
                }
                Err(ConfigError::Missing { .. }) => {
                    if let Some(env_value) = env_fallback(&sub.path) {
                        *progress = true;
                        new_tokens.push(ConcatToken::Literal(env_value));
                    } else if sub.optional {
                        *progress = true;
                        // Optional and absent: contributes nothing, dropped like a null token.
                    } else {
                        all_literal = false;
                        unresolved.push(sub.path.join("."));
                        new_tokens.push(ConcatToken::Substitution(sub));
                    }
                }
                Err(other) => return Err(other),
            },
        }
    }

    run.tokens = new_tokens;

    if !all_literal {
        return Ok(Resolution::StillDeferred(std::mem::replace(
            run,
            ConcatRun { tokens: vec![], path: vec![], overridden: None },
        )));
    }

    let literals: Vec<Value> = run
        .tokens
        .iter()
        .map(|t| match t {
            ConcatToken::Literal(v) => v.clone(),
            ConcatToken::Substitution(_) => unreachable!("all_literal checked above"),
        })
        .collect();

    match transform_concat(&literals)? {
        Some(resolved) => Ok(Resolution::Value(resolved)),
        None => match run.overridden.take() {
            // Every token vanished (e.g. `a = 1; a = ${?MISSING}`) — restore the value this run
            // overrode instead of deleting the key, per the "optional substitution falls back to
            // the prior value" rule.
            Some(prev) => {
                *progress = true;
                let mut restored = *prev;
                resolve_value_in_place(&mut restored, root, progress, unresolved)?;
                Ok(Resolution::Value(restored))
            }
            None => Ok(Resolution::Delete),
        },
    }
}

fn env_fallback(path: &[String]) -> Option<Value> {
    if path.len() != 1 {
        return None;
    }

    std::env::var(&path[0]).ok().map(Value::String)
}

/// Concatenates a run's now-fully-literal tokens into a single value: drops nulls, then requires
/// every remaining token to be the same kind (all trees merge, all lists concatenate, otherwise
/// everything is rendered to text and joined). Returns `None` if every token was null.
pub fn transform_concat(tokens: &[Value]) -> ConfigResult<Option<Value>> {
    let non_null: Vec<&Value> = tokens.iter().filter(|v| !matches!(v, Value::Null)).collect();

    if non_null.is_empty() {
        return Ok(None);
    }

    if non_null.len() == 1 {
        return Ok(Some(non_null[0].clone()));
    }

    if non_null.iter().all(|v| matches!(v, Value::Tree(_))) {
        let mut acc = ConfigTree::new();

        for v in non_null {
            if let Value::Tree(t) = v {
                acc = hocon_tree::merge_configs(acc, t.clone());
            }
        }

        return Ok(Some(Value::Tree(acc)));
    }

    if non_null.iter().all(|v| matches!(v, Value::List(_))) {
        let mut acc = Vec::new();

        for v in non_null {
            if let Value::List(l) = v {
                acc.extend(l.clone());
            }
        }

        return Ok(Some(Value::List(acc)));
    }

    let mut out = String::new();

    for v in non_null {
        match v {
            Value::String(s) => out.push_str(s),
            Value::Int(n) => out.push_str(&n.to_string()),
            Value::Real(n) => out.push_str(&format_real(*n)),
            Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
            Value::Tree(_) | Value::List(_) => {
                return Err(ConfigError::WrongType {
                    path: String::new(),
                    expected: "string".to_string(),
                    found: v.type_name().to_string(),
                    pos: None,
                })
            }
            Value::Null | Value::Deferred(_) => unreachable!(),
        }
    }

    Ok(Some(Value::String(out)))
}

fn format_real(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

fn finalize_unresolved(mut root: ConfigTree, mode: UnresolvedMode, unresolved: Vec<String>) -> ConfigResult<ConfigTree> {
    if mode == UnresolvedMode::Mandatory {
        return Err(ConfigError::SubstitutionCycle { paths: unresolved, pos: None });
    }

    finalize_tree(&mut root, mode);
    Ok(root)
}

fn finalize_tree(tree: &mut ConfigTree, mode: UnresolvedMode) {
    let keys: Vec<String> = tree.keys().map(|k| k.to_string()).collect();

    for key in keys {
        let mut value = tree.get_own(&key).cloned().unwrap();

        if finalize_value(&mut value, mode) {
            tree.remove_path(&[key]);
        } else {
            tree.set(key, value);
        }
    }
}

fn finalize_value(value: &mut Value, mode: UnresolvedMode) -> bool {
    match value {
        Value::Tree(t) => {
            finalize_tree(t, mode);
            false
        }
        Value::List(items) => {
            let mut new_items = Vec::with_capacity(items.len());

            for mut item in items.drain(..) {
                if !finalize_value(&mut item, mode) {
                    new_items.push(item);
                }
            }

            *items = new_items;
            false
        }
        Value::Deferred(run) => match mode {
            UnresolvedMode::Omit => true,
            UnresolvedMode::Null => {
                *value = Value::Null;
                false
            }
            UnresolvedMode::Str => {
                *value = Value::String(reconstruct(run));
                false
            }
            UnresolvedMode::Mandatory => unreachable!(),
        },
        _ => false,
    }
}

fn reconstruct(run: &ConcatRun) -> String {
    let mut out = String::new();

    for token in &run.tokens {
        match token {
            ConcatToken::Literal(Value::String(s)) => out.push_str(s),
            ConcatToken::Literal(v) => out.push_str(&format!("{:?}", v)),
            ConcatToken::Substitution(sub) => {
                out.push_str("${");

                if sub.optional {
                    out.push('?');
                }

                out.push_str(&sub.path.join("."));
                out.push('}');
            }
        }
    }

    out
}

#[cfg(test)]
mod test {
    use super::*;
    use hocon_tree::{parse_key, ConcatRun, ConcatToken, Substitution};
    use pretty_assertions::assert_eq;

    fn deferred(path: &str, tokens: Vec<ConcatToken>) -> Value {
        Value::Deferred(ConcatRun { tokens, path: parse_key(path), overridden: None })
    }

    fn sub(path: &str) -> Substitution {
        Substitution { path: parse_key(path), optional: false, trailing_ws: String::new(), pos: None }
    }

    #[test]
    fn test_simple_substitution_resolves() {
        let mut tree = ConfigTree::root();
        tree.put_path(&parse_key("a"), Value::Int(1));
        tree.put_path(&parse_key("b"), deferred("b", vec![ConcatToken::Substitution(sub("a"))]));

        let resolved = resolve_substitutions(tree, UnresolvedMode::Mandatory).unwrap();

        assert_eq!(resolved.get_path(&parse_key("b")).unwrap(), &Value::Int(1));
    }

    #[test]
    fn test_transitive_substitution_resolves() {
        let mut tree = ConfigTree::root();
        tree.put_path(&parse_key("a"), Value::Int(1));
        tree.put_path(&parse_key("b"), deferred("b", vec![ConcatToken::Substitution(sub("a"))]));
        tree.put_path(&parse_key("c"), deferred("c", vec![ConcatToken::Substitution(sub("b"))]));

        let resolved = resolve_substitutions(tree, UnresolvedMode::Mandatory).unwrap();

        assert_eq!(resolved.get_path(&parse_key("c")).unwrap(), &Value::Int(1));
    }

    #[test]
    fn test_missing_mandatory_substitution_errors() {
        let mut tree = ConfigTree::root();
        tree.put_path(&parse_key("a"), deferred("a", vec![ConcatToken::Substitution(sub("missing"))]));

        assert!(matches!(
            resolve_substitutions(tree, UnresolvedMode::Mandatory),
            Err(ConfigError::SubstitutionCycle { .. })
        ));
    }

    #[test]
    fn test_optional_missing_substitution_resolves_to_null() {
        let mut tree = ConfigTree::root();
        let mut s = sub("missing");
        s.optional = true;
        tree.put_path(&parse_key("a"), deferred("a", vec![ConcatToken::Substitution(s)]));

        let resolved = resolve_substitutions(tree, UnresolvedMode::Mandatory).unwrap();

        assert!(!resolved.contains_key("a"));
    }

    #[test]
    fn test_unresolved_omit_mode_drops_key() {
        let mut tree = ConfigTree::root();
        tree.put_path(&parse_key("a"), deferred("a", vec![ConcatToken::Substitution(sub("missing"))]));

        let resolved = resolve_substitutions(tree, UnresolvedMode::Omit).unwrap();

        assert!(!resolved.contains_key("a"));
    }

    #[test]
    fn test_unresolved_str_mode_keeps_placeholder_text() {
        let mut tree = ConfigTree::root();
        tree.put_path(&parse_key("a"), deferred("a", vec![ConcatToken::Substitution(sub("missing"))]));

        let resolved = resolve_substitutions(tree, UnresolvedMode::Str).unwrap();

        assert_eq!(
            resolved.get_path(&parse_key("a")).unwrap(),
            &Value::String("${missing}".to_string())
        );
    }

    #[test]
    fn test_self_reference_override_resolves_against_previous_value() {
        let mut tree = ConfigTree::root();
        tree.put_path(&parse_key("a"), Value::Int(1));
        tree.put_path(
            &parse_key("a"),
            deferred(
                "a",
                vec![
                    ConcatToken::Substitution(sub("a")),
                    ConcatToken::Literal(Value::String(" extra".to_string())),
                ],
            ),
        );

        let resolved = resolve_substitutions(tree, UnresolvedMode::Mandatory).unwrap();

        assert_eq!(
            resolved.get_path(&parse_key("a")).unwrap(),
            &Value::String("1 extra".to_string())
        );
    }

    #[test]
    fn test_self_reference_chain_threads_every_intermediate_reassignment() {
        let mut tree = ConfigTree::root();
        tree.put_path(&parse_key("x"), Value::List(vec![Value::Int(1), Value::Int(2)]));
        tree.put_path(
            &parse_key("x"),
            deferred(
                "x",
                vec![
                    ConcatToken::Substitution(sub("x")),
                    ConcatToken::Literal(Value::List(vec![Value::Int(3), Value::Int(4)])),
                ],
            ),
        );
        tree.put_path(
            &parse_key("x"),
            deferred(
                "x",
                vec![
                    ConcatToken::Literal(Value::List(vec![Value::Int(-1), Value::Int(0)])),
                    ConcatToken::Substitution(sub("x")),
                    ConcatToken::Literal(Value::List(vec![Value::Int(5), Value::Int(6)])),
                ],
            ),
        );
        tree.put_path(
            &parse_key("x"),
            deferred(
                "x",
                vec![
                    ConcatToken::Literal(Value::List(vec![Value::Int(-3), Value::Int(-2)])),
                    ConcatToken::Substitution(sub("x")),
                ],
            ),
        );

        let resolved = resolve_substitutions(tree, UnresolvedMode::Mandatory).unwrap();

        assert_eq!(
            resolved.get_path(&parse_key("x")).unwrap(),
            &Value::List(
                [-3, -2, -1, 0, 1, 2, 3, 4, 5, 6]
                    .into_iter()
                    .map(Value::Int)
                    .collect()
            )
        );
    }

    #[test]
    fn test_overridden_value_restored_when_optional_substitution_contributes_nothing() {
        let mut tree = ConfigTree::root();
        tree.put_path(&parse_key("a"), Value::Int(1));

        let mut s = sub("missing");
        s.optional = true;
        tree.put_path(&parse_key("a"), deferred("a", vec![ConcatToken::Substitution(s)]));

        let resolved = resolve_substitutions(tree, UnresolvedMode::Mandatory).unwrap();

        assert_eq!(resolved.get_path(&parse_key("a")).unwrap(), &Value::Int(1));
    }

    #[test]
    fn test_nested_append_self_reference_uses_overridden_value() {
        let mut tree = ConfigTree::root();
        tree.put_path(
            &parse_key("application.large"),
            Value::List(vec![Value::String("-Xm16g".to_string())]),
        );

        let mut s = sub("application.large");
        s.optional = true;
        tree.put_path(
            &parse_key("application.large"),
            deferred(
                "application.large",
                vec![
                    ConcatToken::Substitution(s),
                    ConcatToken::Literal(Value::List(vec![Value::String("128m".to_string())])),
                ],
            ),
        );

        let resolved = resolve_substitutions(tree, UnresolvedMode::Mandatory).unwrap();

        assert_eq!(
            resolved.get_path(&parse_key("application.large")).unwrap(),
            &Value::List(vec![
                Value::String("-Xm16g".to_string()),
                Value::String("128m".to_string()),
            ])
        );
    }

    #[test]
    fn test_transform_concat_merges_trees() {
        let mut a = ConfigTree::new();
        a.put_path(&parse_key("x"), Value::Int(1));

        let mut b = ConfigTree::new();
        b.put_path(&parse_key("y"), Value::Int(2));

        let merged = transform_concat(&[Value::Tree(a), Value::Tree(b)]).unwrap().unwrap();

        match merged {
            Value::Tree(t) => {
                assert_eq!(t.get_path(&parse_key("x")).unwrap(), &Value::Int(1));
                assert_eq!(t.get_path(&parse_key("y")).unwrap(), &Value::Int(2));
            }
            other => panic!("expected a merged tree, got {:?}", other),
        }
    }

    #[test]
    fn test_transform_concat_mixed_tree_and_scalar_is_wrong_type() {
        let mut a = ConfigTree::new();
        a.put_path(&parse_key("x"), Value::Int(1));

        assert!(transform_concat(&[Value::Tree(a), Value::Int(1)]).is_err());
    }

    #[test]
    fn test_transform_concat_all_null_deletes() {
        assert_eq!(transform_concat(&[Value::Null, Value::Null]).unwrap(), None);
    }
}
