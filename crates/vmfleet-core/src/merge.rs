//! Declaration inheritance
//!
//! A child declaration inherits from its parent with this precedence, later
//! layers winning on key collisions:
//!
//! 1. the parent's `import` block
//! 2. the parent's own keys
//! 3. the child's `import` block
//! 4. the child's own keys
//!
//! `tags` are shallow-merged across the same layers instead of replaced.
//! `inventory_groups` and `security_groups` are the parent's own list
//! unioned with the layered result, so an `import` list shadowed by an
//! explicit key does not leak through. A missing `group_name` is derived
//! from the smallest inventory group.

use crate::error::{ConfigError, Result};
use crate::model::Declaration;
use serde_json::Value;
use std::collections::BTreeSet;

const IMPORT: &str = "import";
const TAGS: &str = "tags";
const GROUP_NAME: &str = "group_name";
const UNION_KEYS: [&str; 2] = ["inventory_groups", "security_groups"];

/// Merge `child` over `parent`. Pure; neither input is modified.
pub fn merge(parent: &Declaration, child: &Declaration) -> Result<Declaration> {
    let parent_import = import_block(parent)?;
    let child_import = import_block(child)?;
    let layers = [parent_import, Some(parent), child_import, Some(child)];
    let layers: Vec<&Declaration> = layers.into_iter().flatten().collect();

    let mut merged = Declaration::new();
    for layer in &layers {
        for (key, value) in layer.iter() {
            if key != IMPORT {
                merged.insert(key.clone(), value.clone());
            }
        }
    }

    let mut tags = Declaration::new();
    for layer in &layers {
        if let Some(layer_tags) = mapping(layer, TAGS)? {
            for (key, value) in layer_tags {
                tags.insert(key.clone(), value.clone());
            }
        }
    }
    merged.insert(TAGS.to_string(), Value::Object(tags));

    for key in UNION_KEYS {
        let mut union = string_set(parent, key)?;
        union.extend(string_set(&merged, key)?);
        merged.insert(
            key.to_string(),
            Value::Array(union.into_iter().map(Value::String).collect()),
        );
    }

    let has_name = matches!(merged.get(GROUP_NAME), Some(v) if !v.is_null());
    if !has_name {
        // BTreeSet ordering makes the first element the lexicographic minimum
        let derived = string_set(&merged, "inventory_groups")?.into_iter().next();
        match derived {
            Some(name) => {
                merged.insert(GROUP_NAME.to_string(), Value::String(name));
            }
            None => {
                merged.remove(GROUP_NAME);
            }
        }
    }

    Ok(merged)
}

/// Merge a group into its cluster and require a resolvable `group_name`.
pub fn merge_group(cluster: &Declaration, group: &Declaration) -> Result<Declaration> {
    let merged = merge(cluster, group)?;
    if !merged.contains_key(GROUP_NAME) {
        return Err(ConfigError::MissingGroupName);
    }
    Ok(merged)
}

fn import_block(decl: &Declaration) -> Result<Option<&Declaration>> {
    mapping(decl, IMPORT)
}

fn mapping<'a>(decl: &'a Declaration, key: &str) -> Result<Option<&'a Declaration>> {
    match decl.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(_) => Err(ConfigError::malformed(key, "a mapping")),
    }
}

fn string_set(decl: &Declaration, key: &str) -> Result<BTreeSet<String>> {
    match decl.get(key) {
        None | Some(Value::Null) => Ok(BTreeSet::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => Ok(s.clone()),
                _ => Err(ConfigError::malformed(key, "a list of strings")),
            })
            .collect(),
        Some(_) => Err(ConfigError::malformed(key, "a list of strings")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decl(value: Value) -> Declaration {
        match value {
            Value::Object(map) => map,
            _ => panic!("not a mapping"),
        }
    }

    #[test]
    fn test_tags_and_groups() {
        let parent = decl(json!({"tags": {"a": 1}, "inventory_groups": ["x"]}));
        let child = decl(json!({"tags": {"a": 2, "b": 3}, "inventory_groups": ["y"]}));

        let merged = merge(&parent, &child).unwrap();

        assert_eq!(merged["tags"], json!({"a": 2, "b": 3}));
        assert_eq!(merged["inventory_groups"], json!(["x", "y"]));
        assert_eq!(merged["group_name"], json!("x"));
    }

    #[test]
    fn test_precedence_order() {
        let parent = decl(json!({
            "import": {"region": "import-parent", "image": "import-parent", "subnet": "import-parent"},
            "region": "parent",
            "image": "parent"
        }));
        let child = decl(json!({
            "import": {"image": "import-child", "zone": "import-child"},
            "zone": "child"
        }));

        let merged = merge(&parent, &child).unwrap();

        assert_eq!(merged["subnet"], json!("import-parent"));
        assert_eq!(merged["region"], json!("parent"));
        assert_eq!(merged["image"], json!("import-child"));
        assert_eq!(merged["zone"], json!("child"));
        assert!(!merged.contains_key("import"));
    }

    #[test]
    fn test_three_level_chain_is_left_to_right() {
        let a = decl(json!({"inventory_groups": ["z"], "region": "a"}));
        let b = decl(json!({"inventory_groups": ["y"], "import": {"region": "b"}}));
        let c = decl(json!({"inventory_groups": ["x"]}));

        let left = merge(&merge(&a, &b).unwrap(), &c).unwrap();
        let right = merge(&a, &merge(&b, &c).unwrap()).unwrap();

        // group_name is fixed at the first level that derives it
        assert_eq!(left["group_name"], json!("y"));
        assert_eq!(right["group_name"], json!("x"));
        // b's import overrides a's explicit key when b is the child
        assert_eq!(left["region"], json!("b"));
        assert_eq!(left["inventory_groups"], json!(["x", "y", "z"]));
    }

    #[test]
    fn test_explicit_groups_shadow_child_import() {
        let parent = decl(json!({"inventory_groups": ["p"]}));
        let child = decl(json!({
            "import": {"inventory_groups": ["c"], "security_groups": ["sg-import"]},
            "inventory_groups": ["d"]
        }));

        let merged = merge(&parent, &child).unwrap();

        assert_eq!(merged["inventory_groups"], json!(["d", "p"]));
        assert_eq!(merged["group_name"], json!("d"));
        // no explicit key, so the import list still applies
        assert_eq!(merged["security_groups"], json!(["sg-import"]));
    }

    #[test]
    fn test_union_is_idempotent() {
        let a = decl(json!({"security_groups": ["sg-1", "sg-2"], "inventory_groups": ["g"]}));
        let once = merge(&a, &a).unwrap();
        let twice = merge(&once, &a).unwrap();
        assert_eq!(once["security_groups"], json!(["sg-1", "sg-2"]));
        assert_eq!(once, twice);
    }

    #[test]
    fn test_import_tags_are_merged() {
        let parent = decl(json!({"import": {"tags": {"env": "prod", "team": "a"}}}));
        let child = decl(json!({"tags": {"team": "b"}, "group_name": "g"}));
        let merged = merge(&parent, &child).unwrap();
        assert_eq!(merged["tags"], json!({"env": "prod", "team": "b"}));
        assert_eq!(merged["group_name"], json!("g"));
    }

    #[test]
    fn test_malformed_values() {
        let bad_import = decl(json!({"import": ["nope"]}));
        assert!(matches!(
            merge(&bad_import, &Declaration::new()),
            Err(ConfigError::Malformed { key, .. }) if key == "import"
        ));

        let bad_tags = decl(json!({"tags": ["a"]}));
        assert!(matches!(
            merge(&Declaration::new(), &bad_tags),
            Err(ConfigError::Malformed { key, .. }) if key == "tags"
        ));

        let bad_groups = decl(json!({"inventory_groups": "x"}));
        assert!(merge(&Declaration::new(), &bad_groups).is_err());
    }

    #[test]
    fn test_missing_group_name() {
        let cluster = decl(json!({"region": "r"}));
        let group = decl(json!({"exact_count": 1}));

        let merged = merge(&cluster, &group).unwrap();
        assert!(!merged.contains_key("group_name"));
        assert!(matches!(
            merge_group(&cluster, &group),
            Err(ConfigError::MissingGroupName)
        ));
    }

    #[test]
    fn test_inputs_untouched() {
        let parent = decl(json!({"tags": {"a": 1}}));
        let child = decl(json!({"tags": {"a": 2}}));
        let before = parent.clone();
        merge(&parent, &child).unwrap();
        assert_eq!(parent, before);
    }
}
