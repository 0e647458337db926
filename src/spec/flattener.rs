//! Schema Flattener: reduces a schema graph to a `TypeCounts` multiset of leaf
//! descriptors, used by the Sync Pipeline for structural schema equality (§4.8).

use crate::spec::model::TypeCounts;
use serde_json::Value;
use std::collections::HashSet;

const PRIMITIVES: [&str; 4] = ["string", "integer", "number", "boolean"];

/// Flatten a named schema from `components.schemas` into a leaf-type multiset.
pub fn flatten(name: &str, doc: &Value) -> TypeCounts {
    let mut counts = TypeCounts::new();
    let mut visited = HashSet::new();
    visited.insert(name.to_string());
    if let Some(schema) = doc
        .get("components")
        .and_then(|c| c.get("schemas"))
        .and_then(|s| s.get(name))
    {
        walk(schema, doc, "", &mut counts, &mut visited);
    }
    counts
}

fn bump(counts: &mut TypeCounts, key: String) {
    *counts.entry(key).or_insert(0) += 1;
}

fn ref_name(schema: &Value) -> Option<&str> {
    schema
        .get("$ref")
        .and_then(Value::as_str)
        .and_then(|r| r.strip_prefix("#/components/schemas/"))
}

fn walk(schema: &Value, doc: &Value, prefix: &str, counts: &mut TypeCounts, visited: &mut HashSet<String>) {
    if let Some(name) = ref_name(schema) {
        if visited.contains(name) {
            // Cycle: treat the revisited schema name as an opaque leaf.
            bump(counts, format!("{prefix}:{name}"));
            return;
        }
        let Some(target) = doc
            .get("components")
            .and_then(|c| c.get("schemas"))
            .and_then(|s| s.get(name))
        else {
            bump(counts, format!("{prefix}:{name}"));
            return;
        };
        let mut next_visited = visited.clone();
        next_visited.insert(name.to_string());
        walk(target, doc, prefix, counts, &mut next_visited);
        return;
    }

    let Some(obj) = schema.as_object() else {
        return;
    };
    let schema_type = obj.get("type").and_then(Value::as_str).unwrap_or("object");

    if schema_type == "object" {
        if let Some(props) = obj.get("properties").and_then(Value::as_object) {
            for (prop_name, prop_schema) in props {
                let nested_prefix = if prefix.is_empty() {
                    prop_name.clone()
                } else {
                    format!("{prefix}.{prop_name}")
                };
                leaf_or_nested(prop_schema, doc, &nested_prefix, counts, visited);
            }
        }
        return;
    }

    // Root schema itself is a primitive or bare array; treat the prefix as its own leaf name.
    leaf_or_nested(schema, doc, prefix, counts, visited);
}

fn leaf_or_nested(
    schema: &Value,
    doc: &Value,
    prop_prefix: &str,
    counts: &mut TypeCounts,
    visited: &mut HashSet<String>,
) {
    if let Some(name) = ref_name(schema) {
        if visited.contains(name) {
            bump(counts, format!("{prop_prefix}:{name}"));
            return;
        }
        let Some(target) = doc
            .get("components")
            .and_then(|c| c.get("schemas"))
            .and_then(|s| s.get(name))
        else {
            bump(counts, format!("{prop_prefix}:{name}"));
            return;
        };
        let target_type = target.get("type").and_then(Value::as_str).unwrap_or("object");
        if target_type == "object" {
            let mut next_visited = visited.clone();
            next_visited.insert(name.to_string());
            walk(target, doc, prop_prefix, counts, &mut next_visited);
        } else {
            bump(counts, format!("{prop_prefix}:{name}"));
        }
        return;
    }

    let Some(obj) = schema.as_object() else {
        bump(counts, format!("{prop_prefix}:string"));
        return;
    };
    let schema_type = obj.get("type").and_then(Value::as_str).unwrap_or("string");

    match schema_type {
        "object" => walk(schema, doc, prop_prefix, counts, visited),
        "array" => {
            let items = obj.get("items");
            match items {
                Some(item_schema) => {
                    if let Some(name) = ref_name(item_schema) {
                        bump(counts, format!("{prop_prefix}:array.{name}"));
                    } else {
                        let item_type = item_schema
                            .get("type")
                            .and_then(Value::as_str)
                            .unwrap_or("string");
                        if PRIMITIVES.contains(&item_type) {
                            bump(counts, format!("{prop_prefix}:array.{item_type}"));
                        } else {
                            bump(counts, format!("{prop_prefix}:array.object"));
                        }
                    }
                }
                None => bump(counts, format!("{prop_prefix}:array.string")),
            }
        }
        primitive => bump(counts, format!("{prop_prefix}:{primitive}")),
    }
}

/// Two schemas "match" iff their flattened multisets are equal.
pub fn schemas_match(a: &TypeCounts, b: &TypeCounts) -> bool {
    a == b
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc() -> Value {
        json!({
            "components": {
                "schemas": {
                    "User": {
                        "type": "object",
                        "properties": {
                            "id": { "type": "integer" },
                            "name": { "type": "string" },
                            "tags": { "type": "array", "items": { "type": "string" } },
                            "address": { "$ref": "#/components/schemas/Address" },
                            "friends": { "type": "array", "items": { "$ref": "#/components/schemas/User" } }
                        }
                    },
                    "Address": {
                        "type": "object",
                        "properties": { "city": { "type": "string" } }
                    }
                }
            }
        })
    }

    #[test]
    fn flattens_nested_objects_inline() {
        let counts = flatten("User", &doc());
        assert_eq!(counts.get("id:integer"), Some(&1));
        assert_eq!(counts.get("name:string"), Some(&1));
        assert_eq!(counts.get("tags:array.string"), Some(&1));
        assert_eq!(counts.get("address.city:string"), Some(&1));
        assert_eq!(counts.get("friends:array.User"), Some(&1));
    }

    #[test]
    fn property_order_does_not_affect_counts() {
        let doc_a = json!({
            "components": { "schemas": { "S": {
                "type": "object",
                "properties": { "a": {"type": "string"}, "b": {"type": "integer"} }
            }}}
        });
        let doc_b = json!({
            "components": { "schemas": { "S": {
                "type": "object",
                "properties": { "b": {"type": "integer"}, "a": {"type": "string"} }
            }}}
        });
        assert!(schemas_match(&flatten("S", &doc_a), &flatten("S", &doc_b)));
    }

    #[test]
    fn cycle_becomes_opaque_leaf() {
        let cyclic = json!({
            "components": { "schemas": { "Node": {
                "type": "object",
                "properties": { "next": { "$ref": "#/components/schemas/Node" } }
            }}}
        });
        let counts = flatten("Node", &cyclic);
        assert_eq!(counts.get("next:Node"), Some(&1));
    }
}
