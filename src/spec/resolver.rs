//! Schema Resolver: cycle-safe `$ref` expansion (§4.3).

use crate::spec::model::Schema;
use serde_json::{json, Value};
use std::collections::HashSet;
use tracing::warn;

const REF_PREFIX: &str = "#/components/schemas/";

/// Resolve every `$ref` in `schema` against `components.schemas` in `doc`,
/// recursively, breaking cycles with a visited-ref set.
pub fn resolve(schema: &Schema, doc: &Value) -> Schema {
    resolve_inner(schema, doc, &HashSet::new())
}

fn resolve_inner(schema: &Schema, doc: &Value, visited: &HashSet<String>) -> Schema {
    let Some(obj) = schema.as_object() else {
        return schema.clone();
    };

    if let Some(Value::String(r)) = obj.get("$ref") {
        if visited.contains(r) {
            warn!(r#ref = %r, "cyclic $ref detected, substituting empty object schema");
            return json!({ "type": "object", "properties": {} });
        }
        let Some(name) = r.strip_prefix(REF_PREFIX) else {
            warn!(r#ref = %r, "unsupported $ref form, substituting empty object schema");
            return json!({ "type": "object", "properties": {} });
        };
        let Some(target) = doc
            .get("components")
            .and_then(|c| c.get("schemas"))
            .and_then(|s| s.get(name))
        else {
            warn!(schema = %name, "$ref target not found, substituting empty object schema");
            return json!({ "type": "object", "properties": {} });
        };
        let mut next_visited = visited.clone();
        next_visited.insert(r.clone());
        return resolve_inner(target, doc, &next_visited);
    }

    let mut result = obj.clone();
    if let Some(props) = obj.get("properties").and_then(|p| p.as_object()) {
        let mut resolved_props = serde_json::Map::new();
        for (name, prop_schema) in props {
            // Fresh copy of `visited` per branch: diamond refs resolve
            // independently, only a true cycle along one path is caught.
            resolved_props.insert(name.clone(), resolve_inner(prop_schema, doc, visited));
        }
        result.insert("properties".to_string(), Value::Object(resolved_props));
    }
    if let Some(items) = obj.get("items") {
        result.insert("items".to_string(), resolve_inner(items, doc, visited));
    }
    Value::Object(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc_with_schemas() -> Value {
        json!({
            "components": {
                "schemas": {
                    "User": {
                        "type": "object",
                        "properties": {
                            "id": { "type": "integer" },
                            "self": { "$ref": "#/components/schemas/User" }
                        }
                    },
                    "Address": { "type": "object", "properties": { "city": { "type": "string" } } }
                }
            }
        })
    }

    #[test]
    fn resolves_simple_ref() {
        let doc = doc_with_schemas();
        let schema = json!({ "$ref": "#/components/schemas/Address" });
        let resolved = resolve(&schema, &doc);
        assert_eq!(resolved["properties"]["city"]["type"], "string");
    }

    #[test]
    fn cycle_yields_empty_object_not_infinite_recursion() {
        let doc = doc_with_schemas();
        let schema = json!({ "$ref": "#/components/schemas/User" });
        let resolved = resolve(&schema, &doc);
        let inner = &resolved["properties"]["self"];
        assert_eq!(inner["type"], "object");
        assert!(inner["properties"].as_object().unwrap().is_empty());
    }

    #[test]
    fn unresolvable_ref_form_yields_empty_object() {
        let doc = json!({});
        let schema = json!({ "$ref": "other.yaml#/Foo" });
        let resolved = resolve(&schema, &doc);
        assert_eq!(resolved["type"], "object");
    }

    #[test]
    fn diamond_refs_resolve_independently() {
        let doc = doc_with_schemas();
        let schema = json!({
            "type": "object",
            "properties": {
                "a": { "$ref": "#/components/schemas/Address" },
                "b": { "$ref": "#/components/schemas/Address" }
            }
        });
        let resolved = resolve(&schema, &doc);
        assert_eq!(resolved["properties"]["a"]["properties"]["city"]["type"], "string");
        assert_eq!(resolved["properties"]["b"]["properties"]["city"]["type"], "string");
    }
}
