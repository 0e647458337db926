//! Mock Synthesizer: walks a resolved schema and produces a sample value,
//! optionally driven by the `{{$category.method(params)}}` faker DSL (§4.4).
//!
//! Per the design notes, the faker DSL is interpreted through an explicit
//! `(category, method) -> generator` table rather than reflection: the parser
//! produces `{category, method, params}` and the interpreter looks the pair up.

use fake::faker::internet::en::SafeEmail;
use fake::faker::lorem::en::{Sentence, Word, Words};
use fake::faker::name::en::{FirstName, LastName, Name};
use fake::Fake;
use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;
use serde_json::{json, Map, Value};
use std::collections::HashMap;

use crate::spec::model::Schema;

static FAKER_PATTERN: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"^\{\{\$(.*)\}\}$").expect("static faker pattern is valid")
});

static CALL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"^(?P<category>[A-Za-z_][A-Za-z0-9_]*)\.(?P<method>[A-Za-z_][A-Za-z0-9_]*)\((?P<params>.*)\)$")
        .expect("static call pattern is valid")
});

static PARAM_PATTERN: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r#"^([A-Za-z_][A-Za-z0-9_]*)=(?:(-?\d+)|'([^']*)'|"([^"]*)")$"#)
        .expect("static param pattern is valid")
});

#[derive(Debug, Clone)]
enum ParamValue {
    Int(i64),
    Str(String),
}

struct FakerCall {
    category: String,
    method: String,
    params: HashMap<String, ParamValue>,
}

fn parse_params(raw: &str) -> Option<HashMap<String, ParamValue>> {
    let mut out = HashMap::new();
    let raw = raw.trim();
    if raw.is_empty() {
        return Some(out);
    }
    for part in raw.split(',') {
        let caps = PARAM_PATTERN.captures(part.trim())?;
        let name = caps.get(1)?.as_str().to_string();
        let value = if let Some(int_match) = caps.get(2) {
            ParamValue::Int(int_match.as_str().parse().ok()?)
        } else if let Some(s) = caps.get(3).or_else(|| caps.get(4)) {
            ParamValue::Str(s.as_str().to_string())
        } else {
            return None;
        };
        out.insert(name, value);
    }
    Some(out)
}

fn parse_faker_call(expr: &str) -> Option<FakerCall> {
    let inner = FAKER_PATTERN.captures(expr)?.get(1)?.as_str();
    let caps = CALL_PATTERN.captures(inner)?;
    let category = caps.name("category")?.as_str().to_string();
    let method = caps.name("method")?.as_str().to_string();
    let params = parse_params(caps.name("params")?.as_str())?;
    Some(FakerCall { category, method, params })
}

fn param_int(params: &HashMap<String, ParamValue>, name: &str, default: i64) -> i64 {
    match params.get(name) {
        Some(ParamValue::Int(n)) => *n,
        _ => default,
    }
}

/// Evaluate a parsed faker call against the table of known (category, method)
/// generators. Unknown categories fail; unknown methods on a known category
/// fall back to a no-argument call, per §4.4.
fn eval_call(call: &FakerCall) -> Option<Value> {
    match (call.category.as_str(), call.method.as_str()) {
        ("name", "fullName") => Some(json!(Name().fake::<String>())),
        ("name", "firstName") => Some(json!(FirstName().fake::<String>())),
        ("name", "lastName") => Some(json!(LastName().fake::<String>())),
        ("internet", "email") => Some(json!(SafeEmail().fake::<String>())),
        ("lorem", "word") => Some(json!(Word().fake::<String>())),
        ("lorem", "sentence") => Some(json!(Sentence(3..8).fake::<String>())),
        ("number", "int") | ("number", "numberBetween") => {
            let min = param_int(&call.params, "min", 1);
            let max = param_int(&call.params, "max", 1000);
            Some(json!(rand::thread_rng().gen_range(min..=max)))
        }
        ("number", "decimal") | ("number", "randomDouble") => {
            let min = param_int(&call.params, "min", 1000) as f64;
            let max = param_int(&call.params, "max", 100000) as f64;
            let raw = rand::thread_rng().gen_range(min..=max);
            let rounded = (raw * 100.0).round() / 100.0;
            Some(json!(rounded))
        }
        (category, _) if known_category(category) => {
            // Unknown method on a known category: "call with no args".
            Some(json!(Word().fake::<String>()))
        }
        _ => None,
    }
}

fn known_category(category: &str) -> bool {
    matches!(category, "name" | "internet" | "lorem" | "number")
}

/// Leaf generator: evaluate `x-ouroboros-mock` per the precedence in §4.4.
fn synthesize_leaf(schema: &Schema) -> Value {
    let mock = schema.get("x-ouroboros-mock");
    let schema_type = schema.get("type").and_then(Value::as_str).unwrap_or("string");

    if let Some(Value::String(s)) = mock {
        if FAKER_PATTERN.is_match(s) {
            return match parse_faker_call(s).and_then(|call| eval_call(&call)) {
                Some(value) => value,
                None => json!(format!("[FAKER_ERROR] {s}")),
            };
        }
        if !s.trim().is_empty() {
            return json!(s);
        }
        return json!("");
    }
    if mock.is_some() {
        // present but not a string (or blank-string already handled above)
        return json!("");
    }

    default_for_type(schema_type)
}

fn default_for_type(schema_type: &str) -> Value {
    let mut rng = rand::thread_rng();
    match schema_type {
        "integer" | "number" => json!(rng.gen_range(1..=1000)),
        "boolean" => json!(rng.gen_bool(0.5)),
        "array" => json!(Words(2..3).fake::<Vec<String>>()),
        "object" => json!({ "message": Sentence(3..8).fake::<String>() }),
        _ => json!(Word().fake::<String>()),
    }
}

/// Synthesize a sample value from a resolved schema (no remaining `$ref`s).
pub fn synthesize(schema: &Schema) -> Value {
    let Some(obj) = schema.as_object() else {
        return Value::Null;
    };
    let schema_type = obj.get("type").and_then(Value::as_str).unwrap_or("object");

    match schema_type {
        "object" => synthesize_object(obj),
        "array" => synthesize_array(obj),
        _ => synthesize_leaf(schema),
    }
}

fn property_order(obj: &Map<String, Value>) -> Vec<String> {
    if let Some(orders) = obj.get("x-ouroboros-orders").and_then(Value::as_array) {
        return orders.iter().filter_map(Value::as_str).map(str::to_string).collect();
    }
    obj.get("properties")
        .and_then(Value::as_object)
        .map(|p| p.keys().cloned().collect())
        .unwrap_or_default()
}

fn synthesize_object(obj: &Map<String, Value>) -> Value {
    let Some(properties) = obj.get("properties").and_then(Value::as_object) else {
        return default_for_type("object");
    };
    let mut result = Map::new();
    for name in property_order(obj) {
        if let Some(prop_schema) = properties.get(&name) {
            result.insert(name, synthesize(prop_schema));
        }
    }
    Value::Object(result)
}

/// Arrays always synthesize exactly 3 elements.
fn synthesize_array(obj: &Map<String, Value>) -> Value {
    match obj.get("items") {
        Some(items) => Value::Array((0..3).map(|_| synthesize(items)).collect()),
        None => default_for_type("array"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn object_honors_required_and_declared_order() {
        let schema = json!({
            "type": "object",
            "properties": {
                "id": { "type": "integer" },
                "name": { "type": "string" }
            },
            "required": ["id", "name"]
        });
        let value = synthesize(&schema);
        let obj = value.as_object().unwrap();
        let keys: Vec<&String> = obj.keys().collect();
        assert_eq!(keys, vec!["id", "name"]);
        assert!(obj["id"].is_number());
        assert!(obj["name"].is_string());
    }

    #[test]
    fn x_ouroboros_orders_overrides_declaration_order() {
        let schema = json!({
            "type": "object",
            "properties": { "a": {"type": "string"}, "b": {"type": "string"} },
            "x-ouroboros-orders": ["b", "a"]
        });
        let value = synthesize(&schema);
        let keys: Vec<&String> = value.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["b", "a"]);
    }

    #[test]
    fn array_always_has_exactly_three_elements() {
        let schema = json!({ "type": "array", "items": { "type": "string" } });
        let value = synthesize(&schema);
        assert_eq!(value.as_array().unwrap().len(), 3);
    }

    #[test]
    fn faker_literal_mock_returned_verbatim() {
        let schema = json!({ "type": "string", "x-ouroboros-mock": "fixed-value" });
        assert_eq!(synthesize(&schema), json!("fixed-value"));
    }

    #[test]
    fn faker_error_yields_sentinel_string() {
        let schema = json!({ "type": "string", "x-ouroboros-mock": "{{$nosuch.thing()}}" });
        assert_eq!(synthesize(&schema), json!("[FAKER_ERROR] {{$nosuch.thing()}}"));
    }

    #[test]
    fn number_between_is_inclusive_of_bounds() {
        let schema = json!({ "type": "string", "x-ouroboros-mock": "{{$number.int(min=5,max=5)}}" });
        assert_eq!(synthesize(&schema), json!(5));
    }

    #[test]
    fn faker_name_full_name_produces_nonempty_string() {
        let schema = json!({ "type": "string", "x-ouroboros-mock": "{{$name.fullName()}}" });
        let value = synthesize(&schema);
        assert!(value.as_str().unwrap().len() > 0);
    }
}
