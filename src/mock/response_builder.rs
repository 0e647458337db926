//! Response Builder: selects a response by success-code priority, synthesizes
//! the body, deep-merges the parsed request body, and chooses a content type
//! (§4.7).

use crate::mock::synthesizer::synthesize;
use crate::spec::model::{EndpointMeta, ResponseMeta};
use crate::spec::resolver::resolve;
use serde_json::Value;

pub struct BuiltResponse {
    pub status: u16,
    pub content_type: String,
    pub headers: Vec<(String, String)>,
    pub body: Value,
}

/// Deep-merge `request` into `generated`: matching map keys recurse, anything
/// else (arrays, scalars, type mismatches) is replaced by the request's value.
pub fn deep_merge(generated: &Value, request: &Value) -> Value {
    match (generated, request) {
        (Value::Object(g), Value::Object(r)) => {
            let mut result = g.clone();
            for (k, rv) in r {
                let merged = match result.get(k) {
                    Some(gv) => deep_merge(gv, rv),
                    None => rv.clone(),
                };
                result.insert(k.clone(), merged);
            }
            Value::Object(result)
        }
        _ => request.clone(),
    }
}

fn accept_wants_xml(accept: Option<&str>) -> bool {
    accept.map(|a| a.to_ascii_lowercase().contains("xml")).unwrap_or(false)
}

/// Minimal structural XML serialization sufficient for a mock response body;
/// object keys become elements, arrays repeat the parent element name.
fn to_xml(value: &Value, root: &str) -> String {
    fn write_value(buf: &mut String, name: &str, value: &Value) {
        match value {
            Value::Object(map) => {
                buf.push_str(&format!("<{name}>"));
                for (k, v) in map {
                    write_value(buf, k, v);
                }
                buf.push_str(&format!("</{name}>"));
            }
            Value::Array(items) => {
                for item in items {
                    write_value(buf, name, item);
                }
            }
            Value::Null => buf.push_str(&format!("<{name}/>")),
            other => buf.push_str(&format!("<{name}>{other}</{name}>")),
        }
    }
    let mut buf = String::new();
    write_value(&mut buf, root, value);
    buf
}

/// Build the mock response for `meta`, given the parsed request body
/// (`Value::Null` if absent/unparseable) and the request's `Accept` header.
pub fn build(meta: &EndpointMeta, spec_doc: &Value, request_body: &Value, accept: Option<&str>) -> Option<BuiltResponse> {
    let (status, response_meta) = meta.select_success_response()?;
    Some(build_with(status, response_meta, spec_doc, request_body, accept))
}

fn build_with(status: u16, response_meta: &ResponseMeta, spec_doc: &Value, request_body: &Value, accept: Option<&str>) -> BuiltResponse {
    let headers: Vec<(String, String)> = response_meta
        .headers
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    let generated = match &response_meta.body {
        Some(schema) if !schema.as_object().map(|o| o.is_empty()).unwrap_or(true) => {
            synthesize(&resolve(schema, spec_doc))
        }
        _ => Value::Null,
    };

    let merged = match (&generated, request_body) {
        (Value::Object(_), Value::Object(_)) => deep_merge(&generated, request_body),
        _ => generated,
    };

    let content_type = response_meta
        .content_type
        .clone()
        .unwrap_or_else(|| {
            if accept_wants_xml(accept) {
                "application/xml".to_string()
            } else {
                "application/json".to_string()
            }
        });
    let content_type = format!("{content_type};charset=UTF-8");

    debug_assert_eq!(response_meta.status_code, status);

    BuiltResponse {
        status,
        content_type,
        headers,
        body: merged,
    }
}

impl BuiltResponse {
    pub fn serialize(&self) -> Vec<u8> {
        if self.body.is_null() {
            return Vec::new();
        }
        if self.content_type.to_ascii_lowercase().contains("xml") {
            to_xml(&self.body, "response").into_bytes()
        } else {
            serde_json::to_vec(&self.body).unwrap_or_default()
        }
    }
}
