//! Request Filter: parses the request body by content type, runs the
//! Validation Pipeline, and either returns an error response or a parsed body
//! ready for the Response Builder (§4.6).

use crate::mock::validation::{validate, RequestView, Validation};
use crate::spec::model::EndpointMeta;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use tracing::{debug, warn};
use url::form_urlencoded;

/// Outcome of running the filter: either a ready-made error response, or the
/// parsed body to hand to the Response Builder.
pub enum FilterOutcome {
    Respond { status: u16, body: Value },
    Continue { parsed_body: Value },
}

pub struct IncomingRequest<'a> {
    pub method: &'a str,
    pub headers: &'a HashMap<String, String>,
    pub query_params: &'a HashMap<String, String>,
    pub content_type: &'a str,
    pub body: &'a [u8],
}

fn parse_form_urlencoded(body: &[u8]) -> Value {
    let mut map: Map<String, Value> = Map::new();
    for (k, v) in form_urlencoded::parse(body) {
        match map.get_mut(k.as_ref()) {
            Some(Value::Array(arr)) => arr.push(json!(v.into_owned())),
            Some(existing) => {
                let prior = existing.clone();
                *existing = Value::Array(vec![prior, json!(v.into_owned())]);
            }
            None => {
                map.insert(k.into_owned(), json!(v.into_owned()));
            }
        }
    }
    Value::Object(map)
}

fn parse_xml_stub(body: &[u8]) -> Option<Value> {
    // Structural-presence XML parsing: wrap the raw text under a single key,
    // good enough for the deep-merge step which only needs a map shape.
    let text = std::str::from_utf8(body).ok()?;
    if text.trim().is_empty() {
        return None;
    }
    Some(json!({ "_xml": text }))
}

/// Parse the body according to the expected content type, per §4.6 step 1.
fn parse_body(expected_content_type: &str, actual_content_type: &str, body: &[u8]) -> Value {
    if body.is_empty() {
        return Value::Null;
    }
    if expected_content_type.contains("multipart/form-data") {
        return if actual_content_type.to_ascii_lowercase().contains("multipart") {
            json!({ "_multipart": true })
        } else {
            Value::Null
        };
    }
    if expected_content_type.contains("application/x-www-form-urlencoded") {
        return parse_form_urlencoded(body);
    }
    if expected_content_type.contains("application/xml") {
        return parse_xml_stub(body).unwrap_or(Value::Null);
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "request body parse failure, treating as null");
            Value::Null
        }
    }
}

/// Run the filter for a request matched to `meta`.
pub fn run(req: &IncomingRequest, meta: &EndpointMeta) -> FilterOutcome {
    let parsed_body = if matches!(req.method, "POST" | "PUT" | "PATCH") {
        let expected = meta
            .request_body_content_type
            .as_deref()
            .unwrap_or("application/json");
        parse_body(expected, req.content_type, req.body)
    } else {
        Value::Null
    };

    let view = RequestView {
        headers: req.headers,
        query_params: req.query_params,
    };
    match validate(&view, meta) {
        Validation::Failed { status, message } => {
            debug!(status, message = %message, "validation pipeline rejected request");
            FilterOutcome::Respond {
                status,
                body: json!({ "error": message }),
            }
        }
        Validation::Valid => FilterOutcome::Continue { parsed_body },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta() -> EndpointMeta {
        EndpointMeta {
            id: "id".into(),
            path: "/x".into(),
            method: "POST".into(),
            required_headers: vec![],
            required_params: vec![],
            auth_headers: vec![],
            request_body_required: false,
            request_body_schema: None,
            request_body_content_type: Some("application/json".into()),
            responses: vec![],
        }
    }

    #[test]
    fn json_body_parses_to_map() {
        let headers = HashMap::new();
        let params = HashMap::new();
        let req = IncomingRequest {
            method: "POST",
            headers: &headers,
            query_params: &params,
            content_type: "application/json",
            body: br#"{"a": 1}"#,
        };
        match run(&req, &meta()) {
            FilterOutcome::Continue { parsed_body } => assert_eq!(parsed_body, json!({"a": 1})),
            FilterOutcome::Respond { .. } => panic!("expected continue"),
        }
    }

    #[test]
    fn malformed_json_becomes_null_but_still_continues() {
        let headers = HashMap::new();
        let params = HashMap::new();
        let req = IncomingRequest {
            method: "POST",
            headers: &headers,
            query_params: &params,
            content_type: "application/json",
            body: b"not json",
        };
        match run(&req, &meta()) {
            FilterOutcome::Continue { parsed_body } => assert_eq!(parsed_body, Value::Null),
            FilterOutcome::Respond { .. } => panic!("expected continue despite parse failure"),
        }
    }

    #[test]
    fn form_urlencoded_repeated_keys_become_array() {
        let body = b"a=1&a=2&b=3";
        let value = parse_form_urlencoded(body);
        assert_eq!(value["a"], json!(["1", "2"]));
        assert_eq!(value["b"], json!("3"));
    }

    #[test]
    fn validation_failure_short_circuits_before_body_use() {
        let mut m = meta();
        m.auth_headers = vec!["Authorization".into()];
        let headers = HashMap::new();
        let params = HashMap::new();
        let req = IncomingRequest {
            method: "POST",
            headers: &headers,
            query_params: &params,
            content_type: "application/json",
            body: br#"{"a": 1}"#,
        };
        match run(&req, &m) {
            FilterOutcome::Respond { status, .. } => assert_eq!(status, 401),
            FilterOutcome::Continue { .. } => panic!("expected validation failure"),
        }
    }
}
