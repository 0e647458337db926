//! Derives the set of [`EndpointMeta`] to register from a [`SpecDoc`],
//! filtered to operations with `x-ouroboros-progress = mock` (§3 lifecycle).

use crate::spec::model::{EndpointMeta, ParameterLocation, Progress, ResponseMeta};
use serde_json::Value;
use std::collections::BTreeMap;

const HTTP_METHODS: [&str; 7] = ["get", "put", "post", "delete", "options", "head", "patch"];

/// Walk every path/method in `doc` and build an `EndpointMeta` for each
/// operation whose `x-ouroboros-progress` is `mock`.
pub fn build_endpoints(doc: &Value) -> Vec<EndpointMeta> {
    let mut endpoints = Vec::new();
    let Some(paths) = doc.get("paths").and_then(Value::as_object) else {
        return endpoints;
    };
    for (path, item) in paths {
        let Some(item_obj) = item.as_object() else { continue };
        for method in HTTP_METHODS {
            let Some(op) = item_obj.get(method) else { continue };
            let progress = op
                .get("x-ouroboros-progress")
                .and_then(Value::as_str)
                .and_then(Progress::parse)
                .unwrap_or(Progress::Completed);
            if progress != Progress::Mock {
                continue;
            }
            endpoints.push(build_endpoint_meta(path, method, op));
        }
    }
    endpoints
}

fn build_endpoint_meta(path: &str, method: &str, op: &Value) -> EndpointMeta {
    let id = op
        .get("x-ouroboros-id")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let mut required_headers = Vec::new();
    let mut required_params = Vec::new();
    let mut auth_headers = Vec::new();

    if let Some(params) = op.get("parameters").and_then(Value::as_array) {
        for p in params {
            let required = p.get("required").and_then(Value::as_bool).unwrap_or(false);
            if !required {
                continue;
            }
            let Some(name) = p.get("name").and_then(Value::as_str) else { continue };
            match parameter_location(p) {
                Some(ParameterLocation::Header) => required_headers.push(name.to_string()),
                Some(ParameterLocation::Query) => required_params.push(name.to_string()),
                _ => {}
            }
        }
    }

    if let Some(security) = op.get("security").and_then(Value::as_array) {
        for requirement in security {
            if let Some(obj) = requirement.as_object() {
                for scheme_name in obj.keys() {
                    auth_headers.push(scheme_name.clone());
                }
            }
        }
    }

    let (request_body_required, request_body_schema, request_body_content_type) =
        extract_request_body(op);

    let responses = extract_responses(op);

    EndpointMeta {
        id,
        path: path.to_string(),
        method: method.to_uppercase(),
        required_headers,
        required_params,
        auth_headers,
        request_body_required,
        request_body_schema,
        request_body_content_type,
        responses,
    }
}

fn parameter_location(p: &Value) -> Option<ParameterLocation> {
    match p.get("in").and_then(Value::as_str) {
        Some("path") => Some(ParameterLocation::Path),
        Some("query") => Some(ParameterLocation::Query),
        Some("header") => Some(ParameterLocation::Header),
        Some("cookie") => Some(ParameterLocation::Cookie),
        _ => None,
    }
}

fn extract_request_body(op: &Value) -> (bool, Option<Value>, Option<String>) {
    let Some(body) = op.get("requestBody") else {
        return (false, None, None);
    };
    let required = body.get("required").and_then(Value::as_bool).unwrap_or(false);
    let Some(content) = body.get("content").and_then(Value::as_object) else {
        return (required, None, None);
    };
    for preferred in ["application/json", "application/xml", "application/x-www-form-urlencoded", "multipart/form-data"] {
        if let Some(media) = content.get(preferred) {
            return (required, media.get("schema").cloned(), Some(preferred.to_string()));
        }
    }
    content
        .iter()
        .next()
        .map(|(ct, media)| (required, media.get("schema").cloned(), Some(ct.clone())))
        .unwrap_or((required, None, None))
}

fn extract_responses(op: &Value) -> Vec<(u16, ResponseMeta)> {
    let Some(responses) = op.get("responses").and_then(Value::as_object) else {
        return Vec::new();
    };
    let mut out = Vec::new();
    for (code_str, response) in responses {
        let Ok(code) = code_str.parse::<u16>() else { continue };
        let headers = response
            .get("headers")
            .and_then(Value::as_object)
            .map(|h| {
                h.iter()
                    .filter_map(|(k, v)| v.get("example").and_then(Value::as_str).map(|s| (k.clone(), s.to_string())))
                    .collect::<BTreeMap<_, _>>()
            })
            .unwrap_or_default();

        let content = response.get("content").and_then(Value::as_object);
        let (content_type, body) = content
            .and_then(|c| {
                ["application/json", "application/xml"]
                    .into_iter()
                    .find_map(|ct| c.get(ct).map(|media| (Some(ct.to_string()), media.get("schema").cloned())))
                    .or_else(|| c.iter().next().map(|(ct, media)| (Some(ct.clone()), media.get("schema").cloned())))
            })
            .unwrap_or((None, None));

        out.push((
            code,
            ResponseMeta {
                status_code: code,
                content_type,
                headers,
                body,
            },
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn only_mock_progress_operations_are_registered() {
        let doc = json!({
            "paths": {
                "/a": { "get": { "x-ouroboros-progress": "mock", "responses": {} } },
                "/b": { "get": { "x-ouroboros-progress": "completed", "responses": {} } }
            }
        });
        let endpoints = build_endpoints(&doc);
        assert_eq!(endpoints.len(), 1);
        assert_eq!(endpoints[0].path, "/a");
    }

    #[test]
    fn required_header_and_query_params_are_split_by_location() {
        let doc = json!({
            "paths": {
                "/a": { "get": {
                    "x-ouroboros-progress": "mock",
                    "parameters": [
                        { "name": "X-Tenant", "in": "header", "required": true },
                        { "name": "page", "in": "query", "required": true },
                        { "name": "optional", "in": "query", "required": false }
                    ],
                    "responses": {}
                }}
            }
        });
        let endpoints = build_endpoints(&doc);
        assert_eq!(endpoints[0].required_headers, vec!["X-Tenant"]);
        assert_eq!(endpoints[0].required_params, vec!["page"]);
    }
}
