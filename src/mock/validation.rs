//! Validation Pipeline: precedence-ordered checks on an incoming request
//! against an [`EndpointMeta`] (§4.5). The first failing check short-circuits.

use crate::spec::model::EndpointMeta;
use std::collections::HashMap;
use tracing::{debug, warn};

const FORCED_ERROR_HEADER: &str = "x-ouroboros-error";

/// Outcome of the validation pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    Valid,
    Failed { status: u16, message: String },
}

/// Minimal view of a request the pipeline needs: headers and query params,
/// both case-insensitively keyed by the caller.
pub struct RequestView<'a> {
    pub headers: &'a HashMap<String, String>,
    pub query_params: &'a HashMap<String, String>,
}

fn header_present(headers: &HashMap<String, String>, name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    headers.keys().any(|k| k.to_ascii_lowercase() == lower)
}

fn header_value<'a>(headers: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    let lower = name.to_ascii_lowercase();
    headers
        .iter()
        .find(|(k, _)| k.to_ascii_lowercase() == lower)
        .map(|(_, v)| v.as_str())
}

/// Run the precedence-ordered checks described in §4.5.
pub fn validate(req: &RequestView, meta: &EndpointMeta) -> Validation {
    if let Some(raw) = header_value(req.headers, FORCED_ERROR_HEADER) {
        match raw.trim().parse::<u16>() {
            Ok(code) => {
                debug!(code, "forced error via x-ouroboros-error header");
                return Validation::Failed {
                    status: code,
                    message: "Forced error response via X-Ouroboros-Error header".to_string(),
                };
            }
            Err(_) => warn!(value = %raw, "x-ouroboros-error header is not numeric, ignoring"),
        }
    }

    for name in &meta.auth_headers {
        if !header_present(req.headers, name) {
            return Validation::Failed {
                status: 401,
                message: "Authentication required.".to_string(),
            };
        }
    }

    for name in &meta.required_headers {
        if !header_present(req.headers, name) {
            return Validation::Failed {
                status: 400,
                message: format!("Missing required header: {name}"),
            };
        }
    }

    for name in &meta.required_params {
        if !req.query_params.contains_key(name) {
            return Validation::Failed {
                status: 400,
                message: format!("Missing required parameter: {name}"),
            };
        }
    }

    Validation::Valid
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta() -> EndpointMeta {
        EndpointMeta {
            id: "id".into(),
            path: "/x".into(),
            method: "GET".into(),
            required_headers: vec!["X-Trace".into()],
            required_params: vec!["page".into()],
            auth_headers: vec!["Authorization".into()],
            request_body_required: false,
            request_body_schema: None,
            request_body_content_type: None,
            responses: vec![],
        }
    }

    #[test]
    fn forced_error_takes_precedence_over_everything() {
        let headers = HashMap::from([("x-ouroboros-error".to_string(), "418".to_string())]);
        let params = HashMap::new();
        let view = RequestView { headers: &headers, query_params: &params };
        assert_eq!(
            validate(&view, &meta()),
            Validation::Failed { status: 418, message: "Forced error response via X-Ouroboros-Error header".into() }
        );
    }

    #[test]
    fn missing_auth_header_returns_401() {
        let headers = HashMap::new();
        let params = HashMap::from([("page".to_string(), "1".to_string())]);
        let view = RequestView { headers: &headers, query_params: &params };
        assert_eq!(
            validate(&view, &meta()),
            Validation::Failed { status: 401, message: "Authentication required.".into() }
        );
    }

    #[test]
    fn missing_required_header_returns_400_after_auth_passes() {
        let headers = HashMap::from([("authorization".to_string(), "token".to_string())]);
        let params = HashMap::from([("page".to_string(), "1".to_string())]);
        let view = RequestView { headers: &headers, query_params: &params };
        let result = validate(&view, &meta());
        assert!(matches!(result, Validation::Failed { status: 400, .. }));
    }

    #[test]
    fn all_checks_pass_yields_valid() {
        let headers = HashMap::from([
            ("authorization".to_string(), "token".to_string()),
            ("x-trace".to_string(), "abc".to_string()),
        ]);
        let params = HashMap::from([("page".to_string(), "1".to_string())]);
        let view = RequestView { headers: &headers, query_params: &params };
        assert_eq!(validate(&view, &meta()), Validation::Valid);
    }

    #[test]
    fn non_numeric_forced_error_header_is_ignored() {
        let headers = HashMap::from([
            ("x-ouroboros-error".to_string(), "not-a-number".to_string()),
            ("authorization".to_string(), "token".to_string()),
            ("x-trace".to_string(), "abc".to_string()),
        ]);
        let params = HashMap::from([("page".to_string(), "1".to_string())]);
        let view = RequestView { headers: &headers, query_params: &params };
        assert_eq!(validate(&view, &meta()), Validation::Valid);
    }
}
