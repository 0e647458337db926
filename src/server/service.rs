//! Core application service: the `may_minihttp::HttpService` implementation
//! that wires Registry lookup → Request Filter → Response Builder together,
//! in the style of the reference server's request-handling pipeline.

use crate::error::OuroborosError;
use crate::ids::RequestId;
use crate::mock::registry::MockRegistry;
use crate::mock::request_filter::{self, FilterOutcome, IncomingRequest};
use crate::mock::response_builder::{self};
use arc_swap::ArcSwap;
use may_minihttp::{HttpService, Request, Response};
use serde_json::Value;
use std::collections::HashMap;
use std::io::{self, Read};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A request handed to a [`Passthrough`] when no `EndpointMeta` matches.
pub struct PassthroughRequest<'a> {
    pub method: &'a str,
    pub path: &'a str,
    pub headers: &'a HashMap<String, String>,
    pub body: &'a [u8],
}

/// The response a [`Passthrough`] writes back for a forwarded request.
pub struct PassthroughResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

/// Hook an embedder supplies to satisfy §4.6's "forward the request unchanged"
/// contract for paths the Mock Registry has no `EndpointMeta` for. Without one
/// configured, an unmatched request falls back to a 404 (see DESIGN.md).
pub type Passthrough = dyn Fn(PassthroughRequest) -> PassthroughResponse + Send + Sync;

/// Application service passed to `may_minihttp::HttpServer`. Holds the
/// current spec document and an atomically-swappable mock registry so a
/// registry rebuild is never observed mid-flight (§5).
#[derive(Clone)]
pub struct AppService {
    pub registry: Arc<ArcSwap<MockRegistry>>,
    pub spec_doc: Arc<ArcSwap<Value>>,
    pub passthrough: Option<Arc<Passthrough>>,
}

impl AppService {
    pub fn new(registry: MockRegistry, spec_doc: Value) -> Self {
        Self {
            registry: Arc::new(ArcSwap::from_pointee(registry)),
            spec_doc: Arc::new(ArcSwap::from_pointee(spec_doc)),
            passthrough: None,
        }
    }

    /// Configure a hook to forward requests that miss the Mock Registry,
    /// per §4.6, instead of answering them with a 404.
    pub fn with_passthrough(mut self, passthrough: Arc<Passthrough>) -> Self {
        self.passthrough = Some(passthrough);
        self
    }

    /// Atomically replace the registry and spec document after a rebuild.
    pub fn swap(&self, registry: MockRegistry, spec_doc: Value) {
        self.registry.store(Arc::new(registry));
        self.spec_doc.store(Arc::new(spec_doc));
    }
}

fn headers_to_map(req: &Request) -> HashMap<String, String> {
    req.headers()
        .iter()
        .map(|h| (h.name.to_ascii_lowercase(), String::from_utf8_lossy(h.value).to_string()))
        .collect()
}

fn query_params(path: &str) -> HashMap<String, String> {
    match path.find('?') {
        Some(pos) => url::form_urlencoded::parse(path[pos + 1..].as_bytes())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect(),
        None => HashMap::new(),
    }
}

fn status_reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        400 => "Bad Request",
        401 => "Unauthorized",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "OK",
    }
}

fn write_json(res: &mut Response, status: u16, content_type: &str, body: &[u8]) {
    res.status_code(status as usize, status_reason(status));
    res.header(&format!("Content-Type: {content_type}"));
    res.body_vec(body.to_vec());
}

impl HttpService for AppService {
    fn call(&mut self, mut req: Request, res: &mut Response) -> io::Result<()> {
        let request_id = RequestId::from_header_or_new(
            req.headers()
                .iter()
                .find(|h| h.name.eq_ignore_ascii_case("x-request-id"))
                .map(|h| std::str::from_utf8(h.value).unwrap_or_default()),
        );
        let span = tracing::info_span!("request", request_id = %request_id);
        let _guard = span.enter();

        let method = req.method().to_string();
        let raw_path = req.path().to_string();
        let path = raw_path.split('?').next().unwrap_or("/").to_string();
        let headers = headers_to_map(&req);
        let query = query_params(&raw_path);

        let content_type = headers.get("content-type").cloned().unwrap_or_default();
        let mut body_bytes = Vec::new();
        let _ = req.body().read_to_end(&mut body_bytes);

        let registry = self.registry.load();
        let Some(meta) = registry.find(&path, &method) else {
            return match &self.passthrough {
                Some(passthrough) => {
                    debug!(method = %method, path = %path, "no mock endpoint matched, forwarding unchanged");
                    let forwarded = passthrough(PassthroughRequest {
                        method: &method,
                        path: &path,
                        headers: &headers,
                        body: &body_bytes,
                    });
                    res.status_code(forwarded.status as usize, status_reason(forwarded.status));
                    for (k, v) in &forwarded.headers {
                        res.header(&format!("{k}: {v}"));
                    }
                    res.body_vec(forwarded.body);
                    Ok(())
                }
                None => {
                    debug!(method = %method, path = %path, "no mock endpoint matched and no passthrough configured, returning 404");
                    write_json(res, 404, "application/json;charset=UTF-8", b"{\"error\":\"not found\"}");
                    Ok(())
                }
            };
        };

        let incoming = IncomingRequest {
            method: &method,
            headers: &headers,
            query_params: &query,
            content_type: &content_type,
            body: &body_bytes,
        };

        match request_filter::run(&incoming, &meta) {
            FilterOutcome::Respond { status, body } => {
                info!(status, method = %method, path = %path, "validation pipeline rejected request");
                let bytes = serde_json::to_vec(&body).unwrap_or_default();
                write_json(res, status, "application/json;charset=UTF-8", &bytes);
            }
            FilterOutcome::Continue { parsed_body } => {
                let accept = headers.get("accept").cloned();
                let spec_doc = self.spec_doc.load();
                match response_builder::build(&meta, &spec_doc, &parsed_body, accept.as_deref()) {
                    Some(built) => {
                        res.status_code(built.status as usize, status_reason(built.status));
                        res.header(&format!("Content-Type: {}", built.content_type));
                        for (k, v) in &built.headers {
                            res.header(&format!("{k}: {v}"));
                        }
                        res.body_vec(built.serialize());
                        info!(status = built.status, method = %method, path = %path, "mock response sent");
                    }
                    None => {
                        let err = OuroborosError::ResponseDefinitionMissing {
                            method: method.clone(),
                            path: path.clone(),
                        };
                        warn!(%err, "endpoint has no success response defined");
                        let body = serde_json::json!({ "error": err.to_string() });
                        write_json(res, 500, "application/json;charset=UTF-8", &serde_json::to_vec(&body).unwrap_or_default());
                    }
                }
            }
        }
        Ok(())
    }
}
