//! Core data types shared by the loader, resolver, registry, and sync pipeline.
//!
//! A `Schema` and a `SpecDoc` are both plain [`serde_json::Value`] trees. The
//! whole-document model deliberately stays untyped: the sync pipeline needs to
//! read and write arbitrary `x-ouroboros-*` fields alongside standard OpenAPI
//! keys without a struct definition fighting it at every turn, exactly the way
//! the reference loader bridges YAML into a `serde_json::Value` and back. Order
//! sensitivity (§3, §9 of the design) is carried by enabling serde_json's
//! `preserve_order` feature crate-wide, so `Value::Object` iterates in
//! insertion order with no extra dependency.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// A JSON Schema subtree: either a `$ref` pointer or an inline type description.
pub type Schema = Value;

/// The whole parsed OpenAPI document.
pub type SpecDoc = Value;

/// HTTP verb, normalized to uppercase as used in registry keys.
pub type Method = String;

/// Progress marker carried on `x-ouroboros-progress`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Progress {
    Mock,
    Completed,
}

impl Progress {
    pub fn as_str(self) -> &'static str {
        match self {
            Progress::Mock => "mock",
            Progress::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "mock" => Some(Progress::Mock),
            "completed" => Some(Progress::Completed),
            _ => None,
        }
    }
}

/// Diff classification carried on `x-ouroboros-diff`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffKind {
    None,
    Request,
    Response,
    Endpoint,
    Both,
}

impl DiffKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DiffKind::None => "none",
            DiffKind::Request => "request",
            DiffKind::Response => "response",
            DiffKind::Endpoint => "endpoint",
            DiffKind::Both => "both",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "request" => DiffKind::Request,
            "response" => DiffKind::Response,
            "endpoint" => DiffKind::Endpoint,
            "both" => DiffKind::Both,
            _ => DiffKind::None,
        }
    }

    /// Combine a request-side and response-side diff per §4.9's `diff=both` rule.
    pub fn combine_with(self, other: DiffKind) -> DiffKind {
        match (self, other) {
            (DiffKind::None, x) => x,
            (x, DiffKind::None) => x,
            (a, b) if a == b => a,
            _ => DiffKind::Both,
        }
    }
}

/// Tag carried on `x-ouroboros-tag`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tag {
    None,
    Implementing,
    Bugfix,
}

impl Tag {
    pub fn as_str(self) -> &'static str {
        match self {
            Tag::None => "none",
            Tag::Implementing => "implementing",
            Tag::Bugfix => "bugfix",
        }
    }
}

/// Where a request parameter is carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterLocation {
    Path,
    Query,
    Header,
    Cookie,
}

/// Runtime handle for a single registered mock endpoint, derived from a
/// `progress: mock` operation in the file spec.
#[derive(Debug, Clone)]
pub struct EndpointMeta {
    pub id: String,
    pub path: String,
    pub method: Method,
    pub required_headers: Vec<String>,
    pub required_params: Vec<String>,
    pub auth_headers: Vec<String>,
    pub request_body_required: bool,
    pub request_body_schema: Option<Schema>,
    pub request_body_content_type: Option<String>,
    /// Ordered by declaration in the spec; insertion order backs the
    /// "first response defined" fallback tier of §4.7's success priority.
    pub responses: Vec<(u16, ResponseMeta)>,
}

impl EndpointMeta {
    pub fn response(&self, status: u16) -> Option<&ResponseMeta> {
        self.responses.iter().find(|(code, _)| *code == status).map(|(_, r)| r)
    }

    /// Select a response per the §4.7 success-code priority: 200 > 201 > 204 >
    /// first other 2xx > first response defined.
    pub fn select_success_response(&self) -> Option<(u16, &ResponseMeta)> {
        for preferred in [200u16, 201, 204] {
            if let Some(r) = self.response(preferred) {
                return Some((preferred, r));
            }
        }
        if let Some((code, r)) = self
            .responses
            .iter()
            .find(|(code, _)| (200..300).contains(code))
        {
            return Some((*code, r));
        }
        self.responses.first().map(|(code, r)| (*code, r))
    }
}

#[derive(Debug, Clone)]
pub struct ResponseMeta {
    pub status_code: u16,
    pub content_type: Option<String>,
    pub headers: BTreeMap<String, String>,
    pub body: Option<Schema>,
}

/// A leaf-type multiset produced by the Schema Flattener (§4.8).
pub type TypeCounts = BTreeMap<String, u64>;
