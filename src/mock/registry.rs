//! Mock Registry: maps (method, path-with-params) to [`EndpointMeta`], with
//! exact-match lookup first and regex-template matching on miss (§4.2).

use crate::spec::model::EndpointMeta;
use dashmap::DashMap;
use once_cell::sync::OnceCell;
use regex::Regex;
use std::sync::Arc;
use tracing::debug;

fn normalize(path: &str) -> String {
    if path.len() > 1 && path.ends_with('/') {
        path.trim_end_matches('/').to_string()
    } else {
        path.to_string()
    }
}

fn key(method: &str, path: &str) -> String {
    format!("{}:{}", method.to_uppercase(), normalize(path))
}

struct TemplateEntry {
    method: String,
    path: String,
    meta: Arc<EndpointMeta>,
    pattern: OnceCell<Regex>,
}

impl TemplateEntry {
    fn compiled(&self) -> &Regex {
        self.pattern.get_or_init(|| compile_template(&self.path))
    }
}

/// Escape regex metacharacters in literal path segments, replace `{name}`
/// segments with `[^/]+`, and anchor the whole pattern.
fn compile_template(path: &str) -> Regex {
    let mut pattern = String::with_capacity(path.len() + 8);
    pattern.push('^');
    for (i, segment) in path.split('/').enumerate() {
        if i > 0 {
            pattern.push('/');
        }
        if segment.starts_with('{') && segment.ends_with('}') && segment.len() >= 2 {
            pattern.push_str("[^/]+");
        } else {
            pattern.push_str(&regex::escape(segment));
        }
    }
    pattern.push('$');
    // Template paths are produced by the spec loader, not attacker input;
    // a compile failure here indicates a malformed spec, not a runtime error.
    #[allow(clippy::expect_used)]
    Regex::new(&pattern).expect("path template compiles to a valid regex")
}

/// Thread-safe table of registered mock endpoints.
#[derive(Default)]
pub struct MockRegistry {
    exact: DashMap<String, Arc<EndpointMeta>>,
    templates: DashMap<String, TemplateEntry>,
}

impl MockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an endpoint under `METHOD:normalize(path)`. Overwrites any
    /// existing entry with the same key (permissive policy, §4.2 open question).
    pub fn register(&self, meta: EndpointMeta) {
        let k = key(&meta.method, &meta.path);
        let meta = Arc::new(meta);
        debug!(key = %k, "registering mock endpoint");
        self.exact.insert(k.clone(), meta.clone());
        if meta.path.contains('{') {
            self.templates.insert(
                k,
                TemplateEntry {
                    method: meta.method.clone(),
                    path: meta.path.clone(),
                    meta,
                    pattern: OnceCell::new(),
                },
            );
        }
    }

    /// Exact match first, then iterate templates with matching method.
    pub fn find(&self, path: &str, method: &str) -> Option<Arc<EndpointMeta>> {
        let k = key(method, path);
        if let Some(entry) = self.exact.get(&k) {
            return Some(entry.clone());
        }
        let normalized = normalize(path);
        let method = method.to_uppercase();
        for entry in self.templates.iter() {
            if entry.method != method {
                continue;
            }
            if entry.compiled().is_match(&normalized) {
                return Some(entry.meta.clone());
            }
        }
        None
    }

    pub fn clear(&self) {
        self.exact.clear();
        self.templates.clear();
    }

    pub fn len(&self) -> usize {
        self.exact.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exact.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(method: &str, path: &str) -> EndpointMeta {
        EndpointMeta {
            id: "id".into(),
            path: path.into(),
            method: method.into(),
            required_headers: vec![],
            required_params: vec![],
            auth_headers: vec![],
            request_body_required: false,
            request_body_schema: None,
            request_body_content_type: None,
            responses: vec![],
        }
    }

    #[test]
    fn exact_match_wins_over_template() {
        let reg = MockRegistry::new();
        reg.register(meta("GET", "/api/users/{id}"));
        reg.register(meta("GET", "/api/users/me"));
        let found = reg.find("/api/users/me", "GET").unwrap();
        assert_eq!(found.path, "/api/users/me");
        let found = reg.find("/api/users/7", "GET").unwrap();
        assert_eq!(found.path, "/api/users/{id}");
    }

    #[test]
    fn literal_segments_are_regex_escaped() {
        let reg = MockRegistry::new();
        reg.register(meta("GET", "/api/v1.0/{id}"));
        assert!(reg.find("/api/v1.0/42", "GET").is_some());
        // `.` in the literal segment must not match an arbitrary character.
        assert!(reg.find("/api/v1X0/42", "GET").is_none());
    }

    #[test]
    fn normalize_strips_single_trailing_slash() {
        let reg = MockRegistry::new();
        reg.register(meta("GET", "/api/users"));
        assert!(reg.find("/api/users/", "GET").is_some());
    }

    #[test]
    fn register_overwrites_existing_entry() {
        let reg = MockRegistry::new();
        reg.register(meta("GET", "/x"));
        let mut second = meta("GET", "/x");
        second.id = "other-id".into();
        reg.register(second);
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.find("/x", "GET").unwrap().id, "other-id");
    }
}
