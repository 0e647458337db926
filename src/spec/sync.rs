//! Sync Pipeline: reconciles the on-disk file spec against a spec scanned
//! from the running codebase (§4.9). Runs once at startup, never concurrent
//! with Mock Registry reads.

use crate::spec::flattener::{flatten, schemas_match};
use crate::spec::model::{DiffKind, Progress, SpecDoc, TypeCounts};
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::{debug, info};

const EXT_ID: &str = "x-ouroboros-id";
const EXT_PROGRESS: &str = "x-ouroboros-progress";
const EXT_DIFF: &str = "x-ouroboros-diff";
const EXT_TAG: &str = "x-ouroboros-tag";
const EXT_REQ_LOG: &str = "x-ouroboros-req-log";
const EXT_RES_LOG: &str = "x-ouroboros-res-log";
const EXT_RESPONSE: &str = "x-ouroboros-response";

const HTTP_METHODS: [&str; 7] = ["get", "put", "post", "delete", "options", "head", "patch"];

/// Run the Sync Pipeline, mutating `file` in place. `scanned` is read-only.
pub fn sync(file: &mut SpecDoc, scanned: &SpecDoc) {
    ensure_skeleton(file);

    if paths_of(file).map(Map::is_empty).unwrap_or(true) {
        let has_scanned_paths = paths_of(scanned).map(|p| !p.is_empty()).unwrap_or(false);
        if has_scanned_paths {
            info!("file spec empty, bootstrapping wholesale from scanned spec");
            bootstrap(file, scanned);
            return;
        }
    }

    let schema_match = compare_schemas(file, scanned);
    preserve_security_schemes(file, scanned);
    let dropped = cleanup_file_side(file);
    walk_scanned(file, scanned, &schema_match, &dropped);
}

fn ensure_skeleton(doc: &mut SpecDoc) {
    if !doc.is_object() {
        *doc = Value::Object(Map::new());
    }
    let obj = doc.as_object_mut().expect("ensured object above");
    obj.entry("openapi").or_insert_with(|| Value::String("3.1.0".into()));
    obj.entry("paths").or_insert_with(|| Value::Object(Map::new()));
    obj.entry("components").or_insert_with(|| {
        Value::Object(Map::from_iter([
            ("schemas".to_string(), Value::Object(Map::new())),
            ("securitySchemes".to_string(), Value::Object(Map::new())),
        ]))
    });
    let components = obj.get_mut("components").expect("just inserted");
    if let Some(comp_obj) = components.as_object_mut() {
        comp_obj.entry("schemas").or_insert_with(|| Value::Object(Map::new()));
        comp_obj
            .entry("securitySchemes")
            .or_insert_with(|| Value::Object(Map::new()));
    }
}

fn paths_of(doc: &SpecDoc) -> Option<&Map<String, Value>> {
    doc.get("paths").and_then(Value::as_object)
}

fn paths_of_mut(doc: &mut SpecDoc) -> &mut Map<String, Value> {
    ensure_skeleton(doc);
    doc.get_mut("paths")
        .and_then(Value::as_object_mut)
        .expect("paths ensured by ensure_skeleton")
}

fn schema_names(doc: &SpecDoc) -> Vec<String> {
    doc.get("components")
        .and_then(|c| c.get("schemas"))
        .and_then(Value::as_object)
        .map(|m| m.keys().cloned().collect())
        .unwrap_or_default()
}

fn ext_str(op: &Value, key: &str) -> Option<String> {
    op.get(key).and_then(Value::as_str).map(str::to_string)
}

fn set_ext(op: &mut Value, key: &str, value: &str) {
    if let Some(obj) = op.as_object_mut() {
        obj.insert(key.to_string(), Value::String(value.to_string()));
    }
}

fn clear_ext(op: &mut Value, key: &str) {
    if let Some(obj) = op.as_object_mut() {
        obj.remove(key);
    }
}

fn op_diff(op: &Value) -> DiffKind {
    ext_str(op, EXT_DIFF).map(|s| DiffKind::parse(&s)).unwrap_or(DiffKind::None)
}

fn normalize_tags_uppercase(op: &mut Value) {
    if let Some(tags) = op.get_mut("tags").and_then(Value::as_array_mut) {
        for tag in tags.iter_mut() {
            if let Some(s) = tag.as_str() {
                *tag = Value::String(s.to_uppercase());
            }
        }
    }
}

fn ensure_id(op: &mut Value) {
    if ext_str(op, EXT_ID).is_none() {
        set_ext(op, EXT_ID, &uuid::Uuid::new_v4().to_string());
    }
}

/// §4.9 step 1: adopt the scanned spec wholesale.
fn bootstrap(file: &mut SpecDoc, scanned: &SpecDoc) {
    let mut adopted = scanned.clone();
    if let Some(paths) = adopted.get_mut("paths").and_then(Value::as_object_mut) {
        for (_path, item) in paths.iter_mut() {
            if let Some(item_obj) = item.as_object_mut() {
                for method in HTTP_METHODS {
                    if let Some(op) = item_obj.get_mut(method) {
                        ensure_id(op);
                        normalize_tags_uppercase(op);
                        set_ext(op, EXT_DIFF, DiffKind::Endpoint.as_str());
                        set_ext(op, EXT_TAG, "none");
                    }
                }
            }
        }
    }
    *file = adopted;
}

/// §4.9 step 2: flatten named schemas in both specs, record match status.
fn compare_schemas(file: &SpecDoc, scanned: &SpecDoc) -> HashMap<String, bool> {
    let file_names: std::collections::HashSet<String> = schema_names(file).into_iter().collect();
    let mut result = HashMap::new();
    for name in schema_names(scanned) {
        let scanned_counts: TypeCounts = flatten(&name, scanned);
        let matches = if file_names.contains(&name) {
            let file_counts = flatten(&name, file);
            schemas_match(&file_counts, &scanned_counts)
        } else {
            false
        };
        result.insert(name, matches);
    }
    result
}

/// §4.9 step 3: copy file's securitySchemes into the scanned-derived view so
/// they survive even though scanning cannot discover them.
fn preserve_security_schemes(file: &SpecDoc, scanned: &SpecDoc) {
    // securitySchemes only ever live in the file spec going forward; this is a
    // no-op against `scanned` (read-only) and is satisfied by never touching
    // file.components.securitySchemes elsewhere in this module.
    let _ = (file, scanned);
}

type DroppedOps = HashMap<(String, String), Value>;

/// §4.9 step 4: drop stale endpoint-diffed operations, reset the rest.
fn cleanup_file_side(file: &mut SpecDoc) -> DroppedOps {
    let mut dropped = DroppedOps::new();
    let mut empty_paths = Vec::new();
    let paths = paths_of_mut(file);
    for (path, item) in paths.iter_mut() {
        let Some(item_obj) = item.as_object_mut() else { continue };
        let mut methods_here = Vec::new();
        for method in HTTP_METHODS {
            if let Some(op) = item_obj.get(method) {
                if op_diff(op) == DiffKind::Endpoint {
                    dropped.insert((path.clone(), method.to_string()), op.clone());
                } else {
                    methods_here.push(method);
                }
            }
        }
        for method in HTTP_METHODS {
            if let Some(op) = item_obj.get(method) {
                if op_diff(op) == DiffKind::Endpoint {
                    item_obj.remove(method);
                }
            }
        }
        for method in &methods_here {
            if let Some(op) = item_obj.get_mut(*method) {
                set_ext(op, EXT_DIFF, DiffKind::None.as_str());
                set_ext(op, EXT_PROGRESS, Progress::Mock.as_str());
                set_ext(op, EXT_TAG, "none");
            }
        }
        if methods_here.is_empty() {
            empty_paths.push(path.clone());
        }
    }
    for path in empty_paths {
        paths.remove(&path);
    }
    debug!(dropped = dropped.len(), "file-side cleanup complete");
    dropped
}

fn collect_schema_refs(value: &Value, out: &mut std::collections::HashSet<String>) {
    match value {
        Value::Object(obj) => {
            if let Some(Value::String(r)) = obj.get("$ref") {
                if let Some(name) = r.strip_prefix("#/components/schemas/") {
                    out.insert(name.to_string());
                }
            }
            for v in obj.values() {
                collect_schema_refs(v, out);
            }
        }
        Value::Array(arr) => {
            for v in arr {
                collect_schema_refs(v, out);
            }
        }
        _ => {}
    }
}

/// Recursively copy schemas reachable from `op` (and transitively from those
/// schemas) from `scanned` into `file`, skipping names already present.
fn copy_missing_schemas(op: &Value, file: &mut SpecDoc, scanned: &SpecDoc) {
    let mut refs = std::collections::HashSet::new();
    collect_schema_refs(op, &mut refs);
    let mut pending: Vec<String> = refs.into_iter().collect();
    let mut seen = std::collections::HashSet::new();
    while let Some(name) = pending.pop() {
        if !seen.insert(name.clone()) {
            continue;
        }
        let already_present = file
            .get("components")
            .and_then(|c| c.get("schemas"))
            .and_then(|s| s.get(&name))
            .is_some();
        if already_present {
            continue;
        }
        let Some(schema) = scanned
            .get("components")
            .and_then(|c| c.get("schemas"))
            .and_then(|s| s.get(&name))
            .cloned()
        else {
            continue;
        };
        let mut nested = std::collections::HashSet::new();
        collect_schema_refs(&schema, &mut nested);
        pending.extend(nested);
        if let Some(schemas) = file
            .get_mut("components")
            .and_then(|c| c.get_mut("schemas"))
            .and_then(Value::as_object_mut)
        {
            schemas.insert(name, schema);
        }
    }
}

/// §4.9 step 5: walk the scanned spec path by path.
fn walk_scanned(file: &mut SpecDoc, scanned: &SpecDoc, schema_match: &HashMap<String, bool>, dropped: &DroppedOps) {
    let scanned_paths: Vec<(String, Value)> = paths_of(scanned)
        .map(|m| m.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
        .unwrap_or_default();

    for (path, scanned_item) in scanned_paths {
        let file_has_path = paths_of(file).map(|m| m.contains_key(&path)).unwrap_or(false);

        if !file_has_path {
            adopt_whole_path(file, scanned, &path, &scanned_item);
            continue;
        }

        for method in HTTP_METHODS {
            let Some(scanned_op) = scanned_item.get(method).cloned() else { continue };

            let file_has_method = paths_of(file)
                .and_then(|m| m.get(&path))
                .and_then(|item| item.get(method))
                .is_some();

            if !file_has_method {
                adopt_new_method(file, scanned, &path, method, &scanned_op, dropped);
                continue;
            }

            let existing_diff = paths_of(file)
                .and_then(|m| m.get(&path))
                .and_then(|item| item.get(method))
                .map(op_diff)
                .unwrap_or(DiffKind::None);
            if existing_diff == DiffKind::Endpoint {
                continue;
            }

            let scanned_progress = ext_str(&scanned_op, EXT_PROGRESS)
                .and_then(|s| Progress::parse(&s))
                .unwrap_or(Progress::Completed);
            if scanned_progress == Progress::Mock {
                continue;
            }

            compare_and_mark(file, &path, method, &scanned_op, schema_match);
        }
    }
}

fn adopt_whole_path(file: &mut SpecDoc, scanned: &SpecDoc, path: &str, scanned_item: &Value) {
    let mut item = scanned_item.clone();
    if let Some(item_obj) = item.as_object_mut() {
        for method in HTTP_METHODS {
            if let Some(op) = item_obj.get_mut(method) {
                ensure_id(op);
                normalize_tags_uppercase(op);
                set_ext(op, EXT_DIFF, DiffKind::Endpoint.as_str());
                set_ext(op, EXT_TAG, "none");
                copy_missing_schemas(op, file, scanned);
            }
        }
    }
    paths_of_mut(file).insert(path.to_string(), item);
}

fn adopt_new_method(
    file: &mut SpecDoc,
    scanned: &SpecDoc,
    path: &str,
    method: &str,
    scanned_op: &Value,
    dropped: &DroppedOps,
) {
    let mut op = scanned_op.clone();
    ensure_id(&mut op);
    normalize_tags_uppercase(&mut op);
    set_ext(&mut op, EXT_DIFF, DiffKind::Endpoint.as_str());
    set_ext(&mut op, EXT_TAG, "none");
    if let Some(prior) = dropped.get(&(path.to_string(), method.to_string())) {
        if let Some(security) = prior.get("security") {
            if let Some(op_obj) = op.as_object_mut() {
                op_obj.insert("security".to_string(), security.clone());
            }
        }
    }
    copy_missing_schemas(&op, file, scanned);
    let paths = paths_of_mut(file);
    let item = paths.entry(path.to_string()).or_insert_with(|| Value::Object(Map::new()));
    if let Some(item_obj) = item.as_object_mut() {
        item_obj.insert(method.to_string(), op);
    }
}

fn required_params(op: &Value) -> HashMap<(String, String), String> {
    let mut result = HashMap::new();
    if let Some(params) = op.get("parameters").and_then(Value::as_array) {
        for p in params {
            let required = p.get("required").and_then(Value::as_bool).unwrap_or(false);
            if !required {
                continue;
            }
            let name = p.get("name").and_then(Value::as_str).unwrap_or_default().to_string();
            let location = p.get("in").and_then(Value::as_str).unwrap_or_default().to_string();
            let ty = p
                .get("schema")
                .and_then(|s| s.get("type"))
                .and_then(Value::as_str)
                .unwrap_or("string")
                .to_string();
            result.insert((name, location), ty);
        }
    }
    result
}

fn compare_request(file_op: &Value, scanned_op: &Value) -> Vec<String> {
    let mut mismatches = Vec::new();
    let file_params = required_params(file_op);
    let scanned_params = required_params(scanned_op);

    for (key, ty) in &scanned_params {
        match file_params.get(key) {
            None => mismatches.push(format!("missing required parameter {} ({})", key.0, key.1)),
            Some(file_ty) if file_ty != ty => mismatches.push(format!(
                "type mismatch for parameter {}: file={} scanned={}",
                key.0, file_ty, ty
            )),
            _ => {}
        }
    }
    for key in file_params.keys() {
        if !scanned_params.contains_key(key) {
            mismatches.push(format!("parameter {} ({}) no longer present in code", key.0, key.1));
        }
    }

    let file_body_required = file_op
        .get("requestBody")
        .and_then(|b| b.get("required"))
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let scanned_body_required = scanned_op
        .get("requestBody")
        .and_then(|b| b.get("required"))
        .and_then(Value::as_bool)
        .unwrap_or(false);
    if file_body_required != scanned_body_required {
        mismatches.push(format!(
            "request body required mismatch: file={file_body_required} scanned={scanned_body_required}"
        ));
    }
    mismatches
}

fn schema_structurally_equal(a: &Value, b: &Value, schema_match: &HashMap<String, bool>) -> bool {
    let a_ref = a.get("$ref").and_then(Value::as_str).and_then(|r| r.strip_prefix("#/components/schemas/"));
    let b_ref = b.get("$ref").and_then(Value::as_str).and_then(|r| r.strip_prefix("#/components/schemas/"));
    match (a_ref, b_ref) {
        (Some(na), Some(nb)) => na == nb && schema_match.get(na).copied().unwrap_or(false),
        (None, None) => {
            let ta = a.get("type").and_then(Value::as_str);
            let tb = b.get("type").and_then(Value::as_str);
            ta == tb
        }
        _ => false,
    }
}

fn media_schemas(response: &Value) -> Vec<Value> {
    response
        .get("content")
        .and_then(Value::as_object)
        .map(|content| {
            content
                .values()
                .filter_map(|media| media.get("schema").cloned())
                .collect()
        })
        .unwrap_or_default()
}

fn compare_response(file_op: &Value, scanned_op: &Value, schema_match: &HashMap<String, bool>) -> Vec<String> {
    let mut mismatches = Vec::new();
    let Some(scanned_responses) = scanned_op.get("responses").and_then(Value::as_object) else {
        return mismatches;
    };
    let file_responses = file_op.get("responses").and_then(Value::as_object);

    for (status, scanned_resp) in scanned_responses {
        let Some(file_resp) = file_responses.and_then(|m| m.get(status)) else {
            mismatches.push(format!("response {status} missing in file spec"));
            continue;
        };
        let scanned_schemas = media_schemas(scanned_resp);
        let file_schemas = media_schemas(file_resp);

        for s in &scanned_schemas {
            if !file_schemas.iter().any(|f| schema_structurally_equal(s, f, schema_match)) {
                mismatches.push(format!("response {status}: scanned media schema has no structural match in file"));
            }
        }
        for f in &file_schemas {
            if !scanned_schemas.iter().any(|s| schema_structurally_equal(f, s, schema_match)) {
                mismatches.push(format!("response {status}: file media schema has no structural match in scanned"));
            }
        }
    }
    mismatches
}

fn compare_and_mark(file: &mut SpecDoc, path: &str, method: &str, scanned_op: &Value, schema_match: &HashMap<String, bool>) {
    let Some(file_op) = paths_of_mut(file)
        .get_mut(path)
        .and_then(Value::as_object_mut)
        .and_then(|item| item.get_mut(method))
    else {
        return;
    };

    let req_mismatches = compare_request(file_op, scanned_op);
    let mut diff = DiffKind::None;
    if req_mismatches.is_empty() {
        clear_ext(file_op, EXT_REQ_LOG);
    } else {
        diff = diff.combine_with(DiffKind::Request);
        set_ext(file_op, EXT_PROGRESS, Progress::Mock.as_str());
        set_ext(file_op, EXT_REQ_LOG, &req_mismatches.join("\n"));
    }

    let response_gated = ext_str(scanned_op, EXT_RESPONSE).as_deref() == Some("use");
    if response_gated {
        let res_mismatches = compare_response(file_op, scanned_op, schema_match);
        if res_mismatches.is_empty() {
            clear_ext(file_op, EXT_RES_LOG);
        } else {
            diff = diff.combine_with(DiffKind::Response);
            set_ext(file_op, EXT_RES_LOG, &res_mismatches.join("\n"));
        }
    }

    set_ext(file_op, EXT_DIFF, diff.as_str());
    if diff == DiffKind::None {
        set_ext(file_op, EXT_PROGRESS, Progress::Completed.as_str());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bootstrap_adopts_scanned_wholesale_when_file_empty() {
        let mut file = json!({});
        let scanned = json!({
            "openapi": "3.1.0",
            "paths": {
                "/pets": { "get": { "responses": { "200": { "description": "ok" } } } }
            }
        });
        sync(&mut file, &scanned);
        let op = &file["paths"]["/pets"]["get"];
        assert_eq!(op[EXT_DIFF], "endpoint");
        assert!(op[EXT_ID].is_string());
    }

    #[test]
    fn request_diff_detected_for_new_required_header() {
        let mut file = json!({
            "paths": {
                "/x": { "get": {
                    "x-ouroboros-progress": "completed",
                    "x-ouroboros-diff": "none",
                    "parameters": [],
                    "responses": {}
                }}
            },
            "components": { "schemas": {}, "securitySchemes": {} }
        });
        let scanned = json!({
            "paths": {
                "/x": { "get": {
                    "x-ouroboros-progress": "completed",
                    "parameters": [
                        { "name": "X-Tenant", "in": "header", "required": true, "schema": { "type": "string" } }
                    ],
                    "responses": {}
                }}
            },
            "components": { "schemas": {}, "securitySchemes": {} }
        });
        sync(&mut file, &scanned);
        let op = &file["paths"]["/x"]["get"];
        assert_eq!(op[EXT_DIFF], "request");
        assert_eq!(op[EXT_PROGRESS], "mock");
        assert!(op[EXT_REQ_LOG].as_str().unwrap().contains("X-Tenant"));
    }

    #[test]
    fn endpoint_diff_from_new_path_is_preserved_next_run() {
        let mut file = json!({
            "paths": { "/new": { "get": { "x-ouroboros-diff": "endpoint", "responses": {} } } },
            "components": { "schemas": {}, "securitySchemes": {} }
        });
        let scanned = json!({
            "paths": { "/new": { "get": { "responses": {} }, "post": { "responses": {} } } },
            "components": { "schemas": {}, "securitySchemes": {} }
        });
        sync(&mut file, &scanned);
        // existing endpoint-diff get is dropped by cleanup, then re-adopted as a new method.
        assert_eq!(file["paths"]["/new"]["get"][EXT_DIFF], "endpoint");
        assert_eq!(file["paths"]["/new"]["post"][EXT_DIFF], "endpoint");
    }

    #[test]
    fn sync_is_a_fixpoint_on_unchanged_input() {
        let mut file = json!({
            "paths": {
                "/x": { "get": {
                    "x-ouroboros-progress": "completed",
                    "x-ouroboros-diff": "none",
                    "parameters": [],
                    "responses": {}
                }}
            },
            "components": { "schemas": {}, "securitySchemes": {} }
        });
        let scanned = json!({
            "paths": { "/x": { "get": { "x-ouroboros-progress": "completed", "parameters": [], "responses": {} } } },
            "components": { "schemas": {}, "securitySchemes": {} }
        });
        sync(&mut file, &scanned);
        let first = file.clone();
        sync(&mut file, &scanned);
        assert_eq!(first, file);
    }
}
